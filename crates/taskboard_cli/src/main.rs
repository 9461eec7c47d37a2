//! Task board command-line driver.
//!
//! # Responsibility
//! - Bootstrap config, logging and the durable SQLite store.
//! - Map subcommands onto `BoardService` queries and commands.

use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use taskboard_core::db::open_db;
use taskboard_core::{
    init_logging, BoardConfig, BoardService, KvRepository, PersistenceGateway, SqliteKvRepository,
};

#[derive(Debug, Parser)]
#[command(name = "taskboard", version, about = "Single-user task board")]
struct Cli {
    /// SQLite file holding the board (overrides TASKBOARD_DB_PATH).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log level (overrides TASKBOARD_LOG_LEVEL).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print category/task counts.
    Summary,
    /// Print categories and their tasks.
    List,
    AddCategory {
        name: String,
    },
    RenameCategory {
        id: String,
        name: String,
    },
    RemoveCategory {
        id: String,
    },
    AddTask {
        category_id: String,
        title: String,
    },
    /// Flip a task between open and done.
    Toggle {
        id: String,
    },
    RenameTask {
        id: String,
        title: String,
    },
    RemoveTask {
        id: String,
    },
    /// Hide a category's tasks in `list`.
    Collapse {
        category_id: String,
    },
    Expand {
        category_id: String,
    },
    /// Remove done tasks from one category.
    ClearCompleted {
        category_id: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut config = BoardConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    if let Err(err) = init_logging(&config.log_level, &config.log_dir.to_string_lossy()) {
        eprintln!("warning: file logging disabled: {err}");
    }

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &BoardConfig) -> Result<(), Box<dyn Error>> {
    let conn = open_db(&config.db_path)?;
    let repo = SqliteKvRepository::try_new(&conn)?;
    let gateway = PersistenceGateway::with_key(repo, config.storage_key.as_str());
    let mut board = BoardService::new(gateway);

    match command {
        Command::Summary => print_summary(&board),
        Command::List => print_list(&board),
        Command::AddCategory { name } => println!("{}", board.add_category(&name)?),
        Command::RenameCategory { id, name } => board.rename_category(&id, &name)?,
        Command::RemoveCategory { id } => board.remove_category(&id)?,
        Command::AddTask { category_id, title } => {
            println!("{}", board.add_task(&category_id, &title)?);
        }
        Command::Toggle { id } => board.toggle_task(&id)?,
        Command::RenameTask { id, title } => board.rename_task(&id, &title)?,
        Command::RemoveTask { id } => board.remove_task(&id)?,
        Command::Collapse { category_id } => board.set_collapsed(&category_id, true),
        Command::Expand { category_id } => board.set_collapsed(&category_id, false),
        Command::ClearCompleted { category_id } => {
            println!("removed {}", board.clear_completed(&category_id)?);
        }
    }

    if !board.is_persisted() {
        return Err(format!(
            "change was not saved to `{}`; see log for the storage error",
            config.db_path.display()
        )
        .into());
    }
    Ok(())
}

fn print_summary<R: KvRepository>(board: &BoardService<R>) {
    let state = board.state();
    let done = state.tasks.iter().filter(|task| task.done).count();
    println!("taskboard_core version={}", taskboard_core::core_version());
    println!("schema_version={}", state.meta.version);
    println!("categories={}", state.categories.len());
    println!("tasks={} done={}", state.tasks.len(), done);
}

fn print_list<R: KvRepository>(board: &BoardService<R>) {
    for category in board.categories() {
        let progress = board.category_progress(&category.id);
        let collapsed = board.is_collapsed(&category.id);
        println!(
            "{} {} ({}/{})  {}",
            if collapsed { "+" } else { "-" },
            category.name,
            progress.done,
            progress.total,
            category.id
        );
        if collapsed {
            continue;
        }
        for task in board.tasks_by_category(&category.id) {
            println!(
                "    [{}] {}  {}",
                if task.done { "x" } else { " " },
                task.title,
                task.id
            );
        }
    }
}
