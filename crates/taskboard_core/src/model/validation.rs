//! Pure validation rules for category names and task titles.
//!
//! # Responsibility
//! - Enforce trimmed length bounds and case-insensitive name uniqueness.
//! - Return a definite `Ok`/`Err` for every input.
//!
//! # Invariants
//! - Functions here are deterministic and side-effect free.
//! - Length is counted in Unicode scalar values of the trimmed input.

use crate::model::id::CategoryId;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const CATEGORY_NAME_MIN: usize = 2;
pub const CATEGORY_NAME_MAX: usize = 40;
pub const TASK_TITLE_MIN: usize = 2;
pub const TASK_TITLE_MAX: usize = 140;

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Field a length rule was applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationField {
    CategoryName,
    TaskTitle,
}

impl ValidationField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CategoryName => "category name",
            Self::TaskTitle => "task title",
        }
    }
}

/// Structured reason a command input was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Trimmed input is shorter than `min` or longer than `max`.
    InvalidLength {
        field: ValidationField,
        min: usize,
        max: usize,
        actual: usize,
    },
    /// Another category already uses this name (case-insensitive).
    DuplicateName(String),
    /// Task target category does not exist.
    UnknownCategory(CategoryId),
}

impl ValidationError {
    /// Stable machine-readable reason code for UI mapping.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidLength { .. } => "invalid_length",
            Self::DuplicateName(_) => "duplicate_name",
            Self::UnknownCategory(_) => "unknown_category",
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLength {
                field,
                min,
                max,
                actual,
            } => write!(
                f,
                "{} must be {min}-{max} characters, got {actual}",
                field.as_str()
            ),
            Self::DuplicateName(name) => write!(f, "category name already exists: `{name}`"),
            Self::UnknownCategory(id) => write!(f, "category not found: {id}"),
        }
    }
}

impl Error for ValidationError {}

/// Validates a category name against length bounds and existing names.
///
/// `existing_lowercase_names` must already exclude the category being
/// renamed, if any.
///
/// # Errors
/// - `InvalidLength` when the trimmed name is outside 2..=40 chars.
/// - `DuplicateName` when the lower-cased trimmed name is already taken.
pub fn validate_category_name(
    name: &str,
    existing_lowercase_names: &HashSet<String>,
) -> ValidationResult<()> {
    let trimmed = name.trim();
    check_length(
        trimmed,
        ValidationField::CategoryName,
        CATEGORY_NAME_MIN,
        CATEGORY_NAME_MAX,
    )?;
    if existing_lowercase_names.contains(&trimmed.to_lowercase()) {
        return Err(ValidationError::DuplicateName(trimmed.to_string()));
    }
    Ok(())
}

/// Validates a task title against length bounds.
///
/// # Errors
/// - `InvalidLength` when the trimmed title is outside 2..=140 chars.
pub fn validate_task_title(title: &str) -> ValidationResult<()> {
    check_length(
        title.trim(),
        ValidationField::TaskTitle,
        TASK_TITLE_MIN,
        TASK_TITLE_MAX,
    )
}

fn check_length(
    trimmed: &str,
    field: ValidationField,
    min: usize,
    max: usize,
) -> ValidationResult<()> {
    let actual = trimmed.chars().count();
    if actual < min || actual > max {
        return Err(ValidationError::InvalidLength {
            field,
            min,
            max,
            actual,
        });
    }
    Ok(())
}
