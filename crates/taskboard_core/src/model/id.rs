//! Identifier generation for categories and tasks.
//!
//! # Responsibility
//! - Produce process-unique, human-traceable ids of the shape
//!   `<prefix>_<time36>_<random hex>`.
//!
//! # Invariants
//! - Generation never panics, even when the clock reads before the epoch.
//! - The prefix is kept verbatim so ids stay readable in logs.

use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier of a category.
pub type CategoryId = String;
/// Stable identifier of a task.
pub type TaskId = String;

/// Prefix used for generated category ids.
pub const CATEGORY_ID_PREFIX: &str = "cat";
/// Prefix used for generated task ids.
pub const TASK_ID_PREFIX: &str = "task";

const RANDOM_SUFFIX_LEN: usize = 8;

/// Generates a new identifier for the given prefix.
///
/// The time component is milliseconds since the Unix epoch in base 36; the
/// random component is taken from a v4 UUID.
pub fn uid(prefix: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0);
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{prefix}_{}_{}",
        to_base36(millis),
        &random[..RANDOM_SUFFIX_LEN]
    )
}

fn to_base36(mut value: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::{to_base36, uid, CATEGORY_ID_PREFIX};
    use std::collections::HashSet;

    #[test]
    fn uid_keeps_prefix_and_three_segments() {
        let id = uid(CATEGORY_ID_PREFIX);
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "cat");
        assert!(!parts[1].is_empty());
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn uid_does_not_repeat_in_tight_loop() {
        let ids: HashSet<String> = (0..1_000).map(|_| uid("task")).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn base36_encodes_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }
}
