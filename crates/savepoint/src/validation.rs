//! Username rules shared by profile setup and updates.

use crate::{Result, SavepointError};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 25;

/// Names nobody may claim, compared case-insensitively.
pub const RESERVED_USERNAMES: &[&str] = &["admin", "support", "savepoint", "moderator", "root", "system"];

/// Check a requested username, returning the first rule it breaks.
pub fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(SavepointError::Validation(
            "Username must be 3-25 characters".to_string(),
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(SavepointError::Validation(
            "Username can only contain letters, numbers, _, -, and .".to_string(),
        ));
    }

    let lowered = username.to_ascii_lowercase();
    if RESERVED_USERNAMES.contains(&lowered.as_str()) {
        return Err(SavepointError::Validation(
            "Username is not allowed".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_of(username: &str) -> String {
        validate_username(username).unwrap_err().to_string()
    }

    #[test]
    fn test_length_bounds() {
        assert_eq!(error_of(""), "Username must be 3-25 characters");
        assert_eq!(error_of("ab"), "Username must be 3-25 characters");
        assert_eq!(error_of(&"a".repeat(26)), "Username must be 3-25 characters");
        assert!(validate_username("abc").is_ok());
        assert!(validate_username(&"a".repeat(25)).is_ok());
    }

    #[test]
    fn test_allowed_characters() {
        for ok in ["johndoe", "JOHNDOE", "user123", "john_doe", "john-doe", "john.doe", "___", "1st"] {
            assert!(validate_username(ok).is_ok(), "{} should be valid", ok);
        }
        for bad in ["john doe", "jöhn", "gamer🎮", "'; DROP TABLE--", "<script>"] {
            assert_eq!(
                error_of(bad),
                "Username can only contain letters, numbers, _, -, and .",
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_reserved_names_any_case() {
        for reserved in ["admin", "ADMIN", "Admin", "support", "SavePoint", "MODERATOR", "root", "System"] {
            assert_eq!(error_of(reserved), "Username is not allowed");
        }
        assert!(validate_username("administrator").is_ok());
    }
}
