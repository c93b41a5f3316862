/*
    types.rs - Common types for the permission model

    Defines:
    - Timestamps used for node expiry
    - Name and context normalisation
*/

use super::errors::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum length of a group or track name
pub const MAX_NAME_LENGTH: usize = 36;

/// Unix timestamp in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create a timestamp representing the current time
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_secs())
    }

    /// Create a timestamp from seconds since epoch
    pub fn from_secs(secs: u64) -> Self {
        Timestamp(secs)
    }

    /// Get seconds since epoch
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// A timestamp `secs` seconds after this one
    pub fn plus_secs(&self, secs: u64) -> Self {
        Timestamp(self.0.saturating_add(secs))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lowercase and validate a group or track name.
///
/// Names end up as store keys (and file names for the file backend), so only
/// `[a-z0-9_-]` is accepted.
pub fn validate_name(name: &str) -> Result<String, ModelError> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(ModelError::InvalidName {
            name,
            reason: "name is empty".to_string(),
        });
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(ModelError::InvalidName {
            name,
            reason: format!("longer than {} characters", MAX_NAME_LENGTH),
        });
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ModelError::InvalidName {
            name,
            reason: "only letters, digits, '_' and '-' are allowed".to_string(),
        });
    }
    Ok(name)
}

/// Normalise an optional context value.
///
/// Contexts are case-insensitive and the literal `global` means "no context".
pub fn normalize_context(context: Option<&str>) -> Option<String> {
    let context = context?.trim().to_lowercase();
    if context.is_empty() || context == super::node::GLOBAL_CONTEXT {
        None
    } else {
        Some(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_lowercases() {
        assert_eq!(validate_name("Admin").unwrap(), "admin");
        assert_eq!(validate_name(" mod_2 ").unwrap(), "mod_2");
    }

    #[test]
    fn test_validate_name_rejects_bad_input() {
        assert!(validate_name("").is_err());
        assert!(validate_name("has space").is_err());
        assert!(validate_name("../etc").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_normalize_context() {
        assert_eq!(normalize_context(None), None);
        assert_eq!(normalize_context(Some("global")), None);
        assert_eq!(normalize_context(Some("GLOBAL")), None);
        assert_eq!(normalize_context(Some("")), None);
        assert_eq!(normalize_context(Some("ServerA")), Some("servera".to_string()));
    }

    #[test]
    fn test_timestamp_ordering() {
        let t = Timestamp::from_secs(100);
        assert!(t < t.plus_secs(1));
        assert_eq!(t.plus_secs(u64::MAX).as_secs(), u64::MAX);
    }
}
