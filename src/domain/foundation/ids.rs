//! Identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ValidationError;

/// Identity of an application user, as issued by the user directory.
///
/// Opaque to this service: it is looked up, never created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new UserId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::empty_field("user_id"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_accepts_non_empty_string() {
        let id = UserId::new("user_42").unwrap();
        assert_eq!(id.as_str(), "user_42");
    }

    #[test]
    fn user_id_rejects_empty_string() {
        let result = UserId::new("");
        match result {
            Err(ValidationError::EmptyField { field }) => assert_eq!(field, "user_id"),
            _ => panic!("Expected EmptyField error"),
        }
    }

    #[test]
    fn user_id_displays_correctly() {
        let id = UserId::new("user-456").unwrap();
        assert_eq!(format!("{}", id), "user-456");
    }

    #[test]
    fn user_id_serializes_as_plain_string() {
        let id = UserId::new("user-789").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"user-789\"");
    }
}
