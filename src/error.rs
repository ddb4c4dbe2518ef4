// Error taxonomy for the domain store.

use thiserror::Error;

/// Coarse cause of a store failure, for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Io,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            // A document that no longer parses is as unusable as an unreadable one.
            StoreError::Io(_) | StoreError::Serialization(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound(what.into())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(StoreError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(StoreError::not_found("team").kind(), ErrorKind::NotFound);
        assert_eq!(StoreError::Conflict("dup".into()).kind(), ErrorKind::Conflict);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(StoreError::from(io).kind(), ErrorKind::Io);
        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(StoreError::from(bad).kind(), ErrorKind::Io);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            StoreError::not_found("team abc").to_string(),
            "Not found: team abc"
        );
    }
}
