use subcache_core::document::DocumentId;
use thiserror::Error;

/// Errors from writing to a parent dataset.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatasetError {
    #[error("Document already exists: {0}")]
    AlreadyExists(DocumentId),
    #[error("Document not found: {0}")]
    NotFound(DocumentId),
    #[error("Invalid document id: {0}")]
    InvalidId(String),
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_display() {
        let error = DatasetError::AlreadyExists(DocumentId::from("a1"));
        assert_eq!(error.to_string(), "Document already exists: a1");
    }

    #[test]
    fn test_not_found_display() {
        let error = DatasetError::NotFound(DocumentId::from("a1"));
        assert_eq!(error.to_string(), "Document not found: a1");
    }

    #[test]
    fn test_invalid_id_display() {
        let error = DatasetError::InvalidId("42".to_string());
        assert_eq!(error.to_string(), "Invalid document id: 42");
    }
}
