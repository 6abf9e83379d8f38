use thiserror::Error;

/// Main error type for the P2P round trip
#[derive(Error, Debug)]
pub enum P2pError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XML read/write errors
    #[error("XML error: {0}")]
    Xml(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Lifecycle call made in the wrong importer state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<quick_xml::Error> for P2pError {
    fn from(err: quick_xml::Error) -> Self {
        P2pError::Xml(err.to_string())
    }
}

/// Convenient Result type using P2pError
pub type Result<T> = std::result::Result<T, P2pError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = P2pError::Parse("Test error".to_string());
        assert!(err.to_string().contains("Parse error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: P2pError = rusqlite_err.into();
        assert!(matches!(err, P2pError::Database(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: P2pError = io_err.into();
        assert!(matches!(err, P2pError::Io(_)));
    }

    #[test]
    fn test_invalid_state_display() {
        let err = P2pError::InvalidState("import not started".to_string());
        assert_eq!(err.to_string(), "Invalid state: import not started");
    }
}
