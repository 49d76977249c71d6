//! Core error types for the import domain

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("file too small: {path} ({size} bytes, minimum {min})")]
    FileTooSmall { path: String, size: u64, min: u64 },

    #[error("invalid extension: {path}")]
    InvalidExtension { path: String },

    #[error("sample file: {path}")]
    SampleFile { path: String },

    #[error("no library match for: {path}")]
    NoMatch { path: String },

    #[error("match conflict: {message}")]
    MatchConflict { message: String },

    #[error("already importing: {path}")]
    AlreadyImporting { path: String },

    #[error("path too long ({length} > {max} characters): {path}")]
    PathTooLong {
        path: String,
        length: usize,
        max: usize,
    },

    #[error("file already in library: {path}")]
    FileAlreadyInLibrary { path: String },

    #[error("not an upgrade: {reason}")]
    NotAnUpgrade { reason: String },

    #[error("import failed after {attempts} attempts: {operation} - {last_error}")]
    ImportFailed {
        operation: String,
        attempts: u32,
        last_error: Box<ImportError>,
    },

    #[error("no media probe tool available")]
    NoProbeToolAvailable,

    #[error("invalid naming pattern: {message}")]
    InvalidPattern { message: String },

    #[error("unknown naming token: {token}")]
    InvalidToken { token: String },

    #[error("import queue is full")]
    QueueFull,

    #[error("media has no root folder assigned")]
    NoRootFolder,

    #[error("cancelled while waiting for {operation}")]
    Cancelled { operation: String },

    #[error("timed out waiting for {operation}")]
    Timeout { operation: String },

    #[error("slot selection required before import can proceed")]
    SlotSelectionRequired,

    #[error("database error: {message}")]
    DatabaseError { message: String },

    #[error("external service error: {service} - {error}")]
    ExternalServiceError { service: String, error: String },

    #[error("domain validation error: {field} - {message}")]
    ValidationError { field: String, message: String },

    #[error("file system error: {path} - {error}")]
    FileSystemError { path: String, error: String },
}

impl ImportError {
    /// Wrap an I/O error against a concrete path.
    pub fn io(path: impl Into<String>, err: std::io::Error) -> Self {
        ImportError::FileSystemError {
            path: path.into(),
            error: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ImportError::FileTooSmall {
            path: "/dl/show.mkv".to_string(),
            size: 512,
            min: 1024,
        };
        assert_eq!(
            err.to_string(),
            "file too small: /dl/show.mkv (512 bytes, minimum 1024)"
        );

        let err = ImportError::QueueFull;
        assert_eq!(err.to_string(), "import queue is full");
    }

    #[test]
    fn test_import_failed_wraps_cause() {
        let err = ImportError::ImportFailed {
            operation: "import".to_string(),
            attempts: 4,
            last_error: Box::new(ImportError::FileTooSmall {
                path: "/dl/a.mkv".to_string(),
                size: 1,
                min: 2,
            }),
        };
        assert!(err.to_string().contains("after 4 attempts"));
        assert!(err.to_string().contains("file too small"));
    }
}
