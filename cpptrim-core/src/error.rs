//! Typed error handling for cpptrim.
//!
//! Provides structured errors that library consumers can match on,
//! with full context about what went wrong and where.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for cpptrim operations.
///
/// This provides typed errors that library consumers can match on,
/// unlike opaque `anyhow::Error` types.
#[derive(Error, Debug)]
pub enum CpptrimError {
    /// I/O error when reading/writing files
    #[error("I/O error at {path}: {message}")]
    Io {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The translation unit failed to parse (front-end run failure).
    ///
    /// Syntax errors confined to template function bodies are tolerated
    /// (see the late-parse forcer); anything else is fatal and no
    /// rewritten text is produced.
    #[error("Compilation error in {path} at {line}:{column}: {message}")]
    Compilation {
        path: PathBuf,
        message: String,
        /// Line number (1-indexed)
        line: usize,
        /// Column number (1-indexed)
        column: usize,
    },

    /// Configuration file errors
    #[error("Config error at {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Rewrite operation errors
    #[error("Rewrite error: {message}")]
    Rewrite { message: String },

    /// Invalid argument provided
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CpptrimError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a compilation error with location.
    pub fn compilation(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self::Compilation {
            path: path.into(),
            message: message.into(),
            line,
            column,
        }
    }

    /// Create a config error.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a rewrite error.
    pub fn rewrite(message: impl Into<String>) -> Self {
        Self::Rewrite {
            message: message.into(),
        }
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error (caller can fall back to the
    /// unmodified source).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Get the path associated with this error, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } => Some(path),
            Self::Compilation { path, .. } => Some(path),
            Self::Config { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Convenience type alias for cpptrim results.
pub type CpptrimResult<T> = Result<T, CpptrimError>;

/// Extension trait for converting std::io::Error with path context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    fn with_path(self, path: impl Into<PathBuf>) -> CpptrimResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> CpptrimResult<T> {
        self.map_err(|e| CpptrimError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error() {
        let err = CpptrimError::io(
            PathBuf::from("/test/sol.cpp"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        );
        assert!(matches!(err, CpptrimError::Io { .. }));
        assert_eq!(err.path(), Some(&PathBuf::from("/test/sol.cpp")));
        assert!(err.to_string().contains("/test/sol.cpp"));
    }

    #[test]
    fn test_compilation_error_location() {
        let err = CpptrimError::compilation("/tmp/a.cpp", "unexpected token", 10, 5);
        if let CpptrimError::Compilation { line, column, .. } = &err {
            assert_eq!(*line, 10);
            assert_eq!(*column, 5);
        } else {
            panic!("Expected Compilation error");
        }
        assert!(err.to_string().contains("10:5"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(CpptrimError::config("/tmp/cpptrim.toml", "bad key").is_recoverable());
        assert!(!CpptrimError::compilation("/tmp/a.cpp", "bad", 1, 1).is_recoverable());
        assert!(!CpptrimError::rewrite("overlap").is_recoverable());
    }

    #[test]
    fn test_io_result_ext() {
        let result: std::io::Result<()> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        let cpptrim_result = result.with_path("/missing/sol.cpp");
        assert!(cpptrim_result.is_err());
    }
}
