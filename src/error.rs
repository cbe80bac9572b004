//! Error types for the scanner and the migration engine

use thiserror::Error;

/// Result type for migration operations
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Result type for scanner operations
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Syntax errors raised while scanning JSON text.
///
/// All indices are byte offsets into the scanned input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed JSON at index {index}: {detail}")]
    MalformedJson { index: usize, detail: String },

    #[error("Unexpected end of input at index {index}")]
    UnexpectedEndOfInput { index: usize },

    #[error("Unexpected token at index {index}: expected '{expected}', found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: char,
        index: usize,
    },
}

impl ParseError {
    pub(crate) fn malformed(index: usize, detail: impl Into<String>) -> Self {
        Self::MalformedJson {
            index,
            detail: detail.into(),
        }
    }

    /// Offset at which the error was detected
    pub fn index(&self) -> usize {
        match self {
            Self::MalformedJson { index, .. }
            | Self::UnexpectedEndOfInput { index }
            | Self::UnexpectedToken { index, .. } => *index,
        }
    }
}

/// Migration registry and protocol errors
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Migration already registered for major version {version}")]
    DuplicateMigration { version: String },

    #[error("Unsupported migration version {version}")]
    UnsupportedVersion { version: String },

    #[error("Message variant mismatch: expected v{expected}, got v{found}")]
    VariantMismatch { expected: String, found: String },

    #[error("Malformed schema: {0}")]
    MalformedSchema(String),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
