//! Error types for confparse
//!
//! Every failure is terminal for the current parse. Errors carry enough
//! context to find the fault: the file for load and syntax errors, the
//! variable name for substitution errors and the dotted field path for
//! validation errors.

use std::fmt;

use crate::schema::Bound;
use crate::value::{Value, ValueKind};

/// Result type alias for confparse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for confparse operations
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Dotted path in the config where the error occurred (e.g., "database.port")
    pub path: Option<String>,
    /// Source location (file, line, column) if available
    pub source_location: Option<SourceLocation>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Location in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl SourceLocation {
    /// A location that only names the file
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    /// The configuration file does not exist
    #[error("File not found: {path}")]
    FileNotFound { path: String },
    /// The file extension does not map to a known decoder
    #[error("Unsupported file type: {extension}")]
    UnsupportedFormat { extension: String },
    /// The file exists but could not be read
    #[error("I/O error")]
    Io,
    /// Malformed source document or include directive
    #[error("Parse error")]
    Parse,
    /// `${NAME}` referenced a variable that is not set and has no default
    #[error("Environment variable not set: {name}")]
    MissingEnvironmentVariable { name: String },
    /// An include chain re-entered a file that is still being loaded
    #[error("Include cycle detected")]
    IncludeCycle,
    /// Include chain nested deeper than the configured limit
    #[error("Include depth limit of {limit} exceeded")]
    IncludeDepthExceeded { limit: usize },
    /// A schema description is malformed
    #[error("Invalid schema")]
    InvalidSchema,
    /// A required field is absent
    #[error("Required field missing")]
    MissingRequiredField,
    /// A field's runtime kind differs from the schema's declared type
    #[error("Invalid type: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: ValueKind,
        actual: ValueKind,
    },
    /// A numeric field falls outside its declared range
    #[error("Value {value} is out of range ({bound})")]
    RangeViolation { value: Value, bound: Bound },
}

impl Error {
    fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            source_location: None,
            help: None,
            cause: None,
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Parse)
        }
    }

    /// Create a file not found error
    pub fn file_not_found(file_path: impl Into<String>) -> Self {
        let fp = file_path.into();
        Self {
            source_location: Some(SourceLocation::file(fp.clone())),
            help: Some(
                "Check that the file exists; includes are relative to the including file".into(),
            ),
            ..Self::from_kind(ErrorKind::FileNotFound { path: fp })
        }
    }

    /// Create an unsupported format error
    pub fn unsupported_format(file_path: impl Into<String>, extension: Option<&str>) -> Self {
        let extension = match extension {
            Some(ext) => format!(".{}", ext),
            None => "(no extension)".to_string(),
        };
        Self {
            source_location: Some(SourceLocation::file(file_path)),
            help: Some("Use a .yaml, .yml or .json file".into()),
            ..Self::from_kind(ErrorKind::UnsupportedFormat { extension })
        }
    }

    /// Create an I/O error for a file that exists but cannot be read
    pub fn io(file_path: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self {
            source_location: Some(SourceLocation::file(file_path)),
            cause: Some(cause.to_string()),
            ..Self::from_kind(ErrorKind::Io)
        }
    }

    /// Create an env var not set error
    pub fn env_not_found(var_name: impl Into<String>, config_path: Option<String>) -> Self {
        let var = var_name.into();
        Self {
            path: config_path,
            help: Some(format!(
                "Set the {} environment variable or provide a default: ${{{}:-value}}",
                var, var
            )),
            ..Self::from_kind(ErrorKind::MissingEnvironmentVariable { name: var })
        }
    }

    /// Create an include cycle error
    pub fn include_cycle(file: impl Into<String>, chain: Vec<String>) -> Self {
        let chain_str = chain.join(" → ");
        Self {
            source_location: Some(SourceLocation::file(file)),
            help: Some("Break the cycle by removing one of the !include directives".into()),
            cause: Some(format!("Chain: {}", chain_str)),
            ..Self::from_kind(ErrorKind::IncludeCycle)
        }
    }

    /// Create an include depth error
    pub fn include_depth_exceeded(file: impl Into<String>, limit: usize) -> Self {
        Self {
            source_location: Some(SourceLocation::file(file)),
            help: Some("Flatten the include chain or raise max_include_depth".into()),
            ..Self::from_kind(ErrorKind::IncludeDepthExceeded { limit })
        }
    }

    /// Create an invalid schema error
    pub fn invalid_schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        let p = path.into();
        Self {
            path: if p.is_empty() { None } else { Some(p) },
            help: Some("Each field accepts: required, type, min, max, schema".into()),
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::InvalidSchema)
        }
    }

    /// Create a missing required field error
    pub fn missing_required_field(path: impl Into<String>) -> Self {
        let p = path.into();
        Self {
            help: Some(format!("Add '{}' to the configuration", p)),
            path: Some(p),
            ..Self::from_kind(ErrorKind::MissingRequiredField)
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(path: impl Into<String>, expected: ValueKind, actual: ValueKind) -> Self {
        Self {
            path: Some(path.into()),
            help: Some(format!("Change the value to a {}", expected)),
            ..Self::from_kind(ErrorKind::TypeMismatch { expected, actual })
        }
    }

    /// Create a range violation error
    pub fn range_violation(path: impl Into<String>, value: Value, bound: Bound) -> Self {
        Self {
            path: Some(path.into()),
            help: Some("Fix the value to match the schema requirements".into()),
            ..Self::from_kind(ErrorKind::RangeViolation { value, bound })
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add source location to the error
    pub fn with_source_location(mut self, loc: SourceLocation) -> Self {
        self.source_location = Some(loc);
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// True for errors raised by schema validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::MissingRequiredField
                | ErrorKind::TypeMismatch { .. }
                | ErrorKind::RangeViolation { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(loc) = &self.source_location {
            write!(f, "\n  File: {}", loc.file)?;
            if let Some(line) = loc.line {
                write!(f, ":{}", line)?;
                if let Some(column) = loc.column {
                    write!(f, ":{}", column)?;
                }
            }
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
