//! Error taxonomy (spec §7).
//!
//! Every component boundary (scanner, parser, transform, executor, schema,
//! resource) raises its own variant. [`GraphQLiteError::Display`] renders the
//! single user-visible message: a kind tag, a source location when
//! available, and the offending token or construct — no stack trace, no
//! partial result.

use std::fmt;
use thiserror::Error;

/// A `(line, column)` location in the original query text, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Location { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Error)]
pub enum GraphQLiteError {
    #[error("Scanner error at {location}: {message}")]
    Scanner { location: Location, message: String },

    #[error("Parse error at {location}: unexpected {found:?}")]
    Parse {
        location: Location,
        found: String,
    },

    #[error("Transform error: {message}")]
    Transform { message: String },

    #[error("Execute error: {message}")]
    Execute { message: String },

    #[error("Schema error: {message}")]
    Schema { message: String },

    #[error("Resource error: {message}")]
    Resource { message: String },
}

impl GraphQLiteError {
    pub fn scanner(location: Location, message: impl Into<String>) -> Self {
        GraphQLiteError::Scanner {
            location,
            message: message.into(),
        }
    }

    pub fn parse(location: Location, found: impl Into<String>) -> Self {
        GraphQLiteError::Parse {
            location,
            found: found.into(),
        }
    }

    pub fn transform(message: impl Into<String>) -> Self {
        GraphQLiteError::Transform {
            message: message.into(),
        }
    }

    pub fn execute(message: impl Into<String>) -> Self {
        GraphQLiteError::Execute {
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        GraphQLiteError::Schema {
            message: message.into(),
        }
    }

    pub fn resource(message: impl Into<String>) -> Self {
        GraphQLiteError::Resource {
            message: message.into(),
        }
    }

    /// The kind tag as it appears in the user-visible message (spec §7).
    pub fn kind(&self) -> &'static str {
        match self {
            GraphQLiteError::Scanner { .. } => "Scanner",
            GraphQLiteError::Parse { .. } => "Parse",
            GraphQLiteError::Transform { .. } => "Transform",
            GraphQLiteError::Execute { .. } => "Execute",
            GraphQLiteError::Schema { .. } => "Schema",
            GraphQLiteError::Resource { .. } => "Resource",
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphQLiteError>;
