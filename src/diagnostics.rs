use std::fmt;

use thiserror::Error;

use crate::concurrency::SimFault;
use crate::memory::MemoryFault;

/// A single parse-time violation tied to a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for SyntaxError {}

/// Coarse classification of an engine error, for adapters and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Name,
    Arity,
    Type,
    Memory,
    Concurrency,
    Thrown,
    Io,
}

/// Unified error type for the Osier engine.
#[derive(Debug, Error)]
pub enum OsierError {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("name error: {0}")]
    Name(String),
    #[error("arity error: function '{name}' expects {expected} arguments, but got {received}")]
    Arity {
        name: String,
        expected: usize,
        received: usize,
    },
    #[error("type error: {0}")]
    Type(String),
    #[error("memory error: {0}")]
    Memory(#[from] MemoryFault),
    #[error("concurrency error: {0}")]
    Concurrency(#[from] SimFault),
    #[error("{0}")]
    Thrown(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OsierError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OsierError::Syntax(_) => ErrorKind::Syntax,
            OsierError::Name(_) => ErrorKind::Name,
            OsierError::Arity { .. } => ErrorKind::Arity,
            OsierError::Type(_) => ErrorKind::Type,
            OsierError::Memory(_) => ErrorKind::Memory,
            OsierError::Concurrency(_) => ErrorKind::Concurrency,
            OsierError::Thrown(_) => ErrorKind::Thrown,
            OsierError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn name(message: impl Into<String>) -> Self {
        OsierError::Name(message.into())
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        OsierError::Type(message.into())
    }

    pub fn thrown(message: impl Into<String>) -> Self {
        OsierError::Thrown(message.into())
    }
}

pub type Result<T> = std::result::Result<T, OsierError>;
