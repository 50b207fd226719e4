//! Error types for data loading, contract construction and rendering.
//!
//! Algebra failures live in [`ContractError`] so the exploration loop can
//! record them per design; everything else funnels into [`Error`].

use std::fmt;
use std::path::PathBuf;

use crate::polyhedra::{ContractError, ParseError};

/// Errors produced by loaders, sensor builders and plot rendering.
#[derive(Debug)]
pub enum Error {
    /// File I/O error with path context.
    Io {
        /// Path that caused the error.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Malformed CSV input (ragged rows, missing columns, bad numbers).
    Csv(String),
    /// Constraint string could not be parsed.
    Parse(ParseError),
    /// Contract algebra failure outside the exploration loop.
    Contract(ContractError),
    /// Configuration could not be applied.
    Config(String),
    /// Invalid parameters (degenerate envelopes, zero references).
    InvalidInput(String),
    /// Chart rendering failed.
    Plot(String),
    /// A worker thread could not be started.
    Worker(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
            Self::Parse(err) => write!(f, "constraint parse error: {err}"),
            Self::Contract(err) => write!(f, "contract error: {err}"),
            Self::Config(msg) => write!(f, "config error: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::Plot(msg) => write!(f, "plot error: {msg}"),
            Self::Worker(msg) => write!(f, "worker error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Contract(err) => Some(err),
            Self::Csv(_)
            | Self::Config(_)
            | Self::InvalidInput(_)
            | Self::Plot(_)
            | Self::Worker(_) => None,
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<ContractError> for Error {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::Parse(parse) => Self::Parse(parse),
            other => Self::Contract(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_io_error_includes_path() {
        let err = Error::io(
            "data/marionette_data.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        let msg = err.to_string();
        assert!(msg.contains("marionette_data.csv"));
        assert!(msg.contains("not found"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn display_prefixes() {
        let cases: Vec<(Error, &str)> = vec![
            (Error::Csv("ragged row".into()), "CSV error"),
            (Error::Config("bad stage".into()), "config error"),
            (Error::InvalidInput("K <= start".into()), "invalid input"),
            (Error::Plot("backend".into()), "plot error"),
            (Error::Worker("spawn".into()), "worker error"),
        ];
        for (err, prefix) in cases {
            let msg = err.to_string();
            assert!(msg.starts_with(prefix), "'{msg}' should start with '{prefix}'");
            assert!(std::error::Error::source(&err).is_none());
        }
    }

    #[test]
    fn contract_parse_errors_flatten() {
        let parse = ParseError::new("x <=", 4, "expected expression");
        let err: Error = ContractError::Parse(parse).into();
        assert!(matches!(err, Error::Parse(_)));
    }
}
