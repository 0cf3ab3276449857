//! Error types for the query hook and the query outcomes it observes.

use sea_orm::DbErr;
use thiserror::Error;

/// The statement text could not be produced for telemetry.
///
/// This is the only failure [`QueryTelemetryHook::after_query`] reports;
/// everything else degrades into partial telemetry.
///
/// [`QueryTelemetryHook::after_query`]: crate::QueryTelemetryHook::after_query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to format query: {message}")]
pub struct FormatError {
    message: String,
}

impl FormatError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Outcome error of an executed query, as carried by a [`QueryEvent`].
///
/// `NoRows` and `MultiRows` are the expected outcomes of single-row lookups and
/// are reported as a plain error status rather than an exception.
///
/// [`QueryEvent`]: crate::QueryEvent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("no rows in result set")]
    NoRows,

    #[error("multiple rows in result set")]
    MultiRows,

    #[error("{0}")]
    Database(String),
}

impl QueryError {
    /// Returns true for the sentinel outcomes that are not exceptional.
    pub fn is_expected(&self) -> bool {
        matches!(self, QueryError::NoRows | QueryError::MultiRows)
    }
}

impl From<&DbErr> for QueryError {
    fn from(err: &DbErr) -> Self {
        match err {
            DbErr::RecordNotFound(_) => QueryError::NoRows,
            other => QueryError::Database(other.to_string()),
        }
    }
}
