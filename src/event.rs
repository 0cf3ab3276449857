//! The query event handed to the hook, and the capabilities its parts may expose.

use std::borrow::Cow;
use std::fmt;
use std::time::Instant;

use crate::error::{FormatError, QueryError};

/// Typed operation tag a query may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryOp {
    Select,
    Insert,
    Update,
    Delete,
}

impl QueryOp {
    /// Returns the operation as used for span names and the method label.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOp::Select => "SELECT",
            QueryOp::Insert => "INSERT",
            QueryOp::Update => "UPDATE",
            QueryOp::Delete => "DELETE",
        }
    }
}

impl fmt::Display for QueryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A statement as seen by the hook.
pub trait Query {
    /// Statement text with placeholders left in place.
    fn unformatted(&self) -> Result<Cow<'_, str>, FormatError>;

    /// Statement text with bound parameters substituted inline.
    fn formatted(&self) -> Result<Cow<'_, str>, FormatError>;

    /// Operation tag, when the query knows what it is.
    fn operation(&self) -> Option<QueryOp> {
        None
    }
}

/// Model metadata a bound parameter may carry.
pub trait TableModel {
    fn model_name(&self) -> &str;
}

/// A bound query parameter.
pub trait QueryParam {
    fn table_model(&self) -> Option<&dyn TableModel> {
        None
    }
}

impl QueryParam for sea_orm::Value {}

/// Address and identity of the database a connection talks to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub addr: String,
    pub user: String,
    pub database: String,
}

impl ConnectionOptions {
    pub fn new(
        addr: impl Into<String>,
        user: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            addr: addr.into(),
            user: user.into(),
            database: database.into(),
        }
    }
}

/// The connection a query was issued on.
pub trait DbHandle {
    fn options(&self) -> Option<&ConnectionOptions> {
        None
    }
}

/// Row counts reported for a completed query.
pub trait QueryResult {
    fn rows_affected(&self) -> u64;
    fn rows_returned(&self) -> u64;
}

/// Plain row counts, for clients that only know the numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCount {
    pub affected: u64,
    pub returned: u64,
}

impl RowCount {
    pub fn affected(rows: u64) -> Self {
        Self {
            affected: rows,
            returned: 0,
        }
    }

    pub fn returned(rows: u64) -> Self {
        Self {
            affected: 0,
            returned: rows,
        }
    }
}

impl QueryResult for RowCount {
    fn rows_affected(&self) -> u64 {
        self.affected
    }

    fn rows_returned(&self) -> u64 {
        self.returned
    }
}

/// One query attempt.
///
/// Built by the SQL client before execution and again, with `result` or
/// `error` filled in, once the query completes.
pub struct QueryEvent<'a> {
    pub start_time: Instant,
    pub query: &'a dyn Query,
    pub params: Vec<&'a dyn QueryParam>,
    pub db: Option<&'a dyn DbHandle>,
    pub result: Option<&'a dyn QueryResult>,
    pub error: Option<&'a QueryError>,
}

impl<'a> QueryEvent<'a> {
    pub fn new(query: &'a dyn Query, start_time: Instant) -> Self {
        Self {
            start_time,
            query,
            params: Vec::new(),
            db: None,
            result: None,
            error: None,
        }
    }

    pub fn with_params(mut self, params: Vec<&'a dyn QueryParam>) -> Self {
        self.params = params;
        self
    }

    pub fn with_db(mut self, db: &'a dyn DbHandle) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_result(mut self, result: &'a dyn QueryResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, error: &'a QueryError) -> Self {
        self.error = Some(error);
        self
    }

    /// Model name of the first bound parameter, if it has a non-empty one.
    pub(crate) fn table_name(&self) -> Option<&str> {
        self.params
            .first()
            .and_then(|param| param.table_model())
            .map(|model| model.model_name())
            .filter(|name| !name.is_empty())
    }
}

impl fmt::Debug for QueryEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEvent")
            .field("start_time", &self.start_time)
            .field("operation", &self.query.operation())
            .field("params", &self.params.len())
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
