//! # sea-orm-query-telemetry
//!
//! A query hook for SeaORM that emits a tracing span and a latency sample for
//! every statement.
//!
//! The hook is called twice per query. `before_query` opens a `db.query` span
//! when the caller is already inside a recording span, and does nothing
//! otherwise. `after_query` names the span, attaches the statement and
//! connection details, classifies the outcome, and records latency into an
//! injected histogram.
//!
//! ## Features
//!
//! - **Low-cardinality names**: span names and the `sql.method` label come from
//!   the operation tag or the statement's first word, capped at 20 characters
//! - **Bounded payloads**: `db.statement` is capped at 5000 characters, and
//!   inserts are recorded without their inlined values
//! - **Outcome classification**: "no rows" and "multiple rows" set an error
//!   status; anything else is recorded as an exception event
//! - **Latency metrics**: microsecond histogram labelled by method, instance,
//!   table and status, recorded even when no span is active if enabled
//! - **Caller attribution**: optionally attaches the first application frame
//!   that issued the query
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sea_orm::Database;
//! use sea_orm_query_telemetry::{HookConfig, HookedConnection, QueryTelemetryHook};
//!
//! let meter = opentelemetry::global::meter("my-service");
//! let hook = QueryTelemetryHook::new(HookConfig::production()).with_meter(&meter);
//!
//! let db = Database::connect("postgres://localhost/mydb").await?;
//! let hooked = HookedConnection::new(db, hook);
//!
//! let users = Users::find().all(&hooked).await?;
//! ```
//!
//! ## Span Attributes
//!
//! | Attribute | Description |
//! |-----------|-------------|
//! | `otel.name` | Operation name (`SELECT`, `INSERT`, ... or the first word) |
//! | `db.system` | `postgresql`, `mysql` or `sqlite` |
//! | `db.statement` | Statement text, at most 5000 characters |
//! | `db.connection_string` / `db.user` / `db.name` | Connection details, when known |
//! | `db.rows_affected` | Rows affected, or rows returned for reads |
//! | `frame.func` / `frame.file` / `frame.line` | Calling code (when enabled) |
//! | `otel.status_code` | `ERROR` for "no rows" / "multiple rows" |
//! | `slow_query` | Set when the slow query threshold is exceeded |
//!
//! ## Metric Labels
//!
//! `sql.latency` (microseconds) carries `sql.method`, `sql.instance`,
//! `sql.table` and `sql.status` (`OK` / `Error`).

mod caller;
mod config;
mod connection;
mod error;
mod event;
mod hook;
pub mod labels;
mod metrics;
mod parser;

#[cfg(test)]
mod testing;

pub use caller::{short_function_name, CallerResolver, Frame};
pub use config::HookConfig;
pub use connection::{db_system, HookedConnection, QueryHookExt};
pub use error::{FormatError, QueryError};
pub use event::{
    ConnectionOptions, DbHandle, Query, QueryEvent, QueryOp, QueryParam, QueryResult, RowCount,
    TableModel,
};
pub use hook::{QueryContext, QueryHook, QueryTelemetryHook};
pub use metrics::{latency_histogram, LatencyRecorder};
pub use parser::detect_operation;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{HookConfig, HookedConnection, QueryHook, QueryHookExt, QueryTelemetryHook};
}
