//! Span attribute keys and metric label keys shared by the hook.

use once_cell::sync::Lazy;
use opentelemetry::KeyValue;

/// Name of the latency histogram.
pub const LATENCY_METRIC: &str = "sql.latency";

/// Description of the latency histogram.
pub const LATENCY_DESCRIPTION: &str = "The latency of calls in microsecond";

/// Span attribute keys.
pub mod attributes {
    pub const DB_SYSTEM: &str = "db.system";
    pub const DB_STATEMENT: &str = "db.statement";
    pub const DB_CONNECTION_STRING: &str = "db.connection_string";
    pub const DB_USER: &str = "db.user";
    pub const DB_NAME: &str = "db.name";
    pub const DB_ROWS_AFFECTED: &str = "db.rows_affected";
    pub const FRAME_FUNC: &str = "frame.func";
    pub const FRAME_FILE: &str = "frame.file";
    pub const FRAME_LINE: &str = "frame.line";
    pub const SLOW_QUERY: &str = "slow_query";
    pub const OTEL_NAME: &str = "otel.name";
    pub const OTEL_STATUS_CODE: &str = "otel.status_code";
}

/// Metric label keys.
pub const INSTANCE_KEY: &str = "sql.instance";
pub const METHOD_KEY: &str = "sql.method";
pub const TABLE_KEY: &str = "sql.table";
pub const STATUS_KEY: &str = "sql.status";

pub static STATUS_OK: Lazy<KeyValue> = Lazy::new(|| KeyValue::new(STATUS_KEY, "OK"));
pub static STATUS_ERROR: Lazy<KeyValue> = Lazy::new(|| KeyValue::new(STATUS_KEY, "Error"));
