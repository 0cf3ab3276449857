//! The query hook: turns query events into spans and latency metrics.

use std::fmt;
use std::sync::Arc;

use opentelemetry::metrics::Meter;
use opentelemetry::{KeyValue, Value};
use tracing::{field, Span};

use crate::caller::CallerResolver;
use crate::config::HookConfig;
use crate::error::FormatError;
use crate::event::{QueryEvent, QueryOp};
use crate::labels::{attributes, INSTANCE_KEY, METHOD_KEY, STATUS_ERROR, STATUS_OK, TABLE_KEY};
use crate::metrics::{latency_histogram, LatencyRecorder, MetricLabels};

/// Span names and method labels are cut to this many characters.
const NAME_LIMIT: usize = 20;

/// `db.statement` is cut to this many characters.
const QUERY_LIMIT: usize = 5000;

/// Carries the query span, if any, from `before_query` to `after_query`.
///
/// The span closes when this value is dropped.
#[derive(Debug)]
pub struct QueryContext {
    span: Span,
}

impl QueryContext {
    /// A context with no span; the query is not traced.
    pub fn none() -> Self {
        Self { span: Span::none() }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn is_recording(&self) -> bool {
        !self.span.is_disabled()
    }
}

/// Callbacks a SQL client invokes around each query.
///
/// `after_query` must be called exactly once for every `before_query`, with
/// the context it returned, including when the query fails.
pub trait QueryHook: Send + Sync {
    fn before_query(&self, evt: &QueryEvent<'_>) -> QueryContext;

    fn after_query(&self, cx: QueryContext, evt: &QueryEvent<'_>) -> Result<(), FormatError>;
}

/// A [`QueryHook`] that emits a `db.query` span and a latency sample per query.
///
/// # Example
///
/// ```rust,ignore
/// use sea_orm_query_telemetry::{HookConfig, QueryTelemetryHook};
///
/// let meter = opentelemetry::global::meter("my-service");
/// let hook = QueryTelemetryHook::new(HookConfig::default().with_metrics(true))
///     .with_meter(&meter);
/// ```
#[derive(Clone)]
pub struct QueryTelemetryHook {
    config: Arc<HookConfig>,
    resolver: CallerResolver,
    recorder: Option<Arc<dyn LatencyRecorder>>,
}

impl QueryTelemetryHook {
    pub fn new(config: HookConfig) -> Self {
        let resolver = CallerResolver::new(config.caller_package);
        Self {
            config: Arc::new(config),
            resolver,
            recorder: None,
        }
    }

    /// Record latency through `recorder` when metrics are enabled.
    pub fn with_latency_recorder(mut self, recorder: Arc<dyn LatencyRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Register the latency histogram on `meter` and record through it.
    pub fn with_meter(self, meter: &Meter) -> Self {
        self.with_latency_recorder(Arc::new(latency_histogram(meter)))
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    fn metrics_enabled(&self) -> bool {
        self.config.allow_metric && self.recorder.is_some()
    }
}

impl Default for QueryTelemetryHook {
    fn default() -> Self {
        Self::new(HookConfig::default())
    }
}

impl fmt::Debug for QueryTelemetryHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryTelemetryHook")
            .field("config", &self.config)
            .field("recorder", &self.recorder.is_some())
            .finish()
    }
}

impl QueryHook for QueryTelemetryHook {
    fn before_query(&self, _evt: &QueryEvent<'_>) -> QueryContext {
        if Span::current().is_disabled() {
            return QueryContext::none();
        }

        // Named once the operation is known, in after_query.
        let span = tracing::info_span!(
            target: "sea_orm_query_telemetry",
            "db.query",
            otel.name = field::Empty,
            otel.kind = "client",
            otel.status_code = field::Empty,
            db.system = field::Empty,
            db.statement = field::Empty,
            db.connection_string = field::Empty,
            db.user = field::Empty,
            db.name = field::Empty,
            db.rows_affected = field::Empty,
            frame.func = field::Empty,
            frame.file = field::Empty,
            frame.line = field::Empty,
            slow_query = field::Empty,
        );

        QueryContext { span }
    }

    fn after_query(&self, cx: QueryContext, evt: &QueryEvent<'_>) -> Result<(), FormatError> {
        let recording = cx.is_recording();
        let metrics = self.metrics_enabled();
        if !recording && !metrics {
            return Ok(());
        }

        // Dropped in reverse order on every return: latency first, then the span.
        let span = cx.span;
        let mut labels = MetricLabels::new(
            self.recorder.as_ref().filter(|_| metrics),
            evt.start_time,
        );

        let operation = evt.query.operation();
        let query = match operation {
            Some(QueryOp::Insert) => evt.query.unformatted()?,
            _ => evt.query.formatted()?,
        };

        let name = match operation {
            Some(op) => op.as_str(),
            None => operation_name(&query),
        };
        if recording {
            span.record(attributes::OTEL_NAME, name);
        }
        labels.push(KeyValue::new(METHOD_KEY, name.to_owned()));

        let statement = truncate_chars(&query, QUERY_LIMIT);

        let mut attrs = Vec::with_capacity(10);
        if self.config.caller && recording {
            let frame = self.resolver.resolve();
            attrs.push(KeyValue::new(attributes::FRAME_FUNC, frame.function));
            attrs.push(KeyValue::new(attributes::FRAME_FILE, frame.file));
            attrs.push(KeyValue::new(attributes::FRAME_LINE, i64::from(frame.line)));
        }

        attrs.push(KeyValue::new(attributes::DB_SYSTEM, self.config.db_system));
        attrs.push(KeyValue::new(attributes::DB_STATEMENT, statement.to_owned()));

        if let Some(opts) = evt.db.and_then(|db| db.options()) {
            attrs.push(KeyValue::new(attributes::DB_CONNECTION_STRING, opts.addr.clone()));
            attrs.push(KeyValue::new(attributes::DB_USER, opts.user.clone()));
            attrs.push(KeyValue::new(attributes::DB_NAME, opts.database.clone()));
            if !opts.database.is_empty() {
                labels.push(KeyValue::new(INSTANCE_KEY, opts.database.clone()));
            }
        }

        if let Some(table) = evt.table_name() {
            labels.push(KeyValue::new(TABLE_KEY, table.to_owned()));
        }

        if let Some(err) = evt.error {
            if recording {
                if err.is_expected() {
                    span.record(attributes::OTEL_STATUS_CODE, "ERROR");
                } else {
                    let error: &(dyn std::error::Error + 'static) = err;
                    tracing::error!(
                        target: "sea_orm_query_telemetry",
                        parent: &span,
                        error,
                        "exception"
                    );
                }
            }
            labels.push(KeyValue::clone(&STATUS_ERROR));
        } else if let Some(result) = evt.result {
            let mut rows = result.rows_affected();
            if rows == 0 {
                rows = result.rows_returned();
            }
            attrs.push(KeyValue::new(
                attributes::DB_ROWS_AFFECTED,
                i64::try_from(rows).unwrap_or(i64::MAX),
            ));
            labels.push(KeyValue::clone(&STATUS_OK));
        }

        if let Some(threshold) = self.config.slow_query_threshold {
            let elapsed = evt.start_time.elapsed();
            if elapsed > threshold {
                attrs.push(KeyValue::new(attributes::SLOW_QUERY, true));
                if recording {
                    tracing::warn!(
                        target: "sea_orm_query_telemetry",
                        parent: &span,
                        duration_ms = elapsed.as_millis() as i64,
                        threshold_ms = threshold.as_millis() as i64,
                        "Slow query detected"
                    );
                }
            }
        }

        if recording {
            record_attributes(&span, &attrs);
        }

        Ok(())
    }
}

/// Derives a low-cardinality name from statement text: its first word, capped
/// at [`NAME_LIMIT`] characters.
pub(crate) fn operation_name(query: &str) -> &str {
    let first = query.trim_start().split(' ').next().unwrap_or_default();
    truncate_chars(first, NAME_LIMIT).trim()
}

fn truncate_chars(s: &str, limit: usize) -> &str {
    if s.len() <= limit {
        return s;
    }
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn record_attributes(span: &Span, attrs: &[KeyValue]) {
    for kv in attrs {
        let key = kv.key.as_str();
        match &kv.value {
            Value::Bool(v) => {
                span.record(key, *v);
            }
            Value::I64(v) => {
                span.record(key, *v);
            }
            Value::F64(v) => {
                span.record(key, *v);
            }
            Value::String(v) => {
                span.record(key, v.as_str());
            }
            other => {
                span.record(key, field::display(other));
            }
        }
    }
}
