//! Configuration for the query hook.

use std::time::Duration;

/// Configuration options for [`QueryTelemetryHook`](crate::QueryTelemetryHook).
///
/// # Example
///
/// ```rust
/// use sea_orm_query_telemetry::HookConfig;
/// use std::time::Duration;
///
/// let config = HookConfig::default()
///     .with_caller(true)
///     .with_metrics(true)
///     .with_slow_query_threshold(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct HookConfig {
    /// Attach the first application frame that issued the query to each span.
    /// Walks the stack on every query.
    /// Default: `false`
    pub caller: bool,

    /// Record query latency even when no span is being recorded.
    /// Has no effect unless the hook was given a latency recorder.
    /// Default: `false`
    pub allow_metric: bool,

    /// Substring identifying frames that belong to the SQL client rather than
    /// the application. The default matches `sea_orm` and this crate.
    /// Default: `"sea_orm"`
    pub caller_package: &'static str,

    /// Value of the `db.system` attribute.
    /// Default: `"postgresql"`
    pub db_system: &'static str,

    /// Queries slower than this are flagged with `slow_query` and logged at WARN.
    /// Default: `None`
    pub slow_query_threshold: Option<Duration>,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            caller: false,
            allow_metric: false,
            caller_package: "sea_orm",
            db_system: "postgresql",
            slow_query_threshold: None,
        }
    }
}

impl HookConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable caller attribution.
    pub fn with_caller(mut self, enabled: bool) -> Self {
        self.caller = enabled;
        self
    }

    /// Enable or disable latency metrics.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.allow_metric = enabled;
        self
    }

    /// Set the package substring used to skip SQL client frames.
    pub fn with_caller_package(mut self, package: &'static str) -> Self {
        self.caller_package = package;
        self
    }

    /// Set the `db.system` attribute value.
    pub fn with_db_system(mut self, system: &'static str) -> Self {
        self.db_system = system;
        self
    }

    /// Flag queries that take longer than `threshold`.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    /// Everything on: caller attribution, metrics, and a 100ms slow query flag.
    ///
    /// **Warning**: caller attribution walks the stack for every query.
    pub fn development() -> Self {
        Self {
            caller: true,
            allow_metric: true,
            slow_query_threshold: Some(Duration::from_millis(100)),
            ..Self::default()
        }
    }

    /// Metrics on, no stack walking.
    pub fn production() -> Self {
        Self {
            caller: false,
            allow_metric: true,
            slow_query_threshold: Some(Duration::from_secs(1)),
            ..Self::default()
        }
    }
}
