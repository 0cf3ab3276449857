//! SeaORM connection wrapper that runs every statement through a query hook.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, DbErr, ExecResult, QueryResult, Statement,
};
use tracing::Instrument;

use crate::config::HookConfig;
use crate::error::{FormatError, QueryError};
use crate::event::{
    ConnectionOptions, DbHandle, Query, QueryEvent, QueryOp, QueryParam, RowCount,
};
use crate::hook::{QueryHook, QueryTelemetryHook};
use crate::parser::detect_operation;

/// A SeaORM `Statement` seen through the hook's [`Query`] interface.
struct StatementQuery<'a> {
    stmt: &'a Statement,
}

impl Query for StatementQuery<'_> {
    fn unformatted(&self) -> Result<Cow<'_, str>, FormatError> {
        Ok(Cow::Borrowed(&self.stmt.sql))
    }

    fn formatted(&self) -> Result<Cow<'_, str>, FormatError> {
        // Display inlines the bound values using the backend's quoting rules.
        Ok(match &self.stmt.values {
            Some(_) => Cow::Owned(self.stmt.to_string()),
            None => Cow::Borrowed(&self.stmt.sql),
        })
    }

    fn operation(&self) -> Option<QueryOp> {
        detect_operation(&self.stmt.sql)
    }
}

/// A hooked wrapper around SeaORM's `DatabaseConnection`.
///
/// Implements `ConnectionTrait`, so it can be passed anywhere a
/// `DatabaseConnection` is used. Each statement runs inside the span opened by
/// the hook, so driver-level spans nest under it.
///
/// Failures reach the hook as [`QueryError::Database`]. `ConnectionTrait`
/// methods never return `RecordNotFound` and do not check row counts, so the
/// "no rows" and "multiple rows" outcomes only come from hooks driven directly
/// by a client that detects them.
///
/// Not `Clone`: SeaORM's `DatabaseConnection` loses `Clone` when its `mock`
/// feature is enabled.
///
/// # Example
///
/// ```rust,ignore
/// use sea_orm::Database;
/// use sea_orm_query_telemetry::{ConnectionOptions, HookedConnection};
///
/// let db = Database::connect("postgres://app@localhost/shop").await?;
/// let hooked = HookedConnection::wrap(db)
///     .with_options(ConnectionOptions::new("localhost:5432", "app", "shop"));
///
/// let users = Users::find().all(&hooked).await?;
/// ```
#[derive(Debug)]
pub struct HookedConnection<H = QueryTelemetryHook> {
    inner: DatabaseConnection,
    hook: Arc<H>,
    options: Option<ConnectionOptions>,
}

impl HookedConnection {
    /// Hook with default configuration; `db.system` follows the backend.
    pub fn wrap(connection: DatabaseConnection) -> Self {
        Self::with_config(connection, HookConfig::default())
    }

    /// Hook with `config`; `db.system` follows the backend.
    pub fn with_config(connection: DatabaseConnection, config: HookConfig) -> Self {
        let system = db_system(connection.get_database_backend());
        Self::new(connection, QueryTelemetryHook::new(config.with_db_system(system)))
    }
}

impl<H: QueryHook> HookedConnection<H> {
    pub fn new(connection: DatabaseConnection, hook: H) -> Self {
        Self {
            inner: connection,
            hook: Arc::new(hook),
            options: None,
        }
    }

    /// Connection details reported as `db.connection_string`, `db.user` and `db.name`.
    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Get a reference to the underlying `DatabaseConnection`.
    pub fn inner(&self) -> &DatabaseConnection {
        &self.inner
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    /// Consume the wrapper and return the inner `DatabaseConnection`.
    pub fn into_inner(self) -> DatabaseConnection {
        self.inner
    }

    fn event<'a>(&'a self, query: &'a StatementQuery<'a>, start: Instant) -> QueryEvent<'a> {
        let params = query
            .stmt
            .values
            .iter()
            .flat_map(|values| values.0.iter())
            .map(|value| value as &dyn QueryParam)
            .collect();

        QueryEvent::new(query, start)
            .with_params(params)
            .with_db(self)
    }

    /// Runs `fut` for `stmt` between the hook's before and after callbacks.
    async fn observe<T, F>(
        &self,
        stmt: &Statement,
        fut: F,
        rows: fn(&T) -> RowCount,
    ) -> Result<T, DbErr>
    where
        F: Future<Output = Result<T, DbErr>> + Send,
        T: Send,
    {
        let query = StatementQuery { stmt };
        let start = Instant::now();
        let cx = self.hook.before_query(&self.event(&query, start));

        let result = fut.instrument(cx.span().clone()).await;

        let count = result.as_ref().ok().map(rows);
        let error = result.as_ref().err().map(QueryError::from);
        let mut evt = self.event(&query, start);
        evt.result = count.as_ref().map(|c| c as &dyn crate::event::QueryResult);
        evt.error = error.as_ref();

        if let Err(err) = self.hook.after_query(cx, &evt) {
            tracing::warn!(
                target: "sea_orm_query_telemetry",
                error = %err,
                "Query telemetry incomplete"
            );
        }

        result
    }
}

impl<H> DbHandle for HookedConnection<H> {
    fn options(&self) -> Option<&ConnectionOptions> {
        self.options.as_ref()
    }
}

impl From<DatabaseConnection> for HookedConnection {
    fn from(connection: DatabaseConnection) -> Self {
        Self::wrap(connection)
    }
}

impl<H> AsRef<DatabaseConnection> for HookedConnection<H> {
    fn as_ref(&self) -> &DatabaseConnection {
        &self.inner
    }
}

#[async_trait]
impl<H: QueryHook + 'static> ConnectionTrait for HookedConnection<H> {
    fn get_database_backend(&self) -> DbBackend {
        self.inner.get_database_backend()
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        let fut = self.inner.execute(stmt.clone());
        self.observe(&stmt, fut, |res: &ExecResult| {
            RowCount::affected(res.rows_affected())
        })
        .await
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        let stmt = Statement::from_string(self.get_database_backend(), sql);
        let fut = self.inner.execute_unprepared(sql);
        self.observe(&stmt, fut, |res: &ExecResult| {
            RowCount::affected(res.rows_affected())
        })
        .await
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        let fut = self.inner.query_one(stmt.clone());
        self.observe(&stmt, fut, |row: &Option<QueryResult>| {
            RowCount::returned(u64::from(row.is_some()))
        })
        .await
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        let fut = self.inner.query_all(stmt.clone());
        self.observe(&stmt, fut, |rows: &Vec<QueryResult>| {
            RowCount::returned(rows.len() as u64)
        })
        .await
    }

    fn support_returning(&self) -> bool {
        self.inner.support_returning()
    }

    fn is_mock_connection(&self) -> bool {
        self.inner.is_mock_connection()
    }
}

/// `db.system` value for a SeaORM backend.
pub fn db_system(backend: DbBackend) -> &'static str {
    match backend {
        DbBackend::Postgres => "postgresql",
        DbBackend::MySql => "mysql",
        DbBackend::Sqlite => "sqlite",
    }
}

/// Extension trait for wrapping database connections with the query hook.
pub trait QueryHookExt {
    /// Wrap this connection with the default query hook.
    fn with_query_hook(self) -> HookedConnection;

    /// Wrap this connection with a query hook built from `config`.
    fn with_query_hook_config(self, config: HookConfig) -> HookedConnection;
}

impl QueryHookExt for DatabaseConnection {
    fn with_query_hook(self) -> HookedConnection {
        HookedConnection::wrap(self)
    }

    fn with_query_hook_config(self, config: HookConfig) -> HookedConnection {
        HookedConnection::with_config(self, config)
    }
}
