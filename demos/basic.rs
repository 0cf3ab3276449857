//! Basic example showing how to use sea-orm-query-telemetry.
//!
//! Run with: cargo run --example basic

use sea_orm::{ConnectionTrait, Database, DbBackend, Statement};
use sea_orm_query_telemetry::prelude::*;
use sea_orm_query_telemetry::ConnectionOptions;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,sea_orm_query_telemetry=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/test".into());

    tracing::info!("Connecting to database...");

    let db = Database::connect(&database_url).await?;

    // Latency goes to whatever meter provider is installed globally.
    let meter = opentelemetry::global::meter("basic-example");
    let hook = QueryTelemetryHook::new(HookConfig::development()).with_meter(&meter);
    let hooked = HookedConnection::new(db, hook)
        .with_options(ConnectionOptions::new("localhost:5432", "postgres", "test"));

    // Or, with defaults and no metrics:
    // let hooked = db.with_query_hook();

    // Queries only get a span when they run inside one.
    let request = tracing::info_span!("request", path = "/health");
    hooked
        .query_one(Statement::from_string(DbBackend::Postgres, "SELECT 1"))
        .instrument(request)
        .await?;

    tracing::info!("Query executed with telemetry enabled");

    Ok(())
}
