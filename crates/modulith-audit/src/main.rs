//! Modulith audit export entry point.

use std::io::{self, BufWriter, Write};

use modulith_audit::config::ExportConfig;
use modulith_audit::error::AppError;
use modulith_audit::export::export_jsonl;
use modulith_event_store::PgEventStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Logs go to stderr; stdout carries only the export.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .json()
        .init();

    let config = ExportConfig::from_env()?;
    tracing::info!(page_size = config.page_size, "Starting event log export");

    let pool = config.connect().await?;
    let store = PgEventStore::new(pool);
    store.migrate().await?;

    let mut out = BufWriter::new(io::stdout().lock());
    let exported = export_jsonl(&store, config.page_size, &mut out).await?;
    out.flush()?;

    tracing::info!(exported, "Export complete");
    Ok(())
}
