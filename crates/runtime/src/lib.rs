pub mod config;
pub mod error;
pub mod ingestion;

pub use config::{init_logging, AppRole, EkeConfig};
pub use error::{Result, RuntimeError};
pub use ingestion::run_ingestion;

use connectors::{historical::HistoricalBackfillAdapter, SourceAdapter};
use database::{DatabaseConnectionInfo, PgSink};
use pipeline::worker::KeyedWorker;
use registry::BaliseRegistry;

/// Assembles the historical-backfill run described by `config` for a single
/// vehicle partition: loads the balise registry, opens the Postgres sink
/// (migrating and creating staging tables as a side effect), and builds the
/// `SourceAdapter` reading `vehicle`'s blobs from `backfill_dir`. The
/// returned pieces are handed to [`run_ingestion`] by the binary crate.
pub async fn bootstrap_backfill(
    config: &EkeConfig,
    backfill_dir: &std::path::Path,
    vehicle: &str,
    worker_id: &str,
) -> Result<(Box<dyn SourceAdapter>, KeyedWorker, PgSink)> {
    let registry = BaliseRegistry::load(&config.balise_data_file)?;
    let worker = KeyedWorker::new(registry);

    let db_info = DatabaseConnectionInfo {
        conn_str: config.postgres_conn_str.clone(),
        min_connections: 1,
        max_connections: 20,
    };
    let sink = PgSink::connect(db_info, worker_id).await?;

    let adapter = HistoricalBackfillAdapter::new(
        backfill_dir,
        vehicle,
        config.start_date,
        config.end_date,
        Some(config.batch_size),
    )?;

    Ok((Box::new(adapter), worker, sink))
}
