use std::path::PathBuf;

use runtime::{init_logging, run_ingestion, EkeConfig};

/// Wires config -> balise registry -> historical source adapter -> keyed
/// worker -> Postgres sink and runs to exhaustion for one vehicle partition.
///
/// The vehicle partition is given as the first CLI argument (the source
/// adapter contract in §6 enumerates partitions as strings "1".."N"; nothing
/// in the environment-variable list names which one a given process owns,
/// so partition selection is left to process args rather than invented as
/// an extra env var). `AZ_STORAGE_CONTAINER` stands in for the local
/// directory the historical blobs are read from, since the Azure Blob
/// client itself is out of scope (§1) but the on-disk framing it presents
/// is not (§4.12). `POSTGRES_TARGET_TABLE` doubles as this worker's staging
/// table suffix, keeping one worker's staging tables from colliding with
/// another's.
#[tokio::main]
async fn main() {
    init_logging();

    let vehicle = std::env::args()
        .nth(1)
        .expect("usage: eke-pipeline <vehicle-id>");

    let config = EkeConfig::from_env().expect("invalid or incomplete configuration");
    let backfill_dir = PathBuf::from(&config.az_storage_container);
    let worker_id = config.postgres_target_table.clone();

    let (adapter, worker, sink) =
        runtime::bootstrap_backfill(&config, &backfill_dir, &vehicle, &worker_id)
            .await
            .expect("failed to bootstrap ingestion pipeline");

    log::info!("starting ingestion for vehicle {vehicle}");
    if let Err(why) = run_ingestion(adapter, worker, sink).await {
        log::error!("ingestion loop aborted: {why}");
        std::process::exit(1);
    }
}
