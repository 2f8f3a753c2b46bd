use std::panic::AssertUnwindSafe;
use std::time::Duration;

use connectors::{Batch, SourceAdapter};
use database::PgSink;
use futures::FutureExt;
use pipeline::worker::{KeyedWorker, PipelineOutput};
use tokio::time::sleep;

use crate::error::{Result, RuntimeError};

const TRANSIENT_BACKOFF: Duration = Duration::from_secs(10);

/// Runs every row in `batch` through the keyed worker and concatenates the
/// per-row outputs into one batch-level output, preserving arrival order
/// within each vehicle key (ordering across different keys is incidental).
async fn drain_batch(worker: &mut KeyedWorker, batch: &Batch) -> PipelineOutput {
    let mut combined = PipelineOutput::default();
    for (vehicle, row) in batch {
        let output = worker.dispatch(vehicle, row.clone()).await;
        combined.messages.extend(output.messages);
        combined.events.extend(output.events);
        combined.stationevents.extend(output.stationevents);
    }
    combined
}

/// Pulls one batch, pushes it through the pipeline, writes every sink, and
/// only then acknowledges the source (§4.9/§9: ack after durable write).
/// Returns `Ok(false)` once the source adapter reports exhaustion.
async fn run_once(
    adapter: &mut dyn SourceAdapter,
    worker: &mut KeyedWorker,
    sink: &PgSink,
) -> Result<bool> {
    let Some(batch) = adapter.next_batch().await? else {
        return Ok(false);
    };

    let output = drain_batch(worker, &batch).await;
    sink.write_messages(&output.messages).await?;
    sink.write_events(&output.events).await?;
    sink.write_stationevents(&output.stationevents).await?;
    adapter.ack(&batch).await?;

    Ok(true)
}

/// Drives `adapter` to exhaustion through `worker` and `sink`. Transient I/O
/// errors (source read, sink write) are logged and retried after a fixed
/// backoff rather than aborting the process, per §7's "retry with 10s
/// backoff indefinitely" rule for transient failures; a panic inside one
/// iteration is caught the same way the actor runtime catches panics inside
/// a single vehicle's pipeline, so one bad batch cannot take the whole
/// ingestion loop down.
pub async fn run_ingestion(
    mut adapter: Box<dyn SourceAdapter>,
    mut worker: KeyedWorker,
    sink: PgSink,
) -> Result<()> {
    loop {
        let step = AssertUnwindSafe(run_once(adapter.as_mut(), &mut worker, &sink))
            .catch_unwind()
            .await;

        match step {
            Ok(Ok(true)) => continue,
            Ok(Ok(false)) => {
                log::info!("source adapter exhausted, shutting down");
                sink.shutdown().await?;
                return Ok(());
            }
            Ok(Err(RuntimeError::Database(why))) => {
                log::error!("sink write failed, retrying after backoff: {why}");
                sleep(TRANSIENT_BACKOFF).await;
            }
            Ok(Err(RuntimeError::Connector(why))) => {
                log::error!("source read failed, retrying after backoff: {why}");
                sleep(TRANSIENT_BACKOFF).await;
            }
            Ok(Err(other)) => return Err(other),
            Err(panic) => {
                log::error!("ingestion loop iteration panicked, resuming: {panic:?}");
                sleep(TRANSIENT_BACKOFF).await;
            }
        }
    }
}
