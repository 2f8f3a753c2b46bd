pub mod broker;
pub mod error;
pub mod historical;

use async_trait::async_trait;
use decoder::RawRow;
pub use error::ConnectorError;
use model::VehicleId;

pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// One item handed to a pipeline worker: a raw row paired with the vehicle
/// partition it belongs to.
pub type Batch = Vec<(VehicleId, RawRow)>;

/// A source of raw EKE rows, partitioned by vehicle key. Both historical
/// backfill and live ingestion are implemented against this trait so stage
/// wiring doesn't need to know which one is feeding it.
#[async_trait]
pub trait SourceAdapter: Send {
    /// Pulls the next batch of rows (at most `batch_size`, possibly fewer at
    /// the tail of a partition). `Ok(None)` means the source is exhausted.
    async fn next_batch(&mut self) -> Result<Option<Batch>, ConnectorError>;

    /// Acknowledges that every row in the most recently returned batch has
    /// been durably written to all sinks. Only after this call may the
    /// adapter consider the batch replayed/delivered for at-least-once
    /// semantics (§4.9).
    async fn ack(&mut self, batch: &Batch) -> Result<(), ConnectorError>;
}
