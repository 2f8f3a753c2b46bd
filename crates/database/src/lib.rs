use std::env;

use model::{eke_msg::EkeMsg, event::Event, station_event::StationEvent};
use sqlx::postgres::{PgPoolOptions, PgPool};

pub mod error;
pub mod staging;

pub use error::{DatabaseError, Result};

const MESSAGES_TABLE: &str = "messages";
const EVENTS_TABLE: &str = "events";
const STATIONEVENTS_TABLE: &str = "stationevents";

pub struct DatabaseConnectionInfo {
    pub conn_str: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DatabaseConnectionInfo {
    /// Reads `POSTGRES_CONN_STR` from the environment. Aborts (returns an
    /// error the caller should treat as fatal) rather than falling back to
    /// defaults, per the fail-fast boot policy.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            conn_str: required_env("POSTGRES_CONN_STR")?,
            min_connections: 1,
            max_connections: 20,
        })
    }

    fn postgres_url(&self) -> &str {
        &self.conn_str
    }
}

fn required_env(name: &'static str) -> Result<String> {
    env::var(name).map_err(|_| DatabaseError::MissingEnv(name))
}

/// The three-table Postgres sink (`messages`, `events`, `stationevents`).
/// Each worker owns its own staging tables, named `<target>-<worker_id>`, so
/// concurrent workers never contend on the same staging rows.
pub struct PgSink {
    pool: PgPool,
    worker_id: String,
}

impl PgSink {
    pub async fn connect(info: DatabaseConnectionInfo, worker_id: impl Into<String>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(info.min_connections)
            .max_connections(info.max_connections)
            .connect(info.postgres_url())
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let worker_id = worker_id.into();
        for target in [MESSAGES_TABLE, EVENTS_TABLE, STATIONEVENTS_TABLE] {
            staging::ensure_staging_table(&pool, target, &worker_id).await?;
        }

        Ok(Self { pool, worker_id })
    }

    pub async fn write_messages(&self, messages: &[EkeMsg]) -> Result<u64> {
        let columns = [
            "tst",
            "ntp_timestamp",
            "eke_timestamp",
            "mqtt_timestamp",
            "tst_source",
            "msg_type",
            "vehicle_id",
            "message",
        ];
        let rows: Vec<String> = messages
            .iter()
            .map(|msg| {
                staging::csv_line(&[
                    msg.tst.unwrap_or(msg.eke_timestamp).to_rfc3339(),
                    msg.ntp_timestamp.to_rfc3339(),
                    msg.eke_timestamp.to_rfc3339(),
                    msg.mqtt_timestamp.to_rfc3339(),
                    msg.tst_source.map(|s| s.to_string()).unwrap_or_default(),
                    msg.msg_name.clone(),
                    msg.vehicle.clone(),
                    serde_json::to_string(msg).unwrap_or_default(),
                ])
            })
            .collect();

        staging::copy_and_merge(&self.pool, MESSAGES_TABLE, &self.worker_id, &columns, &rows).await
    }

    pub async fn write_events(&self, events: &[Event]) -> Result<u64> {
        let columns = [
            "tst",
            "tst_corrected",
            "ntp_timestamp",
            "eke_timestamp",
            "mqtt_timestamp",
            "tst_source",
            "event_type",
            "vehicle_id",
            "data",
        ];
        let rows: Vec<String> = events
            .iter()
            .map(|event| {
                staging::csv_line(&[
                    event.tst.to_rfc3339(),
                    event.tst_corrected.to_rfc3339(),
                    event.ntp_timestamp.to_rfc3339(),
                    event.eke_timestamp.to_rfc3339(),
                    event.mqtt_timestamp.to_rfc3339(),
                    event.tst_source.to_string(),
                    event.event_type.as_str().to_string(),
                    event.vehicle.clone(),
                    serde_json::to_string(&event.data).unwrap_or_default(),
                ])
            })
            .collect();

        staging::copy_and_merge(&self.pool, EVENTS_TABLE, &self.worker_id, &columns, &rows).await
    }

    pub async fn write_stationevents(&self, stationevents: &[StationEvent]) -> Result<u64> {
        let columns = [
            "tst",
            "ntp_timestamp",
            "eke_timestamp",
            "tst_source",
            "vehicle_id",
            "station",
            "track",
            "direction",
            "data",
        ];
        let rows: Vec<String> = stationevents
            .iter()
            .map(|event| {
                staging::csv_line(&[
                    // station events carry no separate tst; ntp_timestamp is authoritative here.
                    event.ntp_timestamp.to_rfc3339(),
                    event.ntp_timestamp.to_rfc3339(),
                    event.eke_timestamp.to_rfc3339(),
                    event.tst_source.to_string(),
                    event.vehicle.clone(),
                    event.station.clone(),
                    event.track.clone(),
                    event.direction.clone(),
                    serde_json::to_string(&event.data).unwrap_or_default(),
                ])
            })
            .collect();

        staging::copy_and_merge(&self.pool, STATIONEVENTS_TABLE, &self.worker_id, &columns, &rows).await
    }

    /// Drops this worker's staging tables. Called at shutdown.
    pub async fn shutdown(&self) -> Result<()> {
        for target in [MESSAGES_TABLE, EVENTS_TABLE, STATIONEVENTS_TABLE] {
            staging::drop_staging_table(&self.pool, target, &self.worker_id).await?;
        }
        Ok(())
    }
}
