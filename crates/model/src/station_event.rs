use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{TstSource, VehicleId};

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StationEvent {
    pub vehicle: VehicleId,
    pub ntp_timestamp: DateTime<Utc>,
    pub eke_timestamp: DateTime<Utc>,
    pub tst_source: TstSource,
    pub station: String,
    pub track: String,
    pub direction: String,
    pub data: Value,
}

/// One accumulated vehicle-visit-to-station record, folded from the event
/// stream until it is either closed out (`arrival`/`departure`/`cabin_changed`)
/// or superseded by a new `arrival`.
#[derive(Debug, Clone, Default)]
pub struct StationStateCache {
    pub station: Option<String>,
    pub track: Option<String>,
    pub direction: Option<String>,
    pub time_arrived: Option<DateTime<Utc>>,
    pub time_doors_last_closed: Option<DateTime<Utc>>,
    pub time_departed: Option<DateTime<Utc>>,
    pub arrival_vehicle_state: Value,
}

impl StationStateCache {
    pub fn is_empty(&self) -> bool {
        self.station.is_none()
            && self.track.is_none()
            && self.direction.is_none()
            && self.time_arrived.is_none()
            && self.time_doors_last_closed.is_none()
            && self.time_departed.is_none()
    }
}
