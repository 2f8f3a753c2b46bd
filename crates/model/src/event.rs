use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{SourceRef, TstSource, VehicleId};

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub vehicle: VehicleId,
    pub tst: DateTime<Utc>,
    pub tst_corrected: DateTime<Utc>,
    pub tst_source: TstSource,
    pub ntp_timestamp: DateTime<Utc>,
    pub eke_timestamp: DateTime<Utc>,
    pub mqtt_timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub data: Value,

    #[serde(skip)]
    pub source_refs: Vec<SourceRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DoorsOpened,
    DoorsClosed,
    Stopped,
    Moving,
    CabinChanged,
    TrainNoChanged,
    VehicleCountChanged,
    VehicleIdsChanged,
    Arrival,
    Departure,
    ArrivalDebug,
    DepartureDebug,
}

impl EventType {
    /// Station-visit event types without their `_debug` counterpart, as
    /// consumed by the station aggregator's match on `event_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::DoorsOpened => "doors_opened",
            EventType::DoorsClosed => "doors_closed",
            EventType::Stopped => "stopped",
            EventType::Moving => "moving",
            EventType::CabinChanged => "cabin_changed",
            EventType::TrainNoChanged => "train_no_changed",
            EventType::VehicleCountChanged => "vehicle_count_changed",
            EventType::VehicleIdsChanged => "vehicle_ids_changed",
            EventType::Arrival => "arrival",
            EventType::Departure => "departure",
            EventType::ArrivalDebug => "arrival_debug",
            EventType::DepartureDebug => "departure_debug",
        }
    }
}
