use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{SourceRef, TstSource, VehicleId};

/// A decoded EKE frame, enriched as it moves through the pipeline. Fields
/// populated only by later stages (`tst`, `tst_corrected`, ...) start out
/// `None` and are filled in place rather than wrapped in a new type, since
/// every stage after the decoder needs the whole envelope.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EkeMsg {
    pub msg_type: u8,
    pub msg_name: String,
    pub msg_version: u16,
    pub ntp_time_valid: bool,
    pub eke_timestamp: DateTime<Utc>,
    pub ntp_timestamp: DateTime<Utc>,
    pub vehicle: VehicleId,
    pub mqtt_timestamp: DateTime<Utc>,

    pub tst: Option<DateTime<Utc>>,
    pub tst_corrected: Option<DateTime<Utc>>,
    pub tst_source: Option<TstSource>,
    pub tst_eke_correction_utc_secs: Option<i64>,

    /// Set by the UDP reorder stage on a stale/late packet; preserved all the
    /// way to the `messages` sink for forensic analysis rather than dropped.
    #[serde(default)]
    pub discard: bool,
    /// Set when a balise half or group never found its pair within its
    /// window.
    #[serde(default)]
    pub incomplete: bool,

    pub content: EkeContent,

    #[serde(skip)]
    pub source_refs: Vec<SourceRef>,
}

impl EkeMsg {
    pub fn is_udp(&self) -> bool {
        matches!(self.content, EkeContent::Udp(_))
    }

    pub fn as_udp(&self) -> Option<&UdpContent> {
        match &self.content {
            EkeContent::Udp(udp) => Some(udp),
            _ => None,
        }
    }

    pub fn as_balise(&self) -> Option<&BalisePayload> {
        match &self.content {
            EkeContent::Balise(balise) => Some(balise),
            _ => None,
        }
    }
}

/// Human-readable name for a numeric message type, independent of whether the
/// sub-schema for it is specified here.
pub fn msg_name(msg_type: u8) -> &'static str {
    match msg_type {
        1 => "StadlerUDP",
        2 => "IOStatus",
        3 => "TrainComposition",
        4 => "Diagnostics",
        5 => "JKVBeacon",
        6 => "GpsPosition",
        7 => "DoorStatus",
        8 => "BrakeStatus",
        9 => "CabinStatus",
        10 => "SystemStatus",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EkeContent {
    Udp(UdpContent),
    Balise(BalisePayload),
    /// Simple bit-flag sub-messages with a known, fixed layout (e.g. IO
    /// status) that the core pipeline never reads but that are decoded for a
    /// complete `messages` table.
    IoStatus(IoStatusContent),
    /// Sub-types with a schema that is not specified; kept as an opaque blob
    /// so every EKE message type still produces a row, without fabricating
    /// undocumented field semantics.
    Opaque { payload: Vec<u8> },
    Empty,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UdpContent {
    pub packet_no: u8,
    pub speed: f32,
    pub odo: u16,
    pub standstill: bool,
    pub doors_open: bool,
    pub active_cabin: Option<Cabin>,
    pub vehicle_count: u8,
    pub vehicle_pos_on_train: u8,
    pub vehicle_no: u8,
    pub all_vehicles: [u8; 4],
    pub train_no: u16,
    pub loc_x: f64,
    pub loc_y: f64,
    pub main_brake_pipe_pressure: f32,
    pub teleste_timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Cabin {
    A,
    B,
    Ab,
}

/// Balise telegrams are transmitted in two halves and go through three
/// stages of enrichment: a raw half (`Part`), the two halves stitched
/// together (`Combined`, still carrying the raw `balise_cba` orientation
/// marker), and finally direction-resolved (`balise_cba` replaced by
/// `direction`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum BalisePayload {
    Part {
        msg_index: u8,
        transponder_msg_part: u8,
        raw: Vec<u8>,
    },
    Combined(BaliseData),
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BaliseData {
    /// Present until direction resolution succeeds, at which point it is
    /// dropped in favour of `direction`.
    pub balise_cba: Option<BaliseCba>,
    pub balise_cbb: BaliseCbb,
    pub balise_msg_type: String,
    pub balise_id: u32,
    pub balise_id_next: u32,
    /// `None` until two balises of the group have been paired; `Some(0)`
    /// means they were paired but disagreed on orientation.
    pub direction: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BaliseCba {
    #[serde(rename = "1(2)")]
    First,
    #[serde(rename = "2(2)")]
    Second,
    #[serde(rename = "2(2)*")]
    SecondAlt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BaliseCbb {
    Single,
    Double,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IoStatusContent {
    pub braking: bool,
    pub sanding: bool,
    pub jkv_on: bool,
    pub safety_device_on: bool,
    pub rail_brake: bool,
}
