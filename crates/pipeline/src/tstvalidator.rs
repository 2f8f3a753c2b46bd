use std::collections::HashMap;

use chrono::Duration;
use model::{eke_msg::EkeMsg, TstSource, VehicleId};

const MQTT_NTP_SANITY_THRESHOLD_SECS: i64 = 2;

/// Per-vehicle EKE-clock-vs-NTP offset, carried forward across records so a
/// temporarily invalid NTP reading still gets a reasonable `tst_corrected`.
#[derive(Default)]
pub struct TstValidatorState {
    offsets: HashMap<VehicleId, Duration>,
}

/// Chooses the authoritative timestamp for a record: `tst` is always the raw
/// EKE clock; `tst_corrected` additionally applies the last known
/// EKE-vs-NTP offset, refreshed whenever the current record's NTP reading is
/// trustworthy (flagged valid, or within 2s of the mqtt broker's receive
/// time as a sanity fallback).
pub fn apply(state: &mut TstValidatorState, mut msg: EkeMsg) -> EkeMsg {
    let offset = state
        .offsets
        .entry(msg.vehicle.clone())
        .or_insert_with(Duration::zero);

    let mqtt_ntp_diff = (msg.mqtt_timestamp - msg.ntp_timestamp).num_seconds().abs();
    if msg.ntp_time_valid || mqtt_ntp_diff < MQTT_NTP_SANITY_THRESHOLD_SECS {
        *offset = msg.ntp_timestamp - msg.eke_timestamp;
    }

    msg.tst = Some(msg.eke_timestamp);
    msg.tst_source = Some(TstSource::Eke);
    msg.tst_corrected = Some(msg.eke_timestamp + *offset);
    msg.tst_eke_correction_utc_secs = Some(offset.num_seconds());

    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use model::eke_msg::EkeContent;

    fn msg(eke: chrono::DateTime<Utc>, ntp: chrono::DateTime<Utc>, ntp_valid: bool) -> EkeMsg {
        EkeMsg {
            msg_type: 1,
            msg_name: "StadlerUDP".to_string(),
            msg_version: 1,
            ntp_time_valid: ntp_valid,
            eke_timestamp: eke,
            ntp_timestamp: ntp,
            vehicle: "12".to_string(),
            mqtt_timestamp: ntp,
            tst: None,
            tst_corrected: None,
            tst_source: None,
            tst_eke_correction_utc_secs: None,
            discard: false,
            incomplete: false,
            content: EkeContent::Empty,
            source_refs: Vec::new(),
        }
    }

    #[test]
    fn applies_ntp_offset_when_valid() {
        let mut state = TstValidatorState::default();
        let eke = Utc.timestamp_opt(1_000, 0).single().unwrap();
        let ntp = Utc.timestamp_opt(1_010, 0).single().unwrap();
        let result = apply(&mut state, msg(eke, ntp, true));
        assert_eq!(result.tst, Some(eke));
        assert_eq!(result.tst_corrected, Some(ntp));
        assert_eq!(result.tst_eke_correction_utc_secs, Some(10));
    }

    #[test]
    fn keeps_last_offset_when_ntp_invalid_and_mqtt_far_off() {
        let mut state = TstValidatorState::default();
        let eke = Utc.timestamp_opt(1_000, 0).single().unwrap();
        let ntp = Utc.timestamp_opt(1_010, 0).single().unwrap();
        apply(&mut state, msg(eke, ntp, true));

        let eke2 = Utc.timestamp_opt(1_020, 0).single().unwrap();
        let mut m2 = msg(eke2, eke2, false);
        m2.mqtt_timestamp = Utc.timestamp_opt(1_500, 0).single().unwrap();
        let result = apply(&mut state, m2);
        // offset stays at +10s from the previous valid reading
        assert_eq!(result.tst_corrected, Some(eke2 + Duration::seconds(10)));
    }
}
