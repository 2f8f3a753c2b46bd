use std::collections::HashMap;

use chrono::Duration;
use model::eke_msg::{BaliseCba, BalisePayload, EkeContent, EkeMsg};

const BALISE_GROUP_MAX_MSG_TIME_DIFF_SECS: i64 = 30;

#[derive(Default)]
pub struct BaliseDirectionState {
    buffered: HashMap<u32, EkeMsg>,
}

/// Pairs two combined balises of the same `balise_id` (the two physical
/// balises of a group) within a 30s window and derives `direction` from
/// which one reports `"1(2)"` versus `"2(2)"`.
pub fn apply(state: &mut BaliseDirectionState, msg: EkeMsg) -> Vec<EkeMsg> {
    let EkeContent::Balise(BalisePayload::Combined(ref data)) = msg.content else {
        return vec![msg];
    };
    let balise_id = data.balise_id;

    if let Some(buffered) = state.buffered.remove(&balise_id) {
        let within_window = (msg.ntp_timestamp - buffered.ntp_timestamp).abs()
            < Duration::seconds(BALISE_GROUP_MAX_MSG_TIME_DIFF_SECS);

        if within_window {
            let (older, newer) = if buffered.ntp_timestamp <= msg.ntp_timestamp {
                (buffered, msg)
            } else {
                (msg, buffered)
            };
            return vec![resolve_direction(older, newer)];
        }

        // the buffered entry is too old to pair with; release it on its own
        // and start a fresh wait for the current record.
        let mut stale = buffered;
        stale.incomplete = true;
        state.buffered.insert(balise_id, msg);
        return vec![stale];
    }

    state.buffered.insert(balise_id, msg);
    Vec::new()
}

fn resolve_direction(older: EkeMsg, newer: EkeMsg) -> EkeMsg {
    let older_cba = balise_cba(&older);
    let newer_cba = balise_cba(&newer);

    let direction = match (older_cba, newer_cba) {
        (Some(a), Some(b)) if a == b => {
            log::warn!("paired balises reported the same orientation");
            0
        }
        (Some(BaliseCba::First), _) => 1,
        _ => 2,
    };

    let mut source_refs = older.source_refs.clone();
    source_refs.extend(newer.source_refs.iter().cloned());

    let mqtt_timestamp = older.mqtt_timestamp.max(newer.mqtt_timestamp);
    let mut out = older;
    out.mqtt_timestamp = mqtt_timestamp;
    out.source_refs = source_refs;
    out.incomplete = direction == 0;
    if let EkeContent::Balise(BalisePayload::Combined(ref mut data)) = out.content {
        data.direction = Some(direction);
        data.balise_cba = None;
    }
    out
}

fn balise_cba(msg: &EkeMsg) -> Option<BaliseCba> {
    match &msg.content {
        EkeContent::Balise(BalisePayload::Combined(data)) => data.balise_cba,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use model::eke_msg::{BaliseCbb, BaliseData};

    fn combined(balise_id: u32, cba: BaliseCba, ts_secs: i64) -> EkeMsg {
        let ts = Utc.timestamp_opt(ts_secs, 0).single().unwrap();
        EkeMsg {
            msg_type: 5,
            msg_name: "JKVBeacon".to_string(),
            msg_version: 1,
            ntp_time_valid: true,
            eke_timestamp: ts,
            ntp_timestamp: ts,
            vehicle: "12".to_string(),
            mqtt_timestamp: ts,
            tst: None,
            tst_corrected: None,
            tst_source: None,
            tst_eke_correction_utc_secs: None,
            discard: false,
            incomplete: false,
            content: EkeContent::Balise(BalisePayload::Combined(BaliseData {
                balise_cba: Some(cba),
                balise_cbb: BaliseCbb::Single,
                balise_msg_type: "FixedData".to_string(),
                balise_id,
                balise_id_next: balise_id + 1,
                direction: None,
            })),
            source_refs: Vec::new(),
        }
    }

    fn direction_of(msg: &EkeMsg) -> Option<u8> {
        match &msg.content {
            EkeContent::Balise(BalisePayload::Combined(data)) => data.direction,
            _ => None,
        }
    }

    #[test]
    fn pairs_within_window_and_resolves_direction() {
        let mut state = BaliseDirectionState::default();
        let first = apply(&mut state, combined(42, BaliseCba::First, 0));
        assert!(first.is_empty());

        let second = apply(&mut state, combined(42, BaliseCba::Second, 10));
        assert_eq!(second.len(), 1);
        assert_eq!(direction_of(&second[0]), Some(1));
        assert!(matches!(
            &second[0].content,
            EkeContent::Balise(BalisePayload::Combined(BaliseData { balise_cba: None, .. }))
        ));
    }

    #[test]
    fn same_orientation_pair_is_marked_incomplete() {
        let mut state = BaliseDirectionState::default();
        apply(&mut state, combined(42, BaliseCba::First, 0));
        let resolved = apply(&mut state, combined(42, BaliseCba::First, 10));
        assert_eq!(resolved.len(), 1);
        assert_eq!(direction_of(&resolved[0]), Some(0));
        assert!(resolved[0].incomplete);
    }

    #[test]
    fn releases_stale_entry_past_window() {
        let mut state = BaliseDirectionState::default();
        apply(&mut state, combined(42, BaliseCba::First, 0));
        let released = apply(&mut state, combined(42, BaliseCba::Second, 1000));
        assert_eq!(released.len(), 1);
        assert!(released[0].incomplete);
    }
}
