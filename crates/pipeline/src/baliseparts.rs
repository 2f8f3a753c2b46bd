use chrono::{DateTime, Duration, Utc};
use decoder::balise::parse_balise_data;
use model::eke_msg::{BalisePayload, EkeContent, EkeMsg};

const BALISE_MAX_MSG_TIME_DIFF_SECS: i64 = 5;

struct Slot {
    msg: EkeMsg,
    msg_index: u8,
    transponder_msg_part: u8,
    raw: Vec<u8>,
    ntp_timestamp: DateTime<Utc>,
}

/// 256-entry cache keyed by `msg_index`, one slot per possible index; a
/// `Vec<Option<Slot>>` mirrors the original fixed-size array since indices
/// outside the observed range never occur (`msg_index` is a `u8`).
pub struct BalisePartsState {
    slots: Vec<Option<Slot>>,
}

impl Default for BalisePartsState {
    fn default() -> Self {
        Self {
            slots: (0..256).map(|_| None).collect(),
        }
    }
}

fn pair_index(msg_index: u8, transponder_msg_part: u8) -> u8 {
    if transponder_msg_part == 0 {
        if msg_index == 255 {
            1
        } else {
            msg_index + 1
        }
    } else if msg_index == 0 {
        255
    } else {
        msg_index - 1
    }
}

/// Pairs the two halves of a balise telegram (`transponder_msg_part` 0 and
/// 1) by adjacent `msg_index`, within a 5s window. Non-balise records pass
/// straight through; a balise half that never finds its pair in time is
/// eventually released on its own, marked `incomplete`.
pub fn apply(state: &mut BalisePartsState, msg: EkeMsg) -> Vec<EkeMsg> {
    let EkeContent::Balise(BalisePayload::Part {
        msg_index,
        transponder_msg_part,
        ref raw,
    }) = msg.content
    else {
        return vec![msg];
    };

    let pair_idx = pair_index(msg_index, transponder_msg_part);
    let pair_slot_occupied = state.slots[pair_idx as usize]
        .as_ref()
        .is_some_and(|slot| {
            (msg.ntp_timestamp - slot.ntp_timestamp).abs()
                < Duration::seconds(BALISE_MAX_MSG_TIME_DIFF_SECS)
        });

    if pair_slot_occupied {
        let pair = state.slots[pair_idx as usize].take().unwrap();
        let (first_raw, first_msg, second_raw) = if transponder_msg_part == 0 {
            (raw.clone(), msg.clone(), pair.raw)
        } else {
            (pair.raw, pair.msg, raw.clone())
        };
        let mut combined_raw = first_raw;
        combined_raw.extend(second_raw);

        let mqtt_timestamp = msg.mqtt_timestamp.max(pair.msg.mqtt_timestamp);
        let mut source_refs = first_msg.source_refs.clone();
        source_refs.extend(msg.source_refs.iter().cloned());
        source_refs.extend(pair.msg.source_refs.iter().cloned());

        return match parse_balise_data(&combined_raw) {
            Ok(data) => {
                let mut out = first_msg;
                out.mqtt_timestamp = mqtt_timestamp;
                out.content = EkeContent::Balise(model::eke_msg::BalisePayload::Combined(data));
                out.source_refs = source_refs;
                vec![out]
            }
            Err(err) => {
                log::warn!("failed to parse combined balise telegram: {err}");
                vec![]
            }
        };
    }

    let mut released = Vec::new();
    if let Some(previous) = state.slots[msg_index as usize].take() {
        let mut stale = previous.msg;
        stale.incomplete = true;
        stale.mqtt_timestamp = msg.mqtt_timestamp.max(stale.mqtt_timestamp);
        released.push(stale);
    }

    state.slots[msg_index as usize] = Some(Slot {
        msg: msg.clone(),
        msg_index,
        transponder_msg_part,
        raw: raw.clone(),
        ntp_timestamp: msg.ntp_timestamp,
    });

    released
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn balise_half(msg_index: u8, part: u8, ts_secs: i64, raw: Vec<u8>) -> EkeMsg {
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
            content: EkeContent::Balise(BalisePayload::Part {
                msg_index,
                transponder_msg_part: part,
                raw,
            }),
            source_refs: Vec::new(),
        }
    }

    #[test]
    fn combines_adjacent_parts_within_window() {
        let mut state = BalisePartsState::default();
        let mut raw0 = vec![0x21u8];
        raw0.extend(vec![0u8; 11]);
        let raw1 = vec![0u8; 1];

        let first = apply(&mut state, balise_half(10, 0, 100, raw0));
        assert!(first.is_empty());

        let second = apply(&mut state, balise_half(11, 1, 102, raw1));
        assert_eq!(second.len(), 1);
        match &second[0].content {
            EkeContent::Balise(BalisePayload::Combined(data)) => {
                assert!(data.direction.is_none());
            }
            _ => panic!("expected combined balise"),
        }
    }

    #[test]
    fn unpaired_half_is_released_incomplete_when_overwritten() {
        let mut state = BalisePartsState::default();
        let raw = vec![0u8; 12];
        let first = apply(&mut state, balise_half(10, 0, 100, raw.clone()));
        assert!(first.is_empty());

        // same slot reused before a pair arrived
        let released = apply(&mut state, balise_half(10, 0, 200, raw));
        assert_eq!(released.len(), 1);
        assert!(released[0].incomplete);
    }
}
