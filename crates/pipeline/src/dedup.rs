use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use indexmap::IndexSet;
use model::eke_msg::EkeMsg;

const CACHE_MAX_SIZE: usize = 20_000;

/// Per-vehicle dedup cache: a bounded, insertion-ordered set of content
/// hashes. `IndexSet` gives FIFO eviction (oldest entry is always at index 0)
/// without a separate queue to keep in sync.
#[derive(Default)]
pub struct DedupState {
    seen: IndexSet<u64>,
}

/// Drops an exact duplicate of an already-seen decoded record. Hashing is
/// done on the decoded content only, before any further enrichment (balise
/// combining, direction resolution), since those stages mutate `content` in
/// place and would otherwise make two notes of the same raw record look
/// different.
pub fn apply(state: &mut DedupState, msg: EkeMsg) -> Option<EkeMsg> {
    let hash = content_hash(&msg);
    if state.seen.contains(&hash) {
        return None;
    }
    if state.seen.len() >= CACHE_MAX_SIZE {
        state.seen.shift_remove_index(0);
    }
    state.seen.insert(hash);
    Some(msg)
}

fn content_hash(msg: &EkeMsg) -> u64 {
    let mut hasher = DefaultHasher::new();
    msg.msg_type.hash(&mut hasher);
    msg.eke_timestamp.hash(&mut hasher);
    msg.ntp_timestamp.hash(&mut hasher);
    msg.vehicle.hash(&mut hasher);
    // serde_json gives a stable field order for a fixed struct shape, which
    // is good enough for a flat-content identity hash.
    serde_json::to_string(&msg.content)
        .unwrap_or_default()
        .hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use model::eke_msg::EkeContent;

    fn msg(vehicle: &str) -> EkeMsg {
        EkeMsg {
            msg_type: 1,
            msg_name: "StadlerUDP".to_string(),
            msg_version: 1,
            ntp_time_valid: true,
            eke_timestamp: Utc::now(),
            ntp_timestamp: Utc::now(),
            vehicle: vehicle.to_string(),
            mqtt_timestamp: Utc::now(),
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
    fn second_identical_record_is_dropped() {
        let mut state = DedupState::default();
        let a = msg("12");
        let b = a.clone();
        assert!(apply(&mut state, a).is_some());
        assert!(apply(&mut state, b).is_none());
    }
}
