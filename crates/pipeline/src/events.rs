use chrono::{DateTime, Utc};
use model::{
    balise::StationEventKind,
    eke_msg::{BalisePayload, Cabin, EkeContent, EkeMsg},
    event::{Event, EventType},
    TstSource,
};
use registry::BaliseRegistry;
use serde_json::json;

#[derive(Default)]
pub struct UdpState {
    doors_open: Option<bool>,
    standstill: Option<bool>,
    active_cabin: Option<Cabin>,
    train_no: Option<u16>,
    vehicle_count: Option<u8>,
    all_vehicles: Option<[u8; 4]>,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct StationState {
    station: Option<String>,
    track: Option<String>,
    direction: Option<String>,
    event: Option<&'static str>,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct EventDetectorState {
    udp: UdpState,
    station: StationState,
}

/// Compares the fields of a UDP record (in a fixed order) against the last
/// seen values for this vehicle and emits at most one event for the first
/// field that changed. `tst` older than the state's `last_updated` is
/// treated as a late/reordered record and dropped with a warning rather than
/// regressing the state.
fn process_udp(state: &mut UdpState, msg: &EkeMsg, tst: DateTime<Utc>) -> Option<Event> {
    let udp = msg.as_udp()?;

    if state.doors_open.is_none() {
        state.doors_open = Some(udp.doors_open);
        state.last_updated = Some(tst);
    } else if state.doors_open != Some(udp.doors_open) {
        if tst < state.last_updated.unwrap() {
            log::warn!("ignoring out-of-order doors_open transition for {}", msg.vehicle);
            return None;
        }
        let event_type = if udp.doors_open {
            EventType::DoorsOpened
        } else {
            EventType::DoorsClosed
        };
        state.doors_open = Some(udp.doors_open);
        state.last_updated = Some(tst);
        return Some(make_event(msg, event_type, json!({ "doors_open": udp.doors_open })));
    }

    if state.standstill.is_none() {
        state.standstill = Some(udp.standstill);
        state.last_updated = Some(tst);
    } else if state.standstill != Some(udp.standstill) {
        if tst < state.last_updated.unwrap() {
            log::warn!("ignoring out-of-order standstill transition for {}", msg.vehicle);
            return None;
        }
        let event_type = if udp.standstill {
            EventType::Stopped
        } else {
            EventType::Moving
        };
        state.standstill = Some(udp.standstill);
        state.last_updated = Some(tst);
        return Some(make_event(msg, event_type, json!({ "standstill": udp.standstill })));
    }

    if state.active_cabin.is_none() {
        state.active_cabin = udp.active_cabin;
    } else if state.active_cabin != udp.active_cabin {
        if tst < state.last_updated.unwrap_or(tst) {
            return None;
        }
        state.active_cabin = udp.active_cabin;
        state.last_updated = Some(tst);
        return Some(make_event(
            msg,
            EventType::CabinChanged,
            json!({ "active_cabin": udp.active_cabin }),
        ));
    }

    if state.train_no.is_none() {
        state.train_no = Some(udp.train_no);
    } else if state.train_no != Some(udp.train_no) {
        if tst < state.last_updated.unwrap_or(tst) {
            return None;
        }
        state.train_no = Some(udp.train_no);
        state.last_updated = Some(tst);
        return Some(make_event(
            msg,
            EventType::TrainNoChanged,
            json!({ "train_no": udp.train_no }),
        ));
    }

    if state.vehicle_count.is_none() {
        state.vehicle_count = Some(udp.vehicle_count);
    } else if state.vehicle_count != Some(udp.vehicle_count) {
        if tst < state.last_updated.unwrap_or(tst) {
            return None;
        }
        state.vehicle_count = Some(udp.vehicle_count);
        state.last_updated = Some(tst);
        return Some(make_event(
            msg,
            EventType::VehicleCountChanged,
            json!({ "vehicle_count": udp.vehicle_count }),
        ));
    }

    if state.all_vehicles.is_none() {
        state.all_vehicles = Some(udp.all_vehicles);
    } else if state.all_vehicles != Some(udp.all_vehicles) {
        if tst < state.last_updated.unwrap_or(tst) {
            return None;
        }
        state.all_vehicles = Some(udp.all_vehicles);
        state.last_updated = Some(tst);
        return Some(make_event(
            msg,
            EventType::VehicleIdsChanged,
            json!({ "all_vehicles": udp.all_vehicles }),
        ));
    }

    None
}

fn process_balise(
    state: &mut StationState,
    registry: &BaliseRegistry,
    msg: &EkeMsg,
    tst: DateTime<Utc>,
) -> Option<Event> {
    if msg.incomplete {
        return None;
    }
    let EkeContent::Balise(BalisePayload::Combined(data)) = &msg.content else {
        return None;
    };
    let direction = data.direction.filter(|&d| d == 1 || d == 2)?;
    let entry = registry.lookup(data.balise_id, direction)?;

    let triggered_by = format!("{}_{}", data.balise_id, direction);
    let event_data = json!({
        "station": entry.station,
        "track": entry.track,
        "direction": entry.train_direction,
        "triggered_by": triggered_by,
    });

    let changed = state.station.as_deref() != Some(entry.station.as_str())
        || state.track.as_deref() != Some(entry.track.as_str())
        || state.direction.as_deref() != Some(entry.train_direction.as_str())
        || state.event != Some(entry.event_kind.as_event_str());

    if !changed {
        let event_type = match entry.event_kind {
            StationEventKind::Arrival => EventType::ArrivalDebug,
            StationEventKind::Departure => EventType::DepartureDebug,
        };
        return Some(make_event(msg, event_type, event_data));
    }

    if let Some(last_updated) = state.last_updated {
        if tst < last_updated {
            log::warn!("ignoring out-of-order station transition for {}", msg.vehicle);
            return None;
        }
    }

    state.station = Some(entry.station.clone());
    state.track = Some(entry.track.clone());
    state.direction = Some(entry.train_direction.clone());
    state.event = Some(entry.event_kind.as_event_str());
    state.last_updated = Some(tst);

    let event_type = match entry.event_kind {
        StationEventKind::Arrival => EventType::Arrival,
        StationEventKind::Departure => EventType::Departure,
    };
    Some(make_event(msg, event_type, event_data))
}

fn make_event(msg: &EkeMsg, event_type: EventType, data: serde_json::Value) -> Event {
    Event {
        vehicle: msg.vehicle.clone(),
        tst: msg.tst.unwrap_or(msg.eke_timestamp),
        tst_corrected: msg.tst_corrected.unwrap_or(msg.eke_timestamp),
        tst_source: msg.tst_source.unwrap_or(TstSource::Eke),
        ntp_timestamp: msg.ntp_timestamp,
        eke_timestamp: msg.eke_timestamp,
        mqtt_timestamp: msg.mqtt_timestamp,
        event_type,
        data,
        source_refs: msg.source_refs.clone(),
    }
}

/// Per-vehicle event detector: compares UDP fields and balise-derived
/// station hits against last-seen state, emitting at most one event per
/// input record.
pub fn apply(state: &mut EventDetectorState, registry: &BaliseRegistry, msg: &EkeMsg) -> Option<Event> {
    if msg.discard {
        return None;
    }
    let tst = msg.tst_corrected.or(msg.tst).unwrap_or(msg.eke_timestamp);
    match &msg.content {
        EkeContent::Udp(_) => process_udp(&mut state.udp, msg, tst),
        EkeContent::Balise(BalisePayload::Combined(_)) => {
            process_balise(&mut state.station, registry, msg, tst)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use model::{
        balise::BaliseRegistryEntry,
        eke_msg::{BaliseCba, BaliseCbb, BaliseData, UdpContent},
    };

    fn base_udp(doors_open: bool, standstill: bool, ts_secs: i64) -> EkeMsg {
        let ts = Utc.timestamp_opt(ts_secs, 0).single().unwrap();
        EkeMsg {
            msg_type: 1,
            msg_name: "StadlerUDP".to_string(),
            msg_version: 1,
            ntp_time_valid: true,
            eke_timestamp: ts,
            ntp_timestamp: ts,
            vehicle: "12".to_string(),
            mqtt_timestamp: ts,
            tst: Some(ts),
            tst_corrected: Some(ts),
            tst_source: Some(TstSource::Eke),
            tst_eke_correction_utc_secs: Some(0),
            discard: false,
            incomplete: false,
            content: EkeContent::Udp(UdpContent {
                packet_no: 0,
                speed: 0.0,
                odo: 0,
                standstill,
                doors_open,
                active_cabin: None,
                vehicle_count: 1,
                vehicle_pos_on_train: 1,
                vehicle_no: 1,
                all_vehicles: [1, 0, 0, 0],
                train_no: 1,
                loc_x: 0.0,
                loc_y: 0.0,
                main_brake_pipe_pressure: 0.0,
                teleste_timestamp: "0".to_string(),
            }),
            source_refs: Vec::new(),
        }
    }

    #[test]
    fn first_record_initializes_without_emitting() {
        let mut state = EventDetectorState::default();
        let registry = BaliseRegistry::from_entries(Vec::new());
        assert!(apply(&mut state, &registry, &base_udp(false, true, 0)).is_none());
    }

    #[test]
    fn doors_opening_emits_event() {
        let mut state = EventDetectorState::default();
        let registry = BaliseRegistry::from_entries(Vec::new());
        apply(&mut state, &registry, &base_udp(false, true, 0));
        let event = apply(&mut state, &registry, &base_udp(true, true, 10)).unwrap();
        assert_eq!(event.event_type, EventType::DoorsOpened);
    }

    fn combined_balise(balise_id: u32, direction: u8, ts_secs: i64) -> EkeMsg {
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
            tst: Some(ts),
            tst_corrected: Some(ts),
            tst_source: Some(TstSource::Eke),
            tst_eke_correction_utc_secs: Some(0),
            discard: false,
            incomplete: false,
            content: EkeContent::Balise(BalisePayload::Combined(BaliseData {
                balise_cba: None,
                balise_cbb: BaliseCbb::Single,
                balise_msg_type: "FixedData".to_string(),
                balise_id,
                balise_id_next: balise_id + 1,
                direction: Some(direction),
            })),
            source_refs: Vec::new(),
        }
    }

    #[test]
    fn balise_hit_emits_arrival_when_registered() {
        let mut state = EventDetectorState::default();
        let registry = BaliseRegistry::from_entries(vec![BaliseRegistryEntry {
            balise: 1001,
            direction: 1,
            station: "Pasila".to_string(),
            track: "11".to_string(),
            event_kind: StationEventKind::Arrival,
            train_direction: "1".to_string(),
        }]);
        let event = apply(&mut state, &registry, &combined_balise(1001, 1, 0)).unwrap();
        assert_eq!(event.event_type, EventType::Arrival);
        assert_eq!(event.data["station"], "Pasila");
    }

    #[test]
    fn repeated_balise_hit_emits_debug_event() {
        let mut state = EventDetectorState::default();
        let registry = BaliseRegistry::from_entries(vec![BaliseRegistryEntry {
            balise: 1001,
            direction: 1,
            station: "Pasila".to_string(),
            track: "11".to_string(),
            event_kind: StationEventKind::Arrival,
            train_direction: "1".to_string(),
        }]);
        apply(&mut state, &registry, &combined_balise(1001, 1, 0));
        let event = apply(&mut state, &registry, &combined_balise(1001, 1, 10)).unwrap();
        assert_eq!(event.event_type, EventType::ArrivalDebug);
    }
}
