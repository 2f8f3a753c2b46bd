use chrono::{DateTime, Utc};
use model::{
    event::{Event, EventType},
    station_event::{StationEvent, StationStateCache},
};
use serde_json::{json, Value};

#[derive(Default)]
pub struct StationAggregatorState {
    cache: StationStateCache,
}

fn merge_object(base: &mut Value, incoming: &Value) {
    if let (Some(base_map), Some(incoming_map)) = (base.as_object_mut(), incoming.as_object()) {
        for (k, v) in incoming_map {
            base_map.insert(k.clone(), v.clone());
        }
    }
}

fn field_str(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(String::from)
}

fn null_if_before(field: &mut Option<DateTime<Utc>>, arrival: DateTime<Utc>) {
    if field.is_some_and(|t| t < arrival) {
        *field = None;
    }
}

/// `_create_event` guard: a visit is only reportable once it has a station
/// and at least one boundary timestamp, and only once every timestamp we
/// know about has actually happened by `trigger_time` (no emitting ahead of
/// a buffered-but-not-yet-released record).
fn create_event(cache: &StationStateCache, trigger_time: DateTime<Utc>) -> Option<Value> {
    if cache.station.is_none() || cache.track.is_none() || cache.direction.is_none() {
        return None;
    }
    if cache.time_arrived.is_none() && cache.time_departed.is_none() {
        return None;
    }
    for ts in [cache.time_arrived, cache.time_doors_last_closed, cache.time_departed]
        .into_iter()
        .flatten()
    {
        if trigger_time < ts {
            return None;
        }
    }

    let mut data = cache.arrival_vehicle_state.clone();
    if !data.is_object() {
        data = json!({});
    }
    merge_object(
        &mut data,
        &json!({
            "time_arrived": cache.time_arrived,
            "time_doors_last_closed": cache.time_doors_last_closed,
            "time_departed": cache.time_departed,
        }),
    );

    Some(data)
}

fn emit(
    cache: &StationStateCache,
    event: &Event,
    trigger_time: DateTime<Utc>,
) -> Option<StationEvent> {
    let data = create_event(cache, trigger_time)?;
    Some(StationEvent {
        vehicle: event.vehicle.clone(),
        ntp_timestamp: event.ntp_timestamp,
        eke_timestamp: event.eke_timestamp,
        tst_source: event.tst_source,
        station: cache.station.clone().unwrap(),
        track: cache.track.clone().unwrap(),
        direction: cache.direction.clone().unwrap(),
        data,
    })
}

/// Folds the per-vehicle event stream into station-visit records, one
/// `StationEvent` per arrival-to-departure (or arrival-to-next-arrival, or
/// arrival-to-cabin-swap) cycle.
pub fn apply(state: &mut StationAggregatorState, event: &Event) -> Option<StationEvent> {
    let cache = &mut state.cache;
    let trigger_time = event.ntp_timestamp;

    match event.event_type {
        EventType::Arrival => {
            let emitted = if cache.station.is_some() {
                let result = emit(cache, event, trigger_time);
                if result.is_some() {
                    *cache = StationStateCache::default();
                }
                result
            } else {
                None
            };

            cache.arrival_vehicle_state = json!({});
            cache.station = field_str(&event.data, "station");
            cache.track = field_str(&event.data, "track");
            cache.direction = field_str(&event.data, "direction");
            null_if_before(&mut cache.time_arrived, trigger_time);
            null_if_before(&mut cache.time_doors_last_closed, trigger_time);
            null_if_before(&mut cache.time_departed, trigger_time);
            emitted
        }
        EventType::Stopped => {
            if cache.time_arrived.is_none() || cache.time_doors_last_closed.is_none() {
                cache.time_arrived = Some(trigger_time);
            }
            None
        }
        EventType::DoorsOpened => None,
        EventType::DoorsClosed => {
            cache.time_doors_last_closed = Some(trigger_time);
            None
        }
        EventType::Moving => {
            cache.time_departed = Some(trigger_time);
            None
        }
        EventType::Departure => {
            if cache.station.is_none() || cache.track.is_none() || cache.direction.is_none() {
                cache.station = field_str(&event.data, "station");
                cache.track = field_str(&event.data, "track");
                cache.direction = field_str(&event.data, "direction");
            }
            if !cache.arrival_vehicle_state.is_object() {
                cache.arrival_vehicle_state = json!({});
            }
            let emitted = emit(cache, event, trigger_time);
            if emitted.is_some() {
                *cache = StationStateCache::default();
            }
            emitted
        }
        EventType::CabinChanged => {
            merge_object(&mut cache.arrival_vehicle_state, &event.data);
            cache.time_departed = None;
            cache.time_doors_last_closed = None;
            let emitted = emit(cache, event, trigger_time);
            *cache = StationStateCache::default();
            emitted
        }
        EventType::TrainNoChanged | EventType::VehicleCountChanged | EventType::VehicleIdsChanged => {
            merge_object(&mut cache.arrival_vehicle_state, &event.data);
            None
        }
        EventType::ArrivalDebug | EventType::DepartureDebug => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use model::TstSource;

    fn event(event_type: EventType, ts_secs: i64, data: Value) -> Event {
        let ts = Utc.timestamp_opt(ts_secs, 0).single().unwrap();
        Event {
            vehicle: "12".to_string(),
            tst: ts,
            tst_corrected: ts,
            tst_source: TstSource::Eke,
            ntp_timestamp: ts,
            eke_timestamp: ts,
            mqtt_timestamp: ts,
            event_type,
            data,
            source_refs: Vec::new(),
        }
    }

    #[test]
    fn normal_visit_emits_on_departure() {
        let mut state = StationAggregatorState::default();
        let arrival = event(
            EventType::Arrival,
            0,
            json!({ "station": "Pasila", "track": "11", "direction": "1" }),
        );
        assert!(apply(&mut state, &arrival).is_none());

        let stopped = event(EventType::Stopped, 5, json!({}));
        assert!(apply(&mut state, &stopped).is_none());

        let doors_closed = event(EventType::DoorsClosed, 30, json!({}));
        assert!(apply(&mut state, &doors_closed).is_none());

        let moving = event(EventType::Moving, 40, json!({}));
        assert!(apply(&mut state, &moving).is_none());

        let departure = event(
            EventType::Departure,
            40,
            json!({ "station": "Pasila", "track": "11", "direction": "1" }),
        );
        let visit = apply(&mut state, &departure).unwrap();
        assert_eq!(visit.station, "Pasila");
        assert_eq!(visit.track, "11");
        assert!(visit.data["time_arrived"].is_string());
        assert!(visit.data["time_departed"].is_string());
    }

    #[test]
    fn missing_station_never_emits() {
        let mut state = StationAggregatorState::default();
        let stopped = event(EventType::Stopped, 5, json!({}));
        assert!(apply(&mut state, &stopped).is_none());
        let moving = event(EventType::Moving, 10, json!({}));
        assert!(apply(&mut state, &moving).is_none());
    }

    #[test]
    fn arrival_while_holding_unfinished_visit_tries_to_emit_and_restarts() {
        let mut state = StationAggregatorState::default();
        let first_arrival = event(
            EventType::Arrival,
            0,
            json!({ "station": "Pasila", "track": "11", "direction": "1" }),
        );
        apply(&mut state, &first_arrival);
        apply(&mut state, &event(EventType::Stopped, 5, json!({})));
        apply(&mut state, &event(EventType::Moving, 15, json!({})));

        // no explicit departure ever arrives; the next arrival must close
        // out the pending visit before starting a new one.
        let second_arrival = event(
            EventType::Arrival,
            20,
            json!({ "station": "Ilmala", "track": "2", "direction": "2" }),
        );
        let visit = apply(&mut state, &second_arrival).unwrap();
        assert_eq!(visit.station, "Pasila");
    }
}
