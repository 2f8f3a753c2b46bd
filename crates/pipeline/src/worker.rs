use std::{any::Any, collections::HashMap, sync::Arc};

use actors::{
    actor::{Actor, SupervisionStrategy},
    actor_ref::ActorRef,
    handler::{Handler, Message},
};
use async_trait::async_trait;
use decoder::RawRow;
use model::{eke_msg::EkeMsg, event::Event, station_event::StationEvent, VehicleId};
use registry::BaliseRegistry;

use crate::{baliseparts, balisedirection, dedup, events, stationevents, tstvalidator, udporder};

/// One vehicle's worth of per-stage state, chained in pipeline order.
/// Lazily constructed on first sight of a vehicle key and kept for the
/// life of that key (§4.10's keyed-state runtime).
#[derive(Default)]
pub struct PerVehiclePipeline {
    dedup: dedup::DedupState,
    tstvalidator: tstvalidator::TstValidatorState,
    udporder: udporder::UdpOrderState,
    baliseparts: baliseparts::BalisePartsState,
    balisedirection: balisedirection::BaliseDirectionState,
    events: events::EventDetectorState,
    stationevents: stationevents::StationAggregatorState,
}

#[derive(Debug, Default, Clone)]
pub struct PipelineOutput {
    pub messages: Vec<EkeMsg>,
    pub events: Vec<Event>,
    pub stationevents: Vec<StationEvent>,
}

/// Runs one raw row through every stage, in order, feeding each stage's
/// (possibly fanned-out) output into the next. Decode failures and
/// intentionally-filtered rows (connection-status heartbeats) simply yield
/// an empty output rather than propagating an error past the worker.
pub fn step(state: &mut PerVehiclePipeline, registry: &BaliseRegistry, row: &RawRow) -> PipelineOutput {
    let mut out = PipelineOutput::default();

    let msg = match decoder::decode(row) {
        Ok(Some(msg)) => msg,
        Ok(None) => return out,
        Err(err) => {
            log::error!("decode failed for topic {}: {err}", row.mqtt_topic);
            return out;
        }
    };

    let Some(msg) = dedup::apply(&mut state.dedup, msg) else {
        return out;
    };
    let msg = tstvalidator::apply(&mut state.tstvalidator, msg);

    for msg in udporder::apply(&mut state.udporder, msg) {
        for msg in baliseparts::apply(&mut state.baliseparts, msg) {
            for msg in balisedirection::apply(&mut state.balisedirection, msg) {
                if let Some(event) = events::apply(&mut state.events, registry, &msg) {
                    if let Some(station_event) = stationevents::apply(&mut state.stationevents, &event) {
                        out.stationevents.push(station_event);
                    }
                    out.events.push(event);
                }
                out.messages.push(msg);
            }
        }
    }

    out
}

/// Actor wrapping one vehicle's `PerVehiclePipeline`. Messages are handled
/// strictly in mailbox arrival order, which is what gives the pipeline's
/// single-writer-per-key guarantee without locking (§4.10, §5).
pub struct VehicleActor {
    registry: Arc<BaliseRegistry>,
    pipeline: PerVehiclePipeline,
}

impl VehicleActor {
    pub fn new(registry: Arc<BaliseRegistry>) -> Self {
        Self {
            registry,
            pipeline: PerVehiclePipeline::default(),
        }
    }
}

impl Actor for VehicleActor {
    fn on_fail(&mut self, error: Box<dyn Any + Send>) -> SupervisionStrategy {
        log::error!("vehicle pipeline actor panicked, restarting with fresh state: {error:?}");
        SupervisionStrategy::Restart
    }
}

#[async_trait]
impl Handler<RawRow> for VehicleActor {
    async fn handle(&mut self, message: RawRow) -> PipelineOutput {
        step(&mut self.pipeline, &self.registry, &message)
    }
}

impl Message for RawRow {
    type Response = PipelineOutput;
}

/// Owns one actor per vehicle key, creating it lazily on first sight and
/// routing every subsequent row for that vehicle to the same actor so
/// ordering within a key is preserved end-to-end.
pub struct KeyedWorker {
    registry: Arc<BaliseRegistry>,
    actors: HashMap<VehicleId, ActorRef<VehicleActor>>,
}

impl KeyedWorker {
    pub fn new(registry: BaliseRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            actors: HashMap::new(),
        }
    }

    fn actor_for(&mut self, vehicle: &VehicleId) -> ActorRef<VehicleActor> {
        self.actors
            .entry(vehicle.clone())
            .or_insert_with(|| {
                let registry = self.registry.clone();
                actors::run(move || VehicleActor::new(registry.clone()))
            })
            .clone()
    }

    /// Routes `row` to the pipeline for `vehicle`, awaiting its output.
    pub async fn dispatch(&mut self, vehicle: &VehicleId, row: RawRow) -> PipelineOutput {
        let actor_ref = self.actor_for(vehicle);
        match actor_ref.ask(row).await {
            Ok(output) => output,
            Err(err) => {
                log::error!("pipeline actor for vehicle {vehicle} failed to respond: {err:?}");
                PipelineOutput::default()
            }
        }
    }
}
