use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod balise;
pub mod eke_msg;
pub mod event;
pub mod station_event;

/// Vehicle id, taken from the fourth segment of the source mqtt topic.
/// Plain strings are used rather than a generic id wrapper because there is
/// exactly one kind of key in this domain and nothing to merge across origins.
pub type VehicleId = String;

/// Opaque identifier handed back by a source adapter together with a row; it
/// is carried through the pipeline untouched and used to acknowledge the
/// row(s) that contributed to an emitted record once it has been persisted.
pub type SourceRef = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TstSource {
    Eke,
}

impl std::fmt::Display for TstSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TstSource::Eke => write!(f, "eke"),
        }
    }
}
