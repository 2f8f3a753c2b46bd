use serde::Deserialize;

/// One row of the static balise registry CSV, plus synthesized
/// opposite-direction rows. Key used for lookup is `"<balise>_<direction>"`.
#[derive(Debug, Clone, Deserialize)]
pub struct BaliseRegistryEntry {
    pub balise: u32,
    pub direction: u8,
    pub station: String,
    pub track: String,
    #[serde(rename = "type")]
    pub event_kind: StationEventKind,
    pub train_direction: String,
}

impl BaliseRegistryEntry {
    pub fn registry_key(balise: u32, direction: u8) -> String {
        format!("{balise}_{direction}")
    }

    /// The opposite-direction entry synthesized when the registry CSV does
    /// not list it explicitly: direction, event kind and train direction all
    /// flip, and the synthesized train direction is marked with a `_g` suffix
    /// so it can be told apart from a registry-authored value.
    pub fn synthesize_opposite(&self) -> Self {
        Self {
            balise: self.balise,
            direction: flip_direction(self.direction),
            station: self.station.clone(),
            track: self.track.clone(),
            event_kind: self.event_kind.flipped(),
            train_direction: format!("{}_g", flip_train_direction(&self.train_direction)),
        }
    }
}

fn flip_direction(direction: u8) -> u8 {
    match direction {
        1 => 2,
        2 => 1,
        other => other,
    }
}

fn flip_train_direction(train_direction: &str) -> String {
    match train_direction {
        "1" => "2".to_string(),
        "2" => "1".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StationEventKind {
    Arrival,
    Departure,
}

impl StationEventKind {
    pub fn flipped(self) -> Self {
        match self {
            StationEventKind::Arrival => StationEventKind::Departure,
            StationEventKind::Departure => StationEventKind::Arrival,
        }
    }

    pub fn as_event_str(self) -> &'static str {
        match self {
            StationEventKind::Arrival => "arrival",
            StationEventKind::Departure => "departure",
        }
    }

    pub fn as_debug_event_str(self) -> &'static str {
        match self {
            StationEventKind::Arrival => "arrival_debug",
            StationEventKind::Departure => "departure_debug",
        }
    }
}
