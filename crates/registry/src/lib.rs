use std::{collections::HashMap, fmt, path::Path};

use model::balise::BaliseRegistryEntry;

#[derive(Debug)]
pub enum RegistryError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Io(err) => write!(f, "failed to read balise registry file: {err}"),
            RegistryError::Csv(err) => write!(f, "failed to parse balise registry csv: {err}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Io(err)
    }
}

impl From<csv::Error> for RegistryError {
    fn from(err: csv::Error) -> Self {
        RegistryError::Csv(err)
    }
}

/// The static mapping from `(balise, direction)` to the station it sits at,
/// loaded once at boot and shared read-only across all per-vehicle workers.
pub struct BaliseRegistry {
    entries: HashMap<String, BaliseRegistryEntry>,
}

impl BaliseRegistry {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let entry: BaliseRegistryEntry = record?;
            rows.push(entry);
        }
        Ok(Self::from_entries(rows))
    }

    /// Builds the registry from already-parsed rows, synthesizing the
    /// opposite-direction entry for any balise that only has one direction
    /// listed. Synthesis happens once here, not on the lookup hot path, and
    /// an entry that is already present in `rows` always wins over a
    /// synthesized one.
    pub fn from_entries(rows: Vec<BaliseRegistryEntry>) -> Self {
        let mut entries: HashMap<String, BaliseRegistryEntry> = HashMap::new();
        for entry in &rows {
            let key = BaliseRegistryEntry::registry_key(entry.balise, entry.direction);
            entries.insert(key, entry.clone());
        }
        for entry in &rows {
            let opposite = entry.synthesize_opposite();
            let key = BaliseRegistryEntry::registry_key(opposite.balise, opposite.direction);
            entries.entry(key).or_insert(opposite);
        }
        Self { entries }
    }

    pub fn lookup(&self, balise: u32, direction: u8) -> Option<&BaliseRegistryEntry> {
        let key = BaliseRegistryEntry::registry_key(balise, direction);
        self.entries.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_rows() -> Vec<BaliseRegistryEntry> {
        let csv_data = "balise,direction,station,track,type,train_direction\n\
                         1001,1,Pasila,11,ARRIVAL,1\n";
        let mut reader = csv::Reader::from_reader(csv_data.as_bytes());
        reader
            .deserialize()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn synthesizes_opposite_direction() {
        let registry = BaliseRegistry::from_entries(csv_rows());
        assert_eq!(registry.len(), 2);

        let original = registry.lookup(1001, 1).unwrap();
        assert_eq!(original.station, "Pasila");
        assert_eq!(original.train_direction, "1");

        let synthesized = registry.lookup(1001, 2).unwrap();
        assert_eq!(synthesized.station, "Pasila");
        assert_eq!(synthesized.train_direction, "2_g");
    }

    #[test]
    fn existing_entry_wins_over_synthesis() {
        let csv_data = "balise,direction,station,track,type,train_direction\n\
                         1001,1,Pasila,11,ARRIVAL,1\n\
                         1001,2,Pasila,11,DEPARTURE,2\n";
        let mut reader = csv::Reader::from_reader(csv_data.as_bytes());
        let rows: Vec<BaliseRegistryEntry> =
            reader.deserialize().collect::<Result<Vec<_>, _>>().unwrap();
        let registry = BaliseRegistry::from_entries(rows);

        let explicit = registry.lookup(1001, 2).unwrap();
        assert_eq!(explicit.train_direction, "2");
    }
}
