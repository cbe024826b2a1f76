use std::collections::BTreeSet;
use std::sync::Mutex;

use log::info;

use crate::modules::models::record::LapRecord;

/// # Append only set of event names
/// every record belongs to exactly one event. names are never removed,
/// an event whose records were all deleted keeps existing so its
/// history can be extended later.
pub struct EventRegistry {
    names: Mutex<BTreeSet<String>>,
}

impl Default for EventRegistry {
    fn default() -> Self {
        EventRegistry::new()
    }
}

impl EventRegistry {
    pub fn new() -> EventRegistry {
        EventRegistry {
            names: Mutex::new(BTreeSet::new()),
        }
    }

    /// # Seed the registry from an existing snapshot
    /// every event referenced by a stored record is a known event.
    pub fn seed_from_records(&self, records: &[LapRecord]) {
        let mut names = self.names.lock().unwrap();
        for record in records {
            names.insert(record.event.clone());
        }
    }

    /// # Register a new event name
    ///
    /// ## Returns
    /// * `bool` - false if the name was already registered
    pub fn register(&self, name: &str) -> bool {
        let added = self.names.lock().unwrap().insert(name.to_string());
        if added {
            info!(target: "models/event:register", "registered event: {}", name);
        }
        added
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.lock().unwrap().contains(name)
    }

    /// all registered names, sorted.
    pub fn all(&self) -> Vec<String> {
        self.names.lock().unwrap().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::models::record::parse_timestamp;

    fn record(event: &str) -> LapRecord {
        LapRecord {
            driver: "Mika".to_string(),
            event: event.to_string(),
            minutes: 1,
            seconds: 23,
            milliseconds: 456,
            captured_at: parse_timestamp("2024-05-01 18:30:00").unwrap(),
        }
    }

    #[test]
    fn register_is_append_only_and_deduplicated() {
        let registry = EventRegistry::new();
        assert!(registry.register("GP Berlin"));
        assert!(!registry.register("GP Berlin"));
        assert!(registry.contains("GP Berlin"));
        assert_eq!(registry.all(), vec!["GP Berlin".to_string()]);
    }

    #[test]
    fn seeding_picks_up_every_referenced_event() {
        let registry = EventRegistry::new();
        registry.seed_from_records(&[record("Clubabend"), record("GP Berlin"), record("Clubabend")]);
        assert_eq!(
            registry.all(),
            vec!["Clubabend".to_string(), "GP Berlin".to_string()]
        );
    }
}
