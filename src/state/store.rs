//! ParameterStore - last known value of every console parameter
//!
//! Entries are created on first observation or first write and never removed.
//! A path that has never been seen reads as `None` ("unknown"), which is what
//! turns a fade request into an immediate write.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use super::types::ParameterPath;

/// Path-keyed 7-bit values, owned by the console actor
#[derive(Debug, Default, Clone)]
pub struct ParameterStore {
    values: HashMap<ParameterPath, u8>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known value, `None` if the path was never observed or set
    pub fn get(&self, path: &ParameterPath) -> Option<u8> {
        self.values.get(path).copied()
    }

    /// Record a value (masked to 7 bits) and return whether it changed
    pub fn set(&mut self, path: ParameterPath, value: u8) -> bool {
        let value = value & 0x7F;
        let previous = self.values.insert(path, value);
        if previous != Some(value) {
            trace!(%path, ?previous, value, "Parameter updated");
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sorted copy keyed by the path string, for display and JSON dumps
    pub fn snapshot(&self) -> BTreeMap<String, u8> {
        self.values
            .iter()
            .map(|(path, value)| (path.to_string(), *value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_until_set() {
        let mut store = ParameterStore::new();
        let path = ParameterPath::fader(0, 1);

        assert_eq!(store.get(&path), None);
        assert!(store.set(path, 90));
        assert_eq!(store.get(&path), Some(90));
    }

    #[test]
    fn test_set_reports_change() {
        let mut store = ParameterStore::new();
        let path = ParameterPath::mute(1, 2);

        assert!(store.set(path, 127));
        assert!(!store.set(path, 127));
        assert!(store.set(path, 0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_value_is_masked() {
        let mut store = ParameterStore::new();
        let path = ParameterPath::fader(0, 0);
        store.set(path, 0xFF);
        assert_eq!(store.get(&path), Some(0x7F));
    }

    #[test]
    fn test_snapshot_is_sorted_by_key() {
        let mut store = ParameterStore::new();
        store.set(ParameterPath::fader(1, 0), 10);
        store.set(ParameterPath::fader(0, 3), 20);

        let keys: Vec<String> = store.snapshot().into_keys().collect();
        assert_eq!(keys, vec!["0/3/faderLevel", "1/0/faderLevel"]);
    }
}
