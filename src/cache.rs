//! Per-item cache of the last successfully decoded readings.
//!
//! One independently locked cell per item so that network readers never
//! block on hardware I/O, and a slow reader of one item never stalls
//! readers or writers of another. Cells start empty and are only ever
//! written by the owning device's polling supervisor.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::registry::{ItemKey, ItemKind, Registry};

/// Last observed value of one item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemValue {
    Analog(f64),
    Temperature(f64),
    Switch(bool),
}

pub struct ValueCache {
    cells: HashMap<ItemKey, RwLock<Option<ItemValue>>>,
}

impl ValueCache {
    /// Build one empty cell per registered item.
    pub fn for_registry(registry: &Registry) -> Self {
        let mut cells = HashMap::new();
        for device in registry.devices() {
            for item in &device.analogs {
                cells.insert(
                    ItemKey::new(&device.id, ItemKind::Analog, &item.id),
                    RwLock::new(None),
                );
            }
            for item in &device.temperatures {
                cells.insert(
                    ItemKey::new(&device.id, ItemKind::Temperature, &item.id),
                    RwLock::new(None),
                );
            }
            for item in &device.switches {
                cells.insert(
                    ItemKey::new(&device.id, ItemKind::Switch, &item.id),
                    RwLock::new(None),
                );
            }
        }
        Self { cells }
    }

    /// Last cached value, or `None` for an unknown key or an item that has
    /// not been successfully polled yet. Performs no I/O and never blocks on
    /// another item's cell.
    pub fn get(&self, key: &ItemKey) -> Option<ItemValue> {
        let cell = self.cells.get(key)?;
        *cell.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a freshly decoded value. Called only by the item's owning
    /// polling supervisor.
    pub fn set(&self, key: &ItemKey, value: ItemValue) {
        if let Some(cell) = self.cells.get(key) {
            *cell.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Device, Registry, SwitchItem};

    fn registry_with_switch() -> Registry {
        let mut registry = Registry::default();
        registry.insert(Device {
            id: "btd1".to_string(),
            path: "/dev/null".to_string(),
            baud: 9600,
            analogs: Vec::new(),
            temperatures: Vec::new(),
            switches: vec![SwitchItem {
                id: "relay1".to_string(),
                cmd_get: b"g".to_vec(),
                cmd_set: b"s".to_vec(),
                cmd_clr: b"c".to_vec(),
            }],
        });
        registry
    }

    #[test]
    fn starts_unknown_then_holds_last_value() {
        let cache = ValueCache::for_registry(&registry_with_switch());
        let key = ItemKey::new("btd1", ItemKind::Switch, "relay1");
        assert_eq!(cache.get(&key), None);

        cache.set(&key, ItemValue::Switch(true));
        assert_eq!(cache.get(&key), Some(ItemValue::Switch(true)));

        cache.set(&key, ItemValue::Switch(false));
        assert_eq!(cache.get(&key), Some(ItemValue::Switch(false)));
    }

    #[test]
    fn unknown_key_reads_none_and_ignores_writes() {
        let cache = ValueCache::for_registry(&registry_with_switch());
        let key = ItemKey::new("btd1", ItemKind::Analog, "adc1");
        cache.set(&key, ItemValue::Analog(1.0));
        assert_eq!(cache.get(&key), None);
    }
}
