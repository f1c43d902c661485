//! Immutable device registry.
//!
//! The registry is built once by the configuration loader and never mutated
//! afterwards. Each device describes one serial-linked instrument and its
//! ordered item lists; items reach their device's transport through an
//! explicit [`DeviceLink`](crate::transport::DeviceLink) handle rather than a
//! back-reference.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::formula::Formula;

/// One serial-linked instrument and its addressable items.
///
/// Item order within each list is configuration order; the polling
/// supervisor visits analogs, then temperatures, then switches.
#[derive(Debug)]
pub struct Device {
    pub id: String,
    /// Serial port path, e.g. `/dev/ttyUSB0`.
    pub path: String,
    pub baud: u32,
    pub analogs: Vec<AnalogItem>,
    pub temperatures: Vec<TemperatureItem>,
    pub switches: Vec<SwitchItem>,
}

impl Device {
    pub fn item_count(&self) -> usize {
        self.analogs.len() + self.temperatures.len() + self.switches.len()
    }

    pub fn analog(&self, id: &str) -> Option<&AnalogItem> {
        self.analogs.iter().find(|item| item.id == id)
    }

    pub fn temperature(&self, id: &str) -> Option<&TemperatureItem> {
        self.temperatures.iter().find(|item| item.id == id)
    }

    pub fn switch(&self, id: &str) -> Option<&SwitchItem> {
        self.switches.iter().find(|item| item.id == id)
    }
}

/// Analog sensor: one command byte-string, a reference voltage and a
/// compiled conversion formula.
#[derive(Debug)]
pub struct AnalogItem {
    pub id: String,
    pub cmd_get: Vec<u8>,
    pub vref: f64,
    pub formula: Formula,
}

/// Two-byte fixed-point temperature sensor (ds18b20-style).
#[derive(Debug)]
pub struct TemperatureItem {
    pub id: String,
    pub cmd_lsb: Vec<u8>,
    pub cmd_msb: Vec<u8>,
}

/// Boolean switch with get/set/clear commands.
#[derive(Debug)]
pub struct SwitchItem {
    pub id: String,
    pub cmd_get: Vec<u8>,
    pub cmd_set: Vec<u8>,
    pub cmd_clr: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Analog,
    Temperature,
    Switch,
}

impl ItemKind {
    /// Map a URL path segment (`adcs`, `tmpts`, `swts`) to an item kind.
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "adcs" => Some(Self::Analog),
            "tmpts" => Some(Self::Temperature),
            "swts" => Some(Self::Switch),
            _ => None,
        }
    }
}

/// Unique lookup key for one item: (device id, kind, item id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub device: String,
    pub kind: ItemKind,
    pub item: String,
}

impl ItemKey {
    pub fn new(device: &str, kind: ItemKind, item: &str) -> Self {
        Self {
            device: device.to_string(),
            kind,
            item: item.to_string(),
        }
    }
}

/// All configured devices, keyed by device id.
#[derive(Debug, Default)]
pub struct Registry {
    devices: BTreeMap<String, Arc<Device>>,
}

impl Registry {
    pub fn insert(&mut self, device: Device) {
        self.devices.insert(device.id.clone(), Arc::new(device));
    }

    pub fn device(&self, id: &str) -> Option<&Arc<Device>> {
        self.devices.get(id)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.values()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
