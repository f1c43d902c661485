//! Gateway assembly: registry, value cache and one device link plus
//! polling supervisor per configured device.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cache::ValueCache;
use crate::registry::Registry;
use crate::supervisor::{self, PollSettings};
use crate::transport::{DeviceLink, SerialOpener};

pub struct Gateway {
    registry: Registry,
    cache: Arc<ValueCache>,
    links: HashMap<String, Arc<DeviceLink>>,
    settings: PollSettings,
}

impl Gateway {
    pub fn new(registry: Registry, settings: PollSettings) -> Self {
        let cache = Arc::new(ValueCache::for_registry(&registry));
        let links = registry
            .devices()
            .map(|device| {
                let opener = SerialOpener::new(&device.path, device.baud, settings.read_timeout);
                let link = DeviceLink::new(&device.id, Box::new(opener));
                (device.id.clone(), Arc::new(link))
            })
            .collect();
        Self {
            registry,
            cache,
            links,
            settings,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cache(&self) -> &ValueCache {
        &self.cache
    }

    pub fn link(&self, device_id: &str) -> Option<&Arc<DeviceLink>> {
        self.links.get(device_id)
    }

    /// Start one polling supervisor task per device. All tasks stop when
    /// `shutdown` flips to `true`.
    pub fn spawn_supervisors(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for device in self.registry.devices() {
            if let Some(link) = self.links.get(&device.id) {
                handles.push(tokio::spawn(supervisor::run(
                    Arc::clone(device),
                    Arc::clone(link),
                    Arc::clone(&self.cache),
                    self.settings.clone(),
                    shutdown.clone(),
                )));
            }
        }
        handles
    }
}
