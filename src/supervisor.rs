//! Per-device polling supervisor.
//!
//! One long-running task per device: it opens the transport, walks every
//! item in a fixed order (analogs, temperatures, switches, configuration
//! order within each group), writes successful readings into the value
//! cache and tracks consecutive exchange failures. Sustained failure drives
//! a close/pause/reopen cycle; a failed reopen is logged only, so a dead
//! link keeps retrying forever. Devices are fully isolated from each other.
//!
//! External switch-set requests enter through [`set_switch`], which takes
//! the same device-scoped exchange mutex as the poll loop.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::watch;
use tokio::time::sleep;

use crate::cache::{ItemValue, ValueCache};
use crate::codec;
use crate::error::Result;
use crate::registry::{Device, ItemKey, ItemKind, SwitchItem};
use crate::transport::DeviceLink;

/// Supervisor tunables. Defaults match the deployed gateway: 5 s read
/// timeout, 4 s pause after a failed exchange, 30 s fault pause after more
/// than 3 consecutive failures.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub read_timeout: Duration,
    pub error_pause: Duration,
    pub fault_timeout: Duration,
    pub max_errors: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            error_pause: Duration::from_secs(4),
            fault_timeout: Duration::from_secs(30),
            max_errors: 3,
        }
    }
}

/// Drive a switch set/clear through the device's exclusive exchange scope,
/// serializing with that device's poll loop. The cached value is not
/// updated here; the new state is observed on the next poll cycle.
pub async fn set_switch(link: &DeviceLink, item: &SwitchItem, state: bool) -> Result<()> {
    let mut session = link.session().await;
    codec::write_switch(session.transport()?, item, state).await
}

/// Run one device's polling loop until the shutdown signal fires.
pub async fn run(
    device: Arc<Device>,
    link: Arc<DeviceLink>,
    cache: Arc<ValueCache>,
    settings: PollSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("[{}] polling task started", device.id);

    if let Err(err) = link.open().await {
        warn!("[{}] {err}", device.id);
    }

    if device.item_count() == 0 {
        warn!("[{}] no items configured; polling task parked", device.id);
        let _ = shutdown.changed().await;
        link.close().await;
        return;
    }

    let mut errors: u32 = 0;
    while !*shutdown.borrow() {
        if !poll_cycle(&device, &link, &cache, &settings, &mut errors, &mut shutdown).await {
            break;
        }
        if errors > settings.max_errors {
            link.close().await;
            info!(
                "[{}] {errors} consecutive errors; pausing for {:?}",
                device.id, settings.fault_timeout
            );
            if pause(settings.fault_timeout, &mut shutdown).await {
                break;
            }
            match link.open().await {
                Ok(()) => info!("[{}] port {} reopened", device.id, device.path),
                Err(err) => warn!("[{}] {err}", device.id),
            }
            // The counter resets even when the reopen failed: the next
            // cycle's failures re-trigger this path, retrying the link
            // indefinitely.
            errors = 0;
        }
    }

    link.close().await;
    info!("[{}] polling task stopped", device.id);
}

/// One full pass over the device's items. Returns `false` once shutdown has
/// been requested.
async fn poll_cycle(
    device: &Device,
    link: &DeviceLink,
    cache: &ValueCache,
    settings: &PollSettings,
    errors: &mut u32,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    for item in &device.analogs {
        if *shutdown.borrow() {
            return false;
        }
        let outcome = {
            let mut session = link.session().await;
            match session.transport() {
                Ok(transport) => codec::read_analog(transport, item).await,
                Err(err) => Err(err),
            }
        };
        let key = ItemKey::new(&device.id, ItemKind::Analog, &item.id);
        let outcome = outcome.map(ItemValue::Analog);
        if !observe(device, key, outcome, cache, settings, errors, shutdown).await {
            return false;
        }
    }

    for item in &device.temperatures {
        if *shutdown.borrow() {
            return false;
        }
        let outcome = {
            // The session guard spans both exchanges of the fetch.
            let mut session = link.session().await;
            match session.transport() {
                Ok(transport) => codec::read_temperature(transport, item).await,
                Err(err) => Err(err),
            }
        };
        let key = ItemKey::new(&device.id, ItemKind::Temperature, &item.id);
        let outcome = outcome.map(ItemValue::Temperature);
        if !observe(device, key, outcome, cache, settings, errors, shutdown).await {
            return false;
        }
    }

    for item in &device.switches {
        if *shutdown.borrow() {
            return false;
        }
        let outcome = {
            let mut session = link.session().await;
            match session.transport() {
                Ok(transport) => codec::read_switch(transport, item).await,
                Err(err) => Err(err),
            }
        };
        let key = ItemKey::new(&device.id, ItemKind::Switch, &item.id);
        let outcome = outcome.map(ItemValue::Switch);
        if !observe(device, key, outcome, cache, settings, errors, shutdown).await {
            return false;
        }
    }

    true
}

/// Fold one exchange outcome into the cache and the consecutive-failure
/// counter. A failure pauses the whole loop for `error_pause`, uniformly
/// throttling retries rather than isolating the one bad item. Returns
/// `false` once shutdown has been requested.
async fn observe(
    device: &Device,
    key: ItemKey,
    outcome: Result<ItemValue>,
    cache: &ValueCache,
    settings: &PollSettings,
    errors: &mut u32,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    match outcome {
        Ok(value) => {
            *errors = 0;
            cache.set(&key, value);
            true
        }
        Err(err) => {
            warn!("[{}] {}: {err}", device.id, key.item);
            *errors += 1;
            !pause(settings.error_pause, shutdown).await
        }
    }
}

/// Sleep for `duration`, returning `true` if shutdown fired first.
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = sleep(duration) => false,
        _ = shutdown.changed() => true,
    }
}
