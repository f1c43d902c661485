//! TOML configuration loading and validation.
//!
//! Validation is all-or-nothing: every device and item must carry every
//! required field, ids must be unique within a device and kind, and analog
//! conversion formulas must compile. Any violation aborts startup before a
//! single polling supervisor runs; there is no per-device partial skip.
//!
//! ```toml
//! [poll]
//! error_pause_secs = 4
//!
//! [devices.btd1]
//! devfile = "/dev/ttyUSB0"
//! baud = 9600
//!
//! [[devices.btd1.adcs]]
//! id = "volt1"
//! vref = 5.0
//! cmdget = "a"
//! expr = "adcval * (vref / 256)"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{GatewayError, Result};
use crate::formula::Formula;
use crate::registry::{AnalogItem, Device, Registry, SwitchItem, TemperatureItem};
use crate::supervisor::PollSettings;

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    poll: RawPoll,
    #[serde(default)]
    devices: BTreeMap<String, RawDevice>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPoll {
    read_timeout_secs: Option<u64>,
    error_pause_secs: Option<u64>,
    fault_timeout_secs: Option<u64>,
    max_errors: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    #[serde(default)]
    devfile: String,
    #[serde(default)]
    baud: u32,
    #[serde(default)]
    adcs: Vec<RawAnalog>,
    #[serde(default)]
    tmpts: Vec<RawTemperature>,
    #[serde(default)]
    swts: Vec<RawSwitch>,
}

#[derive(Debug, Deserialize)]
struct RawAnalog {
    #[serde(default)]
    id: String,
    #[serde(default)]
    vref: f64,
    #[serde(default)]
    cmdget: String,
    #[serde(default)]
    expr: String,
}

#[derive(Debug, Deserialize)]
struct RawTemperature {
    #[serde(default)]
    id: String,
    #[serde(default)]
    cmdlsb: String,
    #[serde(default)]
    cmdmsb: String,
}

#[derive(Debug, Deserialize)]
struct RawSwitch {
    #[serde(default)]
    id: String,
    #[serde(default)]
    cmdget: String,
    #[serde(default)]
    cmdset: String,
    #[serde(default)]
    cmdclr: String,
}

/// Load and validate a configuration file.
pub fn load(path: &Path) -> Result<(Registry, PollSettings)> {
    let text = std::fs::read_to_string(path).map_err(|err| {
        GatewayError::Configuration(format!("cannot read '{}': {err}", path.display()))
    })?;
    from_str(&text)
}

/// Parse and validate configuration text.
pub fn from_str(text: &str) -> Result<(Registry, PollSettings)> {
    let raw: RawConfig =
        toml::from_str(text).map_err(|err| GatewayError::Configuration(err.to_string()))?;

    let mut settings = PollSettings::default();
    if let Some(secs) = raw.poll.read_timeout_secs {
        settings.read_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = raw.poll.error_pause_secs {
        settings.error_pause = Duration::from_secs(secs);
    }
    if let Some(secs) = raw.poll.fault_timeout_secs {
        settings.fault_timeout = Duration::from_secs(secs);
    }
    if let Some(max) = raw.poll.max_errors {
        settings.max_errors = max;
    }

    let mut registry = Registry::default();
    for (device_id, raw_device) in raw.devices {
        registry.insert(validate_device(&device_id, raw_device)?);
    }
    if registry.is_empty() {
        return Err(GatewayError::Configuration(
            "no devices configured".to_string(),
        ));
    }
    Ok((registry, settings))
}

fn validate_device(device_id: &str, raw: RawDevice) -> Result<Device> {
    if raw.devfile.is_empty() {
        return Err(missing(device_id, "devfile"));
    }
    if raw.baud == 0 {
        return Err(missing(device_id, "baud rate"));
    }

    let mut ids = HashSet::new();
    let mut analogs = Vec::with_capacity(raw.adcs.len());
    for adc in raw.adcs {
        if adc.id.is_empty() {
            return Err(missing(device_id, "id of adc"));
        }
        if !ids.insert(adc.id.clone()) {
            return Err(duplicate(device_id, "adc", &adc.id));
        }
        if adc.cmdget.is_empty() {
            return Err(missing_item(device_id, "adc", &adc.id, "cmdget"));
        }
        if adc.expr.is_empty() {
            return Err(missing_item(device_id, "adc", &adc.id, "expr"));
        }
        let formula = Formula::parse(&adc.expr).map_err(|err| {
            GatewayError::Configuration(format!(
                "adc '{}' in '{device_id}': {err}",
                adc.id
            ))
        })?;
        analogs.push(AnalogItem {
            id: adc.id,
            cmd_get: adc.cmdget.into_bytes(),
            vref: adc.vref,
            formula,
        });
    }

    let mut ids = HashSet::new();
    let mut temperatures = Vec::with_capacity(raw.tmpts.len());
    for tmpt in raw.tmpts {
        if tmpt.id.is_empty() {
            return Err(missing(device_id, "id of tmpt"));
        }
        if !ids.insert(tmpt.id.clone()) {
            return Err(duplicate(device_id, "tmpt", &tmpt.id));
        }
        if tmpt.cmdlsb.is_empty() {
            return Err(missing_item(device_id, "tmpt", &tmpt.id, "cmdlsb"));
        }
        if tmpt.cmdmsb.is_empty() {
            return Err(missing_item(device_id, "tmpt", &tmpt.id, "cmdmsb"));
        }
        temperatures.push(TemperatureItem {
            id: tmpt.id,
            cmd_lsb: tmpt.cmdlsb.into_bytes(),
            cmd_msb: tmpt.cmdmsb.into_bytes(),
        });
    }

    let mut ids = HashSet::new();
    let mut switches = Vec::with_capacity(raw.swts.len());
    for swt in raw.swts {
        if swt.id.is_empty() {
            return Err(missing(device_id, "id of swt"));
        }
        if !ids.insert(swt.id.clone()) {
            return Err(duplicate(device_id, "swt", &swt.id));
        }
        if swt.cmdget.is_empty() {
            return Err(missing_item(device_id, "swt", &swt.id, "cmdget"));
        }
        if swt.cmdset.is_empty() {
            return Err(missing_item(device_id, "swt", &swt.id, "cmdset"));
        }
        if swt.cmdclr.is_empty() {
            return Err(missing_item(device_id, "swt", &swt.id, "cmdclr"));
        }
        switches.push(SwitchItem {
            id: swt.id,
            cmd_get: swt.cmdget.into_bytes(),
            cmd_set: swt.cmdset.into_bytes(),
            cmd_clr: swt.cmdclr.into_bytes(),
        });
    }

    Ok(Device {
        id: device_id.to_string(),
        path: raw.devfile,
        baud: raw.baud,
        analogs,
        temperatures,
        switches,
    })
}

fn missing(device_id: &str, what: &str) -> GatewayError {
    GatewayError::Configuration(format!("{what} of device '{device_id}' is not defined"))
}

fn missing_item(device_id: &str, kind: &str, item_id: &str, field: &str) -> GatewayError {
    GatewayError::Configuration(format!(
        "{field} of {kind} '{item_id}' in '{device_id}' is not defined"
    ))
}

fn duplicate(device_id: &str, kind: &str, item_id: &str) -> GatewayError {
    GatewayError::Configuration(format!(
        "duplicate {kind} id '{item_id}' in '{device_id}'"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        [poll]
        error_pause_secs = 1
        max_errors = 5

        [devices.btd1]
        devfile = "/dev/ttyUSB0"
        baud = 9600

        [[devices.btd1.adcs]]
        id = "volt1"
        vref = 5.0
        cmdget = "a"
        expr = "adcval * (vref / 256)"

        [[devices.btd1.tmpts]]
        id = "temp1"
        cmdlsb = "l"
        cmdmsb = "m"

        [[devices.btd1.swts]]
        id = "relay1"
        cmdget = "g"
        cmdset = "s"
        cmdclr = "c"

        [devices.btd2]
        devfile = "/dev/ttyUSB1"
        baud = 115200

        [[devices.btd2.swts]]
        id = "relay1"
        cmdget = "g"
        cmdset = "s"
        cmdclr = "c"
    "#;

    #[test]
    fn parses_valid_config() {
        let (registry, settings) = from_str(VALID).unwrap();
        let device = registry.device("btd1").unwrap();
        assert_eq!(device.baud, 9600);
        assert_eq!(device.item_count(), 3);
        assert_eq!(device.analogs[0].cmd_get, b"a");
        assert!(registry.device("btd2").is_some());
        assert_eq!(settings.error_pause, Duration::from_secs(1));
        assert_eq!(settings.max_errors, 5);
        // Untouched fields keep their defaults.
        assert_eq!(settings.fault_timeout, Duration::from_secs(30));
    }

    #[test]
    fn rejects_missing_baud() {
        let text = r#"
            [devices.btd1]
            devfile = "/dev/ttyUSB0"
        "#;
        let err = from_str(text).unwrap_err();
        assert!(err.to_string().contains("baud rate"));
    }

    #[test]
    fn rejects_switch_without_clear_command() {
        let text = r#"
            [devices.btd1]
            devfile = "/dev/ttyUSB0"
            baud = 9600

            [[devices.btd1.swts]]
            id = "relay1"
            cmdget = "g"
            cmdset = "s"
        "#;
        let err = from_str(text).unwrap_err();
        assert!(err.to_string().contains("cmdclr"));
    }

    #[test]
    fn rejects_malformed_formula_at_load_time() {
        let text = r#"
            [devices.btd1]
            devfile = "/dev/ttyUSB0"
            baud = 9600

            [[devices.btd1.adcs]]
            id = "volt1"
            vref = 5.0
            cmdget = "a"
            expr = "adcval * ("
        "#;
        assert!(from_str(text).is_err());
    }

    #[test]
    fn rejects_duplicate_item_ids() {
        let text = r#"
            [devices.btd1]
            devfile = "/dev/ttyUSB0"
            baud = 9600

            [[devices.btd1.tmpts]]
            id = "temp1"
            cmdlsb = "l"
            cmdmsb = "m"

            [[devices.btd1.tmpts]]
            id = "temp1"
            cmdlsb = "x"
            cmdmsb = "y"
        "#;
        let err = from_str(text).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_empty_config() {
        assert!(from_str("").is_err());
    }
}
