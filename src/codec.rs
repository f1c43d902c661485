//! Per-item protocol codecs.
//!
//! Each codec runs one complete exchange (or two, for temperature) against a
//! transport that the caller has already locked through the device's
//! [`Session`](crate::transport::Session), and returns a decoded value or a
//! typed failure. Codecs never touch the value cache.

use crate::error::{GatewayError, Result};
use crate::registry::{AnalogItem, SwitchItem, TemperatureItem};
use crate::transport::Transport;

/// Acknowledgement byte expected after a switch set/clear command.
pub const ACK: u8 = b'K';

/// Read one analog level and run it through the item's conversion formula.
pub async fn read_analog(transport: &mut dyn Transport, item: &AnalogItem) -> Result<f64> {
    let raw = transport.exchange(&item.cmd_get).await?;
    item.formula.eval(raw, item.vref)
}

/// Fetch LSB then MSB in two sequential exchanges and decode. The caller's
/// session guard keeps anything else from interleaving between the two.
pub async fn read_temperature(transport: &mut dyn Transport, item: &TemperatureItem) -> Result<f64> {
    let lsb = transport.exchange(&item.cmd_lsb).await?;
    let msb = transport.exchange(&item.cmd_msb).await?;
    Ok(convert_temp(msb, lsb))
}

/// Decode a ds18b20-style two-byte fixed-point temperature.
pub fn convert_temp(msb: u8, lsb: u8) -> f64 {
    let sign = msb >> 7;
    let fraction = f64::from(lsb & 0x0F) * 0.0625;
    let magnitude = ((msb << 4) & 0x7F) | (lsb >> 4);
    let temp = f64::from(magnitude) + fraction;
    if sign == 1 {
        -(128.0 - temp)
    } else {
        temp
    }
}

/// Read a switch state. Any response byte other than 0 or 1 is a protocol
/// violation and leaves the cached value untouched.
pub async fn read_switch(transport: &mut dyn Transport, item: &SwitchItem) -> Result<bool> {
    let raw = transport.exchange(&item.cmd_get).await?;
    match raw {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(GatewayError::Protocol {
            item: item.id.clone(),
            value,
        }),
    }
}

/// Assert (`true`) or clear (`false`) a switch. A successful write does not
/// update the value cache; the new state is observed on the next poll.
pub async fn write_switch(
    transport: &mut dyn Transport,
    item: &SwitchItem,
    state: bool,
) -> Result<()> {
    let cmd = if state { &item.cmd_set } else { &item.cmd_clr };
    let ack = transport.exchange(cmd).await?;
    if ack != ACK {
        return Err(GatewayError::Ack {
            item: item.id.clone(),
        });
    }
    Ok(())
}
