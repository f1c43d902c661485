//! Error types for the gateway.
//!
//! `GatewayError` is the single error type used across the library. Per-item
//! exchange failures are folded into the polling supervisor's consecutive
//! failure counter and never terminate the process; the only fatal variant is
//! `Configuration`, which aborts startup before any supervisor runs.

use std::time::Duration;

use thiserror::Error;

/// Convenience alias for results using the gateway error type.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Failed to open serial port '{path}': {source}")]
    Connection {
        path: String,
        source: tokio_serial::Error,
    },

    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial read timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serial port not open")]
    NotConnected,

    #[error("Switch '{item}' returned {value:#04x}, expected 0 or 1")]
    Protocol { item: String, value: u8 },

    #[error("Switch '{item}' did not acknowledge the command")]
    Ack { item: String },

    #[error("Conversion formula error: {0}")]
    Expression(#[from] evalexpr::EvalexprError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GatewayError::Protocol {
            item: "relay1".to_string(),
            value: 0x42,
        };
        assert_eq!(
            err.to_string(),
            "Switch 'relay1' returned 0x42, expected 0 or 1"
        );
    }

    #[test]
    fn test_ack_error_display() {
        let err = GatewayError::Ack {
            item: "relay1".to_string(),
        };
        assert!(err.to_string().contains("did not acknowledge"));
    }
}
