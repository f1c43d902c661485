//! Serial instrument polling gateway.
//!
//! serialgate continuously polls instruments attached over point-to-point
//! serial links and exposes their latest readings, plus binary actuator
//! commands, over a small plain-text HTTP API. Each device multiplexes
//! analog sensors with formula-based conversion, two-byte fixed-point
//! temperature sensors, and boolean switches.
//!
//! The polling supervisors own all hardware I/O; network reads are served
//! from a per-item value cache and never touch the serial links.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod formula;
pub mod gateway;
pub mod registry;
pub mod server;
pub mod supervisor;
pub mod transport;
