//! Prometheus metrics for the DummySite controller
//!
//! Exposes reconciliation counters plus the health endpoints on one port.

pub mod prometheus;

pub use self::prometheus::*;
