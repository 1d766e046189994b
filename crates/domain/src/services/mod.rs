//! Shared service helpers: telemetry wiring.

pub mod telemetry;

pub use telemetry::*;
