//! Session statistics for device telemetry

pub mod metrics;

pub use metrics::{SessionStats, SharedStats};
