//! Vehicle telemetry towards observers
//!
//! ```text
//! TelemetrySource ──► Aggregator ──► MovementSnapshot (watch) ──► Broadcaster ──┐
//!                        │                                      (tick B)       ▼
//!                        └── phase / battery, immediately ──────────────► ObserverHub
//! ```

pub mod aggregator;
pub mod broadcaster;
pub mod observers;
