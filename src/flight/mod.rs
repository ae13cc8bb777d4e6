//! Vehicle-facing control components
//!
//! - [`mode`] - flight and recording state machine driven by button edges
//! - [`command_synthesizer`] - fixed-rate motion frames from the control state
//! - [`camera`] - edge-triggered camera orientation

pub mod camera;
pub mod command_synthesizer;
pub mod mode;
