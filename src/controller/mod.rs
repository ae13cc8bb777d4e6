//! Controller subsystem for gamepad input handling
//!
//! Two stages:
//!
//! 1. [`event_collector`] - gilrs polling thread producing raw [`InputSample`]s
//! 2. [`normalizer`] - deadband filtering into [`ControlState`] and button
//!    edges into [`ControlEvent`]s
//!
//! ```text
//! Gamepad ──► Collector ──mpsc──► Normalizer ──► ControlState (watch)
//!             (thread)                       └─► ControlEvent
//! ```
//!
//! The core only depends on the sample type; any other source can feed the
//! same channel.
//!
//! [`InputSample`]: event_collector::InputSample
//! [`ControlState`]: normalizer::ControlState
//! [`ControlEvent`]: normalizer::ControlEvent

pub mod event_collector;
pub mod normalizer;
