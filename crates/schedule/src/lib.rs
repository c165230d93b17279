//! Competition schedule.
//!
//! Converts wall-clock time into aligned train/validation/test windows and an
//! inference timestamp. Pure functions of configuration and time; no I/O.

#![warn(missing_docs)]

pub mod cadence;
pub mod engine;

pub use cadence::parse_duration;
pub use engine::{align, windows, ScheduleConfig, WindowSet};
