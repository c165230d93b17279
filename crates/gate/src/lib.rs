//! Submission window gate.
//!
//! Decides whether a submission attempt is currently legal for a
//! topic/worker pair by probing chain state.

#![warn(missing_docs)]

pub mod gate;

pub use gate::WindowGate;
pub use epochgate_core::EligibilityStatus;
