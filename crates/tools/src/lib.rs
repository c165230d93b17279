//! Chain client integration.
//!
//! Runs the chain client binary as a subprocess and exposes the read-only
//! query surface the gate and dispatcher depend on.

#![warn(missing_docs)]

pub mod r#trait;
pub mod builtin;
pub mod chain;

pub use r#trait::{Tool, ToolError, ToolInput, ToolOutput};
pub use builtin::CommandTool;
pub use chain::{ChainQuery, CliChainQuery, Coin, NonceProbe, QueryError, keyring_address};
