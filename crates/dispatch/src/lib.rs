//! Submission dispatcher.
//!
//! Delivers one value per call through an ordered chain of transport tiers
//! (native client, CLI subprocess, REST) and records every attempt in the
//! submission ledger.

#![warn(missing_docs)]

pub mod transport;
pub mod native;
pub mod cli;
pub mod rest;
pub mod nonce;
pub mod wallet;
pub mod dispatcher;

pub use transport::{SubmitRequest, TierResponse, Transport, TransportError};
pub use native::{NativeClient, NativeTransport};
pub use cli::CliTransport;
pub use rest::RestTransport;
pub use nonce::resolve_nonce;
pub use wallet::{AddressResolver, AddressSource, ConfiguredAddress, KeyringAddress, NativeAddress};
pub use dispatcher::Dispatcher;
