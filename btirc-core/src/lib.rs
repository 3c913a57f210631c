//! Bluetooth IRC-style chat core.
//! Transport-agnostic: backends implement the `transport` traits; the core drives discovery
//! rounds and chat sessions over them and writes everything to a shared transcript.

pub mod codec;
pub mod config;
pub mod discovery;
pub mod identity;
pub mod inbound;
pub mod session;
pub mod transcript;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use discovery::{
    DiscoveryCoordinator, DiscoveryError, DiscoveryEvent, DiscoverySink, DiscoveryState,
    DiscoverySummary,
};
pub use identity::{resolve, Identity};
pub use inbound::{run_inbound, spawn_inbound, InboundExit, InboundStats};
pub use session::{open_connection, SessionEnd, SessionError};
pub use transcript::{Channel, Transcript};
pub use transport::{
    Connector, Device, DeviceClass, DiscoveryAgent, InquiryScope, StreamConnection, StreamHalves,
    TransportError,
};
