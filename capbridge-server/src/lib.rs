//! Capability servers backed by host-runtime objects.
//!
//! A host object becomes a capability through [`new_client`],
//! [`new_server`] or [`server_to_client`]; calls are routed to it by method
//! name and answered with promises the RPC scheduler awaits.

pub mod cap_table;
pub mod client;
pub mod config;
pub mod logging;
pub mod server;

pub use cap_table::{CapTable, CapTableError, CapTableStats};
pub use client::{new_client, new_server, server_to_client, Capability, CapabilityClient, DynamicValue};
pub use config::BridgeConfig;
pub use logging::{init_logging, init_test_logging};
pub use server::{AdapterState, CapabilityServer, HostCapabilityServer};
