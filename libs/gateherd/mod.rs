//! # Gateherd
//!
//! Supervised WebSocket connection orchestration for message-broker
//! gateways.
//!
//! ## Features
//!
//! - **Declarative config**: one serde tree describes host, transport
//!   options and every producer/consumer/reader connection
//! - **Deterministic descriptors**: gateway URLs and socket options are
//!   pure functions of the config, byte-identical across restarts
//! - **Rest-for-one supervision**: a crashed connection takes down and
//!   restarts everything started after it, nothing before it
//! - **Per-instance registry**: stable logical names resolve to live
//!   connection handles, re-bound automatically across restarts
//! - **Built-in keepalive**: fixed 30 s pings plus the ping/pong reflex on
//!   every connection, no per-role wiring
//!
//! ## Example
//!
//! ```rust,ignore
//! use gateherd::{ClientConfig, Fanout, Frame, RoleArgs};
//!
//! let config: ClientConfig = serde_yaml::from_str(yaml)?;
//! let client = gateherd::Client::start(config).await?;
//!
//! client.send_to("producer-0", Frame::Text("hello".into()))?;
//! client.shutdown().await?;
//! ```

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod keepalive;
pub mod registry;
pub mod supervisor;
pub mod traits;
pub mod transport;

// Re-export all traits
pub use traits::*;

// Re-export configuration and descriptor types
pub use config::{
    ClientConfig, Fanout, HostConfig, Persistence, Protocol, RoleArgs, TransportConfig,
    DEFAULT_INSTANCE,
};
pub use endpoint::{ConnectionSettings, EndpointConfig, Role, TransportOptions};

// Re-export the keepalive policy
pub use keepalive::{Keepalive, Reflex, PING_INTERVAL};

// Re-export the registry surface
pub use registry::{ChildName, ConnectionHandle, ProcessId, Registration, Registry};

// Re-export the orchestrator
pub use supervisor::{
    plan, ChildKind, ChildSpec, Client, ClientBuilder, ClientEvent, ConnectionSpec, ExitReason,
    InstanceState, SupervisionPlan, REGISTRY_CHILD,
};

// Re-export the default transport
pub use transport::TungsteniteTransport;

/// Start building a client instance from a config
pub fn builder(config: ClientConfig) -> ClientBuilder {
    ClientBuilder::new(config)
}

/// Type alias for Result with GateherdError
pub type Result<T> = std::result::Result<T, traits::GateherdError>;
