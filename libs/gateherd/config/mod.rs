//! Declarative client configuration.
//!
//! A [`ClientConfig`] describes one client instance: where the broker
//! gateway lives, shared transport options, and which connection roles to
//! run. The tree is plain serde data so callers can build it in code or
//! deserialize it from a config file; nothing here spawns tasks or opens
//! sockets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Instance name used when the caller does not supply one
pub const DEFAULT_INSTANCE: &str = "default";

/// URL scheme for the gateway connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Ws,
    Wss,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Ws => "ws",
            Protocol::Wss => "wss",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topic persistence mode, a fixed path segment of the gateway URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Persistence {
    #[default]
    #[serde(rename = "persistent")]
    Persistent,
    #[serde(rename = "non-persistent")]
    NonPersistent,
}

impl Persistence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Persistence::Persistent => "persistent",
            Persistence::NonPersistent => "non-persistent",
        }
    }
}

impl std::fmt::Display for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway host in any of the accepted shapes.
///
/// Accepted: a `"host:port"` literal, a single address/port pair, or a
/// one-element list of pairs. Anything else is rejected with
/// `InvalidHostFormat` when the descriptor is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostConfig {
    /// `"broker.example.com:8080"`
    Literal(String),
    /// `("broker.example.com", 8080)`
    Pair(String, u16),
    /// List form kept for callers that configure hosts as pair lists;
    /// only a single entry is valid
    Pairs(Vec<(String, u16)>),
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig::Literal(String::new())
    }
}

impl From<&str> for HostConfig {
    fn from(value: &str) -> Self {
        HostConfig::Literal(value.to_string())
    }
}

impl From<String> for HostConfig {
    fn from(value: String) -> Self {
        HostConfig::Literal(value)
    }
}

impl From<(&str, u16)> for HostConfig {
    fn from((host, port): (&str, u16)) -> Self {
        HostConfig::Pair(host.to_string(), port)
    }
}

/// Raw socket-layer options as supplied by the caller.
///
/// This is the permissive input side: keys outside the allow-list are
/// ignored during deserialization, and repeated sources are folded into a
/// canonical [`TransportOptions`](crate::endpoint::TransportOptions) with
/// `auth_token` rewritten into an Authorization header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Bearer token, converted to exactly one `Authorization` header
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Path to a PEM root certificate for TLS verification
    #[serde(default)]
    pub cacerts: Option<std::path::PathBuf>,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: Option<bool>,
    /// Connect/handshake timeout in milliseconds
    #[serde(default)]
    pub socket_connect_timeout: Option<u64>,
    /// Idle receive watchdog in milliseconds
    #[serde(default)]
    pub socket_recv_timeout: Option<u64>,
    /// Additional headers sent with the upgrade request, in caller order
    #[serde(default)]
    pub extra_headers: Vec<(String, String)>,
}

/// Arguments for a single connection role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleArgs {
    pub tenant: String,
    pub namespace: String,
    pub topic: String,
    /// Defaults to `persistent`
    #[serde(default)]
    pub persistence: Persistence,
    /// Required for the consumer role, ignored elsewhere
    #[serde(default)]
    pub subscription: Option<String>,
    /// Extra query parameters appended to the gateway URL
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Per-role transport overrides, folded over the shared options
    #[serde(default)]
    pub transport: Option<TransportConfig>,
}

/// One role section or a homogeneous fan-out of them.
///
/// `producer: {..}` deserializes to `One`, `producer: [{..}, {..}]` to
/// `Many`. The shape is resolved exactly once when the supervision plan is
/// computed; `Many` children get index-suffixed names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fanout<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Fanout<T> {
    /// Number of children this section contributes
    pub fn len(&self) -> usize {
        match self {
            Fanout::One(_) => 1,
            Fanout::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the contained role args in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        match self {
            Fanout::One(item) => std::slice::from_ref(item).iter(),
            Fanout::Many(items) => items.iter(),
        }
    }

    /// True when the caller asked for an explicit fan-out list
    pub fn is_many(&self) -> bool {
        matches!(self, Fanout::Many(_))
    }
}

/// Top-level configuration for one client instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Logical instance name, scoping the registry. Defaults to
    /// [`DEFAULT_INSTANCE`].
    #[serde(default)]
    pub name: Option<String>,
    /// Gateway host, shared by every role
    pub host: HostConfig,
    /// URL scheme, shared by every role
    #[serde(default)]
    pub protocol: Protocol,
    /// Transport options shared by every role
    #[serde(default)]
    pub transport: TransportConfig,
    /// Zero or more producers
    #[serde(default)]
    pub producer: Option<Fanout<RoleArgs>>,
    /// At most one consumer (requires `subscription`)
    #[serde(default)]
    pub consumer: Option<RoleArgs>,
    /// At most one reader
    #[serde(default)]
    pub reader: Option<RoleArgs>,
}

impl ClientConfig {
    /// Instance name with the default sentinel applied
    pub fn instance_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_INSTANCE)
    }
}
