//! Connection descriptor building.
//!
//! Turns declarative configuration into the two values a connection process
//! needs to start: a fully-formed gateway URL ([`ConnectionSettings`]) and
//! the canonical socket-layer options ([`TransportOptions`]). Everything in
//! this module is pure; identical inputs always produce byte-identical
//! output, so a restarted process reconstructs exactly the descriptor its
//! predecessor used.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{HostConfig, Persistence, Protocol, TransportConfig};
use crate::traits::error::ConfigError;

/// Connection role, the first variable segment of the gateway path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Producer,
    Consumer,
    Reader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Producer => "producer",
            Role::Consumer => "consumer",
            Role::Reader => "reader",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merged endpoint inputs for one connection child.
///
/// Host and protocol come from the shared instance config, the rest from
/// the role section. The host is kept in its raw shape; normalization
/// happens inside [`ConnectionSettings::build`] so rebuilding on restart
/// goes through the same validation every time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointConfig {
    pub host: HostConfig,
    pub protocol: Protocol,
    pub persistence: Persistence,
    pub tenant: String,
    pub namespace: String,
    pub topic: String,
    pub subscription: Option<String>,
}

/// Immutable descriptor for one gateway connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Complete connection URL
    pub url: String,
    /// Canonical `"host:port"`
    pub host: String,
    pub protocol: Protocol,
    pub persistence: Persistence,
    pub tenant: String,
    pub namespace: String,
    pub topic: String,
}

impl ConnectionSettings {
    /// Build the connection descriptor for `role`.
    ///
    /// The URL grammar is fixed:
    /// `{protocol}://{host}/ws/v2/{role}/{persistence}/{tenant}/{namespace}/{topic}`,
    /// with `/{subscription}` appended for the consumer role only and
    /// `?{extra_query}` appended only when `extra_query` is non-empty.
    ///
    /// # Arguments
    /// * `config` - Merged endpoint inputs for this child
    /// * `role` - Connection role selecting the URL shape
    /// * `extra_query` - Pre-rendered query string, may be empty
    ///
    /// # Returns
    /// The descriptor, or a `ConfigError` when a required field is missing,
    /// the consumer has no subscription, or the host shape is invalid.
    pub fn build(
        config: &EndpointConfig,
        role: Role,
        extra_query: &str,
    ) -> Result<Self, ConfigError> {
        let host = normalize_host(&config.host)?;

        require(&config.tenant, "tenant")?;
        require(&config.namespace, "namespace")?;
        require(&config.topic, "topic")?;

        let subscription = match role {
            Role::Consumer => match config.subscription.as_deref() {
                Some(sub) if !sub.is_empty() => Some(sub),
                _ => return Err(ConfigError::MissingSubscription),
            },
            _ => None,
        };

        let mut url = format!(
            "{}://{}/ws/v2/{}/{}/{}/{}/{}",
            config.protocol, host, role, config.persistence, config.tenant, config.namespace,
            config.topic
        );
        if let Some(sub) = subscription {
            url.push('/');
            url.push_str(sub);
        }
        if !extra_query.is_empty() {
            url.push('?');
            url.push_str(extra_query);
        }

        Ok(ConnectionSettings {
            url,
            host,
            protocol: config.protocol,
            persistence: config.persistence,
            tenant: config.tenant.clone(),
            namespace: config.namespace.clone(),
            topic: config.topic.clone(),
        })
    }
}

fn require(value: &str, field: &'static str) -> Result<(), ConfigError> {
    if value.is_empty() {
        Err(ConfigError::MissingField(field))
    } else {
        Ok(())
    }
}

/// Render any accepted host shape to canonical `"host:port"`.
pub fn normalize_host(host: &HostConfig) -> Result<String, ConfigError> {
    match host {
        HostConfig::Literal(literal) => {
            if literal.is_empty() {
                return Err(ConfigError::MissingField("host"));
            }
            let (addr, port) = literal
                .rsplit_once(':')
                .ok_or_else(|| ConfigError::InvalidHostFormat(literal.clone()))?;
            if addr.is_empty() || port.parse::<u16>().is_err() {
                return Err(ConfigError::InvalidHostFormat(literal.clone()));
            }
            Ok(literal.clone())
        }
        HostConfig::Pair(addr, port) => {
            if addr.is_empty() {
                return Err(ConfigError::InvalidHostFormat(format!("{addr}:{port}")));
            }
            Ok(format!("{addr}:{port}"))
        }
        HostConfig::Pairs(pairs) => match pairs.as_slice() {
            [] => Err(ConfigError::MissingField("host")),
            [(addr, port)] => normalize_host(&HostConfig::Pair(addr.clone(), *port)),
            _ => Err(ConfigError::InvalidHostFormat(format!(
                "{} address/port pairs, expected one",
                pairs.len()
            ))),
        },
    }
}

/// Render extra query parameters deterministically (sorted key order,
/// percent-encoded values). Empty input renders to an empty string.
pub fn render_query(params: &BTreeMap<String, String>) -> String {
    let mut query = String::new();
    for (key, value) in params {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&urlencoding::encode(key));
        query.push('=');
        query.push_str(&urlencoding::encode(value));
    }
    query
}

/// Canonical socket-layer options after allow-list filtering.
///
/// Field order is the builder's representation order; forwarding to the
/// socket layer walks the fields top to bottom regardless of how the caller
/// ordered its input. `auth_token` never appears here: it is consumed
/// during [`TransportOptions::build`] and survives only as the leading
/// Authorization header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    pub cacerts: Option<PathBuf>,
    pub insecure: bool,
    pub socket_connect_timeout: Option<Duration>,
    pub socket_recv_timeout: Option<Duration>,
    /// Headers in send order: synthesized Authorization first, then caller
    /// headers in the order their sources supplied them
    pub extra_headers: Vec<(String, String)>,
}

impl TransportOptions {
    /// Fold one or more raw option sources into the canonical shape.
    ///
    /// Later sources win for scalar keys, header lists concatenate in
    /// source order, and a present `auth_token` becomes exactly one
    /// `Authorization: Bearer <token>` header placed before all others.
    pub fn build(sources: &[&TransportConfig]) -> TransportOptions {
        let mut auth_token: Option<&str> = None;
        let mut options = TransportOptions::default();

        for source in sources {
            if let Some(token) = source.auth_token.as_deref() {
                auth_token = Some(token);
            }
            if let Some(cacerts) = &source.cacerts {
                options.cacerts = Some(cacerts.clone());
            }
            if let Some(insecure) = source.insecure {
                options.insecure = insecure;
            }
            if let Some(ms) = source.socket_connect_timeout {
                options.socket_connect_timeout = Some(Duration::from_millis(ms));
            }
            if let Some(ms) = source.socket_recv_timeout {
                options.socket_recv_timeout = Some(Duration::from_millis(ms));
            }
            options.extra_headers.extend(source.extra_headers.clone());
        }

        if let Some(token) = auth_token {
            options
                .extra_headers
                .insert(0, ("Authorization".to_string(), format!("Bearer {token}")));
        }

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_host_requires_port() {
        assert_eq!(
            normalize_host(&HostConfig::Literal("broker".into())),
            Err(ConfigError::InvalidHostFormat("broker".into()))
        );
        assert_eq!(
            normalize_host(&HostConfig::Literal("broker:8080".into())),
            Ok("broker:8080".to_string())
        );
    }

    #[test]
    fn pair_and_single_pair_list_normalize() {
        assert_eq!(
            normalize_host(&HostConfig::Pair("broker".into(), 6650)),
            Ok("broker:6650".to_string())
        );
        assert_eq!(
            normalize_host(&HostConfig::Pairs(vec![("broker".into(), 6650)])),
            Ok("broker:6650".to_string())
        );
    }

    #[test]
    fn multi_pair_list_is_invalid() {
        let host = HostConfig::Pairs(vec![("a".into(), 1), ("b".into(), 2)]);
        assert!(matches!(
            normalize_host(&host),
            Err(ConfigError::InvalidHostFormat(_))
        ));
    }

    #[test]
    fn query_rendering_is_sorted_and_encoded() {
        let mut params = BTreeMap::new();
        params.insert("b".to_string(), "2".to_string());
        params.insert("a".to_string(), "one two".to_string());
        assert_eq!(render_query(&params), "a=one%20two&b=2");
        assert_eq!(render_query(&BTreeMap::new()), "");
    }
}
