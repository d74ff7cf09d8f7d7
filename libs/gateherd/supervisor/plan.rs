//! Supervision plan construction.
//!
//! `plan` is the pure half of the orchestrator: it expands a
//! [`ClientConfig`] into the ordered child list the supervisor will start,
//! merging shared and role-specific arguments and validating every
//! descriptor up front. No tasks are spawned here; a plan that comes back
//! `Ok` is one the supervisor can start without configuration surprises.

use crate::config::{ClientConfig, Fanout, RoleArgs, TransportConfig};
use crate::endpoint::{render_query, ConnectionSettings, EndpointConfig, Role, TransportOptions};
use crate::registry::ChildName;
use crate::traits::error::ConfigError;

/// Name of the registry child, always first in the plan
pub const REGISTRY_CHILD: &str = "registry";

/// Ordered description of everything one client instance runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisionPlan {
    /// Instance name (registry scope)
    pub instance: String,
    /// Children in start order: registry, producers, consumer, reader
    pub children: Vec<ChildSpec>,
}

impl SupervisionPlan {
    /// Child names in start order
    pub fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|child| child.name.as_str()).collect()
    }

    /// Position of `name` in the start order
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|child| child.name == name)
    }
}

/// One supervised child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSpec {
    pub name: ChildName,
    pub kind: ChildKind,
}

impl ChildSpec {
    /// Connection details, `None` for the registry child
    pub fn connection(&self) -> Option<&ConnectionSpec> {
        match &self.kind {
            ChildKind::Registry => None,
            ChildKind::Connection(spec) => Some(spec),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildKind {
    Registry,
    Connection(ConnectionSpec),
}

/// Everything a connection child needs to build its descriptor at start
/// time. Owned by the plan so restarts reconstruct identical settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    pub role: Role,
    pub endpoint: EndpointConfig,
    pub transport: TransportOptions,
    /// Pre-rendered query string, possibly empty
    pub extra_query: String,
}

/// Expand `config` into the ordered child list.
///
/// Ordering is fixed: the registry first, then producers (fan-out expanded
/// in declaration order), then the consumer, then the reader. Sections that
/// are absent contribute no children. Fails fast with the first
/// configuration error; nothing is spawned on any path through this
/// function.
pub fn plan(config: &ClientConfig) -> Result<SupervisionPlan, ConfigError> {
    let instance = config.instance_name().to_string();
    let mut children = vec![ChildSpec {
        name: REGISTRY_CHILD.to_string(),
        kind: ChildKind::Registry,
    }];

    if let Some(producers) = &config.producer {
        match producers {
            Fanout::One(args) => {
                children.push(connection_child(config, Role::Producer.to_string(), Role::Producer, args)?);
            }
            Fanout::Many(list) => {
                for (index, args) in list.iter().enumerate() {
                    let name = format!("{}-{index}", Role::Producer);
                    children.push(connection_child(config, name, Role::Producer, args)?);
                }
            }
        }
    }
    if let Some(args) = &config.consumer {
        children.push(connection_child(config, Role::Consumer.to_string(), Role::Consumer, args)?);
    }
    if let Some(args) = &config.reader {
        children.push(connection_child(config, Role::Reader.to_string(), Role::Reader, args)?);
    }

    Ok(SupervisionPlan { instance, children })
}

fn connection_child(
    config: &ClientConfig,
    name: ChildName,
    role: Role,
    args: &RoleArgs,
) -> Result<ChildSpec, ConfigError> {
    // Shared values win for host and protocol; the role section owns
    // everything else it supplies.
    let endpoint = EndpointConfig {
        host: config.host.clone(),
        protocol: config.protocol,
        persistence: args.persistence,
        tenant: args.tenant.clone(),
        namespace: args.namespace.clone(),
        topic: args.topic.clone(),
        subscription: args.subscription.clone(),
    };

    let mut sources: Vec<&TransportConfig> = vec![&config.transport];
    if let Some(overrides) = &args.transport {
        sources.push(overrides);
    }
    let transport = TransportOptions::build(&sources);
    let extra_query = render_query(&args.params);

    // Dry-build the descriptor so configuration errors surface now, not
    // inside a spawned child.
    ConnectionSettings::build(&endpoint, role, &extra_query)?;

    Ok(ChildSpec {
        name,
        kind: ChildKind::Connection(ConnectionSpec {
            role,
            endpoint,
            transport,
            extra_query,
        }),
    })
}
