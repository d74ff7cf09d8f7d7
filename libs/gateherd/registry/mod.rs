//! Per-instance process registry.
//!
//! Maps stable logical child names to addressable connection handles. One
//! registry exists per client instance, created by the supervisor and
//! passed by reference to every child at construction time; nothing here is
//! process-wide. Entries carry a [`ProcessId`] so a name can never be
//! re-bound to a dead process: deregistration is an RAII guard that only
//! removes the entry it created.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

use crate::traits::error::{GateherdError, Result};
use crate::traits::transport::Frame;

/// Logical child name, unique within one registry
pub type ChildName = String;

/// Identity of one spawned connection process. Monotonic within a registry
/// instance; a restarted child always gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(u64);

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Addressable handle for a registered connection process.
///
/// Cloning is cheap; sends go over the process's unbounded frame channel
/// and fail with `ChildUnavailable` once the process is gone.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pid: ProcessId,
    name: ChildName,
    frame_tx: mpsc::UnboundedSender<Frame>,
}

impl ConnectionHandle {
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue an outbound frame for this connection
    pub fn send(&self, frame: Frame) -> Result<()> {
        self.frame_tx
            .send(frame)
            .map_err(|_| GateherdError::ChildUnavailable(self.name.clone()))
    }
}

/// Name → handle namespace for one client instance.
pub struct Registry {
    scope: String,
    next_pid: AtomicU64,
    entries: RwLock<HashMap<ChildName, ConnectionHandle>>,
}

impl Registry {
    pub fn new(scope: impl Into<String>) -> Self {
        Registry {
            scope: scope.into(),
            next_pid: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Instance name this registry is scoped to
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Register `name` with the process's frame channel.
    ///
    /// Returns the guard that owns the entry; dropping it deregisters the
    /// name. Duplicate names are rejected, that is an orchestrator bug and
    /// never retried.
    pub fn register(
        registry: &Arc<Registry>,
        name: &str,
        frame_tx: mpsc::UnboundedSender<Frame>,
    ) -> Result<Registration> {
        let mut entries = registry.entries.write();
        if entries.contains_key(name) {
            return Err(GateherdError::DuplicateRegistration(name.to_string()));
        }

        let pid = ProcessId(registry.next_pid.fetch_add(1, Ordering::Relaxed) + 1);
        entries.insert(
            name.to_string(),
            ConnectionHandle {
                pid,
                name: name.to_string(),
                frame_tx,
            },
        );
        debug!("[{}] registered '{}' as {}", registry.scope, name, pid);

        Ok(Registration {
            registry: Arc::clone(registry),
            name: name.to_string(),
            pid,
        })
    }

    /// Look up the handle currently bound to `name`
    pub fn lookup(&self, name: &str) -> Option<ConnectionHandle> {
        self.entries.read().get(name).cloned()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<ChildName> {
        let mut names: Vec<ChildName> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove `name` only if it is still bound to `pid`. A guard outliving
    /// its successor's registration must not evict the successor.
    fn deregister(&self, name: &str, pid: ProcessId) {
        let mut entries = self.entries.write();
        if entries.get(name).map(|entry| entry.pid) == Some(pid) {
            entries.remove(name);
            debug!("[{}] deregistered '{}' ({})", self.scope, name, pid);
        }
    }
}

/// RAII registration guard. Held by the owning connection process for its
/// whole lifetime; dropping it (normal exit, crash cleanup, cancellation)
/// removes the registry entry.
pub struct Registration {
    registry: Arc<Registry>,
    name: ChildName,
    pid: ProcessId,
}

impl Registration {
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(&self.name, self.pid);
    }
}
