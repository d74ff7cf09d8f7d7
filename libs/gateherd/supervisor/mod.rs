//! Supervision orchestrator.
//!
//! Owns the full lifecycle of one client instance: expanding the config
//! into a [`SupervisionPlan`], starting children in order and keeping them
//! running with a rest-for-one restart discipline.
//!
//! ```text
//!                    ┌────────────────┐
//!                    │   Supervisor   │  one loop per instance
//!                    └───────┬────────┘
//!        start order:        │ restart discipline: rest-for-one
//!   ┌──────────┬─────────────┼─────────────┬──────────┐
//!   ▼          ▼             ▼             ▼          ▼
//! registry  producer-0 .. producer-N   consumer    reader
//! ```
//!
//! A crash of any child tears down every *later* child (in reverse order)
//! and restarts from the crashed one; earlier children are untouched. The
//! registry is first, so losing it recycles the whole namespace generation
//! and every connection child with it. Restarts are unconditional: no
//! backoff and no attempt cap live at this layer, recovery policy is the
//! supervisor's only policy.

pub mod events;
pub mod plan;
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::connection::ConnectionChild;
use crate::endpoint::Role;
use crate::registry::{ChildName, ConnectionHandle, Registry};
use crate::traits::error::{GateherdError, Result};
use crate::traits::handler::{FrameHandler, NoOpFrameHandler};
use crate::traits::transport::{Frame, Transport};
use crate::transport::TungsteniteTransport;

pub use events::{ClientEvent, ExitReason};
pub use plan::{plan, ChildKind, ChildSpec, ConnectionSpec, SupervisionPlan, REGISTRY_CHILD};
pub use state::{AtomicInstanceState, InstanceState};

const EVENT_CAPACITY: usize = 256;

/// Configure and start a client instance.
///
/// ```rust,ignore
/// let client = gateherd::builder(config)
///     .handler(Role::Consumer, PrintHandler)
///     .start()
///     .await?;
/// ```
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    handlers: HashMap<Role, Arc<dyn FrameHandler>>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        ClientBuilder {
            config,
            transport: None,
            handlers: HashMap::new(),
        }
    }

    /// Replace the default tungstenite transport
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Attach a frame handler for every child of `role`
    pub fn handler(mut self, role: Role, handler: impl FrameHandler) -> Self {
        self.handlers.insert(role, Arc::new(handler));
        self
    }

    /// Plan and start the instance, returning once every child of the
    /// initial pass has acknowledged its start.
    pub async fn start(self) -> Result<Client> {
        let plan = Arc::new(plan::plan(&self.config)?);
        let instance = plan.instance.clone();
        info!("[{}] supervision plan: {:?}", instance, plan.child_names());

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(TungsteniteTransport::new()));
        let state = Arc::new(AtomicInstanceState::new(InstanceState::NotStarted));
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let registry_cell = Arc::new(RwLock::new(Arc::new(Registry::new(instance.clone()))));
        let cancel = CancellationToken::new();
        let (ctl_tx, ctl_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let supervisor = Supervisor {
            plan: Arc::clone(&plan),
            instance: instance.clone(),
            transport,
            handlers: self.handlers,
            registry: registry_cell.read().clone(),
            registry_cell: Arc::clone(&registry_cell),
            epochs: vec![0; plan.children.len()],
            slots: (0..plan.children.len()).map(|_| None).collect(),
            events: events_tx.clone(),
            state: Arc::clone(&state),
            exit_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(supervisor.run(ctl_rx, exit_rx, ready_tx));

        match ready_rx.await {
            Ok(Ok(())) => Ok(Client {
                instance,
                plan,
                state,
                events: events_tx,
                registry_cell,
                ctl_tx,
                cancel,
                task: Some(task),
            }),
            Ok(Err(err)) => {
                let _ = task.await;
                Err(err)
            }
            // Supervisor ended without reporting; treat as a failed start
            Err(_) => {
                cancel.cancel();
                let _ = task.await;
                Err(GateherdError::NotRunning)
            }
        }
    }
}

/// Handle to a running client instance.
///
/// Cheap to query, must be shut down explicitly for an orderly stop;
/// dropping it cancels the whole tree without waiting.
pub struct Client {
    instance: String,
    plan: Arc<SupervisionPlan>,
    state: Arc<AtomicInstanceState>,
    events: broadcast::Sender<ClientEvent>,
    registry_cell: Arc<RwLock<Arc<Registry>>>,
    ctl_tx: mpsc::UnboundedSender<Control>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Client {
    /// Start an instance with the default transport and no handlers
    pub async fn start(config: ClientConfig) -> Result<Client> {
        ClientBuilder::new(config).start().await
    }

    pub fn name(&self) -> &str {
        &self.instance
    }

    /// The immutable plan this instance runs
    pub fn plan(&self) -> &SupervisionPlan {
        &self.plan
    }

    pub fn state(&self) -> InstanceState {
        self.state.get()
    }

    /// Subscribe to supervision events from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Current registry generation
    pub fn registry(&self) -> Arc<Registry> {
        self.registry_cell.read().clone()
    }

    /// Handle of a currently-registered child
    pub fn lookup(&self, name: &str) -> Option<ConnectionHandle> {
        self.registry().lookup(name)
    }

    /// Send a frame through the named child's connection
    pub fn send_to(&self, name: &str, frame: Frame) -> Result<()> {
        match self.registry().lookup(name) {
            Some(handle) => handle.send(frame),
            None if self.plan.index_of(name).is_some() => {
                Err(GateherdError::ChildUnavailable(name.to_string()))
            }
            None => Err(GateherdError::UnknownChild(name.to_string())),
        }
    }

    /// Kill a child as if it had crashed. The supervisor reacts with the
    /// same rest-for-one cascade a real crash triggers.
    pub async fn terminate_child(&self, name: &str) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.ctl_tx
            .send(Control::TerminateChild {
                name: name.to_string(),
                reply: reply_tx,
            })
            .map_err(|_| GateherdError::NotRunning)?;
        reply_rx.await.map_err(|_| GateherdError::NotRunning)?
    }

    /// Stop every child in reverse start order and end the instance
    pub async fn shutdown(mut self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .ctl_tx
            .send(Control::Shutdown { reply: reply_tx })
            .is_ok()
        {
            let _ = reply_rx.await;
        } else {
            self.cancel.cancel();
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Control {
    TerminateChild {
        name: ChildName,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct ChildExit {
    index: usize,
    epoch: u64,
    reason: ExitReason,
}

/// A currently-spawned child: its cancellation token, a kill switch and
/// the watcher's completion signal.
struct RunningChild {
    token: CancellationToken,
    abort: AbortHandle,
    done: oneshot::Receiver<()>,
}

struct Supervisor {
    plan: Arc<SupervisionPlan>,
    instance: String,
    transport: Arc<dyn Transport>,
    handlers: HashMap<Role, Arc<dyn FrameHandler>>,
    /// Current registry generation, replaced on registry child (re)start
    registry: Arc<Registry>,
    registry_cell: Arc<RwLock<Arc<Registry>>>,
    /// Per-child restart epoch; exit reports from older epochs are stale
    epochs: Vec<u64>,
    slots: Vec<Option<RunningChild>>,
    events: broadcast::Sender<ClientEvent>,
    state: Arc<AtomicInstanceState>,
    exit_tx: mpsc::UnboundedSender<ChildExit>,
    cancel: CancellationToken,
}

impl Supervisor {
    async fn run(
        mut self,
        mut ctl_rx: mpsc::UnboundedReceiver<Control>,
        mut exit_rx: mpsc::UnboundedReceiver<ChildExit>,
        ready_tx: oneshot::Sender<Result<()>>,
    ) {
        self.state.set(InstanceState::Starting);
        info!(
            "[{}] starting {} children",
            self.instance,
            self.plan.children.len()
        );

        match self.start_all().await {
            Ok(()) => {
                self.state.set(InstanceState::Running);
                let _ = self.events.send(ClientEvent::Started);
                let _ = ready_tx.send(Ok(()));
            }
            Err(err) => {
                error!("[{}] start failed: {}", self.instance, err);
                self.state.set(InstanceState::Failed);
                let _ = self.events.send(ClientEvent::Failed {
                    error: err.to_string(),
                });
                self.teardown_from(0).await;
                let _ = ready_tx.send(Err(err));
                return;
            }
        }

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.stop(None).await;
                    return;
                }
                Some(control) = ctl_rx.recv() => match control {
                    Control::Shutdown { reply } => {
                        self.stop(Some(reply)).await;
                        return;
                    }
                    Control::TerminateChild { name, reply } => {
                        let _ = reply.send(self.kill(&name));
                    }
                },
                Some(exit) = exit_rx.recv() => {
                    if let Err(err) = self.handle_exit(exit).await {
                        error!("[{}] restart failed: {}", self.instance, err);
                        self.state.set(InstanceState::Failed);
                        let _ = self.events.send(ClientEvent::Failed {
                            error: err.to_string(),
                        });
                        self.teardown_from(0).await;
                        return;
                    }
                }
            }
        }
    }

    async fn start_all(&mut self) -> Result<()> {
        for index in 0..self.plan.children.len() {
            self.start_child(index).await?;
        }
        Ok(())
    }

    /// Spawn child `index` and wait for its start acknowledgement.
    async fn start_child(&mut self, index: usize) -> Result<()> {
        let spec = self.plan.children[index].clone();
        self.epochs[index] += 1;
        let epoch = self.epochs[index];
        let token = self.cancel.child_token();
        let (ack_tx, ack_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        let task: JoinHandle<ExitReason> = match &spec.kind {
            ChildKind::Registry => {
                // Every (re)start of the registry child is a fresh
                // namespace generation; names never survive it.
                let registry = Arc::new(Registry::new(self.instance.clone()));
                self.registry = Arc::clone(&registry);
                *self.registry_cell.write() = registry;

                let child_token = token.clone();
                tokio::spawn(async move {
                    let _ = ack_tx.send(Ok(()));
                    child_token.cancelled().await;
                    ExitReason::Cancelled
                })
            }
            ChildKind::Connection(conn) => {
                let child = ConnectionChild {
                    name: spec.name.clone(),
                    spec: conn.clone(),
                    registry: Arc::clone(&self.registry),
                    transport: Arc::clone(&self.transport),
                    handler: self
                        .handlers
                        .get(&conn.role)
                        .cloned()
                        .unwrap_or_else(|| Arc::new(NoOpFrameHandler)),
                    events: self.events.clone(),
                    cancel: token.clone(),
                };
                tokio::spawn(child.run(ack_tx))
            }
        };

        let abort = task.abort_handle();
        let exit_tx = self.exit_tx.clone();
        tokio::spawn(async move {
            let reason = match task.await {
                Ok(reason) => reason,
                Err(err) if err.is_panic() => ExitReason::Failed("panicked".to_string()),
                Err(_) => ExitReason::Failed("killed".to_string()),
            };
            let _ = exit_tx.send(ChildExit {
                index,
                epoch,
                reason,
            });
            let _ = done_tx.send(());
        });

        self.slots[index] = Some(RunningChild {
            token,
            abort,
            done: done_rx,
        });

        match ack_rx.await {
            Ok(Ok(())) => {
                debug!("[{}] started '{}'", self.instance, spec.name);
                let _ = self.events.send(ClientEvent::ChildStarted {
                    child: spec.name.clone(),
                });
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(GateherdError::ChannelSend(format!(
                "'{}' exited before acknowledging start",
                spec.name
            ))),
        }
    }

    /// React to a child exit: stale reports are dropped, everything else
    /// triggers the rest-for-one cascade.
    async fn handle_exit(&mut self, exit: ChildExit) -> Result<()> {
        if exit.epoch != self.epochs[exit.index] {
            return Ok(());
        }
        let name = self.plan.children[exit.index].name.clone();
        warn!(
            "[{}] child '{}' exited ({}), restarting from it",
            self.instance, name, exit.reason
        );
        let _ = self.events.send(ClientEvent::ChildExited {
            child: name.clone(),
            reason: exit.reason,
        });
        let _ = self.events.send(ClientEvent::CascadeRestart { from: name });

        // Later children first, then restart the whole tail in order
        self.teardown_from(exit.index + 1).await;
        for index in exit.index..self.plan.children.len() {
            self.start_child(index).await?;
        }
        Ok(())
    }

    /// Stop children `start..` in reverse order and wait for each one.
    async fn teardown_from(&mut self, start: usize) {
        for index in (start..self.plan.children.len()).rev() {
            if let Some(child) = self.slots[index].take() {
                // Bump first so the watcher's report reads as stale
                self.epochs[index] += 1;
                child.token.cancel();
                let _ = child.done.await;
                debug!(
                    "[{}] stopped '{}'",
                    self.instance, self.plan.children[index].name
                );
            }
        }
    }

    fn kill(&mut self, name: &str) -> Result<()> {
        let index = self
            .plan
            .index_of(name)
            .ok_or_else(|| GateherdError::UnknownChild(name.to_string()))?;
        match &self.slots[index] {
            Some(child) => {
                // Epoch untouched: the exit report must look like a crash
                child.abort.abort();
                Ok(())
            }
            None => Err(GateherdError::NotRunning),
        }
    }

    async fn stop(&mut self, reply: Option<oneshot::Sender<()>>) {
        info!("[{}] shutting down", self.instance);
        self.teardown_from(0).await;
        self.state.set(InstanceState::Stopped);
        let _ = self.events.send(ClientEvent::Stopped);
        if let Some(reply) = reply {
            let _ = reply.send(());
        }
    }
}
