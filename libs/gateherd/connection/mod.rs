//! Connection process.
//!
//! One tokio task per planned connection child. The task builds its own
//! descriptor at start time, registers under its logical name, connects
//! through the transport seam and then handles one event at a time:
//! keepalive ticks, inbound frames (keepalive reflex first, then the role
//! handler), outbound frames addressed through the registry, and
//! cancellation. The task never restarts itself; any exit is reported to
//! the supervisor, which owns recovery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::endpoint::ConnectionSettings;
use crate::keepalive::{Keepalive, Reflex};
use crate::registry::{ChildName, Registry};
use crate::supervisor::events::{ClientEvent, ExitReason};
use crate::supervisor::plan::ConnectionSpec;
use crate::traits::error::{GateherdError, Result};
use crate::traits::handler::FrameHandler;
use crate::traits::transport::{Frame, FrameStream, Transport};

/// Upper bound on the graceful close when a connection is being stopped
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// One connection child, assembled by the supervisor and consumed by
/// [`ConnectionChild::run`].
pub(crate) struct ConnectionChild {
    pub(crate) name: ChildName,
    pub(crate) spec: ConnectionSpec,
    pub(crate) registry: Arc<Registry>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) handler: Arc<dyn FrameHandler>,
    pub(crate) events: broadcast::Sender<ClientEvent>,
    pub(crate) cancel: CancellationToken,
}

impl ConnectionChild {
    /// Run the connection to completion.
    ///
    /// The start phase (descriptor build + registration) reports through
    /// `ack`; everything after the ack is runtime and surfaces as the
    /// returned [`ExitReason`].
    pub(crate) async fn run(self, ack: oneshot::Sender<Result<()>>) -> ExitReason {
        let scope = self.registry.scope().to_string();

        let settings =
            match ConnectionSettings::build(&self.spec.endpoint, self.spec.role, &self.spec.extra_query) {
                Ok(settings) => settings,
                Err(err) => {
                    let reason = ExitReason::Failed(err.to_string());
                    let _ = ack.send(Err(err.into()));
                    return reason;
                }
            };

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let registration = match Registry::register(&self.registry, &self.name, frame_tx) {
            Ok(registration) => registration,
            Err(err) => {
                let reason = ExitReason::Failed(err.to_string());
                let _ = ack.send(Err(err));
                return reason;
            }
        };
        debug!("[{}:{}] registered as {}", scope, self.name, registration.pid());
        let _ = ack.send(Ok(()));

        let reason = match self.drive(&scope, settings, frame_rx).await {
            Ok(reason) => reason,
            Err(err) => {
                warn!(
                    "[{}:{}] connection error ({}): {}",
                    scope,
                    self.name,
                    err.as_label(),
                    err
                );
                ExitReason::Failed(err.to_string())
            }
        };
        debug!("[{}:{}] exiting ({})", scope, self.name, reason);
        // `registration` drops here and removes the registry entry
        reason
    }

    async fn drive(
        &self,
        scope: &str,
        settings: ConnectionSettings,
        mut frame_rx: mpsc::UnboundedReceiver<Frame>,
    ) -> Result<ExitReason> {
        debug!("[{}:{}] connecting to {}", scope, self.name, settings.url);
        let (mut sink, mut stream) = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(ExitReason::Cancelled),
            connected = self.transport.connect(&settings, &self.spec.transport) => connected?,
        };
        info!("[{}:{}] connected to {}", scope, self.name, settings.host);
        let _ = self.events.send(ClientEvent::ChildConnected {
            child: self.name.clone(),
        });
        self.handler.on_connected(&self.name).await;

        let mut keepalive = Keepalive::new();
        // Idle watchdog: one deadline for the whole connection, pushed out
        // only by inbound frames. Outbound sends and keepalive ticks must
        // not touch it, or a window at or above the ping interval would
        // never fire.
        let recv_window = self.spec.transport.socket_recv_timeout;
        let idle = tokio::time::sleep(recv_window.unwrap_or(Duration::ZERO));
        tokio::pin!(idle);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    let _ = tokio::time::timeout(CLOSE_GRACE, sink.close()).await;
                    return Ok(ExitReason::Cancelled);
                }
                _ = keepalive.tick() => {
                    sink.send(Keepalive::ping()).await?;
                }
                outbound = frame_rx.recv() => match outbound {
                    Some(frame) => sink.send(frame).await?,
                    // Registry entry gone while still running; stop quietly
                    None => {
                        let _ = tokio::time::timeout(CLOSE_GRACE, sink.close()).await;
                        return Ok(ExitReason::Cancelled);
                    }
                },
                inbound = stream.next() => match inbound.transpose()? {
                    Some(frame) => {
                        if let Some(window) = recv_window {
                            idle.as_mut().reset(tokio::time::Instant::now() + window);
                        }
                        match Keepalive::reflex(&frame) {
                            Reflex::Reply(reply) => sink.send(reply).await?,
                            Reflex::Ignore => {}
                            Reflex::Forward if frame.is_data() => {
                                if let Err(err) = self.handler.on_frame(&self.name, frame).await {
                                    warn!("[{}:{}] handler error: {}", scope, self.name, err);
                                }
                            }
                            Reflex::Forward => {
                                info!("[{}:{}] close frame from peer", scope, self.name);
                                return Ok(ExitReason::Closed);
                            }
                        }
                    }
                    None => {
                        warn!("[{}:{}] stream ended", scope, self.name);
                        return Ok(ExitReason::Closed);
                    }
                },
                _ = idle.as_mut(), if recv_window.is_some() => {
                    return Err(GateherdError::Transport(format!(
                        "no inbound traffic within {}ms",
                        recv_window.unwrap_or_default().as_millis()
                    )));
                }
            }
        }
    }
}
