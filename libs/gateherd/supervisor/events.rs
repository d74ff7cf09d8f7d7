use crate::registry::ChildName;

/// Why a child task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Stopped on purpose by the supervisor
    Cancelled,
    /// Peer closed the stream (or the close frame arrived)
    Closed,
    /// Transport failure, kill, or panic
    Failed(String),
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Cancelled => f.write_str("cancelled"),
            ExitReason::Closed => f.write_str("closed"),
            ExitReason::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Supervision events published on the instance's broadcast channel.
///
/// Purely observational: subscribers cannot influence supervision, and a
/// lagging subscriber only loses its own backlog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// All children of the initial pass started
    Started,
    /// A child registered and acknowledged its start
    ChildStarted { child: ChildName },
    /// A connection child established its link
    ChildConnected { child: ChildName },
    /// A child exited; unless cancelled this triggers a restart
    ChildExited { child: ChildName, reason: ExitReason },
    /// Rest-for-one cascade beginning at `from`
    CascadeRestart { from: ChildName },
    /// Non-recoverable failure, the instance is stopping
    Failed { error: String },
    /// The instance shut down
    Stopped,
}
