use thiserror::Error;

/// Configuration-time errors.
///
/// Everything in here is detected synchronously while planning a client
/// instance or building a connection descriptor, before any task is spawned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required field is missing or empty
    #[error("missing required config field `{0}`")]
    MissingField(&'static str),

    /// Consumer role configured without a subscription name
    #[error("consumer role requires a subscription")]
    MissingSubscription,

    /// Host was not a "host:port" literal or a single address/port pair
    #[error("invalid host format: {0}")]
    InvalidHostFormat(String),
}

/// Main error type for gateherd
#[derive(Error, Debug)]
pub enum GateherdError {
    /// Invalid client configuration, rejected before start
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Socket layer failed to connect, send or stay alive
    #[error("transport error: {0}")]
    Transport(String),

    /// A child name was registered twice under the same registry
    #[error("duplicate registration for `{0}`")]
    DuplicateRegistration(String),

    /// Addressed child exists but its frame channel is gone
    #[error("child `{0}` is not accepting frames")]
    ChildUnavailable(String),

    /// Addressed child is not part of this instance
    #[error("no child named `{0}`")]
    UnknownChild(String),

    /// Operation requires a running instance
    #[error("client instance is not running")]
    NotRunning,

    /// Channel send error
    #[error("channel send error: {0}")]
    ChannelSend(String),
}

impl GateherdError {
    /// Short label for log fields and event payloads
    pub fn as_label(&self) -> &'static str {
        match self {
            GateherdError::Config(_) => "config",
            GateherdError::Transport(_) => "transport",
            GateherdError::DuplicateRegistration(_) => "duplicate_registration",
            GateherdError::ChildUnavailable(_) => "child_unavailable",
            GateherdError::UnknownChild(_) => "unknown_child",
            GateherdError::NotRunning => "not_running",
            GateherdError::ChannelSend(_) => "channel_send",
        }
    }
}

/// Result type for gateherd operations
pub type Result<T> = std::result::Result<T, GateherdError>;
