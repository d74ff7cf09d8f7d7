use async_trait::async_trait;

use super::error::Result;
use super::transport::Frame;

/// Role-specific message handling, layered on top of a connection process.
///
/// The connection loop owns keepalive and control frames; only data frames
/// reach the handler. Handler errors are logged and do not terminate the
/// connection.
///
/// # Example
///
/// ```rust,ignore
/// struct PrintHandler;
///
/// #[async_trait]
/// impl FrameHandler for PrintHandler {
///     async fn on_frame(&self, child: &str, frame: Frame) -> Result<()> {
///         if let Some(text) = frame.as_text() {
///             println!("[{child}] {text}");
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait FrameHandler: Send + Sync + 'static {
    /// Called once per (re)connection, after the link is established
    async fn on_connected(&self, _child: &str) {}

    /// Called for every inbound data frame, in arrival order
    async fn on_frame(&self, child: &str, frame: Frame) -> Result<()>;
}

/// Default handler that discards all frames
pub struct NoOpFrameHandler;

#[async_trait]
impl FrameHandler for NoOpFrameHandler {
    async fn on_frame(&self, _child: &str, _frame: Frame) -> Result<()> {
        Ok(())
    }
}
