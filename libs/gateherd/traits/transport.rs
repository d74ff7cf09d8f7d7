use async_trait::async_trait;

use super::error::Result;
use crate::endpoint::{ConnectionSettings, TransportOptions};

/// A single WebSocket frame as seen by connection processes.
///
/// Control frames (ping/pong/close) are part of the type because the
/// keepalive policy must observe and answer them; data frames are passed
/// through to the role-specific handler untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text payload
    Text(String),
    /// Binary payload
    Binary(Vec<u8>),
    /// Ping control frame (payload echoed back in the pong)
    Ping(Vec<u8>),
    /// Pong control frame
    Pong(Vec<u8>),
    /// Close control frame
    Close,
}

impl Frame {
    /// Get text content if this is a text frame
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Get binary content if this is a binary frame
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Frame::Binary(data) => Some(data),
            _ => None,
        }
    }

    /// True for text/binary payload frames, false for control frames
    pub fn is_data(&self) -> bool {
        matches!(self, Frame::Text(_) | Frame::Binary(_))
    }
}

/// Outbound half of an established connection
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Send a single frame
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Close the connection gracefully
    async fn close(&mut self) -> Result<()>;
}

/// Inbound half of an established connection
#[async_trait]
pub trait FrameStream: Send + 'static {
    /// Receive the next frame. `None` means the peer closed the stream.
    async fn next(&mut self) -> Option<Result<Frame>>;
}

/// Capability seam over the socket layer.
///
/// The orchestration code never touches a socket library directly; it asks
/// a `Transport` for a connected link and drives the returned halves. The
/// split mirrors how the event loop works: the stream half is owned by the
/// receive branch, the sink half by everything that sends (keepalive,
/// reflex replies, outbound frames). The default implementation is
/// tungstenite-backed (`transport::TungsteniteTransport`); tests substitute
/// a scripted one.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection to `settings.url`, honoring the transport options
    /// (headers, TLS material, connect timeout).
    async fn connect(
        &self,
        settings: &ConnectionSettings,
        options: &TransportOptions,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_accessors_match_their_variant() {
        assert_eq!(Frame::Text("m".into()).as_text(), Some("m"));
        assert_eq!(Frame::Binary(vec![1]).as_text(), None);
        assert_eq!(Frame::Binary(vec![1]).as_binary(), Some(&[1u8][..]));
        assert_eq!(Frame::Ping(vec![1]).as_binary(), None);
    }

    #[test]
    fn only_text_and_binary_are_data_frames() {
        assert!(Frame::Text("m".into()).is_data());
        assert!(Frame::Binary(Vec::new()).is_data());
        assert!(!Frame::Ping(Vec::new()).is_data());
        assert!(!Frame::Pong(Vec::new()).is_data());
        assert!(!Frame::Close.is_data());
    }
}
