//! Default tungstenite-backed transport.
//!
//! Maps the transport seam onto tokio-tungstenite: the upgrade request is
//! built from the descriptor URL plus the folded extra headers, TLS
//! material (`cacerts`, `insecure`) is handed to a native-tls connector
//! without this crate interpreting it further, and the connect timeout
//! bounds the whole handshake. The established stream is split so the
//! connection loop can read and write independently.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{
    connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use crate::endpoint::{ConnectionSettings, TransportOptions};
use crate::traits::error::{GateherdError, Result};
use crate::traits::transport::{Frame, FrameSink, FrameStream, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production transport used when the builder is not given another one.
pub struct TungsteniteTransport;

impl TungsteniteTransport {
    pub fn new() -> Self {
        TungsteniteTransport
    }
}

impl Default for TungsteniteTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn connect(
        &self,
        settings: &ConnectionSettings,
        options: &TransportOptions,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>)> {
        let mut request = settings
            .url
            .as_str()
            .into_client_request()
            .map_err(|err| GateherdError::Transport(format!("invalid request: {err}")))?;

        for (name, value) in &options.extra_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                GateherdError::Transport(format!("invalid header name '{name}': {err}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|err| {
                GateherdError::Transport(format!("invalid value for header '{name}': {err}"))
            })?;
            request.headers_mut().insert(header_name, header_value);
        }

        let connector = build_connector(options).await?;
        let connect = connect_async_tls_with_config(request, None, false, connector);
        let (ws_stream, _) = match options.socket_connect_timeout {
            Some(window) => tokio::time::timeout(window, connect)
                .await
                .map_err(|_| {
                    GateherdError::Transport(format!(
                        "connect timed out after {}ms",
                        window.as_millis()
                    ))
                })?
                .map_err(|err| GateherdError::Transport(err.to_string()))?,
            None => connect
                .await
                .map_err(|err| GateherdError::Transport(err.to_string()))?,
        };
        debug!("websocket established to {}", settings.host);

        let (write, read) = ws_stream.split();
        Ok((
            Box::new(TungsteniteSink { write }),
            Box::new(TungsteniteStream { read }),
        ))
    }
}

/// TLS connector honoring `cacerts` and `insecure`; `None` means plain
/// defaults (system roots, full verification).
async fn build_connector(options: &TransportOptions) -> Result<Option<Connector>> {
    if options.cacerts.is_none() && !options.insecure {
        return Ok(None);
    }

    let mut builder = native_tls::TlsConnector::builder();
    if let Some(path) = &options.cacerts {
        let pem = tokio::fs::read(path).await.map_err(|err| {
            GateherdError::Transport(format!("cannot read cacerts {}: {err}", path.display()))
        })?;
        let certificate = native_tls::Certificate::from_pem(&pem)
            .map_err(|err| GateherdError::Transport(format!("invalid cacerts: {err}")))?;
        builder.add_root_certificate(certificate);
    }
    if options.insecure {
        builder.danger_accept_invalid_certs(true);
    }
    let connector = builder
        .build()
        .map_err(|err| GateherdError::Transport(err.to_string()))?;
    Ok(Some(Connector::NativeTls(connector)))
}

struct TungsteniteSink {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for TungsteniteSink {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.write
            .send(frame_to_message(frame))
            .await
            .map_err(|err| GateherdError::Transport(err.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.write
            .close()
            .await
            .map_err(|err| GateherdError::Transport(err.to_string()))
    }
}

struct TungsteniteStream {
    read: SplitStream<WsStream>,
}

#[async_trait]
impl FrameStream for TungsteniteStream {
    async fn next(&mut self) -> Option<Result<Frame>> {
        loop {
            match self.read.next().await {
                None => return None,
                Some(Err(err)) => return Some(Err(GateherdError::Transport(err.to_string()))),
                Some(Ok(message)) => match message_to_frame(message) {
                    Some(frame) => return Some(Ok(frame)),
                    // Raw frames are a tungstenite detail, skip them
                    None => continue,
                },
            }
        }
    }
}

fn frame_to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text),
        Frame::Binary(data) => Message::Binary(data),
        Frame::Ping(payload) => Message::Ping(payload),
        Frame::Pong(payload) => Message::Pong(payload),
        Frame::Close => Message::Close(None),
    }
}

fn message_to_frame(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text)),
        Message::Binary(data) => Some(Frame::Binary(data)),
        Message::Ping(payload) => Some(Frame::Ping(payload)),
        Message::Pong(payload) => Some(Frame::Pong(payload)),
        Message::Close(_) => Some(Frame::Close),
        Message::Frame(_) => None,
    }
}
