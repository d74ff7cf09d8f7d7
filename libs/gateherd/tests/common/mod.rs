//! Common test utilities for gateherd integration tests
//!
//! Provides a scripted in-memory transport plus config fixtures shared by
//! the supervision test suites.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};

use gateherd::{
    ClientConfig, ConnectionSettings, Frame, FrameSink, FrameStream, GateherdError, RoleArgs,
    Transport, TransportOptions,
};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// A scripted transport standing in for the WebSocket layer.
///
/// Every connect attempt is counted per URL. Tests can make the next N
/// attempts fail, hold a connect open until released, inject inbound
/// frames and inspect everything the connection processes sent.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    connects: HashMap<String, usize>,
    fail_next: HashMap<String, usize>,
    hold: HashMap<String, Arc<Semaphore>>,
    peers: HashMap<String, mpsc::UnboundedSender<Frame>>,
    options_seen: HashMap<String, TransportOptions>,
    sent: Vec<(String, Frame)>,
    closed: Vec<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect attempts made against `url` so far
    pub fn connect_count(&self, url: &str) -> usize {
        self.state.lock().connects.get(url).copied().unwrap_or(0)
    }

    /// Total connect attempts across all URLs
    pub fn total_connects(&self) -> usize {
        self.state.lock().connects.values().sum()
    }

    /// URLs that have seen at least one connect attempt, sorted
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.state.lock().connects.keys().cloned().collect();
        urls.sort();
        urls
    }

    /// Make the next `count` connect attempts against `url` fail
    pub fn fail_next(&self, url: &str, count: usize) {
        self.state.lock().fail_next.insert(url.to_string(), count);
    }

    /// Park connect attempts against `url` until [`release`](Self::release)
    pub fn hold(&self, url: &str) {
        self.state
            .lock()
            .hold
            .insert(url.to_string(), Arc::new(Semaphore::new(0)));
    }

    /// Release one held connect and stop holding further attempts
    pub fn release(&self, url: &str) {
        if let Some(gate) = self.state.lock().hold.remove(url) {
            gate.add_permits(1);
        }
    }

    /// Whether a connection is currently established on `url`
    pub fn is_connected(&self, url: &str) -> bool {
        self.state
            .lock()
            .peers
            .get(url)
            .map(|peer| !peer.is_closed())
            .unwrap_or(false)
    }

    /// Frames sent through the sink connected to `url`, in send order
    pub fn sent_frames(&self, url: &str) -> Vec<Frame> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|(sent_url, _)| sent_url == url)
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    /// URLs whose sinks were closed, in close order
    pub fn closed(&self) -> Vec<String> {
        self.state.lock().closed.clone()
    }

    /// Options the last connect against `url` carried
    pub fn last_options(&self, url: &str) -> Option<TransportOptions> {
        self.state.lock().options_seen.get(url).cloned()
    }

    /// Deliver an inbound frame to the connection currently on `url`
    pub fn inject(&self, url: &str, frame: Frame) {
        let state = self.state.lock();
        let peer = state
            .peers
            .get(url)
            .unwrap_or_else(|| panic!("no active connection for {url}"));
        peer.send(frame).unwrap_or_else(|_| panic!("connection on {url} is gone"));
    }

    /// End the inbound stream on `url`, as if the peer vanished
    pub fn drop_peer(&self, url: &str) {
        self.state.lock().peers.remove(url);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        settings: &ConnectionSettings,
        options: &TransportOptions,
    ) -> gateherd::Result<(Box<dyn FrameSink>, Box<dyn FrameStream>)> {
        let url = settings.url.clone();
        let gate = {
            let mut state = self.state.lock();
            *state.connects.entry(url.clone()).or_insert(0) += 1;
            state.options_seen.insert(url.clone(), options.clone());
            if let Some(remaining) = state.fail_next.get_mut(&url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(GateherdError::Transport(format!(
                        "scripted connect failure for {url}"
                    )));
                }
            }
            state.hold.get(&url).cloned()
        };
        if let Some(gate) = gate {
            // Permits persist, so a release that lands before the child
            // parks here is not lost
            let _permit = gate.acquire().await;
        }

        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        self.state.lock().peers.insert(url.clone(), peer_tx);
        let sink = MockSink {
            url,
            state: Arc::clone(&self.state),
        };
        Ok((Box::new(sink), Box::new(MockStream { rx: peer_rx })))
    }
}

struct MockSink {
    url: String,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send(&mut self, frame: Frame) -> gateherd::Result<()> {
        self.state.lock().sent.push((self.url.clone(), frame));
        Ok(())
    }

    async fn close(&mut self) -> gateherd::Result<()> {
        self.state.lock().closed.push(self.url.clone());
        Ok(())
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl FrameStream for MockStream {
    async fn next(&mut self) -> Option<gateherd::Result<Frame>> {
        self.rx.recv().await.map(Ok)
    }
}

/// Poll `check` every 10ms until it holds or the 2s deadline passes
pub async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Config fixtures matching the broker shapes used across the suites
pub mod fixtures {
    use super::*;
    use gateherd::Fanout;

    pub fn role(tenant: &str, namespace: &str, topic: &str) -> RoleArgs {
        RoleArgs {
            tenant: tenant.to_string(),
            namespace: namespace.to_string(),
            topic: topic.to_string(),
            ..Default::default()
        }
    }

    pub fn subscribed(tenant: &str, namespace: &str, topic: &str, subscription: &str) -> RoleArgs {
        RoleArgs {
            subscription: Some(subscription.to_string()),
            ..role(tenant, namespace, topic)
        }
    }

    /// `host: "broker:8080"` with a single producer on `t/n/top`
    pub fn single_producer() -> ClientConfig {
        ClientConfig {
            host: "broker:8080".into(),
            producer: Some(Fanout::One(role("t", "n", "top"))),
            ..Default::default()
        }
    }

    pub const PRODUCER_URL: &str = "ws://broker:8080/ws/v2/producer/persistent/t/n/top";
    pub const CONSUMER_URL: &str = "ws://broker:8080/ws/v2/consumer/persistent/t/n/top/sub1";
    pub const READER_URL: &str = "ws://broker:8080/ws/v2/reader/persistent/t/n/top";
}
