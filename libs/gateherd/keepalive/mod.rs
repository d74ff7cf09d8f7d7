//! Connection keepalive policy.
//!
//! Every connection process, regardless of role, composes this policy into
//! its event loop: a fixed-period outbound ping plus the ping/pong reflex
//! for inbound control frames. The interval lives inside the owning task,
//! so it is cancelled with the task and needs no explicit cleanup.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::traits::transport::Frame;

/// Fixed period between outbound pings
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// What the connection loop should do with an inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reflex {
    /// Answer with this frame, do not forward
    Reply(Frame),
    /// Consume silently (liveness signal only)
    Ignore,
    /// Not a keepalive concern, hand to the role handler
    Forward,
}

/// Recurring ping schedule for one connection.
///
/// The first ping is due one full period after creation (connections do not
/// ping the instant they come up) and missed ticks are skipped rather than
/// bursted.
pub struct Keepalive {
    ticker: Interval,
}

impl Keepalive {
    pub fn new() -> Self {
        let mut ticker = interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Keepalive { ticker }
    }

    /// Wait until the next ping is due
    pub async fn tick(&mut self) {
        self.ticker.tick().await;
    }

    /// The outbound ping frame (no payload)
    pub fn ping() -> Frame {
        Frame::Ping(Vec::new())
    }

    /// Pure ping/pong policy applied to every inbound frame before any
    /// role-specific handling: pings are answered with a payload-echoing
    /// pong, pongs are consumed, everything else is forwarded.
    pub fn reflex(frame: &Frame) -> Reflex {
        match frame {
            Frame::Ping(payload) => Reflex::Reply(Frame::Pong(payload.clone())),
            Frame::Pong(_) => Reflex::Ignore,
            _ => Reflex::Forward,
        }
    }
}

impl Default for Keepalive {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_is_answered_with_payload_echo() {
        let reflex = Keepalive::reflex(&Frame::Ping(b"abc".to_vec()));
        assert_eq!(reflex, Reflex::Reply(Frame::Pong(b"abc".to_vec())));
    }

    #[test]
    fn pong_is_consumed_silently() {
        assert_eq!(Keepalive::reflex(&Frame::Pong(Vec::new())), Reflex::Ignore);
    }

    #[test]
    fn data_frames_are_forwarded() {
        assert_eq!(
            Keepalive::reflex(&Frame::Text("payload".into())),
            Reflex::Forward
        );
        assert_eq!(Keepalive::reflex(&Frame::Binary(vec![1])), Reflex::Forward);
    }

    #[test]
    fn outbound_ping_has_no_payload() {
        assert_eq!(Keepalive::ping(), Frame::Ping(Vec::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn pings_are_due_every_full_period() {
        let started = Instant::now();
        let mut keepalive = Keepalive::new();

        keepalive.tick().await;
        assert_eq!(started.elapsed(), PING_INTERVAL);

        keepalive.tick().await;
        assert_eq!(started.elapsed(), PING_INTERVAL * 2);
    }
}
