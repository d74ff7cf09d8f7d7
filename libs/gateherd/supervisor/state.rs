use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of one client instance.
///
/// `NotStarted -> Starting -> Running -> Stopped`, with `Starting ->
/// Failed` when a child fails to start and `Running -> Failed` when a
/// restart hits a non-recoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InstanceState {
    NotStarted = 0,
    Starting = 1,
    Running = 2,
    Failed = 3,
    Stopped = 4,
}

impl InstanceState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => InstanceState::NotStarted,
            1 => InstanceState::Starting,
            2 => InstanceState::Running,
            3 => InstanceState::Failed,
            _ => InstanceState::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::NotStarted => "not_started",
            InstanceState::Starting => "starting",
            InstanceState::Running => "running",
            InstanceState::Failed => "failed",
            InstanceState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free instance state shared between the supervisor task and the
/// client handle.
pub struct AtomicInstanceState {
    state: AtomicU8,
}

impl AtomicInstanceState {
    pub fn new(initial: InstanceState) -> Self {
        AtomicInstanceState {
            state: AtomicU8::new(initial as u8),
        }
    }

    pub fn get(&self) -> InstanceState {
        InstanceState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, state: InstanceState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.get() == InstanceState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_the_atomic() {
        let state = AtomicInstanceState::new(InstanceState::NotStarted);
        assert_eq!(state.get(), InstanceState::NotStarted);
        assert!(!state.is_running());

        state.set(InstanceState::Starting);
        state.set(InstanceState::Running);
        assert!(state.is_running());

        state.set(InstanceState::Stopped);
        assert_eq!(state.get(), InstanceState::Stopped);
    }

    #[test]
    fn display_labels() {
        assert_eq!(InstanceState::Running.to_string(), "running");
        assert_eq!(InstanceState::Failed.to_string(), "failed");
    }
}
