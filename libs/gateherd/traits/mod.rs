//! # Gateherd Traits
//!
//! Core traits and types shared across the library:
//!
//! - **Transport / FrameSink / FrameStream**: capability seam over the
//!   socket layer
//! - **FrameHandler**: role-specific handling of inbound data frames
//! - **GateherdError / ConfigError**: error taxonomy
//!
//! The orchestration layer is written entirely against these seams, so a
//! test (or an alternative socket stack) can stand in for the real
//! WebSocket library without touching supervision code.

pub mod error;
pub mod handler;
pub mod transport;

// Re-export commonly used types
pub use error::{ConfigError, GateherdError, Result};
pub use handler::{FrameHandler, NoOpFrameHandler};
pub use transport::{Frame, FrameSink, FrameStream, Transport};
