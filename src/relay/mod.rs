//! WebSocket relay subsystem.
//!
//! # Data Flow
//! ```text
//! Client ←── frames ──→ external │ Pump │ internal ←── frames ──→ Backend
//!
//! external reader ──inbound queue──▶ ┐
//!                                    ├─ writer ──▶ internal / external
//! internal reader ──outbound queue─▶ ┘
//! ```
//!
//! # Design Decisions
//! - One reader task per side, one writer task per pump: readers never write,
//!   so no connection sees writes from two tasks
//! - Liveness through deadlines: peers must answer pings within `pong_wait`
//! - The writer is the single join point that closes both connections

pub mod frame;
pub mod pump;
pub mod tracker;

use std::time::Duration;

pub use frame::{Frame, FrameSocket, WireMessage};
pub use pump::{Pump, PumpExit, PumpTasks};
pub use tracker::{RelayGuard, RelayId, RelayTracker};

use crate::config::RelayConfig;

/// Keep-alive settings for a relay instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOptions {
    /// Deadline for writing a single frame.
    pub write_wait: Duration,
    /// Read deadline, refreshed by every pong.
    pub pong_wait: Duration,
    /// Interval between pings to each side. Must be shorter than `pong_wait`.
    pub ping_period: Duration,
    /// Largest accepted message payload in bytes.
    pub max_message_size: usize,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            write_wait: Duration::from_secs(10),
            pong_wait: Duration::from_secs(60),
            ping_period: Duration::from_secs(54),
            max_message_size: 1024,
        }
    }
}

impl From<&RelayConfig> for RelayOptions {
    fn from(config: &RelayConfig) -> Self {
        Self {
            write_wait: Duration::from_millis(config.write_wait_ms),
            pong_wait: Duration::from_millis(config.pong_wait_ms),
            ping_period: Duration::from_millis(config.ping_period_ms),
            max_message_size: config.max_message_size,
        }
    }
}

/// Which connection of a pump a frame or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The client-facing connection.
    External,
    /// The backend connection.
    Internal,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::External => write!(f, "external"),
            Side::Internal => write!(f, "internal"),
        }
    }
}

/// Per-connection relay failures. Terminal for the relay instance only.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("websocket transport error: {0}")]
    Transport(#[source] axum::BoxError),

    #[error("{0} read deadline exceeded")]
    ReadTimeout(Side),

    #[error("{0} write deadline exceeded")]
    WriteTimeout(Side),

    #[error("{side} sent a {size} byte message, limit is {limit}")]
    MessageTooLarge { side: Side, size: usize, limit: usize },
}

impl RelayError {
    pub(crate) fn transport(error: impl Into<axum::BoxError>) -> Self {
        RelayError::Transport(error.into())
    }
}
