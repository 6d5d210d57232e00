//! WebRTC signaling and looping file-backed media relay
//!
//! A browser peer posts an SDP offer over HTTP; the server answers and
//! streams looping VP8 video (IVF) and Opus audio (Ogg) back to it,
//! paced to real time. ICE candidates flow asymmetrically: the client
//! submits its candidates directly, and polls a per-session mailbox for
//! the server's.
//!
//! # Architecture
//!
//! ```text
//!  HTTP client ──► SignalingServer ──► Negotiator ──► RTCPeerConnection
//!                        │                 │                │
//!                        │                 ▼                ▼
//!                        └────────► SessionRegistry ◄── session events
//!                                          ▲
//!                            MediaPump ────┘ (liveness poll per tick)
//!                          (IVF video / Ogg audio)
//! ```
//!
//! The `SessionRegistry` is the single source of truth for session
//! liveness: the event loop removes a session on terminal ICE states,
//! and every other task discovers the removal by polling the registry
//! rather than by being signalled.
//!
//! # Example
//!
//! ```no_run
//! use loopstream_webrtc::{RelayConfig, SessionRegistry, SignalingServer};
//! use std::sync::Arc;
//!
//! # async fn run() -> loopstream_webrtc::Result<()> {
//! let config = Arc::new(RelayConfig::default());
//! config.validate()?;
//!
//! let registry = Arc::new(SessionRegistry::new());
//! SignalingServer::new("0.0.0.0:8080", config, registry)
//!     .serve()
//!     .await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod media;
pub mod session;
pub mod signaling;

mod peer;

pub use config::{RelayConfig, TurnServerConfig};
pub use error::{Error, Result};
pub use peer::Negotiator;
pub use session::{SessionEvent, SessionRegistry};
pub use signaling::SignalingServer;

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::version().is_empty());
    }
}
