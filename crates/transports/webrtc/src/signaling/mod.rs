//! HTTP signaling surface

mod http;

pub use http::SignalingServer;
