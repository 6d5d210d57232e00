//! Peer connection construction and negotiation

mod connection;
mod negotiator;

pub use negotiator::Negotiator;
