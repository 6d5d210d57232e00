//! Session store and per-session candidate mailbox

use parking_lot::RwLock;
use std::collections::HashMap;
use std::mem;
use std::sync::Arc;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::RTCPeerConnection;

/// Per-session state held by the registry
struct SessionEntry {
    /// Connection handle for the session
    connection: Arc<RTCPeerConnection>,

    /// Locally discovered candidates not yet delivered to the client
    pending_candidates: Vec<RTCIceCandidateInit>,
}

/// Registry of live sessions
///
/// The single source of truth for session liveness. Holds the connection
/// handle and the undelivered local candidates of each session under one
/// lock, so a liveness check and a candidate append cannot interleave
/// with a removal.
///
/// The lock is synchronous (`parking_lot`) and is never held across an
/// await point.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session
    ///
    /// A re-submitted id silently replaces the previous entry; session id
    /// uniqueness is the client's responsibility.
    pub fn register(&self, session_id: &str, connection: Arc<RTCPeerConnection>) {
        let mut sessions = self.sessions.write();
        sessions.insert(
            session_id.to_string(),
            SessionEntry {
                connection,
                pending_candidates: Vec::new(),
            },
        );
    }

    /// Get the connection handle for a session, if it is still alive
    pub fn lookup(&self, session_id: &str) -> Option<Arc<RTCPeerConnection>> {
        self.sessions
            .read()
            .get(session_id)
            .map(|entry| Arc::clone(&entry.connection))
    }

    /// Whether the session is currently alive
    ///
    /// Media pumps poll this on every pacing tick instead of caching
    /// liveness.
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Remove a session, returning its connection handle if one existed
    ///
    /// Idempotent: removing an unknown or already-removed id returns
    /// `None`.
    pub fn remove(&self, session_id: &str) -> Option<Arc<RTCPeerConnection>> {
        self.sessions
            .write()
            .remove(session_id)
            .map(|entry| entry.connection)
    }

    /// Append a locally discovered candidate to the session's mailbox
    ///
    /// A no-op for unknown ids: candidate discovery may race session
    /// teardown.
    pub fn push_candidate(&self, session_id: &str, candidate: RTCIceCandidateInit) {
        let mut sessions = self.sessions.write();
        if let Some(entry) = sessions.get_mut(session_id) {
            entry.pending_candidates.push(candidate);
        }
    }

    /// Drain the session's mailbox
    ///
    /// Destructive read: a second drain without intervening discovery
    /// returns an empty list, as does any unknown id.
    pub fn drain_candidates(&self, session_id: &str) -> Vec<RTCIceCandidateInit> {
        let mut sessions = self.sessions.write();
        sessions
            .get_mut(session_id)
            .map(|entry| mem::take(&mut entry.pending_candidates))
            .unwrap_or_default()
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}
