//! Per-session connection event loop

use crate::session::SessionRegistry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::track::track_remote::TrackRemote;

/// Events emitted by the transport layer for one session
///
/// Delivered asynchronously, in no defined order relative to the HTTP
/// response that created the session, and possibly after teardown.
#[derive(Debug)]
pub enum SessionEvent {
    /// A local ICE candidate became available for delivery to the client
    CandidateDiscovered(RTCIceCandidateInit),

    /// The ICE connection state changed
    ConnectivityChanged(RTCIceConnectionState),

    /// The remote peer opened a media track towards us
    InboundTrackOpened(Arc<TrackRemote>),
}

/// Spawn the event loop for one session
///
/// The loop owns all registry mutation driven by connection callbacks:
/// mailbox appends on candidate discovery, session removal on terminal
/// ICE states, and drain tasks for inbound tracks. It ends when every
/// event sender has been dropped.
pub(crate) fn spawn_event_loop(
    session_id: String,
    registry: Arc<SessionRegistry>,
    mut events: mpsc::Receiver<SessionEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::CandidateDiscovered(candidate) => {
                    debug!(
                        session_id = %session_id,
                        candidate = %candidate.candidate,
                        "local candidate discovered"
                    );
                    // Silently dropped if the session is already gone.
                    registry.push_candidate(&session_id, candidate);
                }
                SessionEvent::ConnectivityChanged(state) => {
                    info!(session_id = %session_id, ?state, "ICE connection state changed");
                    if matches!(
                        state,
                        RTCIceConnectionState::Failed | RTCIceConnectionState::Disconnected
                    ) {
                        terminate_session(&session_id, &registry).await;
                    }
                }
                SessionEvent::InboundTrackOpened(track) => {
                    info!(
                        session_id = %session_id,
                        kind = %track.kind(),
                        "remote track opened"
                    );
                    spawn_track_drain(session_id.clone(), track);
                }
            }
        }
        debug!(session_id = %session_id, "session event loop ended");
    })
}

/// Remove the session and close its connection
///
/// Duplicate terminal events hit the idempotent remove and do nothing.
/// Closing the connection unblocks any drain task still reading from it;
/// the media pumps notice the registry absence on their next tick.
async fn terminate_session(session_id: &str, registry: &SessionRegistry) {
    let Some(connection) = registry.remove(session_id) else {
        return;
    };
    info!(session_id = %session_id, "session removed after terminal ICE state");
    if let Err(e) = connection.close().await {
        warn!(session_id = %session_id, "Failed to close connection: {}", e);
    }
}

/// Read and discard inbound RTP until the track ends
///
/// Received media is not forwarded anywhere; draining keeps the
/// transport's feedback machinery fed and notices track termination.
fn spawn_track_drain(session_id: String, track: Arc<TrackRemote>) {
    tokio::spawn(async move {
        while track.read_rtp().await.is_ok() {}
        debug!(session_id = %session_id, "remote track drain ended");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use webrtc::api::APIBuilder;
    use webrtc::peer_connection::configuration::RTCConfiguration;

    async fn registry_with_session(session_id: &str) -> Arc<SessionRegistry> {
        let registry = Arc::new(SessionRegistry::new());
        let api = APIBuilder::new().build();
        let connection = api
            .new_peer_connection(RTCConfiguration::default())
            .await
            .unwrap();
        registry.register(session_id, Arc::new(connection));
        registry
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within one second");
    }

    #[tokio::test]
    async fn test_discovered_candidates_land_in_mailbox() {
        let registry = registry_with_session("s1").await;
        let (tx, rx) = mpsc::channel(8);
        spawn_event_loop("s1".to_string(), Arc::clone(&registry), rx);

        tx.send(SessionEvent::CandidateDiscovered(RTCIceCandidateInit {
            candidate: "a".to_string(),
            ..Default::default()
        }))
        .await
        .unwrap();

        let registry_clone = Arc::clone(&registry);
        wait_until(move || !registry_clone.drain_candidates("s1").is_empty()).await;
    }

    #[tokio::test]
    async fn test_failed_state_removes_session() {
        let registry = registry_with_session("s1").await;
        let (tx, rx) = mpsc::channel(8);
        spawn_event_loop("s1".to_string(), Arc::clone(&registry), rx);

        tx.send(SessionEvent::ConnectivityChanged(
            RTCIceConnectionState::Failed,
        ))
        .await
        .unwrap();

        let registry_clone = Arc::clone(&registry);
        wait_until(move || !registry_clone.contains("s1")).await;
    }

    #[tokio::test]
    async fn test_disconnected_state_removes_session() {
        let registry = registry_with_session("s1").await;
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_event_loop("s1".to_string(), Arc::clone(&registry), rx);

        tx.send(SessionEvent::ConnectivityChanged(
            RTCIceConnectionState::Disconnected,
        ))
        .await
        .unwrap();
        // A duplicate terminal event must be harmless.
        tx.send(SessionEvent::ConnectivityChanged(
            RTCIceConnectionState::Failed,
        ))
        .await
        .unwrap();

        let registry_clone = Arc::clone(&registry);
        wait_until(move || !registry_clone.contains("s1")).await;

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_connected_state_keeps_session() {
        let registry = registry_with_session("s1").await;
        let (tx, rx) = mpsc::channel(8);
        spawn_event_loop("s1".to_string(), Arc::clone(&registry), rx);

        tx.send(SessionEvent::ConnectivityChanged(
            RTCIceConnectionState::Connected,
        ))
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(registry.contains("s1"));
    }
}
