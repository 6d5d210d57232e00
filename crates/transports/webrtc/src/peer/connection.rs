//! Peer connection factory and callback wiring

use crate::config::RelayConfig;
use crate::session::SessionEvent;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::ice::mdns::MulticastDnsMode;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

/// Build a peer connection configured from the relay config
pub(crate) async fn create_peer_connection(
    config: &RelayConfig,
) -> Result<Arc<RTCPeerConnection>> {
    // MediaEngine with default codecs (Opus for audio, VP8/VP9/H.264 for
    // video)
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_default_codecs()
        .map_err(|e| Error::WebRtcError(format!("Failed to register codecs: {}", e)))?;

    let interceptor_registry = register_default_interceptors(Default::default(), &mut media_engine)
        .map_err(|e| Error::WebRtcError(format!("Failed to register interceptors: {}", e)))?;

    // Query-only mDNS: resolve .local candidates from browsers without
    // advertising our own.
    let mut setting_engine = SettingEngine::default();
    setting_engine.set_ice_multicast_dns_mode(MulticastDnsMode::QueryOnly);

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(interceptor_registry)
        .with_setting_engine(setting_engine)
        .build();

    // Configure ICE servers (STUN/TURN)
    let ice_servers: Vec<RTCIceServer> = config
        .stun_servers
        .iter()
        .map(|url| RTCIceServer {
            urls: vec![url.clone()],
            ..Default::default()
        })
        .chain(config.turn_servers.iter().map(|turn| {
            #[allow(clippy::needless_update)]
            RTCIceServer {
                urls: vec![turn.url.clone()],
                username: turn.username.clone(),
                credential: turn.credential.clone(),
                ..Default::default()
            }
        }))
        .collect();

    let rtc_config = RTCConfiguration {
        ice_servers,
        ..Default::default()
    };

    let connection = api
        .new_peer_connection(rtc_config)
        .await
        .map_err(|e| Error::WebRtcError(format!("Failed to create peer connection: {}", e)))?;

    Ok(Arc::new(connection))
}

/// Forward transport callbacks into the session event channel
///
/// Wired after the session is registered, so no event can observe an
/// unregistered session. Send failures are ignored: a closed channel
/// just means the event loop (and the session) is gone.
pub(crate) fn wire_connection_events(
    connection: &RTCPeerConnection,
    events: mpsc::Sender<SessionEvent>,
) {
    let candidate_tx = events.clone();
    connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        let candidate_tx = candidate_tx.clone();
        Box::pin(async move {
            // None marks the end of gathering.
            let Some(candidate) = candidate else { return };
            match candidate.to_json() {
                Ok(init) => {
                    let _ = candidate_tx
                        .send(SessionEvent::CandidateDiscovered(init))
                        .await;
                }
                Err(e) => warn!("Failed to serialize local candidate: {}", e),
            }
        })
    }));

    let state_tx = events.clone();
    connection.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
        let state_tx = state_tx.clone();
        Box::pin(async move {
            let _ = state_tx
                .send(SessionEvent::ConnectivityChanged(state))
                .await;
        })
    }));

    let track_tx = events;
    connection.on_track(Box::new(
        move |track: Arc<TrackRemote>,
              _receiver: Arc<RTCRtpReceiver>,
              _transceiver: Arc<RTCRtpTransceiver>| {
            let track_tx = track_tx.clone();
            Box::pin(async move {
                let _ = track_tx.send(SessionEvent::InboundTrackOpened(track)).await;
            })
        },
    ));
}
