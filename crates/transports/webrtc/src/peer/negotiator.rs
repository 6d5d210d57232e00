//! Negotiation orchestration
//!
//! One `Negotiator` per server instance. It owns the full offer flow —
//! connection creation, registration, callback wiring, local tracks,
//! answer generation, pump startup — plus remote candidate forwarding
//! and local candidate polling.

use crate::config::RelayConfig;
use crate::media::{IvfFileSource, MediaPump, OggFileSource, SampleTrackSink};
use crate::peer::connection::{create_peer_connection, wire_connection_events};
use crate::session::{spawn_event_loop, SessionRegistry};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

const SESSION_EVENT_BUFFER: usize = 32;

/// Orchestrates offer/answer negotiation and candidate brokering
pub struct Negotiator {
    config: Arc<RelayConfig>,
    registry: Arc<SessionRegistry>,
}

impl Negotiator {
    pub fn new(config: Arc<RelayConfig>, registry: Arc<SessionRegistry>) -> Self {
        Self { config, registry }
    }

    /// The session registry backing this negotiator
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Handle an inbound offer
    ///
    /// Creates and registers the connection, wires its events, attaches
    /// the local video and audio tracks, produces the answer, and starts
    /// both media pumps. The answer is returned as created; ICE gathering
    /// completes in the background and late candidates are delivered
    /// through the mailbox.
    pub async fn handle_offer(
        &self,
        session_id: &str,
        offer: RTCSessionDescription,
    ) -> Result<RTCSessionDescription> {
        info!(session_id = %session_id, "handling offer");

        let connection = create_peer_connection(&self.config).await?;

        // Register before wiring callbacks: a state change or candidate
        // must never observe an unregistered session.
        self.registry.register(session_id, Arc::clone(&connection));

        let (event_tx, event_rx) = mpsc::channel(SESSION_EVENT_BUFFER);
        let _ = spawn_event_loop(session_id.to_string(), Arc::clone(&self.registry), event_rx);
        wire_connection_events(&connection, event_tx);

        let video_track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                ..Default::default()
            },
            "video".to_owned(),
            "loopstream".to_owned(),
        ));
        let video_sender = connection
            .add_track(Arc::clone(&video_track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::MediaTrackError(format!("Failed to add video track: {}", e)))?;
        spawn_rtcp_drain(session_id.to_string(), video_sender);

        let audio_track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            "audio".to_owned(),
            "loopstream".to_owned(),
        ));
        let audio_sender = connection
            .add_track(Arc::clone(&audio_track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::MediaTrackError(format!("Failed to add audio track: {}", e)))?;
        spawn_rtcp_drain(session_id.to_string(), audio_sender);

        connection
            .set_remote_description(offer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote description: {}", e)))?;

        let answer = connection
            .create_answer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create answer: {}", e)))?;

        connection
            .set_local_description(answer.clone())
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))?;

        self.spawn_video_pump(session_id, video_track);
        self.spawn_audio_pump(session_id, audio_track);

        debug!(session_id = %session_id, "answer generated");
        Ok(answer)
    }

    /// Forward a remote candidate to the session's connection
    pub async fn add_remote_candidate(
        &self,
        session_id: &str,
        candidate: RTCIceCandidateInit,
    ) -> Result<()> {
        let connection = self
            .registry
            .lookup(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        debug!(
            session_id = %session_id,
            candidate = %candidate.candidate,
            "adding remote candidate"
        );

        connection
            .add_ice_candidate(candidate)
            .await
            .map_err(|e| Error::IceCandidateError(format!("Failed to add ICE candidate: {}", e)))
    }

    /// Drain the pending local candidates for a session
    ///
    /// Unknown ids yield an empty list; polling is not an error path.
    pub fn poll_local_candidates(&self, session_id: &str) -> Vec<RTCIceCandidateInit> {
        self.registry.drain_candidates(session_id)
    }

    fn spawn_video_pump(&self, session_id: &str, track: Arc<TrackLocalStaticSample>) {
        let path = self.config.video_source.clone();
        let registry = Arc::clone(&self.registry);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            // Opened inside the task: a source failure is logged, never
            // surfaced to the HTTP layer.
            match IvfFileSource::open(&path) {
                Ok(source) => {
                    MediaPump::new(session_id, "video", registry, source, SampleTrackSink::new(track))
                        .run()
                        .await
                }
                Err(e) => warn!(
                    session_id = %session_id,
                    path = %path.display(),
                    "Failed to open video source: {}",
                    e
                ),
            }
        });
    }

    fn spawn_audio_pump(&self, session_id: &str, track: Arc<TrackLocalStaticSample>) {
        let path = self.config.audio_source.clone();
        let page_interval = Duration::from_millis(self.config.audio_page_ms);
        let registry = Arc::clone(&self.registry);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            match OggFileSource::open(&path, page_interval) {
                Ok(source) => {
                    MediaPump::new(session_id, "audio", registry, source, SampleTrackSink::new(track))
                        .run()
                        .await
                }
                Err(e) => warn!(
                    session_id = %session_id,
                    path = %path.display(),
                    "Failed to open audio source: {}",
                    e
                ),
            }
        });
    }
}

/// Read and discard RTCP feedback so the interceptors keep running
fn spawn_rtcp_drain(session_id: String, sender: Arc<RTCRtpSender>) {
    tokio::spawn(async move {
        let mut rtcp_buf = vec![0u8; 1500];
        while sender.read(&mut rtcp_buf).await.is_ok() {}
        debug!(session_id = %session_id, "rtcp drain ended");
    });
}
