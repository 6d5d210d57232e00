//! Local track sinks

use crate::media::MediaUnit;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use webrtc::media::Sample;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Destination for paced media units
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Deliver one unit
    async fn write_unit(&self, unit: MediaUnit) -> Result<()>;
}

/// Writes units as timed samples onto a webrtc local track
pub struct SampleTrackSink {
    track: Arc<TrackLocalStaticSample>,
}

impl SampleTrackSink {
    pub fn new(track: Arc<TrackLocalStaticSample>) -> Self {
        Self { track }
    }
}

#[async_trait]
impl MediaSink for SampleTrackSink {
    async fn write_unit(&self, unit: MediaUnit) -> Result<()> {
        self.track
            .write_sample(&Sample {
                data: unit.data,
                duration: unit.duration,
                ..Default::default()
            })
            .await
            .map_err(|e| Error::MediaTrackError(format!("Failed to write sample: {}", e)))
    }
}
