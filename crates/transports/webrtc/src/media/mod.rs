//! Looping file-backed media: sources, sinks and the pacing pump

mod pump;
mod sink;
mod source;

pub use pump::MediaPump;
pub use sink::{MediaSink, SampleTrackSink};
pub use source::{IvfFileSource, MediaSource, MediaUnit, OggFileSource};
