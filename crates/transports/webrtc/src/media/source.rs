//! File-backed media sources
//!
//! Wraps the webrtc IVF and Ogg readers behind a small trait so the
//! pumps can be driven (and tested) independently of the container
//! format. Each source owns its file handle and timing cursor; `rewind`
//! reopens the file from byte zero.

use crate::{Error, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use webrtc::media::io::ivf_reader::{IVFFileHeader, IVFReader};
use webrtc::media::io::ogg_reader::OggReader;

/// Granule positions in Ogg Opus always run at 48 kHz, regardless of the
/// stream's actual sample rate.
const OPUS_GRANULE_RATE: u64 = 48_000;

/// One timed media unit ready to be written to a local track
#[derive(Debug, Clone)]
pub struct MediaUnit {
    /// Encoded payload (one video frame or one audio page)
    pub data: Bytes,

    /// Playout duration of the payload
    pub duration: Duration,
}

/// Sequential producer of timed media units from a loopable source
pub trait MediaSource: Send {
    /// Pacing interval between units
    fn cadence(&self) -> Duration;

    /// Parse the next unit
    ///
    /// `Ok(None)` signals a clean end of source; the caller decides
    /// whether to `rewind` or stop. Any `Err` is unrecoverable for this
    /// source instance.
    fn next_unit(&mut self) -> Result<Option<MediaUnit>>;

    /// Reopen the source from the beginning and reset the timing
    /// reference
    fn rewind(&mut self) -> Result<()>;
}

/// Walk an error's source chain looking for a clean end-of-stream
///
/// The container readers surface EOF as an `UnexpectedEof` io error
/// wrapped somewhere in their error chain; anything else is real
/// corruption.
fn is_end_of_stream(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<std::io::Error>() {
            return io_err.kind() == std::io::ErrorKind::UnexpectedEof;
        }
        current = e.source();
    }
    false
}

/// Looping VP8 video from an IVF container
///
/// The pacing interval comes from the container's declared timebase and
/// doubles as the per-frame playout duration.
pub struct IvfFileSource {
    path: PathBuf,
    reader: IVFReader<BufReader<File>>,
    frame_interval: Duration,
}

impl IvfFileSource {
    /// Open an IVF file and derive the frame interval from its header
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (reader, header) = Self::open_reader(&path)?;

        if header.timebase_denominator == 0 {
            return Err(Error::MediaSourceError(format!(
                "IVF header of {} has a zero timebase denominator",
                path.display()
            )));
        }
        let millis = u64::from(header.timebase_numerator) * 1000
            / u64::from(header.timebase_denominator);
        if millis == 0 {
            return Err(Error::MediaSourceError(format!(
                "IVF timebase of {} is below one millisecond per frame",
                path.display()
            )));
        }

        Ok(Self {
            path,
            reader,
            frame_interval: Duration::from_millis(millis),
        })
    }

    fn open_reader(path: &Path) -> Result<(IVFReader<BufReader<File>>, IVFFileHeader)> {
        let file = File::open(path)?;
        IVFReader::new(BufReader::new(file)).map_err(|e| {
            Error::MediaSourceError(format!(
                "Failed to parse IVF header of {}: {}",
                path.display(),
                e
            ))
        })
    }
}

impl MediaSource for IvfFileSource {
    fn cadence(&self) -> Duration {
        self.frame_interval
    }

    fn next_unit(&mut self) -> Result<Option<MediaUnit>> {
        match self.reader.parse_next_frame() {
            Ok((frame, _header)) => Ok(Some(MediaUnit {
                data: frame.freeze(),
                duration: self.frame_interval,
            })),
            Err(e) if is_end_of_stream(&e) => Ok(None),
            Err(e) => Err(Error::MediaSourceError(format!(
                "Failed to parse IVF frame from {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        let (reader, _header) = Self::open_reader(&self.path)?;
        self.reader = reader;
        Ok(())
    }
}

/// Looping Opus audio from an Ogg container
///
/// Pages are paced at a fixed interval (nominally one 20 ms page per
/// tick); each page's playout duration comes from the granule-position
/// delta. The granule reference resets on rewind so the first page of
/// every loop gets a sane duration.
pub struct OggFileSource {
    path: PathBuf,
    reader: OggReader<BufReader<File>>,
    page_interval: Duration,
    last_granule: u64,
}

impl OggFileSource {
    /// Open an Ogg file with the given fixed pacing interval
    pub fn open(path: impl AsRef<Path>, page_interval: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = Self::open_reader(&path)?;
        Ok(Self {
            path,
            reader,
            page_interval,
            last_granule: 0,
        })
    }

    fn open_reader(path: &Path) -> Result<OggReader<BufReader<File>>> {
        let file = File::open(path)?;
        let (reader, _header) = OggReader::new(BufReader::new(file), true).map_err(|e| {
            Error::MediaSourceError(format!(
                "Failed to parse Ogg header of {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(reader)
    }
}

impl MediaSource for OggFileSource {
    fn cadence(&self) -> Duration {
        self.page_interval
    }

    fn next_unit(&mut self) -> Result<Option<MediaUnit>> {
        match self.reader.parse_next_page() {
            Ok((page, header)) => {
                let duration = granule_delta_duration(self.last_granule, header.granule_position);
                self.last_granule = header.granule_position;
                Ok(Some(MediaUnit {
                    data: page.freeze(),
                    duration,
                }))
            }
            Err(e) if is_end_of_stream(&e) => Ok(None),
            Err(e) => Err(Error::MediaSourceError(format!(
                "Failed to parse Ogg page from {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.reader = Self::open_reader(&self.path)?;
        self.last_granule = 0;
        Ok(())
    }
}

/// Playout duration of a page from consecutive granule positions
fn granule_delta_duration(last: u64, current: u64) -> Duration {
    let samples = current.saturating_sub(last);
    Duration::from_millis(samples * 1000 / OPUS_GRANULE_RATE)
}
