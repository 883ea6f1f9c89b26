//! Encoder/muxer boundary driven by a [`WriterSession`](crate::WriterSession)

mod h264_mp4;
pub mod readiness;

pub use h264_mp4::H264Mp4Writer;
pub use readiness::{Readiness, ReadinessNotifier};

use crate::encoder::ffmpeg::DEFAULT_QUEUE_DEPTH;
use crate::pixel_buffer::FrameBuffer;
use crate::schedule::Timestamp;
use crate::{Configuration, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// An encoder writing one video track into one output file
///
/// The writer announces capacity through [`readiness`](AssetWriter::readiness).
/// Frames are appended only while
/// [`is_ready_for_more_media_data`](AssetWriter::is_ready_for_more_media_data)
/// holds, and all calls come from a single thread.
pub trait AssetWriter: Send {
    /// Begin the session at timestamp zero and emit the first readiness signal
    fn start_writing(&mut self) -> Result<()>;

    /// Signal the session waits on between append loops
    fn readiness(&self) -> Readiness;

    /// Whether one more frame can be appended right now
    fn is_ready_for_more_media_data(&self) -> bool;

    /// Append the frame shown at `pts`
    fn append(&mut self, buffer: &Arc<FrameBuffer>, pts: Timestamp) -> Result<()>;

    /// No more frames will be appended
    fn mark_as_finished(&mut self);

    /// Flush the encoder and write the container trailer
    fn finish_writing(self: Box<Self>) -> Result<()>;
}

/// Creates the [`AssetWriter`] for each export
pub trait WriterBackend: Send + Sync {
    fn create_writer(&self, configuration: &Configuration) -> Result<Box<dyn AssetWriter>>;
}

/// Backend encoding H.264 with an ffmpeg process and muxing with the `mp4` crate
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg_path: Option<PathBuf>,
    queue_depth: usize,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegBackend {
    /// Use the first ffmpeg found on `PATH`
    pub fn new() -> Self {
        Self {
            ffmpeg_path: None,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    /// Use a specific ffmpeg executable
    pub fn with_ffmpeg_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.ffmpeg_path = Some(path.into());
        self
    }

    /// Number of frames buffered ahead of the encoder
    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth.max(1);
        self
    }
}

impl WriterBackend for FfmpegBackend {
    fn create_writer(&self, configuration: &Configuration) -> Result<Box<dyn AssetWriter>> {
        Ok(Box::new(H264Mp4Writer::create(
            configuration,
            self.ffmpeg_path.as_deref(),
            self.queue_depth,
        )?))
    }
}
