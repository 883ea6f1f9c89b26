//! photovid - Render a single still image into an H.264 video
//!
//! The image is decoded and rendered once into a BGRA pixel buffer, which is then
//! appended to the encoder at every presentation timestamp of the requested
//! duration. Frames are supplied only when the encoder signals readiness.
//!
//! ```no_run
//! use photovid::{Configuration, Container, Dimensions, Exporter};
//!
//! let mut exporter = Exporter::new();
//! exporter.configure(
//!     Configuration::new("out.mp4", Container::Mp4, Dimensions::new(1920, 1080))
//!         .with_frame_rate(25),
//! )?;
//! let output = exporter.export_blocking("photo.jpg", 5.0)?;
//! println!("wrote {}", output.display());
//! # Ok::<(), photovid::Error>(())
//! ```

pub mod encoder;
pub mod error;
pub mod exporter;
pub mod ffi;
pub mod muxer;
pub mod pixel_buffer;
pub mod schedule;
pub mod session;
pub mod writer;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use error::{Error, ErrorKind, Result};
pub use exporter::{ExportHandle, Exporter};
pub use pixel_buffer::{FrameBuffer, PixelBufferFactory};
pub use schedule::{FrameSchedule, Timestamp};
pub use session::{SessionState, WriterSession};
pub use writer::{AssetWriter, FfmpegBackend, WriterBackend};

/// Default frame rate for exported videos
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Container format types
///
/// Every container carries a single H.264 track and differs only in its brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub enum Container {
    /// ISO base media file (`.mp4`)
    #[default]
    Mp4 = 0,
    /// QuickTime movie (`.mov`)
    Mov = 1,
    /// iTunes video (`.m4v`)
    M4v = 2,
}

impl Container {
    /// File extension commonly used for this container
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mov => "mov",
            Container::M4v => "m4v",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Container {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" => Ok(Container::Mp4),
            "mov" | "qt" => Ok(Container::Mov),
            "m4v" => Ok(Container::M4v),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown container format `{other}`"
            ))),
        }
    }
}

/// Frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Export configuration
///
/// Built once by the caller and immutable afterwards. When exporting, the
/// dimensions are replaced by the natural size of the source image.
///
/// H.264 4:2:0 needs even frame sizes, so an odd width or height is encoded
/// with one black column or row of padding and the track declares the padded
/// size (a 101x75 image becomes a 102x76 video).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    output_path: PathBuf,
    container: Container,
    dimensions: Dimensions,
    frame_rate: u32,
}

impl Configuration {
    /// Create a configuration using the default frame rate of 30 fps
    pub fn new<P: Into<PathBuf>>(output_path: P, container: Container, dimensions: Dimensions) -> Self {
        Self {
            output_path: output_path.into(),
            container,
            dimensions,
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }

    /// Use a different frame rate
    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Copy of this configuration with other frame dimensions
    pub fn with_dimensions(&self, dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            ..self.clone()
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn container(&self) -> Container {
        self.container
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfiguration(
                "output path is empty".to_string(),
            ));
        }
        if self.frame_rate == 0 {
            return Err(Error::InvalidConfiguration(
                "frame rate must be positive".to_string(),
            ));
        }
        if self.dimensions.width == 0 || self.dimensions.height == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "frame dimensions must be positive, got {}",
                self.dimensions
            )));
        }
        Ok(())
    }
}

/// Check if H.264 encoding is available, optionally with a specific ffmpeg executable
pub fn available(ffmpeg_path: Option<&Path>) -> Result<()> {
    encoder::ffmpeg::check_available(ffmpeg_path)
}
