//! Error types for photovid

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for photovid operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for photovid operations
#[derive(Error, Debug)]
pub enum Error {
    /// Non-positive frame rate or dimensions, empty output path, missing configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An existing output file could not be removed
    #[error("Cannot remove existing output {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The encoder or muxer could not be created
    #[error("Writer setup failed: {0}")]
    Setup(String),

    /// The source image could not be opened or decoded
    #[error("Cannot load image {}: {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// No pixel buffer of the required size could be allocated
    #[error("Cannot allocate a {width}x{height} BGRA pixel buffer")]
    BufferAllocation { width: u32, height: u32 },

    /// The encoder failed while appending or finalizing
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A writer session operation was called in the wrong state
    #[error("Cannot {operation} a writer session in state {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}

impl Error {
    /// The kind of this error, without its payload
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Error::FileSystem { .. } => ErrorKind::FileSystem,
            Error::Setup(_) => ErrorKind::Setup,
            Error::ImageLoad { .. } => ErrorKind::ImageLoad,
            Error::BufferAllocation { .. } => ErrorKind::BufferAllocation,
            Error::Encoding(_) => ErrorKind::Encoding,
            Error::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }
}

/// Payload-free classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidConfiguration,
    FileSystem,
    Setup,
    ImageLoad,
    BufferAllocation,
    Encoding,
    InvalidState,
}

/// Error code for FFI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub enum ErrorCode {
    /// Success
    Ok = 0,
    /// Invalid argument or configuration
    InvalidConfiguration = 1,
    /// Existing output could not be removed
    FileSystemError = 2,
    /// Encoder or muxer could not be created
    SetupError = 3,
    /// Source image could not be decoded
    ImageLoadError = 4,
    /// Pixel buffer could not be allocated
    BufferAllocationError = 5,
    /// Encoder failure
    EncodingError = 6,
    /// Session misuse
    InvalidState = 7,
}

impl From<&Error> for ErrorCode {
    fn from(err: &Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidConfiguration => ErrorCode::InvalidConfiguration,
            ErrorKind::FileSystem => ErrorCode::FileSystemError,
            ErrorKind::Setup => ErrorCode::SetupError,
            ErrorKind::ImageLoad => ErrorCode::ImageLoadError,
            ErrorKind::BufferAllocation => ErrorCode::BufferAllocationError,
            ErrorKind::Encoding => ErrorCode::EncodingError,
            ErrorKind::InvalidState => ErrorCode::InvalidState,
        }
    }
}
