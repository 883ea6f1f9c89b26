//! H.264 encoding

pub mod annexb;
pub mod ffmpeg;

/// Average bitrate target in bits per second
pub const AVERAGE_BITRATE: u32 = 6_000_000;

/// Encoded video packet (one access unit)
#[derive(Debug, Clone)]
pub struct Packet {
    /// NAL units, each prefixed with its 4-byte big-endian length
    pub data: Vec<u8>,
    /// Is this a keyframe?
    pub is_keyframe: bool,
}

/// H.264 profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Baseline,
    Main,
    High,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Baseline => "baseline",
            Profile::Main => "main",
            Profile::High => "high",
        }
    }
}

/// Encoder configuration
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Frame rate (frames per second)
    pub fps: u32,
    /// Average bitrate in bits per second
    pub bitrate: u32,
    /// Profile; the level is chosen by the encoder
    pub profile: Profile,
}

impl EncoderConfig {
    /// Settings used for every export: 6 Mbit/s, High profile, automatic level
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            bitrate: AVERAGE_BITRATE,
            profile: Profile::High,
        }
    }

    /// Coded size; 4:2:0 chroma needs even dimensions
    pub fn coded_size(&self) -> (u32, u32) {
        (self.width.next_multiple_of(2), self.height.next_multiple_of(2))
    }
}

/// Elementary stream split into parameter sets and access units
#[derive(Debug, Default)]
pub struct EncodedStream {
    /// Sequence Parameter Set, including its NAL header byte
    pub sps: Option<Vec<u8>>,
    /// Picture Parameter Set, including its NAL header byte
    pub pps: Option<Vec<u8>>,
    /// Access units in decode order
    pub packets: Vec<Packet>,
}
