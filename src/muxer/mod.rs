//! Video container muxers

pub mod mp4;

use crate::encoder::Packet;
use crate::{Container, Result};
use std::fs::File;

/// Video muxer trait
pub trait Muxer: Send {
    /// Write a video packet
    fn write_packet(&mut self, packet: &Packet) -> Result<()>;

    /// Finalize and close the output file
    fn finalize(self: Box<Self>) -> Result<()>;
}

/// Muxer configuration
#[derive(Debug, Clone)]
pub struct MuxerConfig {
    /// Coded frame width
    pub width: u32,
    /// Coded frame height
    pub height: u32,
    /// Frame rate (fps); also the track timescale
    pub fps: u32,
    /// Sequence Parameter Set; `None` writes a movie without tracks
    pub sps: Option<Vec<u8>>,
    /// Picture Parameter Set
    pub pps: Option<Vec<u8>>,
}

/// Create a muxer writing `container` into an already opened file
pub fn create_muxer(container: Container, file: File, config: MuxerConfig) -> Result<Box<dyn Muxer>> {
    Ok(Box::new(mp4::Mp4Muxer::new(file, container, config)?))
}
