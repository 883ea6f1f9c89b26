//! ISO-BMFF muxer (MP4, MOV and M4V brands)

use super::{Muxer, MuxerConfig};
use crate::encoder::Packet;
use crate::{Container, Error, Result};
use mp4::{Mp4Config, Mp4Writer, TrackConfig};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use tracing::debug;

/// Movie timescale (milliseconds)
const MOVIE_TIMESCALE: u32 = 1000;

/// MP4 muxer (H.264 only)
pub struct Mp4Muxer<W: Write + Seek = BufWriter<File>> {
    writer: Mp4Writer<W>,
    track_id: Option<u32>,
    sample_count: u64,
}

impl Mp4Muxer {
    pub fn new(file: File, container: Container, config: MuxerConfig) -> Result<Self> {
        Self::with_writer(BufWriter::new(file), container, config)
    }
}

impl<W: Write + Seek> Mp4Muxer<W> {
    pub fn with_writer(writer: W, container: Container, config: MuxerConfig) -> Result<Self> {
        let mp4_config = Mp4Config {
            major_brand: str_to_brand(major_brand(container)),
            minor_version: 512,
            compatible_brands: compatible_brands(container)
                .iter()
                .map(|b| str_to_brand(b))
                .collect(),
            timescale: MOVIE_TIMESCALE,
        };

        let mut mp4_writer = Mp4Writer::write_start(writer, &mp4_config)
            .map_err(|e| Error::Encoding(format!("Failed to create MP4 writer: {}", e)))?;

        let track_id = match (config.sps, config.pps) {
            (Some(sps), Some(pps)) => {
                let width = u16::try_from(config.width)
                    .map_err(|_| Error::Encoding(format!("Width {} too large", config.width)))?;
                let height = u16::try_from(config.height)
                    .map_err(|_| Error::Encoding(format!("Height {} too large", config.height)))?;

                // Add video track for H.264
                let track_config = TrackConfig {
                    track_type: mp4::TrackType::Video,
                    timescale: config.fps,
                    language: String::from("und"),
                    media_conf: mp4::MediaConfig::AvcConfig(mp4::AvcConfig {
                        width,
                        height,
                        seq_param_set: sps,
                        pic_param_set: pps,
                    }),
                };

                mp4_writer
                    .add_track(&track_config)
                    .map_err(|e| Error::Encoding(format!("Failed to add track: {}", e)))?;

                // Track ID is always 1 for single track
                Some(1)
            }
            _ => {
                debug!("No parameter sets, writing a movie without tracks");
                None
            }
        };

        Ok(Self {
            writer: mp4_writer,
            track_id,
            sample_count: 0,
        })
    }

    pub fn into_writer(self) -> W {
        self.writer.into_writer()
    }

    fn write_sample(&mut self, packet: &Packet) -> Result<()> {
        let track_id = self
            .track_id
            .ok_or_else(|| Error::Encoding("Packet without a video track".to_string()))?;

        // Track timescale is the frame rate: sample N starts at N, lasts 1
        let sample = mp4::Mp4Sample {
            start_time: self.sample_count,
            duration: 1,
            rendering_offset: 0,
            is_sync: packet.is_keyframe,
            bytes: mp4::Bytes::copy_from_slice(&packet.data),
        };

        self.writer
            .write_sample(track_id, &sample)
            .map_err(|e| Error::Encoding(format!("Failed to write sample: {}", e)))?;

        self.sample_count += 1;
        Ok(())
    }

    fn write_end(&mut self) -> Result<()> {
        self.writer
            .write_end()
            .map_err(|e| Error::Encoding(format!("Failed to finalize container: {}", e)))
    }
}

impl<W: Write + Seek + Send> Muxer for Mp4Muxer<W> {
    fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        self.write_sample(packet)
    }

    fn finalize(mut self: Box<Self>) -> Result<()> {
        self.write_end()?;
        self.writer
            .into_writer()
            .flush()
            .map_err(|e| Error::Encoding(format!("Failed to flush output: {}", e)))
    }
}

fn major_brand(container: Container) -> &'static str {
    match container {
        Container::Mp4 => "isom",
        Container::Mov => "qt  ",
        Container::M4v => "M4V ",
    }
}

fn compatible_brands(container: Container) -> &'static [&'static str] {
    match container {
        Container::Mp4 => &["isom", "iso2", "avc1", "mp41"],
        Container::Mov => &["qt  "],
        Container::M4v => &["M4V ", "M4A ", "mp42", "isom"],
    }
}

fn str_to_brand(s: &str) -> mp4::FourCC {
    let bytes = s.as_bytes();
    mp4::FourCC {
        value: [
            bytes.first().copied().unwrap_or(b' '),
            bytes.get(1).copied().unwrap_or(b' '),
            bytes.get(2).copied().unwrap_or(b' '),
            bytes.get(3).copied().unwrap_or(b' '),
        ],
    }
}
