use super::{AssetWriter, Readiness};
use crate::encoder::ffmpeg::FfmpegEncoder;
use crate::encoder::EncoderConfig;
use crate::muxer::{create_muxer, MuxerConfig};
use crate::pixel_buffer::FrameBuffer;
use crate::schedule::Timestamp;
use crate::{Configuration, Container, Dimensions, Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// H.264 track in an ISO-BMFF container
///
/// The output file is created once the encoder process is running; the
/// container is written in `finish_writing` once the encoder has produced its
/// parameter sets.
pub struct H264Mp4Writer {
    encoder: FfmpegEncoder,
    file: File,
    output_path: PathBuf,
    container: Container,
    dimensions: Dimensions,
    frame_rate: u32,
    next_frame: u64,
    started: bool,
}

impl H264Mp4Writer {
    pub fn create(
        configuration: &Configuration,
        ffmpeg_path: Option<&Path>,
        queue_depth: usize,
    ) -> Result<Self> {
        let dimensions = configuration.dimensions();
        let encoder_config =
            EncoderConfig::new(dimensions.width, dimensions.height, configuration.frame_rate());

        let (coded_width, coded_height) = encoder_config.coded_size();
        if coded_width > u16::MAX as u32 || coded_height > u16::MAX as u32 {
            return Err(Error::Setup(format!(
                "{} exceeds the largest H.264 track size",
                dimensions
            )));
        }
        if (coded_width, coded_height) != (dimensions.width, dimensions.height) {
            warn!(
                %dimensions,
                coded_width, coded_height, "Padding odd frame size for 4:2:0 encoding"
            );
        }

        // The encoder comes up first so a setup failure leaves no output behind
        let encoder = FfmpegEncoder::new(encoder_config, ffmpeg_path, queue_depth)?;

        let output_path = configuration.output_path().to_path_buf();
        let file = File::create(&output_path).map_err(|e| {
            Error::Setup(format!(
                "Cannot create output {}: {}",
                output_path.display(),
                e
            ))
        })?;

        Ok(Self {
            encoder,
            file,
            output_path,
            container: configuration.container(),
            dimensions,
            frame_rate: configuration.frame_rate(),
            next_frame: 0,
            started: false,
        })
    }
}

impl AssetWriter for H264Mp4Writer {
    fn start_writing(&mut self) -> Result<()> {
        self.started = true;
        self.encoder.signal_ready();
        Ok(())
    }

    fn readiness(&self) -> Readiness {
        self.encoder.readiness()
    }

    fn is_ready_for_more_media_data(&self) -> bool {
        self.started && self.encoder.is_ready()
    }

    fn append(&mut self, buffer: &Arc<FrameBuffer>, pts: Timestamp) -> Result<()> {
        if !self.started {
            return Err(Error::Encoding("Append before writing started".to_string()));
        }
        if pts.timescale() != self.frame_rate || pts.value() != self.next_frame {
            return Err(Error::Encoding(format!(
                "Expected frame {}/{}, got {}",
                self.next_frame, self.frame_rate, pts
            )));
        }
        if buffer.dimensions() != self.dimensions {
            return Err(Error::Encoding(format!(
                "Buffer is {}, track is {}",
                buffer.dimensions(),
                self.dimensions
            )));
        }

        self.encoder.submit(Arc::clone(buffer))?;
        self.next_frame += 1;
        trace!(%pts, "Appended frame");
        Ok(())
    }

    fn mark_as_finished(&mut self) {
        self.encoder.close_input();
    }

    fn finish_writing(self: Box<Self>) -> Result<()> {
        let this = *self;
        let (coded_width, coded_height) = this.encoder.config().coded_size();
        let stream = this.encoder.finish()?;

        if this.next_frame > 0 && (stream.sps.is_none() || stream.pps.is_none()) {
            return Err(Error::Encoding(
                "Encoder output has no SPS/PPS".to_string(),
            ));
        }

        let muxer_config = MuxerConfig {
            width: coded_width,
            height: coded_height,
            fps: this.frame_rate,
            sps: stream.sps,
            pps: stream.pps,
        };

        let mut muxer = create_muxer(this.container, this.file, muxer_config)?;
        for packet in &stream.packets {
            muxer.write_packet(packet)?;
        }
        muxer.finalize()?;

        debug!(
            output = %this.output_path.display(),
            samples = stream.packets.len(),
            container = %this.container,
            "Container written"
        );
        Ok(())
    }
}
