//! H.264 encoder using an external ffmpeg process (libx264)
//!
//! Raw BGRA frames are queued on a bounded channel. A feeder thread writes them
//! into ffmpeg's stdin and signals readiness whenever it frees a queue slot.
//! Two more threads drain stdout (the Annex-B stream) and stderr.

use super::{annexb, EncodedStream, EncoderConfig};
use crate::pixel_buffer::FrameBuffer;
use crate::writer::readiness::{self, Readiness, ReadinessNotifier};
use crate::{Error, Result};
use async_channel::{Receiver, Sender, TrySendError};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Frames buffered between the session and ffmpeg's stdin
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

/// FFmpeg-based H.264 encoder
pub struct FfmpegEncoder {
    process: Child,
    config: EncoderConfig,
    frames: Option<Sender<Arc<FrameBuffer>>>,
    readiness: Readiness,
    notifier: ReadinessNotifier,
    feeder: Option<JoinHandle<std::io::Result<u64>>>,
    stdout: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    stderr: Option<JoinHandle<String>>,
    frames_submitted: u64,
}

impl FfmpegEncoder {
    pub fn new(config: EncoderConfig, ffmpeg_path: Option<&Path>, queue_depth: usize) -> Result<Self> {
        let ffmpeg = find_ffmpeg(ffmpeg_path)?;
        let args = encoder_args(&config);
        debug!(ffmpeg = %ffmpeg.display(), ?args, "Starting H.264 encoder");

        let mut process = Command::new(&ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Setup(format!("Failed to start ffmpeg: {}", e)))?;

        let (stdin, stdout, stderr) = match (
            process.stdin.take(),
            process.stdout.take(),
            process.stderr.take(),
        ) {
            (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
            _ => {
                let _ = process.kill();
                let _ = process.wait();
                return Err(Error::Setup("FFmpeg pipes not available".to_string()));
            }
        };

        let (notifier, readiness) = readiness::channel();
        let (frames_tx, frames_rx) = async_channel::bounded(queue_depth.max(1));

        let spawned = spawn_feeder(stdin, frames_rx, notifier.clone()).and_then(|feeder| {
            let stdout = spawn_named("photovid-ffmpeg-stdout", move || {
                let mut stdout = stdout;
                let mut data = Vec::new();
                stdout.read_to_end(&mut data).map(|_| data)
            })?;
            let stderr = spawn_named("photovid-ffmpeg-stderr", move || {
                let mut stderr = stderr;
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })?;
            Ok((feeder, stdout, stderr))
        });

        let (feeder, stdout, stderr) = match spawned {
            Ok(handles) => handles,
            Err(e) => {
                let _ = process.kill();
                let _ = process.wait();
                return Err(Error::Setup(format!("Failed to start encoder threads: {}", e)));
            }
        };

        Ok(Self {
            process,
            config,
            frames: Some(frames_tx),
            readiness,
            notifier,
            feeder: Some(feeder),
            stdout: Some(stdout),
            stderr: Some(stderr),
            frames_submitted: 0,
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Receiver side of the readiness signal
    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Announce that the encoder accepts data, e.g. when writing starts
    pub fn signal_ready(&self) {
        self.notifier.signal();
    }

    /// Whether a frame can be queued without blocking
    ///
    /// A closed queue reports ready so the next submit surfaces the failure.
    pub fn is_ready(&self) -> bool {
        match &self.frames {
            Some(frames) => frames.is_closed() || !frames.is_full(),
            None => false,
        }
    }

    /// Queue one frame for encoding
    pub fn submit(&mut self, frame: Arc<FrameBuffer>) -> Result<()> {
        let frames = self
            .frames
            .as_ref()
            .ok_or_else(|| Error::Encoding("Encoder input already finished".to_string()))?;

        match frames.try_send(frame) {
            Ok(()) => {
                self.frames_submitted += 1;
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(Error::Encoding(
                "Frame appended while the encoder was not ready".to_string(),
            )),
            Err(TrySendError::Closed(_)) => Err(Error::Encoding(
                "FFmpeg stopped accepting frames".to_string(),
            )),
        }
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Stop accepting frames; ffmpeg sees end of input once the queue drains
    pub fn close_input(&mut self) {
        if let Some(frames) = self.frames.take() {
            frames.close();
        }
    }

    /// Wait for ffmpeg to exit and return the parsed elementary stream
    pub fn finish(mut self) -> Result<EncodedStream> {
        self.close_input();

        let feeder = join(self.feeder.take(), "feeder")?;
        let stdout = join(self.stdout.take(), "stdout")?;
        let stderr = join(self.stderr.take(), "stderr")?;

        let status = self
            .process
            .wait()
            .map_err(|e| Error::Encoding(format!("FFmpeg process error: {}", e)))?;

        if !status.success() {
            return Err(Error::Encoding(format!(
                "FFmpeg exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        let written = feeder.map_err(|e| Error::Encoding(format!("Failed to write frame: {}", e)))?;
        let output =
            stdout.map_err(|e| Error::Encoding(format!("Failed to read output: {}", e)))?;

        let stream = annexb::parse_stream(&output);
        debug!(
            frames_written = written,
            packets = stream.packets.len(),
            bytes = output.len(),
            "H.264 encoder finished"
        );
        if stream.packets.len() as u64 != written {
            warn!(
                frames_written = written,
                packets = stream.packets.len(),
                "Encoder produced a different number of access units than frames"
            );
        }
        Ok(stream)
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        self.close_input();
        // Kill the process if it's still running
        if let Ok(None) = self.process.try_wait() {
            let _ = self.process.kill();
            let _ = self.process.wait();
        }
    }
}

fn encoder_args(config: &EncoderConfig) -> Vec<String> {
    let (coded_width, coded_height) = config.coded_size();

    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "bgra",
        "-s",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push(format!("{}x{}", config.width, config.height));
    args.extend(["-r".to_string(), config.fps.to_string()]);
    args.extend(["-i", "pipe:0", "-an", "-c:v", "libx264"].map(String::from));
    args.extend(["-profile:v".to_string(), config.profile.as_str().to_string()]);
    args.extend(["-b:v".to_string(), config.bitrate.to_string()]);
    // No B-frames: decode order equals presentation order
    args.extend(["-bf", "0", "-pix_fmt", "yuv420p"].map(String::from));

    if (coded_width, coded_height) != (config.width, config.height) {
        args.extend([
            "-vf".to_string(),
            format!("pad={}:{}:0:0", coded_width, coded_height),
        ]);
    }

    args.extend(["-f", "h264", "pipe:1"].map(String::from));
    args
}

fn spawn_feeder(
    stdin: ChildStdin,
    frames: Receiver<Arc<FrameBuffer>>,
    notifier: ReadinessNotifier,
) -> std::io::Result<JoinHandle<std::io::Result<u64>>> {
    spawn_named("photovid-ffmpeg-stdin", move || {
        let mut stdin = stdin;
        let mut written = 0u64;

        let result = loop {
            let frame = match frames.recv_blocking() {
                Ok(frame) => frame,
                Err(_) => break Ok(written),
            };
            // A slot is free again
            notifier.signal();

            if let Err(e) = stdin.write_all(frame.as_bytes()) {
                break Err(e);
            }
            written += 1;
            trace!(written, "Frame handed to ffmpeg");
        };

        // Dropping stdin tells ffmpeg the input ended; closing the queue makes
        // pending and future submits fail instead of hanging.
        frames.close();
        if result.is_err() {
            notifier.signal();
        }
        result
    })
}

fn spawn_named<T, F>(name: &str, f: F) -> std::io::Result<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new().name(name.to_string()).spawn(f)
}

fn join<T>(handle: Option<JoinHandle<T>>, name: &str) -> Result<T> {
    handle
        .ok_or_else(|| Error::Encoding(format!("Encoder {} thread already joined", name)))?
        .join()
        .map_err(|_| Error::Encoding(format!("Encoder {} thread panicked", name)))
}

/// Find ffmpeg executable
fn find_ffmpeg(custom_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = custom_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::Setup(format!(
            "FFmpeg not found at: {}",
            path.display()
        )));
    }

    // Try to find ffmpeg in PATH
    let paths = ["ffmpeg", "/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg"];

    for path in paths {
        if Command::new(path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
        {
            return Ok(PathBuf::from(path));
        }
    }

    Err(Error::Setup("FFmpeg not found in PATH".to_string()))
}

/// Check if ffmpeg with H.264 support is available
pub fn check_available(ffmpeg_path: Option<&Path>) -> Result<()> {
    let ffmpeg = find_ffmpeg(ffmpeg_path)?;

    // Check if ffmpeg has libx264 support
    let output = Command::new(&ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .output()
        .map_err(|e| Error::Setup(format!("Failed to run ffmpeg: {}", e)))?;

    let encoders = String::from_utf8_lossy(&output.stdout);
    if encoders.contains("libx264") {
        Ok(())
    } else {
        Err(Error::Setup(
            "FFmpeg does not have libx264 support".to_string(),
        ))
    }
}
