//! Common test utilities

#![allow(dead_code)]

use image::{ImageBuffer, Rgba, RgbaImage};
use photovid::writer::readiness::{self, Readiness, ReadinessNotifier};
use photovid::{AssetWriter, Configuration, Error, FrameBuffer, Result, Timestamp, WriterBackend};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Generate a test image with a solid color and optional gradient
pub fn generate_test_image(width: u32, height: u32, base_color: [u8; 4]) -> RgbaImage {
    let mut img = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        // Add subtle gradient so the encoder has something to compress
        let r = base_color[0].saturating_add((x % 50) as u8);
        let g = base_color[1].saturating_add((y % 50) as u8);
        let b = base_color[2];
        let a = base_color[3];
        *pixel = Rgba([r, g, b, a]);
    }

    img
}

/// Save a test image as JPEG
pub fn save_jpeg<P: AsRef<Path>>(img: &RgbaImage, path: P, quality: u8) -> std::io::Result<()> {
    // Convert RGBA to RGB for JPEG
    let rgb_img: image::RgbImage = image::DynamicImage::ImageRgba8(img.clone()).to_rgb8();

    let file = std::fs::File::create(path)?;
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, quality);
    encoder
        .encode_image(&rgb_img)
        .map_err(std::io::Error::other)?;

    Ok(())
}

/// Save a test image as PNG
pub fn save_png<P: AsRef<Path>>(img: &RgbaImage, path: P) -> std::io::Result<()> {
    img.save(path).map_err(std::io::Error::other)
}

/// Write a PNG fixture into `dir` and return its path
pub fn png_fixture(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    save_png(&generate_test_image(width, height, [200, 80, 40, 255]), &path).unwrap();
    path
}

/// Verify that a file exists and has non-zero size
pub fn verify_file_exists_with_size<P: AsRef<Path>>(path: P) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.len() > 0,
        Err(_) => false,
    }
}

/// Parse MP4 header to verify it's a valid ISO-BMFF file
pub fn verify_mp4_header<P: AsRef<Path>>(path: P) -> bool {
    use std::io::Read;

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let mut header = [0u8; 12];
    if file.read_exact(&mut header).is_err() {
        return false;
    }

    // ISO-BMFF files have 'ftyp' box at offset 4
    &header[4..8] == b"ftyp"
}

/// Whether ffmpeg with libx264 can be used by end-to-end tests
pub fn ffmpeg_available() -> bool {
    match photovid::available(None) {
        Ok(()) => true,
        Err(e) => {
            println!("Skipping: H.264 encoding unavailable: {}", e);
            false
        }
    }
}

/// Everything the scripted writers observed
#[derive(Debug, Default)]
pub struct WriterLog {
    pub writers_created: usize,
    pub appended: Vec<Timestamp>,
    pub appends_while_not_ready: usize,
    pub appends_after_finished: usize,
    pub mark_finished_calls: usize,
    pub finish_calls: usize,
    pub append_threads: HashSet<String>,
}

/// Backend whose writers drain frames on a background thread
///
/// Each writer accepts up to `capacity` queued frames and signals readiness
/// from its drain thread whenever one is consumed, like a real encoder.
#[derive(Clone)]
pub struct ScriptedBackend {
    pub log: Arc<Mutex<WriterLog>>,
    pub capacity: usize,
    pub fail_create: bool,
    pub fail_finish: bool,
    pub fail_append_at: Option<u64>,
}

impl ScriptedBackend {
    pub fn new(capacity: usize) -> Self {
        Self {
            log: Arc::new(Mutex::new(WriterLog::default())),
            capacity,
            fail_create: false,
            fail_finish: false,
            fail_append_at: None,
        }
    }
}

impl WriterBackend for ScriptedBackend {
    fn create_writer(&self, configuration: &Configuration) -> Result<Box<dyn AssetWriter>> {
        if self.fail_create {
            return Err(Error::Setup("scripted setup failure".to_string()));
        }

        let path = configuration.output_path().to_path_buf();
        std::fs::File::create(&path).map_err(|e| Error::Setup(e.to_string()))?;
        self.log.lock().unwrap().writers_created += 1;

        let (queue_tx, queue_rx) = async_channel::bounded::<u64>(self.capacity);
        let (notifier, readiness) = readiness::channel();
        let drain_notifier = notifier.clone();
        let drain = thread::spawn(move || {
            let mut drained = 0u64;
            while queue_rx.recv_blocking().is_ok() {
                drained += 1;
                drain_notifier.signal();
            }
            drained
        });

        Ok(Box::new(ScriptedWriter {
            log: Arc::clone(&self.log),
            path,
            queue: Some(queue_tx),
            drain: Some(drain),
            notifier,
            readiness,
            appended: 0,
            finished: false,
            fail_finish: self.fail_finish,
            fail_append_at: self.fail_append_at,
        }))
    }
}

struct ScriptedWriter {
    log: Arc<Mutex<WriterLog>>,
    path: PathBuf,
    queue: Option<async_channel::Sender<u64>>,
    drain: Option<JoinHandle<u64>>,
    notifier: ReadinessNotifier,
    readiness: Readiness,
    appended: u64,
    finished: bool,
    fail_finish: bool,
    fail_append_at: Option<u64>,
}

impl AssetWriter for ScriptedWriter {
    fn start_writing(&mut self) -> Result<()> {
        self.notifier.signal();
        Ok(())
    }

    fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    fn is_ready_for_more_media_data(&self) -> bool {
        self.queue.as_ref().is_some_and(|q| !q.is_full())
    }

    fn append(&mut self, _buffer: &Arc<FrameBuffer>, pts: Timestamp) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if self.finished {
            log.appends_after_finished += 1;
        }
        if !self.is_ready_for_more_media_data() {
            log.appends_while_not_ready += 1;
        }
        if let Some(name) = thread::current().name() {
            log.append_threads.insert(name.to_string());
        }
        if self.fail_append_at == Some(pts.value()) {
            return Err(Error::Encoding("scripted append failure".to_string()));
        }
        log.appended.push(pts);
        drop(log);

        if let Some(queue) = &self.queue {
            queue
                .try_send(pts.value())
                .map_err(|e| Error::Encoding(e.to_string()))?;
        }
        self.appended += 1;
        Ok(())
    }

    fn mark_as_finished(&mut self) {
        self.finished = true;
        self.queue = None;
        self.log.lock().unwrap().mark_finished_calls += 1;
    }

    fn finish_writing(mut self: Box<Self>) -> Result<()> {
        self.log.lock().unwrap().finish_calls += 1;
        self.queue = None;
        let drained = self
            .drain
            .take()
            .map(|d| d.join().unwrap_or(0))
            .unwrap_or(0);

        if self.fail_finish {
            return Err(Error::Encoding("scripted finalize failure".to_string()));
        }

        let mut file = std::fs::File::create(&self.path).map_err(|e| Error::Encoding(e.to_string()))?;
        writeln!(file, "frames={}", drained).map_err(|e| Error::Encoding(e.to_string()))?;
        Ok(())
    }
}
