//! Single image to video export

use crate::pixel_buffer::{FrameBuffer, PixelBufferFactory};
use crate::schedule::FrameSchedule;
use crate::session::WriterSession;
use crate::writer::{FfmpegBackend, WriterBackend};
use crate::{Configuration, Dimensions, Error, Result};
use image::GenericImageView;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// Name of the thread that drives a session's readiness loop
const INPUT_THREAD_NAME: &str = "photovid-input";

type CompletionFn = Box<dyn FnOnce(Result<PathBuf>) + Send + 'static>;

/// Calls the caller's completion exactly once
///
/// If it is dropped without having been called (a panicking or unspawned
/// writing thread), the completion receives an error.
struct Completion {
    callback: Option<CompletionFn>,
}

impl Completion {
    fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Result<PathBuf>) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    fn complete(mut self, result: Result<PathBuf>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(Err(Error::Setup(
                "export ended without reporting a result".to_string(),
            )));
        }
    }
}

/// Handle to a running export
#[derive(Debug)]
pub struct ExportHandle {
    thread: Option<JoinHandle<()>>,
}

impl ExportHandle {
    fn finished() -> Self {
        Self { thread: None }
    }

    /// Whether the completion has been delivered
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Block until the export's completion has run
    pub fn wait(self) {
        if let Some(thread) = self.thread {
            // A panic has already been reported through the completion
            let _ = thread.join();
        }
    }
}

/// Turns one still image into a video
///
/// ```no_run
/// use photovid::{Configuration, Container, Dimensions, Exporter};
///
/// let mut exporter = Exporter::new();
/// exporter.configure(Configuration::new("clip.mov", Container::Mov, Dimensions::new(1, 1)))?;
/// exporter
///     .export("photo.png", 3.0, |result| match result {
///         Ok(path) => println!("done: {}", path.display()),
///         Err(e) => eprintln!("failed: {e}"),
///     })
///     .wait();
/// # Ok::<(), photovid::Error>(())
/// ```
pub struct Exporter {
    configuration: Option<Configuration>,
    renderer: PixelBufferFactory,
    backend: Box<dyn WriterBackend>,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter {
    /// Exporter encoding with the ffmpeg found on `PATH`
    pub fn new() -> Self {
        Self::with_backend(Box::new(FfmpegBackend::new()))
    }

    pub fn with_backend(backend: Box<dyn WriterBackend>) -> Self {
        Self {
            configuration: None,
            renderer: PixelBufferFactory::new(),
            backend,
        }
    }

    /// Replace the pixel buffer factory
    pub fn with_renderer(mut self, renderer: PixelBufferFactory) -> Self {
        self.renderer = renderer;
        self
    }

    /// Validate and store the configuration used by subsequent exports
    pub fn configure(&mut self, configuration: Configuration) -> Result<()> {
        configuration.validate()?;
        self.configuration = Some(configuration);
        Ok(())
    }

    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_ref()
    }

    /// Export `image_path` as a video lasting `duration_seconds`
    ///
    /// Setup (decoding, rendering, opening the output) runs on the calling
    /// thread; if it fails, `completion` runs before this returns. Frames are
    /// then written on a dedicated thread, which also runs `completion`.
    /// `completion` is called exactly once.
    pub fn export<P, F>(&self, image_path: P, duration_seconds: f64, completion: F) -> ExportHandle
    where
        P: AsRef<Path>,
        F: FnOnce(Result<PathBuf>) + Send + 'static,
    {
        let completion = Completion::new(completion);
        let image_path = image_path.as_ref();

        let (mut session, buffer) = match self.prepare(image_path, duration_seconds) {
            Ok(prepared) => prepared,
            Err(err) => {
                error!(image = %image_path.display(), error = %err, "Export setup failed");
                completion.complete(Err(err));
                return ExportHandle::finished();
            }
        };

        let spawned = thread::Builder::new()
            .name(INPUT_THREAD_NAME.to_string())
            .spawn(move || {
                let result = session.run(&buffer);
                match &result {
                    Ok(path) => info!(output = %path.display(), "Export finished"),
                    Err(err) => error!(error = %err, "Export failed"),
                }
                completion.complete(result);
            });

        match spawned {
            Ok(thread) => ExportHandle {
                thread: Some(thread),
            },
            Err(err) => {
                // The closure, and with it the completion, was dropped
                error!(error = %err, "Cannot start writing thread");
                ExportHandle::finished()
            }
        }
    }

    /// Export and wait for the result
    pub fn export_blocking<P: AsRef<Path>>(&self, image_path: P, duration_seconds: f64) -> Result<PathBuf> {
        let (tx, rx) = async_channel::bounded(1);
        self.export(image_path, duration_seconds, move |result| {
            let _ = tx.send_blocking(result);
        })
        .wait();

        rx.recv_blocking().map_err(|_| {
            Error::Setup("export ended without reporting a result".to_string())
        })?
    }

    fn prepare(&self, image_path: &Path, duration_seconds: f64) -> Result<(WriterSession, Arc<FrameBuffer>)> {
        let configuration = self.configuration.as_ref().ok_or_else(|| {
            Error::InvalidConfiguration("exporter has not been configured".to_string())
        })?;
        configuration.validate()?;
        if !duration_seconds.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "duration must be finite, got {duration_seconds}"
            )));
        }

        let image = self.renderer.load(image_path)?;
        let (width, height) = image.dimensions();
        let configuration = configuration.with_dimensions(Dimensions::new(width, height));
        configuration.validate()?;

        let buffer = Arc::new(self.renderer.render(&image)?);
        drop(image);

        let schedule = FrameSchedule::new(duration_seconds, configuration.frame_rate());
        info!(
            image = %image_path.display(),
            output = %configuration.output_path().display(),
            dimensions = %configuration.dimensions(),
            fps = configuration.frame_rate(),
            frames = schedule.frame_count(),
            "Starting export"
        );

        let mut session = WriterSession::new(configuration);
        session.open(self.backend.as_ref())?;
        session.start(schedule)?;
        Ok((session, buffer))
    }
}
