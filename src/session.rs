//! Writer session state machine
//!
//! ```text
//! Idle --open--> Opened --start--> Writing --on_ready*--> Finalizing --finish--> Finished | Failed
//! ```
//!
//! Frames are pulled by the encoder: every readiness signal runs one append
//! loop that stops as soon as the writer is not ready or no frames remain.

use crate::pixel_buffer::FrameBuffer;
use crate::schedule::{FrameSchedule, FrameTimes};
use crate::writer::{AssetWriter, WriterBackend};
use crate::{Configuration, Error, ErrorKind, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle state of a [`WriterSession`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opened,
    Writing,
    Finalizing,
    Finished(PathBuf),
    Failed(ErrorKind),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finished(_) | SessionState::Failed(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("Idle"),
            SessionState::Opened => f.write_str("Opened"),
            SessionState::Writing => f.write_str("Writing"),
            SessionState::Finalizing => f.write_str("Finalizing"),
            SessionState::Finished(path) => write!(f, "Finished({})", path.display()),
            SessionState::Failed(kind) => write!(f, "Failed({:?})", kind),
        }
    }
}

/// Outcome of one readiness invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Frames remain; wait for the next readiness signal
    Pending,
    /// Every frame was appended and the input marked finished
    Complete,
}

/// One export's writer, from opening the output to the final result
pub struct WriterSession {
    configuration: Configuration,
    state: SessionState,
    writer: Option<Box<dyn AssetWriter>>,
    times: Option<FrameTimes>,
    frame_count: u64,
    current_frame: u64,
}

impl WriterSession {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            state: SessionState::Idle,
            writer: None,
            times: None,
            frame_count: 0,
            current_frame: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Frames appended so far
    pub fn frames_appended(&self) -> u64 {
        self.current_frame
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Remove any existing output and create the writer
    pub fn open(&mut self, backend: &dyn WriterBackend) -> Result<()> {
        self.expect_state(SessionState::Idle, "open")?;

        let path = self.configuration.output_path().to_path_buf();
        if path.exists() {
            warn!(path = %path.display(), "Removing existing output");
            if let Err(source) = std::fs::remove_file(&path) {
                return self.fail(Error::FileSystem { path, source });
            }
        }

        match backend.create_writer(&self.configuration) {
            Ok(writer) => self.writer = Some(writer),
            Err(err) => return self.fail(err),
        }

        self.transition(SessionState::Opened);
        Ok(())
    }

    /// Start the writer at timestamp zero
    pub fn start(&mut self, schedule: FrameSchedule) -> Result<()> {
        self.expect_state(SessionState::Opened, "start")?;

        if schedule.frame_rate() != self.configuration.frame_rate() {
            return self.fail(Error::InvalidConfiguration(format!(
                "schedule runs at {} fps, writer at {} fps",
                schedule.frame_rate(),
                self.configuration.frame_rate()
            )));
        }

        let started = match self.writer.as_mut() {
            Some(writer) => writer.start_writing(),
            None => Err(Error::Setup("writer missing".to_string())),
        };
        if let Err(err) = started {
            return self.fail(err);
        }

        self.frame_count = schedule.frame_count();
        self.times = Some(schedule.into_iter());
        self.transition(SessionState::Writing);
        Ok(())
    }

    /// Handle one readiness signal: append while ready and frames remain
    pub fn on_ready(&mut self, buffer: &Arc<FrameBuffer>) -> Result<Progress> {
        self.expect_state(SessionState::Writing, "append to")?;

        match self.append_while_ready(buffer) {
            Ok(Progress::Complete) => {
                self.transition(SessionState::Finalizing);
                Ok(Progress::Complete)
            }
            Ok(Progress::Pending) => Ok(Progress::Pending),
            Err(err) => self.fail(err),
        }
    }

    fn append_while_ready(&mut self, buffer: &Arc<FrameBuffer>) -> Result<Progress> {
        let (Some(writer), Some(times)) = (self.writer.as_mut(), self.times.as_mut()) else {
            return Err(Error::Setup("writer missing".to_string()));
        };

        while writer.is_ready_for_more_media_data() && self.current_frame < self.frame_count {
            let Some(pts) = times.next() else {
                break;
            };
            writer.append(buffer, pts)?;
            self.current_frame += 1;
        }

        if self.current_frame == self.frame_count {
            writer.mark_as_finished();
            return Ok(Progress::Complete);
        }
        Ok(Progress::Pending)
    }

    /// Finalize the container and report the result
    pub fn finish(&mut self) -> Result<PathBuf> {
        self.expect_state(SessionState::Finalizing, "finish")?;

        let finished = match self.writer.take() {
            Some(writer) => writer.finish_writing(),
            None => Err(Error::Setup("writer missing".to_string())),
        };
        if let Err(err) = finished {
            return self.fail(err);
        }

        let path = self.configuration.output_path().to_path_buf();
        self.transition(SessionState::Finished(path.clone()));
        Ok(path)
    }

    /// Drive the session from `Writing` to a terminal state on this thread
    pub fn run(&mut self, buffer: &Arc<FrameBuffer>) -> Result<PathBuf> {
        let readiness = match self.writer.as_ref() {
            Some(writer) if self.state == SessionState::Writing => writer.readiness(),
            _ => {
                return Err(Error::InvalidState {
                    operation: "run",
                    state: self.state.to_string(),
                })
            }
        };

        loop {
            if !readiness.wait() {
                return self.fail(Error::Encoding(
                    "encoder stopped signalling readiness".to_string(),
                ));
            }
            if self.on_ready(buffer)? == Progress::Complete {
                break;
            }
        }

        self.finish()
    }

    fn expect_state(&self, expected: SessionState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state.to_string(),
            })
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, frames = self.current_frame, "Writer session");
        self.state = next;
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        self.transition(SessionState::Failed(err.kind()));
        // Dropping the writer stops its encoder
        self.writer = None;
        self.times = None;
        Err(err)
    }
}
