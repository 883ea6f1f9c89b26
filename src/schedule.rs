//! Frame count and presentation timestamps

use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;

/// Tolerance absorbing binary floating point error in `seconds * fps`
const FRAME_EPSILON: f64 = 1e-9;

/// Rational presentation time, `value / timescale` seconds
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    value: u64,
    timescale: u32,
}

impl Timestamp {
    /// Create a timestamp; returns `None` for a zero timescale
    pub fn new(value: u64, timescale: u32) -> Option<Self> {
        (timescale > 0).then_some(Self { value, timescale })
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn timescale(&self) -> u32 {
        self.timescale
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.value as u128 * other.timescale as u128;
        let rhs = other.value as u128 * self.timescale as u128;
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.value, self.timescale)
    }
}

/// Number of whole frames in `duration_seconds` at `frame_rate`
///
/// Truncates toward zero. Non-positive or non-finite durations yield zero frames.
pub fn frame_count(duration_seconds: f64, frame_rate: u32) -> u64 {
    if frame_rate == 0 || !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return 0;
    }
    (duration_seconds * frame_rate as f64 + FRAME_EPSILON).trunc() as u64
}

/// Every presentation timestamp for a still of `duration_seconds`
pub fn timestamps_for_duration(duration_seconds: f64, frame_rate: u32) -> Vec<Timestamp> {
    FrameSchedule::new(duration_seconds, frame_rate)
        .into_iter()
        .collect()
}

/// Frame count and time base of one export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSchedule {
    frame_count: u64,
    frame_rate: u32,
}

impl FrameSchedule {
    pub fn new(duration_seconds: f64, frame_rate: u32) -> Self {
        Self {
            frame_count: frame_count(duration_seconds, frame_rate),
            frame_rate,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Presentation time of frame `index`, if it is part of the schedule
    pub fn timestamp(&self, index: u64) -> Option<Timestamp> {
        if index < self.frame_count {
            Timestamp::new(index, self.frame_rate)
        } else {
            None
        }
    }

    /// Total duration of the output
    pub fn duration(&self) -> Option<Timestamp> {
        Timestamp::new(self.frame_count, self.frame_rate)
    }
}

impl IntoIterator for FrameSchedule {
    type Item = Timestamp;
    type IntoIter = FrameTimes;

    fn into_iter(self) -> FrameTimes {
        FrameTimes {
            next: 0,
            end: if self.frame_rate == 0 { 0 } else { self.frame_count },
            frame_rate: self.frame_rate,
        }
    }
}

/// Timestamps of a schedule in increasing order; cannot be restarted
#[derive(Debug)]
pub struct FrameTimes {
    next: u64,
    end: u64,
    frame_rate: u32,
}

impl FrameTimes {
    /// Index of the frame the next call to `next` yields
    pub fn position(&self) -> u64 {
        self.next
    }
}

impl Iterator for FrameTimes {
    type Item = Timestamp;

    fn next(&mut self) -> Option<Timestamp> {
        if self.next >= self.end {
            return None;
        }
        let ts = Timestamp::new(self.next, self.frame_rate)?;
        self.next += 1;
        Some(ts)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.end - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameTimes {}

impl FusedIterator for FrameTimes {}
