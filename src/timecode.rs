//! Tick-time and SMPTE timecode conversion.
//!
//! # Purpose
//!
//! The host measures every instant on a master clock of [`TICKS_PER_SECOND`]
//! ticks. Panels show those instants as timecode, so this module turns
//! `(ticks, fps)` into `HH:MM:SS:FF` / `HH:MM:SS;FF` strings and back.
//!
//! Formatting is a pure function of `(ticks, fps, drop_frame)`: no host calls,
//! no logging, no state.
//!
//! # Key types
//!
//! - [`TickTime`] - `{seconds, ticks, ticksNumber}` triple as the host reports it
//! - [`Timecode`] - decomposed timecode, `Display` gives the SMPTE string
//!
//! # Drop-frame
//!
//! 29.97 and 59.94 fps count frames at 30/60 fps nominal and skip frame
//! numbers `0..drop` at the start of every minute except each tenth minute
//! (`drop` = 2 at 29.97, 4 at 59.94). Conversion in both directions uses the
//! standard SMPTE 12M arithmetic.
//!
//! # Used by
//!
//! - `snapshot.rs` - timing fields of items and markers
//! - `media.rs` - selection report
//! - `overlay.rs` - segment boundaries handed to the host
//! - `main.rs` - `timecode` / `frames` commands

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Ticks per second on the host master clock.
pub const TICKS_PER_SECOND: i64 = 254_016_000_000;

/// Frame rate used whenever the sequence does not report a usable one.
pub const DEFAULT_FPS: f64 = 30.0;

const DROP_FRAME_RATES: [f64; 2] = [29.97, 59.94];
const DROP_FRAME_TOLERANCE: f64 = 0.01;

/// Errors from parsing or validating a timecode string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimecodeError {
    #[error("malformed timecode '{0}' (expected HH:MM:SS:FF or HH:MM:SS;FF)")]
    Malformed(String),
    #[error("timecode '{0}' has a field out of range")]
    OutOfRange(String),
    #[error("timecode '{0}' names a frame number skipped by drop-frame counting")]
    DroppedFrame(String),
}

/// Host time value: the three representations the host exposes for one instant.
///
/// Each field is read independently and any of them may be missing, so all
/// three are optional and serialize as `null` when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickTime {
    pub seconds: Option<f64>,
    pub ticks: Option<String>,
    pub ticks_number: Option<i64>,
}

impl TickTime {
    pub fn from_ticks(ticks: i64) -> Self {
        Self {
            seconds: Some(ticks as f64 / TICKS_PER_SECOND as f64),
            ticks: Some(ticks.to_string()),
            ticks_number: Some(ticks),
        }
    }

    pub fn from_seconds(seconds: f64) -> Self {
        let ticks = seconds_to_ticks(seconds);
        Self {
            seconds: Some(seconds),
            ticks: Some(ticks.to_string()),
            ticks_number: Some(ticks),
        }
    }

    /// Best tick count available: `ticksNumber`, then the `ticks` string, then `seconds`.
    pub fn tick_count(&self) -> Option<i64> {
        self.ticks_number
            .or_else(|| self.ticks.as_deref().and_then(|t| t.trim().parse().ok()))
            .or_else(|| self.seconds.map(seconds_to_ticks))
    }

    /// True when no representation could be read.
    pub fn is_empty(&self) -> bool {
        self.seconds.is_none() && self.ticks.is_none() && self.ticks_number.is_none()
    }
}

/// Decomposed SMPTE timecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Timecode {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub frames: u32,
    pub drop_frame: bool,
}

impl Timecode {
    pub const ZERO: Self = Self {
        hours: 0,
        minutes: 0,
        seconds: 0,
        frames: 0,
        drop_frame: false,
    };

    /// Build a timecode from a frame count. Negative counts clamp to zero.
    ///
    /// Fields clamp to `u32::MAX`, which only matters for huge counts at
    /// tiny rates. A rate too large for drop-frame bookkeeping counts
    /// non-drop.
    pub fn from_frames(total_frames: i64, fps: f64, drop_frame: bool) -> Self {
        let fps = sanitize_fps(fps);
        let total_frames = total_frames.max(0);
        if drop_frame {
            if let Some(layout) = DropLayout::new(rounded_fps(fps)) {
                return Self::from_frames_drop(total_frames, fps, &layout);
            }
        }
        Self::from_frames_non_drop(total_frames, fps)
    }

    // Divisions use the nominal rate, the frame field the rounded one.
    fn from_frames_non_drop(total_frames: i64, fps: f64) -> Self {
        let tf = total_frames as f64;
        let hours = (tf / (fps * 3600.0)).floor();
        let minutes = ((tf % (fps * 3600.0)) / (fps * 60.0)).floor();
        let seconds = ((tf % (fps * 60.0)) / fps).floor();
        let frames = total_frames % rounded_fps(fps);

        Self {
            hours: clamp_field(hours),
            minutes: clamp_field(minutes),
            seconds: clamp_field(seconds),
            frames: clamp_field(frames as f64),
            drop_frame: false,
        }
    }

    fn from_frames_drop(total_frames: i64, fps: f64, layout: &DropLayout) -> Self {
        let rounded = rounded_fps(fps);

        let mut f = total_frames % layout.frames_per_24_hours;
        let tens = f / layout.frames_per_10_minutes;
        let rem = f % layout.frames_per_10_minutes;

        // Re-insert the skipped frame numbers: 9 per full ten-minute block,
        // plus one batch per started minute past the first of the block.
        f += layout.drop * 9 * tens;
        if rem > layout.drop {
            f += layout.drop * ((rem - layout.drop) / layout.frames_per_minute);
        }

        let total_seconds = f / rounded;
        Self {
            hours: clamp_field((total_seconds / 3600) as f64),
            minutes: ((total_seconds / 60) % 60) as u32,
            seconds: (total_seconds % 60) as u32,
            frames: (f % rounded) as u32,
            drop_frame: true,
        }
    }

    /// Frame count this timecode addresses at `fps`.
    ///
    /// Validates field ranges and rejects frame numbers that drop-frame
    /// counting skips. Non-drop counts are in nominal (rounded) frames.
    /// A count that does not fit in `i64` is out of range.
    pub fn to_frames(&self, fps: f64) -> Result<i64, TimecodeError> {
        let out_of_range = || TimecodeError::OutOfRange(self.to_string());
        let rounded = rounded_fps(sanitize_fps(fps));
        if self.minutes >= 60 || self.seconds >= 60 || i64::from(self.frames) >= rounded {
            return Err(out_of_range());
        }

        let total_seconds = i64::from(self.hours) * 3600
            + i64::from(self.minutes) * 60
            + i64::from(self.seconds);
        let base = total_seconds
            .checked_mul(rounded)
            .and_then(|frames| frames.checked_add(i64::from(self.frames)))
            .ok_or_else(out_of_range)?;
        if !self.drop_frame {
            return Ok(base);
        }

        let layout = DropLayout::new(rounded).ok_or_else(out_of_range)?;
        if self.seconds == 0 && self.minutes % 10 != 0 && i64::from(self.frames) < layout.drop {
            return Err(TimecodeError::DroppedFrame(self.to_string()));
        }
        let total_minutes = i64::from(self.hours) * 60 + i64::from(self.minutes);
        layout
            .drop
            .checked_mul(total_minutes - total_minutes / 10)
            .and_then(|skipped| base.checked_sub(skipped))
            .ok_or_else(out_of_range)
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.drop_frame { ';' } else { ':' };
        write!(
            f,
            "{:02}:{:02}:{:02}{}{:02}",
            self.hours, self.minutes, self.seconds, sep, self.frames
        )
    }
}

impl FromStr for Timecode {
    type Err = TimecodeError;

    /// Accepts `HH:MM:SS:FF`, and `HH:MM:SS;FF` / `HH:MM:SS.FF` for drop-frame.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let malformed = || TimecodeError::Malformed(s.to_string());

        let split = s.rfind([':', ';', '.']).ok_or_else(malformed)?;
        let drop_frame = matches!(s.as_bytes()[split], b';' | b'.');
        let (head, frames) = (&s[..split], &s[split + 1..]);

        let fields: Vec<&str> = head.split(':').collect();
        if fields.len() != 3 {
            return Err(malformed());
        }
        let parse = |v: &str| -> Result<u32, TimecodeError> {
            if v.is_empty() || !v.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            v.parse().map_err(|_| malformed())
        };

        Ok(Self {
            hours: parse(fields[0])?,
            minutes: parse(fields[1])?,
            seconds: parse(fields[2])?,
            frames: parse(frames)?,
            drop_frame,
        })
    }
}

/// Frame counts of one drop-frame rate, derived from the rounded rate.
struct DropLayout {
    drop: i64,
    frames_per_minute: i64,
    frames_per_10_minutes: i64,
    frames_per_24_hours: i64,
}

impl DropLayout {
    /// `None` when a day of frames at `rounded` overflows `i64`.
    fn new(rounded: i64) -> Option<Self> {
        let drop = (2.0 * rounded as f64 / 30.0).round() as i64;
        let frames_per_minute = rounded.checked_mul(60)? - drop;
        let frames_per_10_minutes = rounded.checked_mul(600)?.checked_sub(drop.checked_mul(9)?)?;
        let frames_per_hour = frames_per_10_minutes.checked_mul(6)?;
        Some(Self {
            drop,
            frames_per_minute,
            frames_per_10_minutes,
            frames_per_24_hours: frames_per_hour.checked_mul(24)?,
        })
    }
}

fn sanitize_fps(fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 { fps } else { DEFAULT_FPS }
}

fn clamp_field(value: f64) -> u32 {
    value.clamp(0.0, f64::from(u32::MAX)) as u32
}

fn rounded_fps(fps: f64) -> i64 {
    (fps.round() as i64).max(1)
}

fn seconds_to_ticks(seconds: f64) -> i64 {
    (seconds * TICKS_PER_SECOND as f64).round() as i64
}

/// 29.97 and 59.94 (within 0.01) count in drop-frame.
pub fn is_drop_frame_rate(fps: f64) -> bool {
    DROP_FRAME_RATES
        .iter()
        .any(|rate| (fps - rate).abs() < DROP_FRAME_TOLERANCE)
}

/// Frame index nearest to `ticks` at `fps`.
pub fn ticks_to_frames(ticks: i64, fps: f64) -> i64 {
    let ticks_per_frame = TICKS_PER_SECOND as f64 / sanitize_fps(fps);
    (ticks as f64 / ticks_per_frame).round() as i64
}

/// Tick position of the start of frame `frames` at `fps`.
pub fn frames_to_ticks(frames: i64, fps: f64) -> i64 {
    let ticks_per_frame = TICKS_PER_SECOND as f64 / sanitize_fps(fps);
    (frames as f64 * ticks_per_frame).round() as i64
}

/// Timecode string for a tick position; zero and negative ticks give `00:00:00:00`.
pub fn ticks_to_timecode(ticks: i64, fps: f64) -> String {
    if ticks <= 0 {
        return Timecode::ZERO.to_string();
    }
    let drop_frame = is_drop_frame_rate(fps);
    Timecode::from_frames(ticks_to_frames(ticks, fps), fps, drop_frame).to_string()
}
