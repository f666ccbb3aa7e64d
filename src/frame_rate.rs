//! Frame-rate resolution against a host sequence.
//!
//! Hosts disagree on how a sequence exposes its rate, so three accessors are
//! tried in order and the first positive answer wins:
//!
//! 1. `getFrameRate` - a number or a numerator/denominator pair
//! 2. `getTimebase` - seconds per timebase unit, inverted
//! 3. `getTicksPerFrame` - divided into [`TICKS_PER_SECOND`]
//!
//! Anything else (no project, no sequence, all accessors missing or failing)
//! gives the fallback rate.

use crate::host::{Host, HostSequence, RateValue, Rational, resolve_opt};
use crate::timecode::{DEFAULT_FPS, TICKS_PER_SECOND};

fn positive(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

fn from_frame_rate(sequence: &dyn HostSequence) -> Option<f64> {
    resolve_opt("frame rate", sequence.frame_rate())
        .and_then(RateValue::as_f64)
        .and_then(positive)
}

fn from_timebase(sequence: &dyn HostSequence) -> Option<f64> {
    resolve_opt("frame rate", sequence.timebase())
        .and_then(Rational::as_f64)
        .and_then(positive)
        .and_then(|seconds_per_unit| positive(1.0 / seconds_per_unit))
}

fn from_ticks_per_frame(sequence: &dyn HostSequence) -> Option<f64> {
    resolve_opt("frame rate", sequence.ticks_per_frame())
        .filter(|ticks| *ticks > 0)
        .and_then(|ticks| positive(TICKS_PER_SECOND as f64 / ticks as f64))
}

/// Rate used when nothing can be resolved: `fallback` if usable, else 30.
pub fn fallback_rate(fallback: f64) -> f64 {
    positive(fallback).unwrap_or(DEFAULT_FPS)
}

/// Frame rate of `sequence`, or `fallback` when no strategy yields one.
pub fn resolve_frame_rate(sequence: &dyn HostSequence, fallback: f64) -> f64 {
    let strategies: [(&str, fn(&dyn HostSequence) -> Option<f64>); 3] = [
        ("frameRate", from_frame_rate),
        ("timebase", from_timebase),
        ("ticksPerFrame", from_ticks_per_frame),
    ];

    for (source, strategy) in strategies {
        if let Some(fps) = strategy(sequence) {
            log::trace!("Frame rate {:.3} from {}", fps, source);
            return fps;
        }
    }

    let fps = fallback_rate(fallback);
    log::debug!("Frame rate unresolved, using {:.3}", fps);
    fps
}

/// Frame rate of the host's active sequence.
///
/// No project or no active sequence gives the fallback rate.
pub fn active_frame_rate(host: &dyn Host, fallback: f64) -> f64 {
    let Some(project) = resolve_opt("frame rate", host.active_project()).flatten() else {
        return fallback_rate(fallback);
    };
    match resolve_opt("frame rate", project.active_sequence()).flatten() {
        Some(sequence) => resolve_frame_rate(sequence, fallback),
        None => fallback_rate(fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fixture::{FixtureHost, FixtureProject, FixtureSequence, WithCapabilities};
    use crate::host::capability as cap;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    /// Test: frame rate accessor wins over the others
    #[test]
    fn test_direct_rate_first() {
        let mut seq = FixtureSequence::new("s", "S");
        seq.frame_rate = Some(RateValue::Number(25.0));
        seq.timebase = Some(Rational::new(1, 24));
        seq.ticks_per_frame = Some(TICKS_PER_SECOND / 50);
        assert!(close(resolve_frame_rate(&seq, 30.0), 25.0));

        seq.frame_rate = Some(RateValue::Ratio(Rational::new(30000, 1001)));
        assert!(close(resolve_frame_rate(&seq, 30.0), 30000.0 / 1001.0));
    }

    /// Test: fallthrough order
    /// Validates: zero/failing accessors are skipped, timebase is inverted
    #[test]
    fn test_fallthrough_order() {
        let mut seq = FixtureSequence::new("s", "S").failing(cap::GET_FRAME_RATE);
        seq.frame_rate = Some(RateValue::Number(25.0));
        seq.timebase = Some(Rational::new(1001, 24000));
        seq.ticks_per_frame = Some(TICKS_PER_SECOND / 50);
        assert!(close(resolve_frame_rate(&seq, 30.0), 24000.0 / 1001.0));

        seq.timebase = Some(Rational::new(0, 1));
        assert!(close(resolve_frame_rate(&seq, 30.0), 50.0));

        seq.ticks_per_frame = Some(0);
        assert!(close(resolve_frame_rate(&seq, 30.0), 30.0));
    }

    #[test]
    fn test_zero_rate_falls_through() {
        let mut seq = FixtureSequence::new("s", "S");
        seq.frame_rate = Some(RateValue::Number(0.0));
        seq.ticks_per_frame = Some(TICKS_PER_SECOND / 60);
        assert!(close(resolve_frame_rate(&seq, 30.0), 60.0));
    }

    #[test]
    fn test_fallback_values() {
        let seq = FixtureSequence::new("s", "S");
        assert!(close(resolve_frame_rate(&seq, 24.0), 24.0));
        assert!(close(resolve_frame_rate(&seq, -1.0), DEFAULT_FPS));
        assert!(close(resolve_frame_rate(&seq, f64::NAN), DEFAULT_FPS));
    }

    /// Test: resolution from the host root
    #[test]
    fn test_active_frame_rate() {
        assert!(close(active_frame_rate(&FixtureHost::default(), 30.0), 30.0));

        let empty = FixtureHost::new(FixtureProject::new("P"));
        assert!(close(active_frame_rate(&empty, 25.0), 25.0));

        let host = crate::host::fixture::sample_host();
        assert!(close(active_frame_rate(&host, 30.0), 30000.0 / 1001.0));

        let broken = crate::host::fixture::sample_host().without(cap::GET_ACTIVE_PROJECT);
        assert!(close(active_frame_rate(&broken, 30.0), 30.0));
    }
}
