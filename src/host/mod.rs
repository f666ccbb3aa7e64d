//! Host capability layer.
//!
//! # Purpose
//!
//! The editing application exposes its project through a scripting bridge
//! whose surface changes between versions: any accessor may be missing on an
//! older host, and any call may fail. This module models that bridge as a set
//! of traits where **every method has a default body returning
//! [`HostError::Unsupported`]**, so an implementation only overrides what its
//! host actually provides.
//!
//! Call sites never probe for capabilities themselves. They call the accessor
//! and hand the result to [`resolve_or`] / [`resolve_opt`], which log the
//! failure with the operation name and degrade to a default.
//!
//! # Object graph
//!
//! ```text
//! Host ─▶ HostProject ─┬▶ HostSequence ─┬▶ HostTrack ─▶ HostTrackItem ─▶ HostProjectItem ─▶ HostClip
//!                      │                └▶ HostMarker
//!                      ├▶ HostProjectItem (root bin)
//!                      └▶ HostSequenceEditor (mutating)
//! ```
//!
//! Time values come back as [`HostTickTime`], whose three representations are
//! read independently.
//!
//! # Capability names
//!
//! Errors carry the bridge's own accessor names (see [`capability`]) so a log
//! line can be matched against host documentation.
//!
//! # Used by
//!
//! - `frame_rate.rs`, `snapshot.rs`, `media.rs`, `overlay.rs`, `panel.rs`
//! - `fixture.rs` - in-memory implementation

pub mod fixture;

use crate::timecode::TickTime;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fixture::FixtureHost;

/// Accessor names used in [`HostError`].
pub mod capability {
    pub const GET_ACTIVE_PROJECT: &str = "Project.getActiveProject";

    pub const NAME: &str = "name";
    pub const GUID: &str = "guid";
    pub const GET_ACTIVE_SEQUENCE: &str = "getActiveSequence";
    pub const GET_SEQUENCES: &str = "getSequences";
    pub const GET_ROOT_ITEM: &str = "getRootItem";
    pub const CREATE_SEQUENCE_WITH_PRESET: &str = "createSequenceWithPresetPath";
    pub const CREATE_SEQUENCE: &str = "createSequence";
    pub const CREATE_SEQUENCE_FROM_MEDIA: &str = "createSequenceFromMedia";
    pub const GET_EDITOR: &str = "SequenceEditor.getEditor";

    pub const GET_IN_POINT: &str = "getInPoint";
    pub const GET_OUT_POINT: &str = "getOutPoint";
    pub const GET_END_TIME: &str = "getEndTime";
    pub const GET_ZERO_POINT: &str = "getZeroPoint";
    pub const GET_TIMEBASE: &str = "getTimebase";
    pub const GET_FRAME_RATE: &str = "getFrameRate";
    pub const GET_TICKS_PER_FRAME: &str = "getTicksPerFrame";
    pub const GET_SETTINGS: &str = "getSettings";
    pub const GET_VIDEO_TRACK_COUNT: &str = "getVideoTrackCount";
    pub const GET_AUDIO_TRACK_COUNT: &str = "getAudioTrackCount";
    pub const GET_VIDEO_TRACK: &str = "getVideoTrack";
    pub const GET_AUDIO_TRACK: &str = "getAudioTrack";
    pub const GET_MARKERS: &str = "getMarkers";
    pub const GET_SELECTION: &str = "getSelection";

    pub const GET_INDEX: &str = "getIndex";
    pub const GET_TRACK_ITEMS: &str = "getTrackItems";

    pub const GET_START_TIME: &str = "getStartTime";
    pub const GET_DURATION: &str = "getDuration";
    pub const GET_NAME: &str = "getName";
    pub const GET_TYPE: &str = "getType";
    pub const GET_TRACK_INDEX: &str = "getTrackIndex";
    pub const IS_DISABLED: &str = "isDisabled";
    pub const IS_ADJUSTMENT_LAYER: &str = "isAdjustmentLayer";
    pub const GET_SPEED: &str = "getSpeed";
    pub const IS_SPEED_REVERSED: &str = "isSpeedReversed";
    pub const GET_PROJECT_ITEM: &str = "getProjectItem";

    pub const GET_GUID: &str = "getGuid";
    pub const CLIP_CAST: &str = "ClipProjectItem.cast";
    pub const IS_SEQUENCE: &str = "isSequence";
    pub const IS_OFFLINE: &str = "isOffline";
    pub const HAS_PROXY: &str = "hasProxy";
    pub const GET_PROXY_PATH: &str = "getProxyPath";
    pub const GET_MEDIA_FILE_PATH: &str = "getMediaFilePath";
    pub const GET_MEDIA_PATH: &str = "getMediaPath";

    pub const GET_START: &str = "getStart";
    pub const GET_COLOR: &str = "getColor";
    pub const GET_COMMENTS: &str = "getComments";
    pub const GET_URL: &str = "getUrl";
    pub const GET_TARGET: &str = "getTarget";

    pub const SECONDS: &str = "seconds";
    pub const TICKS: &str = "ticks";
    pub const TICKS_NUMBER: &str = "ticksNumber";

    pub const EDITOR_VIDEO_TRACK_COUNT: &str = "SequenceEditor.getVideoTrackCount";
    pub const HAS_VIDEO_TRACK_AT: &str = "SequenceEditor.hasVideoTrackAt";
    pub const INSERT_MOGRT: &str = "insertMogrtFromPath";
    pub const SET_END_TIME: &str = "setEndTime";
    pub const EXECUTE_TRANSACTION: &str = "executeTransaction";
}

/// Failure of a single host call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The running host does not provide this accessor.
    #[error("{capability} is not available on this host")]
    Unsupported { capability: &'static str },
    /// The accessor exists but the call failed.
    #[error("{capability} failed: {message}")]
    Call {
        capability: &'static str,
        message: String,
    },
}

impl HostError {
    pub fn unsupported(capability: &'static str) -> Self {
        Self::Unsupported { capability }
    }

    pub fn call(capability: &'static str, message: impl Into<String>) -> Self {
        Self::Call {
            capability,
            message: message.into(),
        }
    }

    pub fn capability(&self) -> &'static str {
        match self {
            Self::Unsupported { capability } | Self::Call { capability, .. } => capability,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

pub type HostResult<T> = Result<T, HostError>;

fn report(op: &str, err: &HostError) {
    match err {
        HostError::Unsupported { capability } => debug!("{}: {} not available", op, capability),
        HostError::Call { .. } => warn!("{}: {}", op, err),
    }
}

/// Value of a host call, or `fallback` when the call is unsupported or fails.
///
/// Unsupported capabilities log at debug, failed calls at warn, both tagged
/// with `op` (the operation that needed the value).
pub fn resolve_or<T>(op: &str, result: HostResult<T>, fallback: T) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            report(op, &err);
            fallback
        }
    }
}

/// Like [`resolve_or`] but yields `None` on failure.
pub fn resolve_opt<T>(op: &str, result: HostResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            report(op, &err);
            None
        }
    }
}

/// Kind filter for [`HostTrack::track_items`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackItemKind {
    Empty,
    #[default]
    Clip,
    Transition,
}

/// Exact ratio as the host reports it (e.g. 30000/1001).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: i64,
    pub denominator: i64,
}

impl Rational {
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// `None` for a zero denominator.
    pub fn as_f64(self) -> Option<f64> {
        (self.denominator != 0).then(|| self.numerator as f64 / self.denominator as f64)
    }
}

/// Frame rate accessor result: a plain number or an exact ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateValue {
    Number(f64),
    Ratio(Rational),
}

impl RateValue {
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Self::Number(fps) => Some(fps),
            Self::Ratio(ratio) => ratio.as_f64(),
        }
    }
}

/// Handle of an item inserted through [`HostSequenceEditor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlayItem {
    pub video_track: usize,
    pub item: usize,
}

/// Text value for one template parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextParam {
    pub index: usize,
    pub value: String,
}

/// Root of the bridge.
pub trait Host {
    fn active_project(&self) -> HostResult<Option<&dyn HostProject>> {
        Err(HostError::unsupported(capability::GET_ACTIVE_PROJECT))
    }

    fn active_project_mut(&mut self) -> HostResult<Option<&mut dyn HostProject>> {
        Err(HostError::unsupported(capability::GET_ACTIVE_PROJECT))
    }
}

pub trait HostProject {
    fn name(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::NAME))
    }

    fn active_sequence(&self) -> HostResult<Option<&dyn HostSequence>> {
        Err(HostError::unsupported(capability::GET_ACTIVE_SEQUENCE))
    }

    fn sequences(&self) -> HostResult<Vec<&dyn HostSequence>> {
        Err(HostError::unsupported(capability::GET_SEQUENCES))
    }

    /// Items of the project's root bin.
    fn root_items(&self) -> HostResult<Vec<&dyn HostProjectItem>> {
        Err(HostError::unsupported(capability::GET_ROOT_ITEM))
    }

    /// Create an empty sequence from a preset file. Returns the new sequence guid.
    fn create_sequence_with_preset(&mut self, _name: &str, _preset_path: &str) -> HostResult<String> {
        Err(HostError::unsupported(capability::CREATE_SEQUENCE_WITH_PRESET))
    }

    /// Older creation entry point, same contract as [`Self::create_sequence_with_preset`].
    fn create_sequence(&mut self, _name: &str, _preset_path: &str) -> HostResult<String> {
        Err(HostError::unsupported(capability::CREATE_SEQUENCE))
    }

    /// Create a sequence matching a clip's media and containing it.
    fn create_sequence_from_media(&mut self, _name: &str, _clip_guid: &str) -> HostResult<String> {
        Err(HostError::unsupported(capability::CREATE_SEQUENCE_FROM_MEDIA))
    }

    fn sequence_editor(&mut self, _sequence_guid: &str) -> HostResult<Option<&mut dyn HostSequenceEditor>> {
        Err(HostError::unsupported(capability::GET_EDITOR))
    }
}

pub trait HostSequence {
    fn name(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::NAME))
    }

    fn guid(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::GUID))
    }

    fn in_point(&self) -> HostResult<&dyn HostTickTime> {
        Err(HostError::unsupported(capability::GET_IN_POINT))
    }

    fn out_point(&self) -> HostResult<&dyn HostTickTime> {
        Err(HostError::unsupported(capability::GET_OUT_POINT))
    }

    fn end_time(&self) -> HostResult<&dyn HostTickTime> {
        Err(HostError::unsupported(capability::GET_END_TIME))
    }

    fn zero_point(&self) -> HostResult<&dyn HostTickTime> {
        Err(HostError::unsupported(capability::GET_ZERO_POINT))
    }

    /// Duration of one timebase unit in seconds, as a ratio.
    fn timebase(&self) -> HostResult<Rational> {
        Err(HostError::unsupported(capability::GET_TIMEBASE))
    }

    fn frame_rate(&self) -> HostResult<RateValue> {
        Err(HostError::unsupported(capability::GET_FRAME_RATE))
    }

    fn ticks_per_frame(&self) -> HostResult<i64> {
        Err(HostError::unsupported(capability::GET_TICKS_PER_FRAME))
    }

    /// Host-specific settings blob, kept opaque.
    fn settings(&self) -> HostResult<serde_json::Value> {
        Err(HostError::unsupported(capability::GET_SETTINGS))
    }

    fn video_track_count(&self) -> HostResult<usize> {
        Err(HostError::unsupported(capability::GET_VIDEO_TRACK_COUNT))
    }

    fn audio_track_count(&self) -> HostResult<usize> {
        Err(HostError::unsupported(capability::GET_AUDIO_TRACK_COUNT))
    }

    fn video_track(&self, _index: usize) -> HostResult<Option<&dyn HostTrack>> {
        Err(HostError::unsupported(capability::GET_VIDEO_TRACK))
    }

    fn audio_track(&self, _index: usize) -> HostResult<Option<&dyn HostTrack>> {
        Err(HostError::unsupported(capability::GET_AUDIO_TRACK))
    }

    fn markers(&self) -> HostResult<Vec<&dyn HostMarker>> {
        Err(HostError::unsupported(capability::GET_MARKERS))
    }

    /// Track items currently selected in the timeline.
    fn selection(&self) -> HostResult<Vec<&dyn HostTrackItem>> {
        Err(HostError::unsupported(capability::GET_SELECTION))
    }
}

pub trait HostTrack {
    fn index(&self) -> HostResult<i32> {
        Err(HostError::unsupported(capability::GET_INDEX))
    }

    fn name(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::NAME))
    }

    /// Items of `kind` in timeline order.
    fn track_items(&self, _kind: TrackItemKind, _include_empty: bool) -> HostResult<Vec<&dyn HostTrackItem>> {
        Err(HostError::unsupported(capability::GET_TRACK_ITEMS))
    }
}

pub trait HostTrackItem {
    fn start_time(&self) -> HostResult<&dyn HostTickTime> {
        Err(HostError::unsupported(capability::GET_START_TIME))
    }

    fn end_time(&self) -> HostResult<&dyn HostTickTime> {
        Err(HostError::unsupported(capability::GET_END_TIME))
    }

    fn duration(&self) -> HostResult<&dyn HostTickTime> {
        Err(HostError::unsupported(capability::GET_DURATION))
    }

    fn in_point(&self) -> HostResult<&dyn HostTickTime> {
        Err(HostError::unsupported(capability::GET_IN_POINT))
    }

    fn out_point(&self) -> HostResult<&dyn HostTickTime> {
        Err(HostError::unsupported(capability::GET_OUT_POINT))
    }

    fn name(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::GET_NAME))
    }

    fn item_type(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::GET_TYPE))
    }

    fn track_index(&self) -> HostResult<i32> {
        Err(HostError::unsupported(capability::GET_TRACK_INDEX))
    }

    fn is_disabled(&self) -> HostResult<bool> {
        Err(HostError::unsupported(capability::IS_DISABLED))
    }

    fn is_adjustment_layer(&self) -> HostResult<bool> {
        Err(HostError::unsupported(capability::IS_ADJUSTMENT_LAYER))
    }

    /// Playback speed in percent.
    fn speed(&self) -> HostResult<f64> {
        Err(HostError::unsupported(capability::GET_SPEED))
    }

    fn is_speed_reversed(&self) -> HostResult<bool> {
        Err(HostError::unsupported(capability::IS_SPEED_REVERSED))
    }

    fn project_item(&self) -> HostResult<Option<&dyn HostProjectItem>> {
        Err(HostError::unsupported(capability::GET_PROJECT_ITEM))
    }
}

pub trait HostProjectItem {
    fn name(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::GET_NAME))
    }

    fn guid(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::GET_GUID))
    }

    /// Cast to a clip item; `Ok(None)` when the item is not a clip (bins).
    fn as_clip(&self) -> HostResult<Option<&dyn HostClip>> {
        Err(HostError::unsupported(capability::CLIP_CAST))
    }
}

pub trait HostClip {
    fn is_sequence(&self) -> HostResult<bool> {
        Err(HostError::unsupported(capability::IS_SEQUENCE))
    }

    fn is_offline(&self) -> HostResult<bool> {
        Err(HostError::unsupported(capability::IS_OFFLINE))
    }

    fn has_proxy(&self) -> HostResult<bool> {
        Err(HostError::unsupported(capability::HAS_PROXY))
    }

    fn proxy_path(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::GET_PROXY_PATH))
    }

    fn media_file_path(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::GET_MEDIA_FILE_PATH))
    }

    fn media_path(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::GET_MEDIA_PATH))
    }
}

pub trait HostMarker {
    fn name(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::GET_NAME))
    }

    fn start(&self) -> HostResult<&dyn HostTickTime> {
        Err(HostError::unsupported(capability::GET_START))
    }

    fn duration(&self) -> HostResult<&dyn HostTickTime> {
        Err(HostError::unsupported(capability::GET_DURATION))
    }

    fn marker_type(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::GET_TYPE))
    }

    /// Marker color already stringified by the host.
    fn color(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::GET_COLOR))
    }

    fn comments(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::GET_COMMENTS))
    }

    fn url(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::GET_URL))
    }

    fn target(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::GET_TARGET))
    }
}

/// Host time object; each representation is a separate call.
pub trait HostTickTime {
    fn seconds(&self) -> HostResult<f64> {
        Err(HostError::unsupported(capability::SECONDS))
    }

    fn ticks(&self) -> HostResult<String> {
        Err(HostError::unsupported(capability::TICKS))
    }

    fn ticks_number(&self) -> HostResult<i64> {
        Err(HostError::unsupported(capability::TICKS_NUMBER))
    }
}

/// Plain tick times are valid host time objects: absent fields are unsupported.
impl HostTickTime for TickTime {
    fn seconds(&self) -> HostResult<f64> {
        self.seconds.ok_or(HostError::unsupported(capability::SECONDS))
    }

    fn ticks(&self) -> HostResult<String> {
        self.ticks
            .clone()
            .ok_or(HostError::unsupported(capability::TICKS))
    }

    fn ticks_number(&self) -> HostResult<i64> {
        self.ticks_number
            .ok_or(HostError::unsupported(capability::TICKS_NUMBER))
    }
}

/// Mutating access to one sequence.
pub trait HostSequenceEditor {
    fn video_track_count(&self) -> HostResult<usize> {
        Err(HostError::unsupported(capability::EDITOR_VIDEO_TRACK_COUNT))
    }

    fn has_video_track_at(&self, _index: usize) -> HostResult<bool> {
        Err(HostError::unsupported(capability::HAS_VIDEO_TRACK_AT))
    }

    /// Insert a template asset at `at`; returns the created items, first is the graphic.
    fn insert_template(
        &mut self,
        _template_path: &str,
        _at: &TickTime,
        _video_track: usize,
        _audio_track: usize,
    ) -> HostResult<Vec<OverlayItem>> {
        Err(HostError::unsupported(capability::INSERT_MOGRT))
    }

    fn set_item_end(&mut self, _item: OverlayItem, _end: &TickTime) -> HostResult<()> {
        Err(HostError::unsupported(capability::SET_END_TIME))
    }

    /// Set text parameters of an inserted template as one undoable step.
    fn set_text_params(&mut self, _item: OverlayItem, _params: &[TextParam], _undo_label: &str) -> HostResult<()> {
        Err(HostError::unsupported(capability::EXECUTE_TRANSACTION))
    }
}

/// Read every representation of a host time independently.
///
/// `None` input (accessor itself unavailable) stays `None`; a time object
/// whose representations all fail is also `None`.
pub fn read_tick_time(op: &str, time: HostResult<&dyn HostTickTime>) -> Option<TickTime> {
    let time = resolve_opt(op, time)?;
    let tick_time = TickTime {
        seconds: resolve_opt(op, time.seconds()),
        ticks: resolve_opt(op, time.ticks()),
        ticks_number: resolve_opt(op, time.ticks_number()),
    };
    (!tick_time.is_empty()).then_some(tick_time)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BareSequence;
    impl HostSequence for BareSequence {}

    struct PartialTime;
    impl HostTickTime for PartialTime {
        fn ticks(&self) -> HostResult<String> {
            Ok("42".to_string())
        }

        fn seconds(&self) -> HostResult<f64> {
            Err(HostError::call(capability::SECONDS, "boom"))
        }
    }

    /// Test: trait defaults report the accessor name
    #[test]
    fn test_default_methods_are_unsupported() {
        let seq = BareSequence;
        let err = seq.markers().err().unwrap();
        assert!(err.is_unsupported());
        assert_eq!(err.capability(), capability::GET_MARKERS);
        assert!(seq.video_track(0).is_err());
    }

    #[test]
    fn test_resolve_or_degrades() {
        assert_eq!(resolve_or("test", Ok(3), 0), 3);
        assert_eq!(resolve_or("test", Err(HostError::unsupported("x")), 0), 0);
        assert_eq!(resolve_or("test", Err::<i32, _>(HostError::call("x", "boom")), -1), -1);
        assert_eq!(resolve_opt::<i32>("test", Err(HostError::unsupported("x"))), None);
    }

    /// Test: partial time objects
    /// Validates: each representation is guarded on its own
    #[test]
    fn test_read_tick_time_partial() {
        let time = PartialTime;
        let read = read_tick_time("test", Ok(&time)).unwrap();
        assert_eq!(read.ticks.as_deref(), Some("42"));
        assert_eq!(read.seconds, None);
        assert_eq!(read.ticks_number, None);

        assert_eq!(read_tick_time("test", Err(HostError::unsupported("x"))), None);
    }

    #[test]
    fn test_rate_value_json_shapes() {
        let number: RateValue = serde_json::from_str("25").unwrap();
        assert_eq!(number.as_f64(), Some(25.0));

        let ratio: RateValue = serde_json::from_str(r#"{"numerator":30000,"denominator":1001}"#).unwrap();
        assert!((ratio.as_f64().unwrap() - 29.97).abs() < 0.001);

        let broken = RateValue::Ratio(Rational::new(30, 0));
        assert_eq!(broken.as_f64(), None);
    }
}
