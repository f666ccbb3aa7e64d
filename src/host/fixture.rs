//! In-memory host backed by JSON.
//!
//! # Purpose
//!
//! Implements every host trait over plain serde structs so a recorded (or
//! hand-written) project state can be snapshotted and edited without the
//! editing application. Used by the CLI (`--host FILE`) and by the tests.
//!
//! # Capability switches
//!
//! Every fixture object flattens a [`Capabilities`] block:
//!
//! ```json
//! { "name": "V1", "missing": ["getIndex"], "failing": ["getTrackItems"] }
//! ```
//!
//! - `missing` - accessor names reported as [`HostError::Unsupported`]
//! - `failing` - accessor names whose calls return [`HostError::Call`]
//!
//! Optional time/rate fields left out of the JSON are also unsupported.
//!
//! # Editing
//!
//! Sequence creation gives the new sequence a random uuid and the project's
//! `newSequence` track layout, and makes it active. Template insertion puts a
//! `Graphic` item on an unlocked video track, ordered by start time.

use super::{
    Host, HostClip, HostError, HostMarker, HostProject, HostProjectItem, HostResult, HostSequence,
    HostSequenceEditor, HostTickTime, HostTrack, HostTrackItem, OverlayItem, RateValue, Rational,
    TextParam, TrackItemKind, capability as cap,
};
use crate::timecode::{TICKS_PER_SECOND, TickTime};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Length given to freshly inserted templates until their end is set.
const TEMPLATE_DEFAULT_SECONDS: f64 = 5.0;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub missing: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub failing: BTreeSet<String>,
}

impl Capabilities {
    fn gate(&self, capability: &'static str) -> HostResult<()> {
        if self.missing.contains(capability) {
            return Err(HostError::unsupported(capability));
        }
        if self.failing.contains(capability) {
            return Err(HostError::call(capability, "marked as failing"));
        }
        Ok(())
    }

    fn read<T: Clone>(&self, capability: &'static str, value: &T) -> HostResult<T> {
        self.gate(capability)?;
        Ok(value.clone())
    }

    fn read_opt<T: Clone>(&self, capability: &'static str, value: &Option<T>) -> HostResult<T> {
        self.gate(capability)?;
        value.clone().ok_or(HostError::unsupported(capability))
    }
}

/// Builder helpers shared by every fixture object.
pub trait WithCapabilities: Sized {
    fn caps_mut(&mut self) -> &mut Capabilities;

    fn without(mut self, capability: &str) -> Self {
        self.caps_mut().missing.insert(capability.to_string());
        self
    }

    fn failing(mut self, capability: &str) -> Self {
        self.caps_mut().failing.insert(capability.to_string());
        self
    }
}

macro_rules! with_capabilities {
    ($($ty:ty),* $(,)?) => {
        $(impl WithCapabilities for $ty {
            fn caps_mut(&mut self) -> &mut Capabilities {
                &mut self.caps
            }
        })*
    };
}

with_capabilities!(
    FixtureHost,
    FixtureProject,
    FixtureSequence,
    FixtureTrack,
    FixtureTrackItem,
    FixtureProjectItem,
    FixtureClip,
    FixtureMarker,
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixtureHost {
    pub project: Option<FixtureProject>,
    #[serde(flatten)]
    pub caps: Capabilities,
}

impl FixtureHost {
    pub fn new(project: FixtureProject) -> Self {
        Self {
            project: Some(project),
            caps: Capabilities::default(),
        }
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read host fixture: {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("Failed to parse host fixture: {}", path.display()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize host fixture")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write host fixture: {}", path.display()))
    }
}

impl Host for FixtureHost {
    fn active_project(&self) -> HostResult<Option<&dyn HostProject>> {
        self.caps.gate(cap::GET_ACTIVE_PROJECT)?;
        Ok(self.project.as_ref().map(|p| p as &dyn HostProject))
    }

    fn active_project_mut(&mut self) -> HostResult<Option<&mut dyn HostProject>> {
        self.caps.gate(cap::GET_ACTIVE_PROJECT)?;
        Ok(self.project.as_mut().map(|p| p as &mut dyn HostProject))
    }
}

/// Track layout and rate of sequences created through the fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SequenceLayout {
    pub video_tracks: usize,
    pub audio_tracks: usize,
    pub frame_rate: RateValue,
    /// Video track indices created locked.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locked_video_tracks: Vec<usize>,
}

impl Default for SequenceLayout {
    fn default() -> Self {
        Self {
            video_tracks: 3,
            audio_tracks: 2,
            frame_rate: RateValue::Ratio(Rational::new(30000, 1001)),
            locked_video_tracks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixtureProject {
    pub name: String,
    /// Guid of the active sequence.
    pub active_sequence: Option<String>,
    pub sequences: Vec<FixtureSequence>,
    pub root_items: Vec<FixtureProjectItem>,
    pub new_sequence: SequenceLayout,
    #[serde(flatten)]
    pub caps: Capabilities,
}

impl FixtureProject {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Add a sequence; the first one added becomes active.
    pub fn with_sequence(mut self, sequence: FixtureSequence) -> Self {
        if self.active_sequence.is_none() {
            self.active_sequence = Some(sequence.guid.clone());
        }
        self.sequences.push(sequence);
        self
    }

    pub fn with_root_item(mut self, item: FixtureProjectItem) -> Self {
        self.root_items.push(item);
        self
    }

    pub fn find_sequence(&self, guid: &str) -> Option<&FixtureSequence> {
        self.sequences.iter().find(|s| s.guid == guid)
    }

    pub fn active(&self) -> Option<&FixtureSequence> {
        self.active_sequence
            .as_deref()
            .and_then(|guid| self.find_sequence(guid))
    }

    fn add_sequence(&mut self, name: &str) -> &mut FixtureSequence {
        let layout = &self.new_sequence;
        let mut sequence = FixtureSequence::new(&Uuid::new_v4().to_string(), name);
        sequence.frame_rate = Some(layout.frame_rate);
        sequence.zero_point = Some(TickTime::from_ticks(0));
        sequence.video_tracks = (0..layout.video_tracks)
            .map(|i| FixtureTrack {
                locked: layout.locked_video_tracks.contains(&i),
                ..FixtureTrack::new(i as i32, &format!("Video {}", i + 1))
            })
            .collect();
        sequence.audio_tracks = (0..layout.audio_tracks)
            .map(|i| FixtureTrack::new(i as i32, &format!("Audio {}", i + 1)))
            .collect();

        log::debug!("Fixture: created sequence '{}' ({})", name, sequence.guid);
        self.active_sequence = Some(sequence.guid.clone());
        self.sequences.push(sequence);
        let last = self.sequences.len() - 1;
        &mut self.sequences[last]
    }

    fn create_from_preset(&mut self, capability: &'static str, name: &str, preset_path: &str) -> HostResult<String> {
        self.caps.gate(capability)?;
        if preset_path.trim().is_empty() {
            return Err(HostError::call(capability, "preset path is empty"));
        }
        Ok(self.add_sequence(name).guid.clone())
    }
}

impl HostProject for FixtureProject {
    fn name(&self) -> HostResult<String> {
        self.caps.read(cap::NAME, &self.name)
    }

    fn active_sequence(&self) -> HostResult<Option<&dyn HostSequence>> {
        self.caps.gate(cap::GET_ACTIVE_SEQUENCE)?;
        Ok(self.active().map(|s| s as &dyn HostSequence))
    }

    fn sequences(&self) -> HostResult<Vec<&dyn HostSequence>> {
        self.caps.gate(cap::GET_SEQUENCES)?;
        Ok(self.sequences.iter().map(|s| s as &dyn HostSequence).collect())
    }

    fn root_items(&self) -> HostResult<Vec<&dyn HostProjectItem>> {
        self.caps.gate(cap::GET_ROOT_ITEM)?;
        Ok(self.root_items.iter().map(|i| i as &dyn HostProjectItem).collect())
    }

    fn create_sequence_with_preset(&mut self, name: &str, preset_path: &str) -> HostResult<String> {
        self.create_from_preset(cap::CREATE_SEQUENCE_WITH_PRESET, name, preset_path)
    }

    fn create_sequence(&mut self, name: &str, preset_path: &str) -> HostResult<String> {
        self.create_from_preset(cap::CREATE_SEQUENCE, name, preset_path)
    }

    fn create_sequence_from_media(&mut self, name: &str, clip_guid: &str) -> HostResult<String> {
        self.caps.gate(cap::CREATE_SEQUENCE_FROM_MEDIA)?;
        let source = self
            .root_items
            .iter()
            .find(|item| item.guid == clip_guid && item.clip.is_some())
            .cloned()
            .ok_or_else(|| {
                HostError::call(cap::CREATE_SEQUENCE_FROM_MEDIA, format!("no clip with guid {}", clip_guid))
            })?;
        let seconds = source.clip.as_ref().map_or(0.0, |c| c.duration_seconds);

        let sequence = self.add_sequence(name);
        let item = FixtureTrackItem::clip(&source.name, 0.0, seconds).with_source(source);
        if let Some(track) = sequence.video_tracks.first_mut() {
            track.push(item.clone());
        }
        if let Some(track) = sequence.audio_tracks.first_mut() {
            track.push(item);
        }
        sequence.end_time = Some(TickTime::from_seconds(seconds));
        Ok(sequence.guid.clone())
    }

    fn sequence_editor(&mut self, sequence_guid: &str) -> HostResult<Option<&mut dyn HostSequenceEditor>> {
        self.caps.gate(cap::GET_EDITOR)?;
        Ok(self
            .sequences
            .iter_mut()
            .find(|s| s.guid == sequence_guid)
            .map(|s| s as &mut dyn HostSequenceEditor))
    }
}

/// Reference into a sequence's tracks (timeline selection).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemRef {
    pub audio: bool,
    pub track: usize,
    pub item: usize,
}

impl ItemRef {
    pub fn video(track: usize, item: usize) -> Self {
        Self { audio: false, track, item }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixtureSequence {
    pub guid: String,
    pub name: String,
    pub in_point: Option<TickTime>,
    pub out_point: Option<TickTime>,
    pub end_time: Option<TickTime>,
    pub zero_point: Option<TickTime>,
    pub timebase: Option<Rational>,
    pub frame_rate: Option<RateValue>,
    pub ticks_per_frame: Option<i64>,
    pub settings: Option<serde_json::Value>,
    pub video_tracks: Vec<FixtureTrack>,
    pub audio_tracks: Vec<FixtureTrack>,
    pub markers: Vec<FixtureMarker>,
    pub selection: Vec<ItemRef>,
    /// Labels of text transactions applied through the editor.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub undo_history: Vec<String>,
    #[serde(flatten)]
    pub caps: Capabilities,
}

impl FixtureSequence {
    pub fn new(guid: &str, name: &str) -> Self {
        Self {
            guid: guid.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_video_track(mut self, track: FixtureTrack) -> Self {
        self.video_tracks.push(track);
        self
    }

    pub fn with_audio_track(mut self, track: FixtureTrack) -> Self {
        self.audio_tracks.push(track);
        self
    }

    pub fn with_marker(mut self, marker: FixtureMarker) -> Self {
        self.markers.push(marker);
        self
    }

    fn item_at(&self, at: ItemRef) -> Option<&FixtureTrackItem> {
        let tracks = if at.audio { &self.audio_tracks } else { &self.video_tracks };
        tracks.get(at.track).and_then(|t| t.items.get(at.item))
    }

    fn overlay_mut(&mut self, capability: &'static str, item: OverlayItem) -> HostResult<&mut FixtureTrackItem> {
        self.video_tracks
            .get_mut(item.video_track)
            .and_then(|t| t.items.get_mut(item.item))
            .ok_or_else(|| HostError::call(capability, format!("no item {:?}", item)))
    }
}

impl HostSequence for FixtureSequence {
    fn name(&self) -> HostResult<String> {
        self.caps.read(cap::NAME, &self.name)
    }

    fn guid(&self) -> HostResult<String> {
        self.caps.read(cap::GUID, &self.guid)
    }

    fn in_point(&self) -> HostResult<&dyn HostTickTime> {
        time_ref(&self.caps, cap::GET_IN_POINT, &self.in_point)
    }

    fn out_point(&self) -> HostResult<&dyn HostTickTime> {
        time_ref(&self.caps, cap::GET_OUT_POINT, &self.out_point)
    }

    fn end_time(&self) -> HostResult<&dyn HostTickTime> {
        time_ref(&self.caps, cap::GET_END_TIME, &self.end_time)
    }

    fn zero_point(&self) -> HostResult<&dyn HostTickTime> {
        time_ref(&self.caps, cap::GET_ZERO_POINT, &self.zero_point)
    }

    fn timebase(&self) -> HostResult<Rational> {
        self.caps.read_opt(cap::GET_TIMEBASE, &self.timebase)
    }

    fn frame_rate(&self) -> HostResult<RateValue> {
        self.caps.read_opt(cap::GET_FRAME_RATE, &self.frame_rate)
    }

    fn ticks_per_frame(&self) -> HostResult<i64> {
        self.caps.read_opt(cap::GET_TICKS_PER_FRAME, &self.ticks_per_frame)
    }

    fn settings(&self) -> HostResult<serde_json::Value> {
        self.caps.read_opt(cap::GET_SETTINGS, &self.settings)
    }

    fn video_track_count(&self) -> HostResult<usize> {
        self.caps.read(cap::GET_VIDEO_TRACK_COUNT, &self.video_tracks.len())
    }

    fn audio_track_count(&self) -> HostResult<usize> {
        self.caps.read(cap::GET_AUDIO_TRACK_COUNT, &self.audio_tracks.len())
    }

    fn video_track(&self, index: usize) -> HostResult<Option<&dyn HostTrack>> {
        self.caps.gate(cap::GET_VIDEO_TRACK)?;
        Ok(self.video_tracks.get(index).map(|t| t as &dyn HostTrack))
    }

    fn audio_track(&self, index: usize) -> HostResult<Option<&dyn HostTrack>> {
        self.caps.gate(cap::GET_AUDIO_TRACK)?;
        Ok(self.audio_tracks.get(index).map(|t| t as &dyn HostTrack))
    }

    fn markers(&self) -> HostResult<Vec<&dyn HostMarker>> {
        self.caps.gate(cap::GET_MARKERS)?;
        Ok(self.markers.iter().map(|m| m as &dyn HostMarker).collect())
    }

    fn selection(&self) -> HostResult<Vec<&dyn HostTrackItem>> {
        self.caps.gate(cap::GET_SELECTION)?;
        Ok(self
            .selection
            .iter()
            .filter_map(|at| self.item_at(*at))
            .map(|item| item as &dyn HostTrackItem)
            .collect())
    }
}

impl HostSequenceEditor for FixtureSequence {
    fn video_track_count(&self) -> HostResult<usize> {
        self.caps.read(cap::EDITOR_VIDEO_TRACK_COUNT, &self.video_tracks.len())
    }

    fn has_video_track_at(&self, index: usize) -> HostResult<bool> {
        self.caps.gate(cap::HAS_VIDEO_TRACK_AT)?;
        Ok(index < self.video_tracks.len())
    }

    // Fixture templates carry no audio, so the audio track is not used.
    fn insert_template(
        &mut self,
        template_path: &str,
        at: &TickTime,
        video_track: usize,
        _audio_track: usize,
    ) -> HostResult<Vec<OverlayItem>> {
        self.caps.gate(cap::INSERT_MOGRT)?;
        if template_path.trim().is_empty() {
            return Err(HostError::call(cap::INSERT_MOGRT, "template path is empty"));
        }
        let start = at
            .tick_count()
            .ok_or_else(|| HostError::call(cap::INSERT_MOGRT, "insertion time has no ticks"))?;
        let track = self
            .video_tracks
            .get_mut(video_track)
            .ok_or_else(|| HostError::call(cap::INSERT_MOGRT, format!("no video track V{}", video_track + 1)))?;
        if track.locked {
            return Err(HostError::call(cap::INSERT_MOGRT, format!("V{} is locked", video_track + 1)));
        }

        let name = Path::new(template_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Graphic");
        let end = start + (TEMPLATE_DEFAULT_SECONDS * TICKS_PER_SECOND as f64) as i64;
        let mut item = FixtureTrackItem::from_ticks(name, start, end);
        item.item_type = "Graphic".to_string();
        item.track_index = Some(video_track as i32);

        let position = track
            .items
            .iter()
            .position(|existing| existing.start_ticks().is_some_and(|t| t > start))
            .unwrap_or(track.items.len());
        track.items.insert(position, item);

        Ok(vec![OverlayItem {
            video_track,
            item: position,
        }])
    }

    fn set_item_end(&mut self, item: OverlayItem, end: &TickTime) -> HostResult<()> {
        self.caps.gate(cap::SET_END_TIME)?;
        let target = self.overlay_mut(cap::SET_END_TIME, item)?;
        let end_ticks = end
            .tick_count()
            .ok_or_else(|| HostError::call(cap::SET_END_TIME, "end time has no ticks"))?;
        let start_ticks = target.start_ticks().unwrap_or(0);
        target.end = Some(TickTime::from_ticks(end_ticks));
        target.duration = Some(TickTime::from_ticks(end_ticks - start_ticks));
        target.out_point = target.duration.clone();
        Ok(())
    }

    fn set_text_params(&mut self, item: OverlayItem, params: &[TextParam], undo_label: &str) -> HostResult<()> {
        self.caps.gate(cap::EXECUTE_TRANSACTION)?;
        let target = self.overlay_mut(cap::EXECUTE_TRANSACTION, item)?;
        for param in params {
            target.params.insert(param.index, param.value.clone());
        }
        self.undo_history.push(undo_label.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixtureTrack {
    pub index: Option<i32>,
    pub name: String,
    /// Locked tracks refuse template insertion.
    pub locked: bool,
    pub items: Vec<FixtureTrackItem>,
    #[serde(flatten)]
    pub caps: Capabilities,
}

impl FixtureTrack {
    pub fn new(index: i32, name: &str) -> Self {
        Self {
            index: Some(index),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Append an item, stamping this track's index on it.
    pub fn with_item(mut self, item: FixtureTrackItem) -> Self {
        self.push(item);
        self
    }

    fn push(&mut self, mut item: FixtureTrackItem) {
        if item.track_index.is_none() {
            item.track_index = self.index;
        }
        self.items.push(item);
    }
}

impl HostTrack for FixtureTrack {
    fn index(&self) -> HostResult<i32> {
        self.caps.read_opt(cap::GET_INDEX, &self.index)
    }

    fn name(&self) -> HostResult<String> {
        self.caps.read(cap::NAME, &self.name)
    }

    fn track_items(&self, kind: TrackItemKind, include_empty: bool) -> HostResult<Vec<&dyn HostTrackItem>> {
        self.caps.gate(cap::GET_TRACK_ITEMS)?;
        Ok(self
            .items
            .iter()
            .filter(|item| item.kind == kind || (include_empty && item.kind == TrackItemKind::Empty))
            .map(|item| item as &dyn HostTrackItem)
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixtureTrackItem {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub kind: TrackItemKind,
    pub track_index: Option<i32>,
    pub disabled: bool,
    pub adjustment_layer: bool,
    pub speed: f64,
    pub reversed: bool,
    pub start: Option<TickTime>,
    pub end: Option<TickTime>,
    pub duration: Option<TickTime>,
    pub in_point: Option<TickTime>,
    pub out_point: Option<TickTime>,
    pub project_item: Option<FixtureProjectItem>,
    /// Template text parameters by index.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<usize, String>,
    #[serde(flatten)]
    pub caps: Capabilities,
}

impl Default for FixtureTrackItem {
    fn default() -> Self {
        Self {
            name: String::new(),
            item_type: String::new(),
            kind: TrackItemKind::Clip,
            track_index: None,
            disabled: false,
            adjustment_layer: false,
            speed: 100.0,
            reversed: false,
            start: None,
            end: None,
            duration: None,
            in_point: None,
            out_point: None,
            project_item: None,
            params: BTreeMap::new(),
            caps: Capabilities::default(),
        }
    }
}

impl FixtureTrackItem {
    /// Clip spanning `[start, end)` seconds on the timeline, source in at zero.
    pub fn clip(name: &str, start_seconds: f64, end_seconds: f64) -> Self {
        let start = TickTime::from_seconds(start_seconds).tick_count().unwrap_or(0);
        let end = TickTime::from_seconds(end_seconds).tick_count().unwrap_or(0);
        Self::from_ticks(name, start, end)
    }

    fn from_ticks(name: &str, start: i64, end: i64) -> Self {
        Self {
            name: name.to_string(),
            item_type: "Clip".to_string(),
            start: Some(TickTime::from_ticks(start)),
            end: Some(TickTime::from_ticks(end)),
            duration: Some(TickTime::from_ticks(end - start)),
            in_point: Some(TickTime::from_ticks(0)),
            out_point: Some(TickTime::from_ticks(end - start)),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, item: FixtureProjectItem) -> Self {
        self.project_item = Some(item);
        self
    }

    fn start_ticks(&self) -> Option<i64> {
        self.start.as_ref().and_then(TickTime::tick_count)
    }
}

impl HostTrackItem for FixtureTrackItem {
    fn start_time(&self) -> HostResult<&dyn HostTickTime> {
        time_ref(&self.caps, cap::GET_START_TIME, &self.start)
    }

    fn end_time(&self) -> HostResult<&dyn HostTickTime> {
        time_ref(&self.caps, cap::GET_END_TIME, &self.end)
    }

    fn duration(&self) -> HostResult<&dyn HostTickTime> {
        time_ref(&self.caps, cap::GET_DURATION, &self.duration)
    }

    fn in_point(&self) -> HostResult<&dyn HostTickTime> {
        time_ref(&self.caps, cap::GET_IN_POINT, &self.in_point)
    }

    fn out_point(&self) -> HostResult<&dyn HostTickTime> {
        time_ref(&self.caps, cap::GET_OUT_POINT, &self.out_point)
    }

    fn name(&self) -> HostResult<String> {
        self.caps.read(cap::GET_NAME, &self.name)
    }

    fn item_type(&self) -> HostResult<String> {
        self.caps.read(cap::GET_TYPE, &self.item_type)
    }

    fn track_index(&self) -> HostResult<i32> {
        self.caps.read_opt(cap::GET_TRACK_INDEX, &self.track_index)
    }

    fn is_disabled(&self) -> HostResult<bool> {
        self.caps.read(cap::IS_DISABLED, &self.disabled)
    }

    fn is_adjustment_layer(&self) -> HostResult<bool> {
        self.caps.read(cap::IS_ADJUSTMENT_LAYER, &self.adjustment_layer)
    }

    fn speed(&self) -> HostResult<f64> {
        self.caps.read(cap::GET_SPEED, &self.speed)
    }

    fn is_speed_reversed(&self) -> HostResult<bool> {
        self.caps.read(cap::IS_SPEED_REVERSED, &self.reversed)
    }

    fn project_item(&self) -> HostResult<Option<&dyn HostProjectItem>> {
        self.caps.gate(cap::GET_PROJECT_ITEM)?;
        Ok(self.project_item.as_ref().map(|p| p as &dyn HostProjectItem))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixtureProjectItem {
    pub name: String,
    pub guid: String,
    /// Present when the item casts to a clip.
    pub clip: Option<FixtureClip>,
    #[serde(flatten)]
    pub caps: Capabilities,
}

impl FixtureProjectItem {
    pub fn clip(name: &str, guid: &str, clip: FixtureClip) -> Self {
        Self {
            name: name.to_string(),
            guid: guid.to_string(),
            clip: Some(clip),
            caps: Capabilities::default(),
        }
    }

    pub fn bin(name: &str, guid: &str) -> Self {
        Self {
            name: name.to_string(),
            guid: guid.to_string(),
            ..Default::default()
        }
    }
}

impl HostProjectItem for FixtureProjectItem {
    fn name(&self) -> HostResult<String> {
        self.caps.read(cap::GET_NAME, &self.name)
    }

    fn guid(&self) -> HostResult<String> {
        self.caps.read(cap::GET_GUID, &self.guid)
    }

    fn as_clip(&self) -> HostResult<Option<&dyn HostClip>> {
        self.caps.gate(cap::CLIP_CAST)?;
        Ok(self.clip.as_ref().map(|c| c as &dyn HostClip))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixtureClip {
    pub sequence: bool,
    pub offline: bool,
    pub proxy_path: String,
    pub media_file_path: String,
    pub media_path: String,
    pub duration_seconds: f64,
    #[serde(flatten)]
    pub caps: Capabilities,
}

impl FixtureClip {
    pub fn media(path: &str, duration_seconds: f64) -> Self {
        Self {
            media_file_path: path.to_string(),
            media_path: path.to_string(),
            duration_seconds,
            ..Default::default()
        }
    }

    pub fn nested_sequence() -> Self {
        Self {
            sequence: true,
            ..Default::default()
        }
    }

    pub fn with_proxy(mut self, path: &str) -> Self {
        self.proxy_path = path.to_string();
        self
    }

    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }
}

impl HostClip for FixtureClip {
    fn is_sequence(&self) -> HostResult<bool> {
        self.caps.read(cap::IS_SEQUENCE, &self.sequence)
    }

    fn is_offline(&self) -> HostResult<bool> {
        self.caps.read(cap::IS_OFFLINE, &self.offline)
    }

    fn has_proxy(&self) -> HostResult<bool> {
        self.caps.read(cap::HAS_PROXY, &!self.proxy_path.is_empty())
    }

    fn proxy_path(&self) -> HostResult<String> {
        self.caps.read(cap::GET_PROXY_PATH, &self.proxy_path)
    }

    fn media_file_path(&self) -> HostResult<String> {
        self.caps.read(cap::GET_MEDIA_FILE_PATH, &self.media_file_path)
    }

    fn media_path(&self) -> HostResult<String> {
        self.caps.read(cap::GET_MEDIA_PATH, &self.media_path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixtureMarker {
    pub name: String,
    pub start: Option<TickTime>,
    pub duration: Option<TickTime>,
    #[serde(rename = "type")]
    pub marker_type: String,
    pub color: String,
    pub comments: String,
    pub url: String,
    pub target: String,
    #[serde(flatten)]
    pub caps: Capabilities,
}

impl FixtureMarker {
    pub fn comment(name: &str, start_seconds: f64, duration_seconds: f64) -> Self {
        Self {
            name: name.to_string(),
            start: Some(TickTime::from_seconds(start_seconds)),
            duration: Some(TickTime::from_seconds(duration_seconds)),
            marker_type: "Comment".to_string(),
            ..Default::default()
        }
    }
}

impl HostMarker for FixtureMarker {
    fn name(&self) -> HostResult<String> {
        self.caps.read(cap::GET_NAME, &self.name)
    }

    fn start(&self) -> HostResult<&dyn HostTickTime> {
        time_ref(&self.caps, cap::GET_START, &self.start)
    }

    fn duration(&self) -> HostResult<&dyn HostTickTime> {
        time_ref(&self.caps, cap::GET_DURATION, &self.duration)
    }

    fn marker_type(&self) -> HostResult<String> {
        self.caps.read(cap::GET_TYPE, &self.marker_type)
    }

    fn color(&self) -> HostResult<String> {
        self.caps.read(cap::GET_COLOR, &self.color)
    }

    fn comments(&self) -> HostResult<String> {
        self.caps.read(cap::GET_COMMENTS, &self.comments)
    }

    fn url(&self) -> HostResult<String> {
        self.caps.read(cap::GET_URL, &self.url)
    }

    fn target(&self) -> HostResult<String> {
        self.caps.read(cap::GET_TARGET, &self.target)
    }
}

fn time_ref<'a>(
    caps: &Capabilities,
    capability: &'static str,
    value: &'a Option<TickTime>,
) -> HostResult<&'a dyn HostTickTime> {
    caps.gate(capability)?;
    value
        .as_ref()
        .map(|t| t as &dyn HostTickTime)
        .ok_or(HostError::unsupported(capability))
}

/// Shared fixture used across the crate's tests.
///
/// Project "Demo" with active sequence "Main Edit" at 29.97:
/// V1 holds three clips, V2 is empty, A1 holds two clips, one marker, and the
/// timeline selection is V1 items 0 and 2. The root bin has a folder, two
/// clips (one with a proxy), a nested sequence and an offline clip.
#[cfg(test)]
pub(crate) fn sample_host() -> FixtureHost {
    let interview = FixtureProjectItem::clip(
        "interview.mov",
        "clip-interview",
        FixtureClip::media("/media/interview.mov", 120.0).with_proxy("/proxy/interview_proxy.mov"),
    );
    let broll = FixtureProjectItem::clip(
        "broll.mp4",
        "clip-broll",
        FixtureClip::media("/media/broll.mp4", 30.0),
    );
    let music = FixtureProjectItem::clip(
        "music.wav",
        "clip-music",
        FixtureClip::media("/media/music.wav", 180.0),
    );

    let v1 = FixtureTrack::new(0, "Video 1")
        .with_item(FixtureTrackItem::clip("interview.mov", 0.0, 10.0).with_source(interview.clone()))
        .with_item(FixtureTrackItem::clip("broll.mp4", 10.0, 15.0).with_source(broll.clone()))
        .with_item(FixtureTrackItem::clip("interview.mov", 15.0, 42.5).with_source(interview.clone()));
    let v2 = FixtureTrack::new(1, "Video 2");
    let a1 = FixtureTrack::new(0, "Audio 1")
        .with_item(FixtureTrackItem::clip("interview.mov", 0.0, 10.0).with_source(interview.clone()))
        .with_item(FixtureTrackItem::clip("music.wav", 10.0, 42.5).with_source(music.clone()));

    let mut main = FixtureSequence::new("seq-main", "Main Edit")
        .with_video_track(v1)
        .with_video_track(v2)
        .with_audio_track(a1)
        .with_marker(FixtureMarker::comment("Check color", 12.0, 0.0));
    main.frame_rate = Some(RateValue::Ratio(Rational::new(30000, 1001)));
    main.zero_point = Some(TickTime::from_ticks(0));
    main.in_point = Some(TickTime::from_seconds(0.0));
    main.out_point = Some(TickTime::from_seconds(42.5));
    main.end_time = Some(TickTime::from_seconds(42.5));
    main.settings = Some(serde_json::json!({ "videoFrameWidth": 1920, "videoFrameHeight": 1080 }));
    main.selection = vec![ItemRef::video(0, 0), ItemRef::video(0, 2)];

    let project = FixtureProject::new("Demo")
        .with_sequence(main)
        .with_root_item(FixtureProjectItem::bin("Footage", "bin-footage"))
        .with_root_item(interview)
        .with_root_item(broll)
        .with_root_item(FixtureProjectItem::clip(
            "Main Edit",
            "seq-main-item",
            FixtureClip::nested_sequence(),
        ))
        .with_root_item(FixtureProjectItem::clip(
            "lost.mov",
            "clip-lost",
            FixtureClip::media("/media/lost.mov", 5.0).offline(),
        ))
        .with_root_item(music);

    FixtureHost::new(project)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_shape() {
        let host = sample_host();
        let project = host.active_project().unwrap().unwrap();
        let sequence = project.active_sequence().unwrap().unwrap();
        assert_eq!(sequence.name().unwrap(), "Main Edit");
        assert_eq!(HostSequence::video_track_count(sequence).unwrap(), 2);

        let v1 = sequence.video_track(0).unwrap().unwrap();
        let items = v1.track_items(TrackItemKind::Clip, false).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].track_index().unwrap(), 0);
        assert_eq!(sequence.selection().unwrap().len(), 2);
    }

    /// Test: capability switches from JSON
    /// Validates: `missing` is unsupported, `failing` is a call error
    #[test]
    fn test_capabilities_from_json() {
        let json = r#"{
            "project": {
                "name": "P",
                "activeSequence": "s1",
                "missing": ["getRootItem"],
                "sequences": [{
                    "guid": "s1",
                    "name": "Seq",
                    "frameRate": 25,
                    "failing": ["getMarkers"],
                    "videoTracks": [{ "name": "V1", "items": [{ "name": "a", "speed": 50 }] }]
                }]
            }
        }"#;
        let host = FixtureHost::from_json(json).unwrap();
        let project = host.active_project().unwrap().unwrap();
        assert!(project.root_items().err().unwrap().is_unsupported());

        let sequence = project.active_sequence().unwrap().unwrap();
        let err = sequence.markers().err().unwrap();
        assert!(!err.is_unsupported());
        assert_eq!(err.capability(), cap::GET_MARKERS);
        assert_eq!(sequence.frame_rate().unwrap(), RateValue::Number(25.0));
        assert!(sequence.timebase().err().unwrap().is_unsupported());

        let track = sequence.video_track(0).unwrap().unwrap();
        assert!(track.index().err().unwrap().is_unsupported());
        let items = track.track_items(TrackItemKind::Clip, false).unwrap();
        assert_eq!(items[0].speed().unwrap(), 50.0);
        assert!(!items[0].is_disabled().unwrap());
    }

    #[test]
    fn test_create_sequence_from_media() {
        let mut host = sample_host();
        let project = host.project.as_mut().unwrap();
        let guid = project
            .create_sequence_from_media("Review", "clip-broll")
            .unwrap();

        let created = project.find_sequence(&guid).unwrap();
        assert_eq!(project.active_sequence.as_deref(), Some(guid.as_str()));
        assert_eq!(created.video_tracks.len(), 3);
        assert_eq!(created.video_tracks[0].items.len(), 1);
        assert_eq!(created.video_tracks[0].items[0].name, "broll.mp4");

        let missing = project.create_sequence_from_media("Review", "bin-footage");
        assert!(missing.is_err());
    }

    /// Test: template insertion keeps timeline order and respects locks
    #[test]
    fn test_insert_template() {
        let mut sequence = FixtureSequence::new("s", "S")
            .with_video_track(FixtureTrack::new(0, "V1"))
            .with_video_track(FixtureTrack::new(1, "V2").locked());

        let later = sequence
            .insert_template("/t/title.mogrt", &TickTime::from_seconds(10.0), 0, 0)
            .unwrap();
        let earlier = sequence
            .insert_template("/t/title.mogrt", &TickTime::from_seconds(2.0), 0, 0)
            .unwrap();
        assert_eq!(later[0].item, 0);
        assert_eq!(earlier[0].item, 0);
        assert_eq!(sequence.video_tracks[0].items[1].start, Some(TickTime::from_seconds(10.0)));
        assert_eq!(sequence.video_tracks[0].items[0].name, "title");

        let locked = sequence.insert_template("/t/title.mogrt", &TickTime::from_seconds(0.0), 1, 0);
        assert!(matches!(locked, Err(HostError::Call { .. })));
        let absent = sequence.insert_template("/t/title.mogrt", &TickTime::from_seconds(0.0), 5, 0);
        assert!(absent.is_err());
    }

    #[test]
    fn test_text_params_and_end() {
        let mut sequence = FixtureSequence::new("s", "S").with_video_track(FixtureTrack::new(0, "V1"));
        let item = sequence
            .insert_template("/t/sub.mogrt", &TickTime::from_seconds(1.0), 0, 0)
            .unwrap()[0];

        sequence.set_item_end(item, &TickTime::from_seconds(3.0)).unwrap();
        let params = [TextParam { index: 0, value: "Intro".into() }];
        sequence.set_text_params(item, &params, "Set subtitle for Intro").unwrap();

        let inserted = &sequence.video_tracks[0].items[0];
        assert_eq!(inserted.duration, Some(TickTime::from_seconds(2.0)));
        assert_eq!(inserted.params.get(&0).map(String::as_str), Some("Intro"));
        assert_eq!(sequence.undo_history, vec!["Set subtitle for Intro".to_string()]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.json");
        let host = sample_host().without(cap::GET_ACTIVE_PROJECT);

        host.save(&path).unwrap();
        let loaded = FixtureHost::load(&path).unwrap();
        assert_eq!(loaded, host);
        assert!(loaded.active_project().err().unwrap().is_unsupported());
    }
}
