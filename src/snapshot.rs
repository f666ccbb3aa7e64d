//! Timeline snapshot: a JSON tree of the active sequence.
//!
//! # Purpose
//!
//! Walks the host sequence graph (video tracks, audio tracks, track items,
//! markers) and captures it as plain data that can be printed, diffed or
//! exported as `timeline-snapshot.json`.
//!
//! # Degradation
//!
//! Only the root is fatal: no project or no active sequence is a
//! [`SnapshotError`]. Every other accessor is read on its own and degrades:
//!
//! | field            | fallback |
//! |------------------|----------|
//! | names, strings   | `""`     |
//! | track item index | `-1`     |
//! | track index      | enumeration position |
//! | speed            | `100`    |
//! | flags            | `false`  |
//! | times, timebase  | `null`   |
//! | markers          | `[]`     |
//!
//! Tracks the host cannot return are skipped. Items keep host order.
//!
//! # JSON layout
//!
//! ```text
//! { sequence: { name, guid, timebase, zeroPoint, inPoint, outPoint, endTime,
//!               settings, frameRate, dropFrame },
//!   videoTracks: [ { index, name, items: [ ItemSnapshot ] } ],
//!   audioTracks: [ ... ],
//!   markers: [ { name, start, duration, type, color, comments, url, target } ] }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame_rate::resolve_frame_rate;
use crate::host::{
    Host, HostError, HostMarker, HostProjectItem, HostSequence, HostTrack, HostTrackItem,
    Rational, TrackItemKind, read_tick_time, resolve_opt, resolve_or,
};
use crate::media::source_media_path;
use crate::timecode::{DEFAULT_FPS, TickTime, is_drop_frame_rate};

/// File name used when exporting into a directory.
pub const SNAPSHOT_FILE_NAME: &str = "timeline-snapshot.json";

const OP: &str = "snapshot";

/// Fatal snapshot failures (host root only).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("there is no active project")]
    NoProject,
    #[error("there is no active sequence")]
    NoActiveSequence,
    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotOptions {
    /// Report proxy paths for sources that have one.
    pub prefer_proxy: bool,
    /// Rate used when the sequence reports none.
    pub fallback_fps: f64,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            prefer_proxy: true,
            fallback_fps: DEFAULT_FPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSnapshot {
    pub sequence: SequenceInfo,
    pub video_tracks: Vec<TrackSnapshot>,
    pub audio_tracks: Vec<TrackSnapshot>,
    pub markers: Vec<MarkerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceInfo {
    pub name: String,
    pub guid: String,
    pub timebase: Option<Rational>,
    pub zero_point: Option<TickTime>,
    pub in_point: Option<TickTime>,
    pub out_point: Option<TickTime>,
    pub end_time: Option<TickTime>,
    /// Opaque host settings object.
    pub settings: Option<serde_json::Value>,
    pub frame_rate: f64,
    pub drop_frame: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSnapshot {
    pub index: i32,
    pub name: String,
    pub items: Vec<ItemSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub track_index: i32,
    pub is_adjustment_layer: bool,
    pub disabled: bool,
    pub speed: f64,
    pub reversed: bool,
    pub seq_start: Option<TickTime>,
    pub seq_end: Option<TickTime>,
    pub seq_duration: Option<TickTime>,
    pub src_in: Option<TickTime>,
    pub src_out: Option<TickTime>,
    pub source: Option<SourceRef>,
}

/// Project item backing a track item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub name: String,
    pub guid: String,
    pub media_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerSnapshot {
    pub name: String,
    pub start: Option<TickTime>,
    pub duration: Option<TickTime>,
    #[serde(rename = "type")]
    pub marker_type: String,
    pub color: String,
    pub comments: String,
    pub url: String,
    pub target: String,
}

/// Snapshot the active sequence of the host's active project.
pub fn dump_active_sequence(
    host: &dyn Host,
    options: &SnapshotOptions,
) -> Result<TimelineSnapshot, SnapshotError> {
    let project = host.active_project()?.ok_or(SnapshotError::NoProject)?;
    let sequence = project
        .active_sequence()?
        .ok_or(SnapshotError::NoActiveSequence)?;
    Ok(TimelineSnapshot::capture(sequence, options))
}

impl TimelineSnapshot {
    /// Capture `sequence`; never fails, unreadable parts degrade.
    pub fn capture(sequence: &dyn HostSequence, options: &SnapshotOptions) -> Self {
        let fps = resolve_frame_rate(sequence, options.fallback_fps);
        let info = SequenceInfo {
            name: resolve_or(OP, sequence.name(), String::new()),
            guid: resolve_or(OP, sequence.guid(), String::new()),
            timebase: resolve_opt(OP, sequence.timebase()),
            zero_point: read_tick_time(OP, sequence.zero_point()),
            in_point: read_tick_time(OP, sequence.in_point()),
            out_point: read_tick_time(OP, sequence.out_point()),
            end_time: read_tick_time(OP, sequence.end_time()),
            settings: resolve_opt(OP, sequence.settings()),
            frame_rate: fps,
            drop_frame: is_drop_frame_rate(fps),
        };

        let video_count = resolve_or(OP, sequence.video_track_count(), 0);
        let video_tracks = (0..video_count)
            .filter_map(|i| {
                let track = resolve_opt(OP, sequence.video_track(i)).flatten()?;
                Some(TrackSnapshot::capture(track, i, options))
            })
            .collect();

        let audio_count = resolve_or(OP, sequence.audio_track_count(), 0);
        let audio_tracks = (0..audio_count)
            .filter_map(|i| {
                let track = resolve_opt(OP, sequence.audio_track(i)).flatten()?;
                Some(TrackSnapshot::capture(track, i, options))
            })
            .collect();

        let markers = resolve_or(OP, sequence.markers(), Vec::new())
            .into_iter()
            .map(MarkerSnapshot::capture)
            .collect();

        let snapshot = Self {
            sequence: info,
            video_tracks,
            audio_tracks,
            markers,
        };
        log::info!(
            "Snapshot '{}': {} video / {} audio tracks, {} items, {} markers",
            snapshot.sequence.name,
            snapshot.video_tracks.len(),
            snapshot.audio_tracks.len(),
            snapshot.item_count(),
            snapshot.markers.len()
        );
        snapshot
    }

    /// Total number of track items over video and audio tracks.
    pub fn item_count(&self) -> usize {
        self.video_tracks
            .iter()
            .chain(&self.audio_tracks)
            .map(|t| t.items.len())
            .sum()
    }

    /// Pretty JSON with 2-space indentation.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Write the pretty JSON to `path`; see [`export_json`].
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let json = self.to_json_pretty().context("Failed to serialize snapshot")?;
        export_json(&json, path)
    }
}

/// Write snapshot text verbatim to `path`; a directory gets [`SNAPSHOT_FILE_NAME`].
///
/// Returns the file actually written.
pub fn export_json<P: AsRef<Path>>(text: &str, path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    let target = if path.is_dir() {
        path.join(SNAPSHOT_FILE_NAME)
    } else {
        path.to_path_buf()
    };
    fs::write(&target, text).with_context(|| format!("Failed to write snapshot: {}", target.display()))?;
    log::info!("Exported snapshot to {}", target.display());
    Ok(target)
}

impl TrackSnapshot {
    fn capture(track: &dyn HostTrack, position: usize, options: &SnapshotOptions) -> Self {
        let items = resolve_or(OP, track.track_items(TrackItemKind::Clip, false), Vec::new())
            .into_iter()
            .map(|item| ItemSnapshot::capture(item, options))
            .collect();
        Self {
            index: resolve_or(OP, track.index(), position as i32),
            name: resolve_or(OP, track.name(), String::new()),
            items,
        }
    }
}

impl ItemSnapshot {
    fn capture(item: &dyn HostTrackItem, options: &SnapshotOptions) -> Self {
        let source = resolve_opt(OP, item.project_item())
            .flatten()
            .map(|pi| SourceRef::capture(pi, options.prefer_proxy));
        Self {
            name: resolve_or(OP, item.name(), String::new()),
            item_type: resolve_or(OP, item.item_type(), String::new()),
            track_index: resolve_or(OP, item.track_index(), -1),
            is_adjustment_layer: resolve_or(OP, item.is_adjustment_layer(), false),
            disabled: resolve_or(OP, item.is_disabled(), false),
            speed: resolve_or(OP, item.speed(), 100.0),
            reversed: resolve_or(OP, item.is_speed_reversed(), false),
            seq_start: read_tick_time(OP, item.start_time()),
            seq_end: read_tick_time(OP, item.end_time()),
            seq_duration: read_tick_time(OP, item.duration()),
            src_in: read_tick_time(OP, item.in_point()),
            src_out: read_tick_time(OP, item.out_point()),
            source,
        }
    }
}

impl SourceRef {
    fn capture(item: &dyn HostProjectItem, prefer_proxy: bool) -> Self {
        let media_path = resolve_opt(OP, item.as_clip())
            .flatten()
            .and_then(|clip| source_media_path(clip, prefer_proxy))
            .unwrap_or_default();
        Self {
            name: resolve_or(OP, item.name(), String::new()),
            guid: resolve_or(OP, item.guid(), String::new()),
            media_path,
        }
    }
}

impl MarkerSnapshot {
    fn capture(marker: &dyn HostMarker) -> Self {
        Self {
            name: resolve_or(OP, marker.name(), String::new()),
            start: read_tick_time(OP, marker.start()),
            duration: read_tick_time(OP, marker.duration()),
            marker_type: resolve_or(OP, marker.marker_type(), String::new()),
            color: resolve_or(OP, marker.color(), String::new()),
            comments: resolve_or(OP, marker.comments(), String::new()),
            url: resolve_or(OP, marker.url(), String::new()),
            target: resolve_or(OP, marker.target(), String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::capability as cap;
    use crate::host::fixture::{
        FixtureHost, FixtureProject, FixtureSequence, FixtureTrack, FixtureTrackItem,
        WithCapabilities, sample_host,
    };

    fn snapshot(host: &FixtureHost) -> TimelineSnapshot {
        dump_active_sequence(host, &SnapshotOptions::default()).unwrap()
    }

    /// Test: sample sequence shape
    /// Validates: 2 video tracks, 3 items on the first, 1 marker
    #[test]
    fn test_sample_shape() {
        let snap = snapshot(&sample_host());
        assert_eq!(snap.video_tracks.len(), 2);
        assert_eq!(snap.video_tracks[0].items.len(), 3);
        assert!(snap.video_tracks[1].items.is_empty());
        assert_eq!(snap.audio_tracks.len(), 1);
        assert_eq!(snap.audio_tracks[0].items.len(), 2);
        assert_eq!(snap.markers.len(), 1);
        assert_eq!(snap.item_count(), 5);

        assert_eq!(snap.sequence.name, "Main Edit");
        assert!(snap.sequence.drop_frame);
        assert_eq!(snap.markers[0].marker_type, "Comment");
    }

    #[test]
    fn test_items_keep_host_order() {
        let snap = snapshot(&sample_host());
        let names: Vec<&str> = snap.video_tracks[0].items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["interview.mov", "broll.mp4", "interview.mov"]);
        assert_eq!(snap.video_tracks[0].items[1].track_index, 0);
    }

    /// Test: marker API missing or failing
    /// Validates: empty marker list, no error
    #[test]
    fn test_markers_degrade_to_empty() {
        for missing in [true, false] {
            let mut host = sample_host();
            let seq = &mut host.project.as_mut().unwrap().sequences[0];
            let set = if missing { &mut seq.caps.missing } else { &mut seq.caps.failing };
            set.insert(cap::GET_MARKERS.to_string());

            let snap = snapshot(&host);
            assert!(snap.markers.is_empty());
            assert_eq!(snap.video_tracks.len(), 2);
        }
    }

    /// Test: per-field fallbacks for a bare item
    #[test]
    fn test_item_field_fallbacks() {
        let mut item = FixtureTrackItem::clip("x", 0.0, 1.0)
            .without(cap::GET_NAME)
            .without(cap::GET_TRACK_INDEX)
            .failing(cap::GET_SPEED)
            .without(cap::GET_START_TIME);
        item.speed = 50.0;
        item.disabled = true;
        item.caps.missing.insert(cap::IS_DISABLED.to_string());

        let seq = FixtureSequence::new("s", "S")
            .with_video_track(FixtureTrack::new(0, "V1").with_item(item).without(cap::GET_INDEX));
        let host = FixtureHost::new(FixtureProject::new("P").with_sequence(seq));
        let snap = snapshot(&host);

        let track = &snap.video_tracks[0];
        assert_eq!(track.index, 0);
        let item = &track.items[0];
        assert_eq!(item.name, "");
        assert_eq!(item.track_index, -1);
        assert_eq!(item.speed, 100.0);
        assert!(!item.disabled);
        assert_eq!(item.seq_start, None);
        assert!(item.seq_end.is_some());
        assert_eq!(item.source, None);
    }

    #[test]
    fn test_missing_tracks_are_skipped() {
        let seq = FixtureSequence::new("s", "S")
            .with_video_track(FixtureTrack::new(0, "V1"))
            .failing(cap::GET_VIDEO_TRACK)
            .without(cap::GET_AUDIO_TRACK_COUNT);
        let host = FixtureHost::new(FixtureProject::new("P").with_sequence(seq));
        let snap = snapshot(&host);
        assert!(snap.video_tracks.is_empty());
        assert!(snap.audio_tracks.is_empty());
        assert_eq!(snap.sequence.timebase, None);
        assert_eq!(snap.sequence.frame_rate, DEFAULT_FPS);
        assert!(!snap.sequence.drop_frame);
    }

    /// Test: fatal root conditions
    #[test]
    fn test_root_errors() {
        let none = FixtureHost::default();
        assert_eq!(
            dump_active_sequence(&none, &SnapshotOptions::default()),
            Err(SnapshotError::NoProject)
        );

        let no_seq = FixtureHost::new(FixtureProject::new("P"));
        assert_eq!(
            dump_active_sequence(&no_seq, &SnapshotOptions::default()),
            Err(SnapshotError::NoActiveSequence)
        );

        let broken = sample_host().failing(cap::GET_ACTIVE_PROJECT);
        assert!(matches!(
            dump_active_sequence(&broken, &SnapshotOptions::default()),
            Err(SnapshotError::Host(_))
        ));
    }

    #[test]
    fn test_source_paths_follow_proxy_preference() {
        let host = sample_host();
        let proxy = snapshot(&host);
        let first = proxy.video_tracks[0].items[0].source.as_ref().unwrap();
        assert_eq!(first.media_path, "/proxy/interview_proxy.mov");
        assert_eq!(first.guid, "clip-interview");

        let options = SnapshotOptions {
            prefer_proxy: false,
            ..Default::default()
        };
        let direct = dump_active_sequence(&host, &options).unwrap();
        let first = direct.video_tracks[0].items[0].source.as_ref().unwrap();
        assert_eq!(first.media_path, "/media/interview.mov");
    }

    /// Test: JSON round trip and field names
    #[test]
    fn test_json_round_trip() {
        let snap = snapshot(&sample_host());
        let json = snap.to_json_pretty().unwrap();
        assert_eq!(TimelineSnapshot::from_json(&json).unwrap(), snap);

        for key in ["\"videoTracks\"", "\"seqStart\"", "\"ticksNumber\"", "\"isAdjustmentLayer\"", "\"mediaPath\"", "\"dropFrame\""] {
            assert!(json.contains(key), "missing {}", key);
        }
        assert!(json.starts_with("{\n  \"sequence\""));
    }

    #[test]
    fn test_deterministic() {
        let host = sample_host();
        assert_eq!(
            snapshot(&host).to_json_pretty().unwrap(),
            snapshot(&host).to_json_pretty().unwrap()
        );
    }

    #[test]
    fn test_write_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let snap = snapshot(&sample_host());
        let written = snap.write_to(dir.path()).unwrap();
        assert_eq!(written, dir.path().join(SNAPSHOT_FILE_NAME));

        let text = fs::read_to_string(&written).unwrap();
        assert_eq!(text, snap.to_json_pretty().unwrap());
    }
}
