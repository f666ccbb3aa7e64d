//! Overlay sequences: template blocks placed per segment.
//!
//! # Purpose
//!
//! Builds two kinds of sequence from a list of [`Segment`]s:
//!
//! - **review**: a sequence made from the selected clip with one template
//!   block per segment on the topmost video track
//! - **report**: an empty sequence from a preset with the blocks on a
//!   configured track
//!
//! Each block is inserted at the segment start, trimmed to the segment end
//! and gets the segment title/description written into two text parameters
//! in a single undoable transaction.
//!
//! # Placement
//!
//! Which track a block lands on is decided by [`place_with_fallback`], a small
//! state machine over an ordered list of candidate tracks:
//!
//! ```text
//! Trying(t0) --ok--> Succeeded(t0)
//!     |err
//! Trying(t1) --ok--> Succeeded(t1)
//!     |err
//! ExhaustedFallbacks
//! ```
//!
//! Review sequences try the top track then the one below it and log segments
//! that fail on both. Report sequences have a single candidate and abort on
//! the first failure.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::{
    Host, HostError, HostProject, HostResult, HostSequenceEditor, OverlayItem, TextParam,
    resolve_opt, resolve_or,
};
use crate::media::{ItemKind, ProjectEntry};
use crate::timecode::TickTime;

const OP: &str = "overlay";

/// Highest video track probed when the editor cannot count tracks.
const PROBE_TOP_TRACK: usize = 7;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("there is no active project")]
    NoProject,
    #[error("segments are empty")]
    NoSegments,
    #[error("selected item is not a clip")]
    NotAClip,
    #[error("cannot get a sequence editor for {0}")]
    NoEditor(String),
    #[error("template insertion returned no items")]
    NothingInserted,
}

/// Time range with the text shown over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start_sec: f64,
    pub end_sec: f64,
    pub title: String,
    pub desc: String,
}

impl Segment {
    pub fn new(start_sec: f64, end_sec: f64, title: &str, desc: &str) -> Self {
        Self {
            start_sec,
            end_sec,
            title: title.to_string(),
            desc: desc.to_string(),
        }
    }
}

/// Built-in segment list for a 180 second promo cut.
pub fn default_segments() -> Vec<Segment> {
    vec![
        Segment::new(0.0, 12.5, "Intro", "Opening logo and background music"),
        Segment::new(12.5, 38.0, "Product reveal", "Full product shot, camera pan"),
        Segment::new(38.0, 65.2, "Feature 1: Quick setup", "Settings screen demo with captions"),
        Segment::new(65.2, 92.0, "Feature 2: Smart suggestions", "Suggestion UI and usage scenarios"),
        Segment::new(92.0, 128.3, "User review highlights", "Three interview clips"),
        Segment::new(128.3, 156.7, "Pricing & promotion", "Price card and promotion banner"),
        Segment::new(156.7, 180.0, "Call to action & ending", "Website/QR and end card"),
    ]
}

/// Load a JSON array of segments.
pub fn load_segments<P: AsRef<Path>>(path: P) -> Result<Vec<Segment>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read segments: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse segments: {}", path.display()))
}

/// What to create and where to put the template blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayOptions {
    pub sequence_name: String,
    pub preset_path: String,
    pub template_path: String,
    /// Video track for report sequences.
    pub video_track: usize,
    pub audio_track: usize,
    pub title_param: usize,
    pub desc_param: usize,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            sequence_name: "SceneReview".to_string(),
            preset_path: String::new(),
            template_path: String::new(),
            video_track: 1,
            audio_track: 0,
            title_param: 0,
            desc_param: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementState {
    Trying(usize),
    Succeeded(usize),
    ExhaustedFallbacks,
}

#[derive(Debug)]
pub struct PlacementFailure {
    pub track: usize,
    pub error: OverlayError,
}

/// Final state of one placement plus every failed attempt.
#[derive(Debug)]
pub struct Placement {
    pub state: PlacementState,
    pub failures: Vec<PlacementFailure>,
}

impl Placement {
    pub fn track(&self) -> Option<usize> {
        match self.state {
            PlacementState::Succeeded(track) => Some(track),
            _ => None,
        }
    }
}

/// Run `attempt` on each candidate track in order until one succeeds.
pub fn place_with_fallback<F>(candidates: &[usize], mut attempt: F) -> Placement
where
    F: FnMut(usize) -> Result<(), OverlayError>,
{
    let mut remaining = candidates.iter().copied();
    let mut state = remaining
        .next()
        .map_or(PlacementState::ExhaustedFallbacks, PlacementState::Trying);
    let mut failures = Vec::new();

    while let PlacementState::Trying(track) = state {
        state = match attempt(track) {
            Ok(()) => PlacementState::Succeeded(track),
            Err(error) => {
                failures.push(PlacementFailure { track, error });
                match remaining.next() {
                    Some(next) => {
                        log::info!("Track V{} failed, falling back to V{}", track + 1, next + 1);
                        PlacementState::Trying(next)
                    }
                    None => PlacementState::ExhaustedFallbacks,
                }
            }
        };
    }

    Placement { state, failures }
}

/// Index of the topmost video track of the sequence behind `editor`.
///
/// Track count minus one, else the highest index in `7..=0` the editor
/// reports as present, else 1.
pub fn top_video_track(editor: &dyn HostSequenceEditor) -> usize {
    if let Some(count) = resolve_opt(OP, editor.video_track_count()).filter(|n| *n > 0) {
        return count - 1;
    }
    (0..=PROBE_TOP_TRACK)
        .rev()
        .find(|&i| resolve_or(OP, editor.has_video_track_at(i), false))
        .unwrap_or(1)
}

/// Insert one template block for `segment` on `video_track`.
///
/// Trimming to the segment end is best effort; a host without text
/// transactions keeps the block with its template defaults.
pub fn insert_overlay(
    editor: &mut dyn HostSequenceEditor,
    segment: &Segment,
    options: &OverlayOptions,
    video_track: usize,
) -> Result<OverlayItem, OverlayError> {
    let start = TickTime::from_seconds(segment.start_sec);
    let end = TickTime::from_seconds(segment.end_sec);

    let inserted = editor.insert_template(&options.template_path, &start, video_track, options.audio_track)?;
    let item = *inserted.first().ok_or(OverlayError::NothingInserted)?;

    resolve_opt(OP, editor.set_item_end(item, &end));

    let params = [
        TextParam {
            index: options.title_param,
            value: segment.title.clone(),
        },
        TextParam {
            index: options.desc_param,
            value: segment.desc.clone(),
        },
    ];
    let label = format!("Set subtitle for {}", segment.title);
    match editor.set_text_params(item, &params, &label) {
        Ok(()) => {}
        Err(err) if err.is_unsupported() => {
            log::info!("{}: parameters of '{}' not set", err, segment.title);
        }
        Err(err) => return Err(err.into()),
    }

    log::debug!(
        "Placed '{}' on V{} at {:.3}s..{:.3}s",
        segment.title,
        video_track + 1,
        segment.start_sec,
        segment.end_sec
    );
    Ok(item)
}

/// Result of building an overlay sequence.
#[derive(Debug)]
pub struct OverlayReport {
    pub sequence_guid: String,
    pub placements: Vec<(String, Placement)>,
}

impl OverlayReport {
    pub fn placed(&self) -> usize {
        self.placements.iter().filter(|(_, p)| p.track().is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.placements.len() - self.placed()
    }
}

/// Create an empty sequence from the preset, falling back to the legacy call.
pub fn create_from_preset(project: &mut dyn HostProject, name: &str, preset_path: &str) -> HostResult<String> {
    let guid = match project.create_sequence_with_preset(name, preset_path) {
        Err(err) if err.is_unsupported() => project.create_sequence(name, preset_path)?,
        other => other?,
    };
    log::info!("Created sequence '{}' ({})", name, guid);
    Ok(guid)
}

fn active_project_mut(host: &mut dyn Host) -> Result<&mut dyn HostProject, OverlayError> {
    host.active_project_mut()?.ok_or(OverlayError::NoProject)
}

fn editor_for<'a>(project: &'a mut dyn HostProject, guid: &str) -> Result<&'a mut dyn HostSequenceEditor, OverlayError> {
    project
        .sequence_editor(guid)?
        .ok_or_else(|| OverlayError::NoEditor(guid.to_string()))
}

/// Sequence from the selected clip with blocks on the topmost video track.
///
/// Falls back to the preset when the host cannot create sequences from
/// media. Segments that fail on the top track and the one below are logged
/// and counted, not fatal.
pub fn build_review_sequence(
    host: &mut dyn Host,
    clip: &ProjectEntry,
    segments: &[Segment],
    options: &OverlayOptions,
) -> Result<OverlayReport, OverlayError> {
    if segments.is_empty() {
        return Err(OverlayError::NoSegments);
    }
    if clip.kind != ItemKind::Clip {
        return Err(OverlayError::NotAClip);
    }

    let project = active_project_mut(host)?;
    let guid = match project.create_sequence_from_media(&options.sequence_name, &clip.guid) {
        Ok(guid) => {
            log::info!("Created sequence '{}' from {}", options.sequence_name, clip.name);
            guid
        }
        Err(err) if err.is_unsupported() => {
            log::info!("{}, using the preset instead", err);
            create_from_preset(project, &options.sequence_name, &options.preset_path)?
        }
        Err(err) => return Err(err.into()),
    };

    let editor = editor_for(project, &guid)?;
    let top = top_video_track(editor);
    if top == 0 {
        log::warn!("Sequence may only have V1; use a preset with V2+ if insertion fails");
    }
    let candidates: Vec<usize> = if top > 0 { vec![top, top - 1] } else { vec![top] };

    let mut placements = Vec::with_capacity(segments.len());
    for segment in segments {
        let placement = place_with_fallback(&candidates, |track| {
            insert_overlay(editor, segment, options, track).map(|_| ())
        });
        if placement.state == PlacementState::ExhaustedFallbacks {
            for failure in &placement.failures {
                log::error!("'{}' on V{}: {}", segment.title, failure.track + 1, failure.error);
            }
        }
        placements.push((segment.title.clone(), placement));
    }

    let report = OverlayReport {
        sequence_guid: guid,
        placements,
    };
    log::info!(
        "Review sequence done: {} placed, {} failed",
        report.placed(),
        report.failed()
    );
    Ok(report)
}

/// Empty preset sequence with blocks on the configured track.
///
/// The first failing segment aborts; blocks placed before it stay.
pub fn build_report_sequence(
    host: &mut dyn Host,
    segments: &[Segment],
    options: &OverlayOptions,
) -> Result<OverlayReport, OverlayError> {
    if segments.is_empty() {
        return Err(OverlayError::NoSegments);
    }

    let project = active_project_mut(host)?;
    let guid = create_from_preset(project, &options.sequence_name, &options.preset_path)?;
    let editor = editor_for(project, &guid)?;

    let mut placements = Vec::with_capacity(segments.len());
    for segment in segments {
        insert_overlay(editor, segment, options, options.video_track)?;
        placements.push((
            segment.title.clone(),
            Placement {
                state: PlacementState::Succeeded(options.video_track),
                failures: Vec::new(),
            },
        ));
    }

    log::info!("Report sequence done: {} blocks", placements.len());
    Ok(OverlayReport {
        sequence_guid: guid,
        placements,
    })
}
