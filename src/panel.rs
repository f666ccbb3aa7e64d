//! Panel view-state and its single writer.
//!
//! # Purpose
//!
//! Everything the panel shows (item list, selection, resolved path, proxy
//! preference, segments, snapshot text, console lines) lives in one
//! [`PanelState`]. Only [`Panel::dispatch`] writes it: each [`PanelAction`]
//! runs to completion and reports an [`ActionStatus`].
//!
//! # Status rules
//!
//! - `Done(msg)` - action completed, state updated
//! - `Skipped(reason)` - missing input or missing host object (no project,
//!   nothing selected); the action stops early
//! - `Failed(err)` - host call, JSON or file failure; state the action had
//!   not finished writing is left as it was
//!
//! Every status is logged and appended to the console.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::frame_rate::resolve_frame_rate;
use crate::host::{Host, HostError, resolve_opt};
use crate::media::{ItemKind, ProjectEntry, describe_selection, entry_clip, list_project_items, resolve_clip_path};
use crate::overlay::{self, OverlayError, OverlayReport, Segment, default_segments};
use crate::settings::PanelSettings;
use crate::snapshot::{SnapshotError, SnapshotOptions, dump_active_sequence, export_json};

#[derive(Debug, Error)]
pub enum PanelError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    #[error("snapshot serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

#[derive(Debug)]
pub enum ActionStatus {
    Done(String),
    Skipped(String),
    Failed(PanelError),
}

impl ActionStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done(msg) | Self::Skipped(msg) => f.write_str(msg),
            Self::Failed(err) => write!(f, "[Error] {}", err),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PanelAction {
    PopulateInfo,
    LoadItems,
    Select(usize),
    SetPreferProxy(bool),
    ResolveSelectedPath,
    ResolveFromTimeline,
    MakeSnapshot,
    /// Target file or directory; `None` uses the export dir from settings.
    ExportSnapshot(Option<PathBuf>),
    Clear,
    LoadDefaultSegments,
    SetSegments(Vec<Segment>),
    BuildReviewSequence,
    BuildReportSequence,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelState {
    pub items: Vec<ProjectEntry>,
    pub selected: Option<usize>,
    pub selected_path: Option<String>,
    pub prefer_proxy: bool,
    pub segments: Vec<Segment>,
    pub snapshot_json: Option<String>,
    pub console: Vec<String>,
}

impl PanelState {
    pub fn new(prefer_proxy: bool) -> Self {
        Self {
            items: Vec::new(),
            selected: None,
            selected_path: None,
            prefer_proxy,
            segments: default_segments(),
            snapshot_json: None,
            console: Vec::new(),
        }
    }

    pub fn selected_item(&self) -> Option<&ProjectEntry> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

pub struct Panel<H: Host> {
    host: H,
    settings: PanelSettings,
    state: PanelState,
}

macro_rules! skip {
    ($($arg:tt)*) => {
        return ActionStatus::Skipped(format!($($arg)*))
    };
}

macro_rules! attempt {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => return ActionStatus::Failed(err.into()),
        }
    };
}

impl<H: Host> Panel<H> {
    pub fn new(host: H, settings: PanelSettings) -> Self {
        let state = PanelState::new(settings.prefer_proxy);
        Self { host, settings, state }
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn settings(&self) -> &PanelSettings {
        &self.settings
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    fn snapshot_options(&self) -> SnapshotOptions {
        SnapshotOptions {
            prefer_proxy: self.state.prefer_proxy,
            fallback_fps: self.settings.fallback_fps,
        }
    }

    /// Apply `action`; the only writer of [`PanelState`].
    pub fn dispatch(&mut self, action: PanelAction) -> ActionStatus {
        log::debug!("Panel action: {:?}", action);
        let status = match action {
            PanelAction::PopulateInfo => self.populate_info(),
            PanelAction::LoadItems => self.load_items(),
            PanelAction::Select(index) => self.select(index),
            PanelAction::SetPreferProxy(prefer) => {
                self.state.prefer_proxy = prefer;
                ActionStatus::Done(format!("Prefer proxy: {}", prefer))
            }
            PanelAction::ResolveSelectedPath => self.resolve_selected_path(),
            PanelAction::ResolveFromTimeline => self.resolve_from_timeline(),
            PanelAction::MakeSnapshot => self.make_snapshot(),
            PanelAction::ExportSnapshot(target) => self.export_snapshot(target),
            PanelAction::Clear => {
                let prefer_proxy = self.state.prefer_proxy;
                let segments = std::mem::take(&mut self.state.segments);
                self.state = PanelState {
                    segments,
                    ..PanelState::new(prefer_proxy)
                };
                ActionStatus::Done("Cleared".to_string())
            }
            PanelAction::LoadDefaultSegments => {
                self.state.segments = default_segments();
                ActionStatus::Done(format!("Loaded {} default segments", self.state.segments.len()))
            }
            PanelAction::SetSegments(segments) => {
                self.state.segments = segments;
                ActionStatus::Done(format!("Loaded {} segments", self.state.segments.len()))
            }
            PanelAction::BuildReviewSequence => self.build_review(),
            PanelAction::BuildReportSequence => self.build_report(),
        };

        match &status {
            ActionStatus::Done(msg) => log::info!("{}", msg),
            ActionStatus::Skipped(msg) => log::info!("Skipped: {}", msg),
            ActionStatus::Failed(err) => log::error!("{}", err),
        }
        self.state.console.push(status.to_string());
        status
    }

    fn populate_info(&mut self) -> ActionStatus {
        let Some(project) = attempt!(self.host.active_project()) else {
            skip!("There is no active project");
        };
        let project_name = resolve_opt("info", project.name())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "(Untitled)".into());
        let sequence = match resolve_opt("info", project.active_sequence()).flatten() {
            Some(seq) => resolve_opt("info", seq.name())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "(Sequence)".into()),
            None => "none".to_string(),
        };
        ActionStatus::Done(format!("Active project: {} | active sequence: {}", project_name, sequence))
    }

    fn load_items(&mut self) -> ActionStatus {
        let Some(project) = attempt!(self.host.active_project()) else {
            skip!("There is no active project");
        };
        let items = attempt!(list_project_items(project));

        self.state.items = items;
        self.state.selected = None;
        self.state.selected_path = None;
        ActionStatus::Done(format!("Loaded items: {}", self.state.items.len()))
    }

    fn select(&mut self, index: usize) -> ActionStatus {
        if index >= self.state.items.len() {
            skip!("No item at index {}", index);
        }
        self.state.selected = Some(index);
        self.state.selected_path = None;
        ActionStatus::Done(format!("Selected item index: {}", index))
    }

    fn resolve_selected_path(&mut self) -> ActionStatus {
        let Some(row) = self.state.selected_item().cloned() else {
            skip!("Select an item first");
        };
        match row.kind {
            ItemKind::Folder => {
                self.state.selected_path = None;
                skip!("Selected item is a folder/bin. Choose a clip.");
            }
            ItemKind::Sequence => {
                self.state.selected_path = None;
                skip!("Selected item is a sequence. Choose a clip.");
            }
            ItemKind::Clip => {}
        }

        let Some(project) = attempt!(self.host.active_project()) else {
            skip!("There is no active project");
        };
        let resolved = match attempt!(entry_clip(project, &row)) {
            Some(clip) => resolve_clip_path(clip, "ListSelection", self.state.prefer_proxy),
            None => {
                self.state.selected_path = None;
                skip!("Cannot cast '{}' to a clip", row.name);
            }
        };

        match resolved {
            Some(path) => {
                self.state.selected_path = Some(path.clone());
                ActionStatus::Done(format!("Resolved media path: {}", path))
            }
            None => {
                self.state.selected_path = None;
                skip!("No media path found for selected item");
            }
        }
    }

    fn resolve_from_timeline(&mut self) -> ActionStatus {
        let Some(project) = attempt!(self.host.active_project()) else {
            skip!("There is no active project");
        };
        let Some(sequence) = attempt!(project.active_sequence()) else {
            skip!("No active sequence");
        };

        let fps = resolve_frame_rate(sequence, self.settings.fallback_fps);
        let report = match describe_selection(sequence, fps, self.state.prefer_proxy) {
            Ok(report) => report,
            Err(err) if err.is_unsupported() => skip!("{}", err),
            Err(err) => return ActionStatus::Failed(err.into()),
        };
        if report.is_empty() {
            skip!("No track items selected in timeline");
        }

        for (i, entry) in report.iter().enumerate() {
            self.state.console.push(format!("#{} {}", i, entry));
        }
        if let Some(path) = report[0].path.clone() {
            self.state.selected_path = Some(path);
        }
        ActionStatus::Done(format!("Timeline selection count: {}", report.len()))
    }

    fn make_snapshot(&mut self) -> ActionStatus {
        let snapshot = attempt!(dump_active_sequence(&self.host, &self.snapshot_options()));
        let text = attempt!(snapshot.to_json_pretty());
        let size = text.chars().count();
        self.state.snapshot_json = Some(text);
        ActionStatus::Done(format!(
            "Timeline snapshot (JSON) is ready. Size: {} chars, {} items",
            size,
            snapshot.item_count()
        ))
    }

    fn export_snapshot(&mut self, target: Option<PathBuf>) -> ActionStatus {
        if self.state.snapshot_json.is_none() {
            if let ActionStatus::Failed(err) = self.make_snapshot() {
                return ActionStatus::Failed(err);
            }
        }
        let Some(text) = self.state.snapshot_json.as_deref() else {
            skip!("No snapshot to export");
        };

        let target = target
            .or_else(|| self.settings.export_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        let written = attempt!(export_json(text, &target));
        ActionStatus::Done(format!("Exported: {}", written.display()))
    }

    fn selected_clip(&self) -> Result<ProjectEntry, String> {
        match self.state.selected_item() {
            None => Err("Select a clip item first (not a folder/sequence)".to_string()),
            Some(row) if row.kind != ItemKind::Clip => Err("Selected item is not a clip".to_string()),
            Some(row) => Ok(row.clone()),
        }
    }

    fn overlay_status(&self, kind: &str, result: Result<OverlayReport, OverlayError>) -> ActionStatus {
        match result {
            Ok(report) => ActionStatus::Done(format!(
                "{} sequence {}: {} placed, {} failed",
                kind,
                report.sequence_guid,
                report.placed(),
                report.failed()
            )),
            Err(err @ (OverlayError::NoSegments | OverlayError::NoProject)) => ActionStatus::Skipped(err.to_string()),
            Err(err) => ActionStatus::Failed(err.into()),
        }
    }

    fn build_review(&mut self) -> ActionStatus {
        let row = match self.selected_clip() {
            Ok(row) => row,
            Err(reason) => skip!("{}", reason),
        };
        let result = overlay::build_review_sequence(
            &mut self.host,
            &row,
            &self.state.segments,
            &self.settings.overlay,
        );
        self.overlay_status("Review", result)
    }

    fn build_report(&mut self) -> ActionStatus {
        let result = overlay::build_report_sequence(&mut self.host, &self.state.segments, &self.settings.overlay);
        self.overlay_status("Report", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::capability as cap;
    use crate::host::fixture::{FixtureHost, sample_host};

    fn panel() -> Panel<FixtureHost> {
        Panel::new(sample_host(), PanelSettings::default())
    }

    fn loaded() -> Panel<FixtureHost> {
        let mut panel = panel();
        assert!(panel.dispatch(PanelAction::LoadItems).is_done());
        panel
    }

    #[test]
    fn test_initial_state() {
        let panel = panel();
        assert!(panel.state().items.is_empty());
        assert_eq!(panel.state().selected, None);
        assert!(panel.state().prefer_proxy);
        assert_eq!(panel.state().segments.len(), 7);
    }

    #[test]
    fn test_populate_info() {
        let mut panel = panel();
        let status = panel.dispatch(PanelAction::PopulateInfo);
        assert_eq!(status.to_string(), "Active project: Demo | active sequence: Main Edit");

        let mut empty = Panel::new(FixtureHost::default(), PanelSettings::default());
        assert!(empty.dispatch(PanelAction::PopulateInfo).is_skipped());
    }

    /// Test: list, select, resolve
    /// Validates: selection resets the path, proxy preference applies
    #[test]
    fn test_select_and_resolve() {
        let mut panel = loaded();
        assert_eq!(panel.state().items.len(), 7);

        assert!(panel.dispatch(PanelAction::Select(2)).is_done());
        assert!(panel.dispatch(PanelAction::ResolveSelectedPath).is_done());
        assert_eq!(panel.state().selected_path.as_deref(), Some("/proxy/interview_proxy.mov"));

        panel.dispatch(PanelAction::SetPreferProxy(false));
        panel.dispatch(PanelAction::Select(2));
        assert_eq!(panel.state().selected_path, None);
        panel.dispatch(PanelAction::ResolveSelectedPath);
        assert_eq!(panel.state().selected_path.as_deref(), Some("/media/interview.mov"));
    }

    #[test]
    fn test_resolve_skips() {
        let mut panel = loaded();
        assert!(panel.dispatch(PanelAction::ResolveSelectedPath).is_skipped());

        assert!(panel.dispatch(PanelAction::Select(99)).is_skipped());
        assert_eq!(panel.state().selected, None);

        panel.dispatch(PanelAction::Select(1));
        let status = panel.dispatch(PanelAction::ResolveSelectedPath);
        assert!(status.is_skipped());
        assert!(status.to_string().contains("folder"));

        panel.dispatch(PanelAction::Select(5));
        assert!(panel.dispatch(PanelAction::ResolveSelectedPath).is_skipped());
        assert_eq!(panel.state().selected_path, None);
    }

    /// Test: failed listing leaves the previous list
    #[test]
    fn test_failed_load_keeps_state() {
        let mut panel = loaded();
        panel.dispatch(PanelAction::Select(2));
        panel.host_mut().project.as_mut().unwrap().caps.failing.insert(cap::GET_ROOT_ITEM.to_string());

        assert!(panel.dispatch(PanelAction::LoadItems).is_failed());
        assert_eq!(panel.state().items.len(), 7);
        assert_eq!(panel.state().selected, Some(2));
    }

    #[test]
    fn test_resolve_from_timeline() {
        let mut panel = panel();
        let status = panel.dispatch(PanelAction::ResolveFromTimeline);
        assert_eq!(status.to_string(), "Timeline selection count: 2");
        assert_eq!(panel.state().selected_path.as_deref(), Some("/proxy/interview_proxy.mov"));
        assert!(panel.state().console.iter().any(|l| l.starts_with("#1 key=0_")));

        let project = panel.host_mut().project.as_mut().unwrap();
        project.sequences[0].selection.clear();
        assert!(panel.dispatch(PanelAction::ResolveFromTimeline).is_skipped());

        let project = panel.host_mut().project.as_mut().unwrap();
        project.sequences[0].caps.missing.insert(cap::GET_SELECTION.to_string());
        assert!(panel.dispatch(PanelAction::ResolveFromTimeline).is_skipped());
    }

    /// Test: snapshot text is kept on failure
    #[test]
    fn test_make_snapshot() {
        let mut panel = panel();
        assert!(panel.dispatch(PanelAction::MakeSnapshot).is_done());
        let text = panel.state().snapshot_json.clone().unwrap();
        assert!(crate::snapshot::TimelineSnapshot::from_json(&text).is_ok());

        panel.host_mut().project = None;
        let status = panel.dispatch(PanelAction::MakeSnapshot);
        assert!(matches!(status, ActionStatus::Failed(PanelError::Snapshot(SnapshotError::NoProject))));
        assert_eq!(panel.state().snapshot_json.as_deref(), Some(text.as_str()));
    }

    #[test]
    fn test_export_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut panel = panel();
        let status = panel.dispatch(PanelAction::ExportSnapshot(Some(dir.path().to_path_buf())));
        assert!(status.is_done());

        let written = std::fs::read_to_string(dir.path().join(crate::snapshot::SNAPSHOT_FILE_NAME)).unwrap();
        assert_eq!(Some(written), panel.state().snapshot_json.clone());

        let mut empty = Panel::new(FixtureHost::default(), PanelSettings::default());
        assert!(empty.dispatch(PanelAction::ExportSnapshot(Some(dir.path().to_path_buf()))).is_failed());
    }

    #[test]
    fn test_clear() {
        let mut panel = loaded();
        panel.dispatch(PanelAction::Select(2));
        panel.dispatch(PanelAction::MakeSnapshot);
        panel.dispatch(PanelAction::Clear);

        let state = panel.state();
        assert!(state.items.is_empty());
        assert_eq!(state.selected, None);
        assert_eq!(state.snapshot_json, None);
        assert_eq!(state.console, ["Cleared"]);
        assert_eq!(state.segments.len(), 7);
    }

    #[test]
    fn test_build_review_sequence() {
        let mut panel = loaded();
        assert!(panel.dispatch(PanelAction::BuildReviewSequence).is_skipped());

        panel.dispatch(PanelAction::Select(1));
        assert!(panel.dispatch(PanelAction::BuildReviewSequence).is_skipped());

        panel.dispatch(PanelAction::Select(2));
        let status = panel.dispatch(PanelAction::BuildReviewSequence);
        assert!(status.is_done(), "{}", status);
        assert!(status.to_string().ends_with("7 placed, 0 failed"));
        assert_eq!(panel.host().project.as_ref().unwrap().sequences.len(), 2);
    }

    #[test]
    fn test_build_report_sequence() {
        let mut panel = panel();
        panel.dispatch(PanelAction::SetSegments(Vec::new()));
        assert!(panel.dispatch(PanelAction::BuildReportSequence).is_skipped());

        panel.dispatch(PanelAction::LoadDefaultSegments);
        assert!(panel.dispatch(PanelAction::BuildReportSequence).is_done());

        let mut locked = panel;
        locked.host_mut().project.as_mut().unwrap().new_sequence.locked_video_tracks = vec![1];
        assert!(locked.dispatch(PanelAction::BuildReportSequence).is_failed());
    }
}
