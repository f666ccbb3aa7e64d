//! Project items, media path resolution and timeline selection reports.
//!
//! # Path resolution
//!
//! A clip resolves to the first non-empty path of:
//!
//! 1. proxy path (only when proxies are preferred and the clip has one)
//! 2. `getMediaFilePath`
//! 3. `getMediaPath`
//!
//! Nested sequences and offline clips resolve to nothing when a panel asks
//! for a path ([`resolve_clip_path`]); the snapshot source reference skips
//! that check ([`source_media_path`]).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::host::{
    HostClip, HostProject, HostProjectItem, HostResult, HostSequence, HostTrackItem,
    read_tick_time, resolve_opt, resolve_or,
};
use crate::timecode::{TickTime, is_drop_frame_rate, ticks_to_timecode};

const OP: &str = "media";

/// Shown in reports when a time cannot be read.
pub const TIMECODE_PLACEHOLDER: &str = "--:--:--:--";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Clip,
    Sequence,
    Folder,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Clip => "clip",
            Self::Sequence => "sequence",
            Self::Folder => "folder",
        };
        f.write_str(name)
    }
}

/// Where a listed entry came from, to find its host object again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "from")]
pub enum EntryOrigin {
    Sequence { position: usize },
    RootItem { position: usize },
}

/// One row of the project item list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEntry {
    pub id: String,
    pub name: String,
    pub guid: String,
    pub kind: ItemKind,
    pub origin: EntryOrigin,
}

impl fmt::Display for ProjectEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn classify(item: &dyn HostProjectItem) -> ItemKind {
    match resolve_opt(OP, item.as_clip()).flatten() {
        Some(clip) if resolve_or(OP, clip.is_sequence(), false) => ItemKind::Sequence,
        Some(_) => ItemKind::Clip,
        None => ItemKind::Folder,
    }
}

/// List sequences (`seq_<guid>`) followed by classified root bin items (`pi_<n>`).
///
/// Failing to enumerate sequences only drops them from the list; the root
/// item accessor is required.
pub fn list_project_items(project: &dyn HostProject) -> HostResult<Vec<ProjectEntry>> {
    let mut entries = Vec::new();

    for (position, sequence) in resolve_or(OP, project.sequences(), Vec::new()).into_iter().enumerate() {
        let guid = non_empty(resolve_opt(OP, sequence.guid())).unwrap_or_default();
        let id_part = if guid.is_empty() { position.to_string() } else { guid.clone() };
        entries.push(ProjectEntry {
            id: format!("seq_{}", id_part),
            name: non_empty(resolve_opt(OP, sequence.name())).unwrap_or_else(|| "(Sequence)".into()),
            guid,
            kind: ItemKind::Sequence,
            origin: EntryOrigin::Sequence { position },
        });
    }

    let root_items = project.root_items()?;
    if root_items.is_empty() {
        log::info!("There are no project items");
    }
    for (position, item) in root_items.into_iter().enumerate() {
        entries.push(ProjectEntry {
            id: format!("pi_{}", position),
            name: non_empty(resolve_opt(OP, item.name())).unwrap_or_else(|| "(no-name)".into()),
            guid: resolve_or(OP, item.guid(), String::new()),
            kind: classify(item),
            origin: EntryOrigin::RootItem { position },
        });
    }

    log::info!("Loaded items: {}", entries.len());
    Ok(entries)
}

/// Clip behind a listed root item; `None` for sequences and folders.
pub fn entry_clip<'a>(project: &'a dyn HostProject, entry: &ProjectEntry) -> HostResult<Option<&'a dyn HostClip>> {
    let EntryOrigin::RootItem { position } = entry.origin else {
        return Ok(None);
    };
    match project.root_items()?.get(position).copied() {
        Some(item) => item.as_clip(),
        None => Ok(None),
    }
}

type PathAccessor = fn(&dyn HostClip) -> HostResult<String>;

/// First non-empty path with the name of the accessor that produced it.
fn pick_path(clip: &dyn HostClip, use_proxy: bool) -> Option<(&'static str, String)> {
    let mut accessors: Vec<(&'static str, PathAccessor)> = Vec::with_capacity(3);
    if use_proxy {
        accessors.push(("Proxy", |c: &dyn HostClip| c.proxy_path()));
    }
    accessors.push(("MediaFilePath", |c: &dyn HostClip| c.media_file_path()));
    accessors.push(("MediaPath", |c: &dyn HostClip| c.media_path()));

    accessors
        .into_iter()
        .find_map(|(origin, read)| non_empty(resolve_opt(OP, read(clip))).map(|path| (origin, path)))
}

/// Best-effort path of a source clip, without the sequence/offline checks.
pub fn source_media_path(clip: &dyn HostClip, prefer_proxy: bool) -> Option<String> {
    let use_proxy = prefer_proxy && resolve_or(OP, clip.has_proxy(), false);
    pick_path(clip, use_proxy).map(|(_, path)| path)
}

/// On-disk path of `clip`, or `None` for nested sequences, offline clips and
/// clips with no readable path. `label` tags the log lines.
pub fn resolve_clip_path(clip: &dyn HostClip, label: &str, prefer_proxy: bool) -> Option<String> {
    let is_sequence = resolve_or(OP, clip.is_sequence(), false);
    let is_offline = resolve_or(OP, clip.is_offline(), false);
    let has_proxy = resolve_or(OP, clip.has_proxy(), false);
    log::debug!(
        "{}: isSequence={} isOffline={} hasProxy={}",
        label, is_sequence, is_offline, has_proxy
    );
    if is_sequence || is_offline {
        return None;
    }

    let (origin, path) = pick_path(clip, prefer_proxy && has_proxy)?;
    log::info!("[{}] {} -> {}", origin, label, path);
    Some(path)
}

/// A time in a selection report: raw ticks plus timecode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTime {
    pub ticks: Option<i64>,
    pub timecode: String,
}

impl ReportTime {
    fn read(time: Option<TickTime>, fps: f64) -> Self {
        let ticks = time.as_ref().and_then(TickTime::tick_count);
        let timecode = match ticks {
            Some(t) => ticks_to_timecode(t, fps),
            None => TIMECODE_PLACEHOLDER.to_string(),
        };
        Self { ticks, timecode }
    }
}

impl fmt::Display for ReportTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ticks {
            Some(t) => write!(f, "{} ({})", t, self.timecode),
            None => write!(f, "- ({})", self.timecode),
        }
    }
}

/// One selected timeline item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionEntry {
    /// `<track>_<startTicks>_<endTicks>`, stable for a given placement.
    pub key: String,
    pub track_index: i32,
    pub seq_start: ReportTime,
    pub seq_end: ReportTime,
    pub src_in: ReportTime,
    pub src_out: ReportTime,
    pub path: Option<String>,
}

impl fmt::Display for SelectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key={} | track={} | seqStart={} | seqEnd={} | srcIn={} | srcOut={} | path={}",
            self.key,
            self.track_index,
            self.seq_start,
            self.seq_end,
            self.src_in,
            self.src_out,
            self.path.as_deref().unwrap_or("-")
        )
    }
}

impl SelectionEntry {
    fn read(item: &dyn HostTrackItem, position: usize, fps: f64, prefer_proxy: bool) -> Self {
        let track_index = resolve_or(OP, item.track_index(), -1);
        let seq_start = ReportTime::read(read_tick_time(OP, item.start_time()), fps);
        let seq_end = ReportTime::read(read_tick_time(OP, item.end_time()), fps);
        let src_in = ReportTime::read(read_tick_time(OP, item.in_point()), fps);
        let src_out = ReportTime::read(read_tick_time(OP, item.out_point()), fps);

        let path = resolve_opt(OP, item.project_item())
            .flatten()
            .and_then(|pi| resolve_opt(OP, pi.as_clip()).flatten())
            .and_then(|clip| resolve_clip_path(clip, &format!("Timeline[{}]", position), prefer_proxy));

        Self {
            key: format!(
                "{}_{}_{}",
                track_index,
                seq_start.ticks.unwrap_or(0),
                seq_end.ticks.unwrap_or(0)
            ),
            track_index,
            seq_start,
            seq_end,
            src_in,
            src_out,
            path,
        }
    }
}

/// Report every item of the timeline selection.
///
/// Fails only when the selection itself cannot be read.
pub fn describe_selection(
    sequence: &dyn HostSequence,
    fps: f64,
    prefer_proxy: bool,
) -> HostResult<Vec<SelectionEntry>> {
    let selection = sequence.selection()?;
    if !selection.is_empty() {
        log::info!(
            "Timeline selection count: {} (fps={:.3}, dropFrame={})",
            selection.len(),
            fps,
            is_drop_frame_rate(fps)
        );
    }
    Ok(selection
        .into_iter()
        .enumerate()
        .map(|(i, item)| SelectionEntry::read(item, i, fps, prefer_proxy))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::capability as cap;
    use crate::host::fixture::{FixtureClip, FixtureProject, WithCapabilities, sample_host};
    use crate::timecode::TICKS_PER_SECOND;

    const FPS_2997: f64 = 30000.0 / 1001.0;

    /// Test: listing order and classification
    #[test]
    fn test_list_project_items() {
        let host = sample_host();
        let project = host.project.as_ref().unwrap();
        let entries = list_project_items(project).unwrap();

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["seq_seq-main", "pi_0", "pi_1", "pi_2", "pi_3", "pi_4", "pi_5"]);

        let kinds: Vec<ItemKind> = entries.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            [
                ItemKind::Sequence,
                ItemKind::Folder,
                ItemKind::Clip,
                ItemKind::Clip,
                ItemKind::Sequence,
                ItemKind::Clip,
                ItemKind::Clip,
            ]
        );
        assert_eq!(entries[2].to_string(), "interview.mov (clip)");
    }

    #[test]
    fn test_list_degrades_without_sequences() {
        let mut project = FixtureProject::new("P").without(cap::GET_SEQUENCES);
        project.root_items.push(crate::host::fixture::FixtureProjectItem::bin("", "b"));
        let entries = list_project_items(&project).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "(no-name)");

        let no_root = FixtureProject::new("P").without(cap::GET_ROOT_ITEM);
        assert!(list_project_items(&no_root).is_err());
    }

    #[test]
    fn test_entry_clip() {
        let host = sample_host();
        let project = host.project.as_ref().unwrap();
        let entries = list_project_items(project).unwrap();

        assert!(entry_clip(project, &entries[0]).unwrap().is_none());
        assert!(entry_clip(project, &entries[1]).unwrap().is_none());
        let clip = entry_clip(project, &entries[2]).unwrap().unwrap();
        assert_eq!(clip.media_file_path().unwrap(), "/media/interview.mov");
    }

    /// Test: proxy preference and fallbacks
    #[test]
    fn test_resolve_clip_path() {
        let with_proxy = FixtureClip::media("/m/a.mov", 1.0).with_proxy("/p/a.mov");
        assert_eq!(resolve_clip_path(&with_proxy, "t", true).as_deref(), Some("/p/a.mov"));
        assert_eq!(resolve_clip_path(&with_proxy, "t", false).as_deref(), Some("/m/a.mov"));

        let failing = FixtureClip::media("/m/a.mov", 1.0)
            .with_proxy("/p/a.mov")
            .failing(cap::GET_PROXY_PATH)
            .failing(cap::GET_MEDIA_FILE_PATH);
        assert_eq!(resolve_clip_path(&failing, "t", true).as_deref(), Some("/m/a.mov"));

        let mut secondary = FixtureClip::media("", 1.0);
        secondary.media_path = "/m/b.mov".into();
        assert_eq!(resolve_clip_path(&secondary, "t", true).as_deref(), Some("/m/b.mov"));

        assert_eq!(resolve_clip_path(&FixtureClip::nested_sequence(), "t", true), None);
        assert_eq!(resolve_clip_path(&FixtureClip::media("/m/c.mov", 1.0).offline(), "t", true), None);
        assert_eq!(resolve_clip_path(&FixtureClip::default(), "t", true), None);
    }

    #[test]
    fn test_source_path_ignores_offline() {
        let clip = FixtureClip::media("/m/c.mov", 1.0).offline();
        assert_eq!(source_media_path(&clip, true).as_deref(), Some("/m/c.mov"));
    }

    /// Test: selection report keys, timecodes and paths
    #[test]
    fn test_describe_selection() {
        let host = sample_host();
        let sequence = host.project.as_ref().unwrap().active().unwrap();
        let report = describe_selection(sequence, FPS_2997, true).unwrap();
        assert_eq!(report.len(), 2);

        let first = &report[0];
        assert_eq!(first.key, format!("0_0_{}", 10 * TICKS_PER_SECOND));
        assert_eq!(first.seq_start.timecode, "00:00:00:00");
        assert_eq!(first.seq_end.timecode, "00:00:10;00");
        assert_eq!(first.path.as_deref(), Some("/proxy/interview_proxy.mov"));

        let second = &report[1];
        assert_eq!(second.seq_end.timecode, "00:00:42;14");
        assert!(second.to_string().starts_with(&format!("key={}", second.key)));
    }

    #[test]
    fn test_selection_placeholders() {
        let mut host = sample_host();
        let sequence = &mut host.project.as_mut().unwrap().sequences[0];
        sequence.video_tracks[0].items[0].caps.missing.insert(cap::GET_END_TIME.to_string());
        let sequence = host.project.as_ref().unwrap().active().unwrap();

        let report = describe_selection(sequence, 25.0, false).unwrap();
        assert_eq!(report[0].seq_end.ticks, None);
        assert_eq!(report[0].seq_end.timecode, TIMECODE_PLACEHOLDER);
        assert_eq!(report[0].key, "0_0_0");
        assert!(report[0].to_string().contains("seqEnd=- (--:--:--:--)"));
    }

    #[test]
    fn test_selection_unsupported() {
        let host = sample_host();
        let sequence = host.project.as_ref().unwrap().active().unwrap().clone().without(cap::GET_SELECTION);
        assert!(describe_selection(&sequence, 30.0, true).unwrap_err().is_unsupported());
    }
}
