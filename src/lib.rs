//! TICKLINE - timeline snapshots, SMPTE timecode and overlay sequences
//! for host-scripted video editor panels.
//!
//! Re-exports all modules for use by the binary target.

// Time math
pub mod frame_rate;
pub mod timecode;

// Host capability layer
pub mod host;

// Panel operations
pub mod media;
pub mod overlay;
pub mod panel;
pub mod snapshot;

// App modules
pub mod cli;
pub mod paths;
pub mod settings;

pub use host::{Host, HostError, HostResult};
pub use panel::{ActionStatus, Panel, PanelAction, PanelError, PanelState};
pub use snapshot::{SnapshotError, SnapshotOptions, TimelineSnapshot, dump_active_sequence};
pub use timecode::{TICKS_PER_SECOND, TickTime, Timecode, ticks_to_timecode};
