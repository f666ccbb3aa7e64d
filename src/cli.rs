use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Timeline inspection and overlay sequence tools for NLE hosts
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging to file (default: tickline.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE", global = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Format a tick count as SMPTE timecode
    Timecode {
        /// Ticks (254016000000 per second)
        #[arg(allow_negative_numbers = true)]
        ticks: i64,

        /// Frame rate (default: fallback_fps from settings)
        #[arg(long = "fps", value_name = "FPS")]
        fps: Option<f64>,
    },

    /// Parse a timecode into a frame count and ticks
    Frames {
        /// HH:MM:SS:FF, or HH:MM:SS;FF for drop-frame
        timecode: String,

        #[arg(long = "fps", value_name = "FPS")]
        fps: Option<f64>,
    },

    /// Snapshot the active sequence of a host file as JSON
    Snapshot {
        #[command(flatten)]
        host: HostArgs,

        /// Write to this file or directory instead of stdout
        #[arg(short = 'o', long = "output", value_name = "PATH")]
        output: Option<PathBuf>,

        /// Report proxy paths where a clip has one
        #[arg(long = "prefer-proxy", conflicts_with = "no_proxy")]
        prefer_proxy: bool,

        /// Report full-resolution media paths only
        #[arg(long = "no-proxy")]
        no_proxy: bool,
    },

    /// List project sequences and bin items
    Items {
        #[command(flatten)]
        host: HostArgs,
    },

    /// Print the timeline selection report
    Selection {
        #[command(flatten)]
        host: HostArgs,
    },

    /// Build a sequence of title blocks from segments
    Overlays {
        #[command(flatten)]
        host: HostArgs,

        #[arg(long = "mode", value_enum, default_value_t = OverlayMode::Review)]
        mode: OverlayMode,

        /// Index into the `items` list of the clip to review
        #[arg(long = "clip", value_name = "N")]
        clip: Option<usize>,

        /// Segments JSON file (default: built-in segments)
        #[arg(long = "segments", value_name = "FILE")]
        segments: Option<PathBuf>,

        /// Save the edited host file here
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
pub struct HostArgs {
    /// Host state file (JSON)
    #[arg(long = "host", value_name = "FILE")]
    pub host: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMode {
    /// Sequence from the selected clip, blocks on the top video track
    Review,
    /// Sequence from the preset, blocks on the configured track
    Report,
}

impl Command {
    /// `Some(prefer)` when a proxy flag was given.
    pub fn proxy_override(&self) -> Option<bool> {
        match self {
            Command::Snapshot { prefer_proxy: true, .. } => Some(true),
            Command::Snapshot { no_proxy: true, .. } => Some(false),
            _ => None,
        }
    }
}
