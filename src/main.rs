use tickline::cli::{Args, Command, OverlayMode};
use tickline::host::fixture::FixtureHost;
use tickline::overlay::load_segments;
use tickline::panel::{ActionStatus, Panel, PanelAction};
use tickline::paths::{self, PathConfig};
use tickline::settings::{PanelSettings, SETTINGS_FILE_NAME};
use tickline::timecode::{Timecode, frames_to_ticks, ticks_to_timecode};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info};

fn init_logger(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| paths::data_file("tickline.log", path_config));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        eprintln!("Logging to: {}", log_path.display());
    } else {
        // RUST_LOG wins over -v
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level.as_str()))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Done passes, Skipped is reported on stderr, Failed becomes the error.
fn report(status: ActionStatus) -> Result<()> {
    match status {
        ActionStatus::Done(_) => Ok(()),
        ActionStatus::Skipped(reason) => {
            eprintln!("{}", reason);
            Ok(())
        }
        ActionStatus::Failed(err) => Err(err.into()),
    }
}

/// Like [`report`], for steps later steps depend on.
fn require(status: ActionStatus) -> Result<()> {
    match status {
        ActionStatus::Skipped(reason) => bail!("{}", reason),
        other => report(other),
    }
}

fn run(command: Command, settings: PanelSettings) -> Result<()> {
    let proxy = command.proxy_override();
    match command {
        Command::Timecode { ticks, fps } => {
            let fps = fps.unwrap_or(settings.fallback_fps);
            println!("{}", ticks_to_timecode(ticks, fps));
        }

        Command::Frames { timecode, fps } => {
            let fps = fps.unwrap_or(settings.fallback_fps);
            let tc: Timecode = timecode.parse()?;
            let frames = tc.to_frames(fps)?;
            println!("frames={} ticks={}", frames, frames_to_ticks(frames, fps));
        }

        Command::Snapshot { host, output, .. } => {
            let mut panel = Panel::new(FixtureHost::load(&host.host)?, settings);
            if let Some(prefer) = proxy {
                panel.dispatch(PanelAction::SetPreferProxy(prefer));
            }
            match output {
                Some(target) => {
                    let status = panel.dispatch(PanelAction::ExportSnapshot(Some(target)));
                    if status.is_done() {
                        println!("{}", status);
                    }
                    report(status)?;
                }
                None => {
                    report(panel.dispatch(PanelAction::MakeSnapshot))?;
                    if let Some(json) = &panel.state().snapshot_json {
                        println!("{}", json);
                    }
                }
            }
        }

        Command::Items { host } => {
            let mut panel = Panel::new(FixtureHost::load(&host.host)?, settings);
            require(panel.dispatch(PanelAction::LoadItems))?;
            for (i, item) in panel.state().items.iter().enumerate() {
                println!("{:>3}  {:<10} {}", i, item.id, item);
            }
        }

        Command::Selection { host } => {
            let mut panel = Panel::new(FixtureHost::load(&host.host)?, settings);
            let status = panel.dispatch(PanelAction::ResolveFromTimeline);
            if status.is_done() {
                for line in &panel.state().console {
                    println!("{}", line);
                }
            }
            report(status)?;
        }

        Command::Overlays { host, mode, clip, segments, output } => {
            let mut panel = Panel::new(FixtureHost::load(&host.host)?, settings);
            if let Some(path) = segments {
                let segments = load_segments(&path)?;
                require(panel.dispatch(PanelAction::SetSegments(segments)))?;
            }

            let status = match mode {
                OverlayMode::Review => {
                    let Some(index) = clip else {
                        bail!("--clip is required for review mode (see `tickline items`)");
                    };
                    require(panel.dispatch(PanelAction::LoadItems))?;
                    require(panel.dispatch(PanelAction::Select(index)))?;
                    panel.dispatch(PanelAction::BuildReviewSequence)
                }
                OverlayMode::Report => panel.dispatch(PanelAction::BuildReportSequence),
            };
            println!("{}", status);
            require(status)?;

            if let Some(path) = output {
                panel.host().save(&path)?;
                println!("Saved host to {}", path.display());
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = paths::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {:#}", e);
    }

    init_logger(&args, &path_config)?;
    debug!("Command-line args: {:?}", args);

    let settings_path = paths::config_file(SETTINGS_FILE_NAME, &path_config);
    info!("Config path: {}", settings_path.display());
    let settings = PanelSettings::load(&settings_path)?;

    run(args.command, settings)
}
