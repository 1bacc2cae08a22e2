use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

mod config;

use config::Config;
use kg_capture::{Monitor, PixelBuffer, Session};

#[derive(Parser, Debug)]
#[command(name = "kg-shot")]
#[command(about = "Save each monitor of the virtual desktop to a PNG file", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "kg-shot.toml")]
    config: PathBuf,

    /// Monitor index to capture, 0 = whole virtual desktop (overrides config)
    #[arg(short, long)]
    monitor: Option<usize>,

    /// Output directory (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List monitors and exit
    #[arg(long)]
    list: bool,

    /// With --list, print the monitor list as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    // Load configuration
    let mut config = if args.config.exists() {
        info!("Loading configuration from: {}", args.config.display());
        Config::from_file(&args.config)?
    } else {
        warn!("Config file not found, using defaults");
        Config::default()
    };

    // Apply CLI overrides
    if let Some(monitor) = args.monitor {
        config.capture.monitor = Some(monitor);
    }
    if let Some(output) = args.output {
        config.output.dir = output;
    }

    config.validate()?;

    let session = Session::open().context("Failed to open a capture session")?;
    let monitors = session.monitors().context("Failed to enumerate monitors")?;

    if args.list {
        return list_monitors(&monitors, args.json);
    }

    let targets: Vec<&Monitor> = match config.capture.monitor {
        Some(index) => {
            let monitor = monitors.get(index).with_context(|| {
                format!("No monitor with index {index} ({} listed)", monitors.len())
            })?;
            vec![monitor]
        }
        None => monitors.iter().filter(|m| !m.is_virtual).collect(),
    };

    fs::create_dir_all(&config.output.dir).with_context(|| {
        format!("Failed to create output directory {}", config.output.dir.display())
    })?;

    for monitor in targets {
        let shot = session
            .capture(monitor.rect)
            .with_context(|| format!("Failed to capture {} ({})", monitor.name, monitor.rect))?;

        let path = config
            .output
            .dir
            .join(format!("{}-{}.png", config.output.stem, monitor.index));
        save_png(shot, &path)?;
        info!("Saved {} ({}) to {}", monitor.name, monitor.rect, path.display());
    }

    Ok(())
}

fn list_monitors(monitors: &[Monitor], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(monitors)?);
        return Ok(());
    }

    println!("Monitors:");
    for monitor in monitors {
        let tag = if monitor.is_virtual {
            " [virtual]"
        } else if monitor.primary {
            " [primary]"
        } else {
            ""
        };
        println!("  {}. {}: {}{}", monitor.index, monitor.name, monitor.rect, tag);
    }
    Ok(())
}

/// Encode the canonical RGB buffer as PNG. The buffer layout is exactly
/// what `image::RgbImage` expects, so this is a move, not a conversion.
fn save_png(shot: PixelBuffer, path: &Path) -> anyhow::Result<()> {
    let image = image::RgbImage::from_raw(shot.width, shot.height, shot.data)
        .context("Capture buffer does not match its dimensions")?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}
