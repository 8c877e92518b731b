//! Subcraft CLI: drive the real-time preview engine from a terminal.
//!
//! Usage:
//!   subcraft scrub [OPTIONS]       Seek across a demo preview and report cache behavior
//!   subcraft play [OPTIONS]        Play a demo preview in real time
//!   subcraft thumbnail [OPTIONS]   Export a preview thumbnail
//!   subcraft frame [OPTIONS]       Export a full preview frame
//!   subcraft config                Print the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use subcraft_common::config::AppConfig;

mod commands;
mod demo;

#[derive(Parser)]
#[command(
    name = "subcraft",
    about = "Real-time preview of subtitle compositions",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to $XDG_CONFIG_HOME/subcraft/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seek across the demo preview twice and print cache statistics
    Scrub {
        /// Demo background length in seconds
        #[arg(long, default_value = "10.0")]
        duration: f64,

        /// Demo background frame rate
        #[arg(long, default_value = "30.0")]
        fps: f64,

        /// Seek step in seconds
        #[arg(long, default_value = "0.25")]
        step: f64,
    },

    /// Play the demo preview for a while, printing time updates
    Play {
        /// Start time in seconds
        #[arg(long, default_value = "0.0")]
        from: f64,

        /// Wall-clock seconds to play for
        #[arg(long, default_value = "3.0")]
        seconds: f64,

        /// Demo background length in seconds
        #[arg(long, default_value = "10.0")]
        duration: f64,

        /// Use the high-performance preset
        #[arg(long)]
        fast: bool,

        /// Attach this many seconds of silent audio, looped or trimmed to fit
        #[arg(long)]
        audio: Option<f64>,
    },

    /// Export a downsized preview still
    Thumbnail {
        /// Time in seconds
        #[arg(long, default_value = "0.0")]
        time: f64,

        /// Thumbnail width
        #[arg(long, default_value = "160")]
        width: u32,

        /// Thumbnail height
        #[arg(long, default_value = "90")]
        height: u32,

        /// Output image path
        #[arg(short, long, default_value = "thumbnail.png")]
        output: PathBuf,
    },

    /// Export a preview frame at preview resolution
    Frame {
        /// Time in seconds
        #[arg(long, default_value = "0.0")]
        time: f64,

        /// Output image path
        #[arg(short, long, default_value = "frame.png")]
        output: PathBuf,
    },

    /// Print the effective configuration as JSON
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    subcraft_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Scrub {
            duration,
            fps,
            step,
        } => commands::scrub::run(&config, duration, fps, step),
        Commands::Play {
            from,
            seconds,
            duration,
            fast,
            audio,
        } => commands::play::run(&config, from, seconds, duration, fast, audio),
        Commands::Thumbnail {
            time,
            width,
            height,
            output,
        } => commands::thumbnail::run(&config, time, width, height, output),
        Commands::Frame { time, output } => commands::frame::run(&config, time, output),
        Commands::Config => commands::config::run(&config),
    }
}
