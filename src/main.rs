use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use frame_pacer::config::PlayerConfig;
use frame_pacer::core::launcher;
use frame_pacer::ui::interactive;
use frame_pacer::utils::{logger, terminal_control};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON player configuration (defaults to ./frame-pacer.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Downscale frames wider than this many pixels (overrides the config file)
    #[arg(long, global = true)]
    max_width: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a source in the terminal with keyboard controls
    Play { source: String },
    /// Play a source headless and print the playback report as JSON
    Bench { source: String },
    /// Print a source's stream info as JSON
    Probe { source: String },
}

fn main() -> Result<()> {
    logger::init();

    // Leftover raw mode from a crashed run breaks line output.
    terminal_control::reset();

    let cli = Cli::parse();
    let mut config = PlayerConfig::load_or_default(cli.config.as_deref())?;
    if cli.max_width.is_some() {
        config.max_frame_width = cli.max_width;
        config.validate()?;
    }

    match &cli.command {
        Commands::Play { source } => {
            interactive::run(config, source)?;
        }
        Commands::Bench { source } => {
            let report = launcher::run_bench(config, source)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Probe { source } => {
            let info = launcher::probe(&config, source)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}
