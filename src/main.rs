// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use robot_brain::CameraBackendType;
use robot_brain::constants;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "robot-brain")]
#[command(about = "Gesture-driven camera and audio demo for RDK X3 boards")]
#[command(version = constants::app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/robot-brain/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gesture control loop (default)
    Run {
        /// Run time in seconds, 0 runs until Ctrl+C
        #[arg(short, long, default_value_t = constants::timing::DEFAULT_RUN_SECS)]
        duration: u64,

        /// Camera backend: auto, mipi or v4l2
        #[arg(short, long)]
        backend: Option<CameraBackendType>,

        /// ONNX hand landmark model
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// List available cameras
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Take a photo
    Photo {
        /// Output file or directory
        #[arg(short, long, default_value = constants::files::TEST_PHOTO)]
        output: PathBuf,

        /// Camera backend: auto, mipi or v4l2
        #[arg(short, long)]
        backend: Option<CameraBackendType>,
    },

    /// Record audio from the microphone
    Record {
        /// Output WAV file
        #[arg(short, long, default_value = constants::files::TEST_RECORDING)]
        output: PathBuf,

        /// Recording duration in seconds
        #[arg(short, long, default_value_t = constants::timing::PALM_RECORD_SECS)]
        duration: u32,
    },

    /// Play a WAV file on the speaker
    Play {
        /// WAV file to play
        path: PathBuf,
    },

    /// Check camera, audio and detector on this board
    Selftest {
        /// Skip the camera check (no sensor attached)
        #[arg(long)]
        skip_camera: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=robot_brain=debug, RUST_LOG=warn
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        None => cli::run_brain(config, constants::timing::DEFAULT_RUN_SECS, None, None),
        Some(Commands::Run {
            duration,
            backend,
            model,
        }) => cli::run_brain(config, duration, backend, model),
        Some(Commands::List { json }) => cli::list_cameras(json),
        Some(Commands::Photo { output, backend }) => cli::take_photo(config, output, backend),
        Some(Commands::Record { output, duration }) => cli::record_audio(config, output, duration),
        Some(Commands::Play { path }) => cli::play_audio(config, path),
        Some(Commands::Selftest { skip_camera }) => {
            let code = cli::selftest(config, skip_camera);
            std::process::exit(code);
        }
        Some(Commands::Config) => cli::print_config(&config),
    }
}
