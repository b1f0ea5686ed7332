// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Running the gesture control loop
//! - Listing available cameras
//! - Taking photos, recording and playing audio
//! - The hardware self-test

use robot_brain::backends::camera;
use robot_brain::selftest::{self, SelfTestOptions};
use robot_brain::storage;
use robot_brain::{Audio, AudioBackend, Camera, CameraBackendType, Config, RobotBrain, StopSignal};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load the configuration from `path`, or the default location
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

/// Run the gesture control loop
pub fn run_brain(
    mut config: Config,
    duration_secs: u64,
    backend: Option<CameraBackendType>,
    model: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(backend) = backend {
        config.camera.backend = backend;
    }
    if let Some(model) = model {
        config.brain.model_path = model;
    }

    let duration = (duration_secs > 0).then(|| Duration::from_secs(duration_secs));
    let stop = StopSignal::install_ctrlc()?;

    let mut brain = RobotBrain::new(&config)?;

    match duration {
        Some(d) => println!("Running for {} seconds (press Ctrl+C to stop early)", d.as_secs()),
        None => println!("Running until Ctrl+C"),
    }
    println!("  Pinch     -> play {}", config.brain.beep_file.display());
    println!("  Open palm -> record {}", config.brain.recording_file.display());
    println!();

    let summary = brain.run(duration, &stop)?;

    println!();
    if summary.interrupted {
        println!("Stopped by user.");
    }
    println!("Processed {} frames", summary.frames);
    if summary.empty_frames > 0 {
        println!("Camera returned no data {} times", summary.empty_frames);
    }

    Ok(())
}

/// List all available cameras
pub fn list_cameras(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let listing = camera::list_cameras();

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!(
        "MIPI camera: {}",
        if listing.mipi_available {
            "available"
        } else {
            "not available"
        }
    );
    println!();

    if listing.v4l2_devices.is_empty() {
        println!("No V4L2 devices found.");
        return Ok(());
    }

    println!("V4L2 devices:");
    println!();
    for device in &listing.v4l2_devices {
        println!("  {} {}", device.path, device.card);
        println!("      Driver: {}", device.driver);
        if device.real_path != device.path {
            println!("      Real path: {}", device.real_path);
        }
        if !device.can_capture {
            println!("      (no capture capability)");
        }
    }

    Ok(())
}

/// Grab one frame and save it as JPEG
pub fn take_photo(
    mut config: Config,
    output: PathBuf,
    backend: Option<CameraBackendType>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(backend) = backend {
        config.camera.backend = backend;
    }

    let mut camera = Camera::open(&config.camera)?;
    println!("Using camera: {}", camera.backend_type());
    println!(
        "Capture format: {}x{}",
        config.camera.width, config.camera.height
    );

    println!("Capturing...");
    let frame = camera
        .get_frame_bgr()?
        .ok_or("Camera returned no frame")?;
    camera.close();

    let output_path = storage::resolve_output(&output, "photo", "jpg");
    storage::save_frame_jpeg(&frame, &output_path)?;

    println!("Photo saved: {}", output_path.display());
    Ok(())
}

/// Record from the microphone into a WAV file
pub fn record_audio(
    config: Config,
    output: PathBuf,
    duration: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let output_path = storage::resolve_output(&output, "recording", "wav");
    storage::ensure_parent_dir(&output_path)?;

    let mut audio = Audio::new(config.audio);
    println!("Output: {}", output_path.display());
    println!("Duration: {} seconds", duration);
    println!();
    println!("Recording...");

    audio.record(&output_path, duration)?;

    println!("Recording saved: {}", output_path.display());
    Ok(())
}

/// Play a WAV file on the speaker
pub fn play_audio(config: Config, path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("File not found: {}", path.display()).into());
    }

    let mut audio = Audio::new(config.audio);
    println!("Playing: {}", path.display());
    audio.play(&path)?;
    Ok(())
}

/// Run the hardware self-test and return the process exit code
pub fn selftest(config: Config, skip_camera: bool) -> i32 {
    println!("Robot Brain Self-Test");
    println!("=====================");
    println!();

    let options = SelfTestOptions {
        skip_camera,
        ..Default::default()
    };
    let report = selftest::run_selftest(&config, &options);

    print!("{}", report);
    println!();
    if report.all_passed() {
        println!("All tests passed.");
    } else {
        println!("Some tests failed.");
    }

    report.exit_code()
}

/// Print the effective configuration
pub fn print_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = Config::default_path() {
        println!("# Default location: {}", path.display());
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
