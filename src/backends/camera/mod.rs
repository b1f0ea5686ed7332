// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │ Brain / CLI         │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ Camera              │  ← Open with fallback, close on drop
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend trait │  ← Common interface
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!   ┌──────┐   ┌──────┐
//!   │ MIPI │   │ V4L2 │
//!   └──────┘   └──────┘
//! ```

pub mod format_converters;
pub mod manager;
pub mod mipi;
pub mod types;
pub mod v4l2;
pub mod v4l2_utils;

pub use manager::Camera;
pub use types::*;

use crate::backends::system::SystemCommand;
use crate::constants;
use crate::errors::CameraError;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Interface every capture backend implements
///
/// Backends are opened with a fixed format and hand out frames already
/// converted to BGR at that size.
pub trait CameraBackend: Send {
    /// Open the device and start capturing
    fn open(&mut self, format: &CameraFormat) -> Result<(), CameraError>;

    /// Next frame, `None` when the device had nothing (or conversion failed)
    fn capture_frame(&mut self) -> Option<BgrFrame>;

    /// Release the device; must be safe to call repeatedly
    fn close(&mut self);

    /// Whether `open` succeeded and `close` has not been called since
    fn is_open(&self) -> bool;

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Check if this backend could work on the current system
    fn is_available(&self) -> bool;
}

/// Get a concrete backend instance
///
/// `Auto` is not a backend of its own and yields `None`; use
/// [`candidate_backends`] to expand it.
pub fn get_backend_for_type(backend_type: CameraBackendType, index: i32) -> Option<Box<dyn CameraBackend>> {
    match backend_type {
        CameraBackendType::Auto => None,
        CameraBackendType::Mipi => Some(Box::new(mipi::MipiBackend::new(index))),
        CameraBackendType::V4l2 => Some(Box::new(v4l2::V4l2Backend::new())),
    }
}

/// Backends to try, in order, for a requested type
pub fn candidate_backends(backend_type: CameraBackendType, index: i32) -> Vec<Box<dyn CameraBackend>> {
    match backend_type {
        CameraBackendType::Auto => CameraBackendType::FALLBACK_ORDER
            .iter()
            .filter_map(|&t| get_backend_for_type(t, index))
            .collect(),
        other => get_backend_for_type(other, index).into_iter().collect(),
    }
}

/// Command-line patterns of leftover processes that hold the sensor
pub const CONFLICTING_PATTERNS: [&str; 2] = ["mipi", "cam"];

/// `systemctl stop lightdm`; the desktop session keeps the VIO pipeline busy
pub fn stop_display_manager_command(use_sudo: bool) -> SystemCommand {
    SystemCommand::privileged(use_sudo, "systemctl").args(["stop", "lightdm"])
}

/// `pgrep -f <pattern>`
pub fn pgrep_command(pattern: &str) -> SystemCommand {
    SystemCommand::new("pgrep").args(["-f", pattern])
}

/// PIDs listed by `pgrep`, without the ones in `exclude`
///
/// `-f` matches full command lines, so this process (`robot-brain photo -o
/// ~/camera`) or the `sudo` that started it can match too.
pub fn conflicting_pids(pgrep_stdout: &str, exclude: &[u32]) -> BTreeSet<u32> {
    pgrep_stdout
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .filter(|pid| !exclude.contains(pid))
        .collect()
}

/// This process and its parent
fn own_pids() -> Vec<u32> {
    vec![std::process::id(), std::os::unix::process::parent_id()]
}

/// Best-effort release of the camera before opening it
pub fn release_conflicting_processes(use_sudo: bool) {
    let stop = stop_display_manager_command(use_sudo);
    let status = stop.run_quiet();
    debug!(command = %stop, ?status, "Camera cleanup step");

    let exclude = own_pids();
    let mut pids = BTreeSet::new();
    for pattern in CONFLICTING_PATTERNS {
        let pgrep = pgrep_command(pattern);
        match pgrep.output_with_timeout(constants::camera::CLEANUP_TIMEOUT) {
            // pgrep exits 1 when nothing matches
            Ok(Some(output)) if output.status.success() => {
                pids.extend(conflicting_pids(&String::from_utf8_lossy(&output.stdout), &exclude));
            }
            Ok(_) => {}
            Err(e) => debug!(command = %pgrep, error = %e, "pgrep unavailable"),
        }
    }

    if pids.is_empty() {
        return;
    }

    info!(?pids, "Killing processes holding the camera");
    SystemCommand::kill(use_sudo, &pids).run_quiet();
}

/// What `robot-brain list` reports
#[derive(Debug, Clone, Serialize)]
pub struct CameraListing {
    /// VIO library present and compiled in
    pub mipi_available: bool,
    /// `/dev/video*` nodes
    pub v4l2_devices: Vec<DeviceInfo>,
}

/// Enumerate cameras on this system
pub fn list_cameras() -> CameraListing {
    CameraListing {
        mipi_available: mipi::MipiBackend::new(0).is_available(),
        v4l2_devices: v4l2_utils::enumerate_video_devices(),
    }
}
