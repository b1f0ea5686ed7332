// SPDX-License-Identifier: GPL-3.0-only

//! Hardware smoke test
//!
//! Checks, in order:
//! 1. Camera: open, grab one frame, save it as a JPEG, close
//! 2. Audio: record one second from the microphone
//! 3. Detector: load the model and time one inference on a black frame
//!
//! A camera failure ends the run early since nothing else is meaningful on a
//! board whose sensor is not working.

use crate::backends::audio::{Audio, AudioBackend};
use crate::backends::camera::format_converters::bgr_to_rgb;
use crate::backends::camera::{BgrFrame, Camera};
use crate::config::{CameraConfig, Config};
use crate::constants;
use crate::detection::{LandmarkDetector, load_default_detector};
use crate::errors::AppError;
use crate::storage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Result of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed(String),
    Skipped,
}

impl TestOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TestOutcome::Passed => "PASSED",
            TestOutcome::Failed(_) => "FAILED",
            TestOutcome::Skipped => "SKIPPED",
        }
    }

    fn symbol(&self) -> char {
        match self {
            TestOutcome::Passed => '✓',
            TestOutcome::Failed(_) => '✗',
            TestOutcome::Skipped => '-',
        }
    }
}

impl<E: fmt::Display> From<Result<(), E>> for TestOutcome {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => TestOutcome::Passed,
            Err(e) => TestOutcome::Failed(e.to_string()),
        }
    }
}

/// Outcomes in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestReport {
    results: Vec<(&'static str, TestOutcome)>,
}

impl TestReport {
    pub fn push(&mut self, name: &'static str, outcome: TestOutcome) {
        match &outcome {
            TestOutcome::Failed(reason) => warn!(test = name, reason = %reason, "Self-test failed"),
            other => info!(test = name, outcome = other.label(), "Self-test finished"),
        }
        self.results.push((name, outcome));
    }

    pub fn results(&self) -> &[(&'static str, TestOutcome)] {
        &self.results
    }

    pub fn outcome(&self, name: &str) -> Option<&TestOutcome> {
        self.results.iter().find(|(n, _)| *n == name).map(|(_, o)| o)
    }

    /// At least one check ran and none of those that ran failed
    pub fn all_passed(&self) -> bool {
        let mut executed = self
            .results
            .iter()
            .filter(|(_, o)| *o != TestOutcome::Skipped)
            .peekable();
        executed.peek().is_some() && executed.all(|(_, o)| *o == TestOutcome::Passed)
    }

    /// Process exit code for the report
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() { 0 } else { 1 }
    }
}

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, outcome) in &self.results {
            write!(f, "{} {}: {}", outcome.symbol(), name, outcome.label())?;
            if let TestOutcome::Failed(reason) = outcome {
                write!(f, " ({})", reason)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Where the self-test writes its artifacts
#[derive(Debug, Clone)]
pub struct SelfTestOptions {
    pub skip_camera: bool,
    pub photo_path: PathBuf,
    pub recording_path: PathBuf,
    pub record_secs: u32,
}

impl Default for SelfTestOptions {
    fn default() -> Self {
        Self {
            skip_camera: false,
            photo_path: PathBuf::from(constants::files::TEST_PHOTO),
            recording_path: PathBuf::from(constants::files::TEST_RECORDING),
            record_secs: 1,
        }
    }
}

/// Open the camera, save one frame, close it again
pub fn check_camera(config: &CameraConfig, photo_path: &Path) -> Result<BgrFrame, AppError> {
    let mut camera = Camera::open(config)?;
    info!(backend = %camera.backend_type(), "Camera opened");

    let frame = camera
        .get_frame_bgr()?
        .ok_or_else(|| AppError::Other("camera returned no frame".to_string()))?;
    info!(shape = ?frame.shape(), "Frame captured");

    storage::save_frame_jpeg(&frame, photo_path)?;
    info!(path = %photo_path.display(), "Photo saved");

    camera.close();
    Ok(frame)
}

/// Record a short clip
pub fn check_audio<A: AudioBackend>(audio: &mut A, path: &Path, secs: u32) -> Result<(), AppError> {
    audio.record(path, secs)?;
    info!(path = %path.display(), "Recording saved");
    Ok(())
}

/// Time one inference on an all-black frame
///
/// Exceeding the latency budget is only a warning.
pub fn check_detector<D: LandmarkDetector>(detector: &mut D, width: u32, height: u32) -> Result<Duration, AppError> {
    let frame = bgr_to_rgb(&BgrFrame::black(width, height));

    let start = Instant::now();
    detector.detect(&frame)?;
    let elapsed = start.elapsed();

    if elapsed.as_millis() < constants::timing::DETECTOR_BUDGET_MS {
        info!(elapsed_ms = elapsed.as_millis() as u64, "Detector performance OK");
    } else {
        warn!(
            elapsed_ms = elapsed.as_millis() as u64,
            budget_ms = constants::timing::DETECTOR_BUDGET_MS as u64,
            "Detector exceeds latency budget"
        );
    }
    Ok(elapsed)
}

/// Run the three checks in order and collect their outcomes
///
/// A camera failure skips everything after it. With `skip_camera` the camera
/// check is never called and the others still run.
pub fn run_checks<C, A, D>(skip_camera: bool, camera: C, audio: A, detector: D) -> TestReport
where
    C: FnOnce() -> Result<(), AppError>,
    A: FnOnce() -> Result<(), AppError>,
    D: FnOnce() -> Result<(), AppError>,
{
    let mut report = TestReport::default();

    if skip_camera {
        report.push("Camera", TestOutcome::Skipped);
    } else {
        let outcome = camera();
        let failed = outcome.is_err();
        report.push("Camera", outcome.into());
        if failed {
            return report;
        }
    }

    report.push("Audio", audio().into());
    report.push("Detector", detector().into());
    report
}

/// Run every check against real hardware
pub fn run_selftest(config: &Config, options: &SelfTestOptions) -> TestReport {
    run_checks(
        options.skip_camera,
        || check_camera(&config.camera, &options.photo_path).map(|_| ()),
        || {
            let mut audio = Audio::new(config.audio.clone());
            check_audio(&mut audio, &options.recording_path, options.record_secs)
        },
        || {
            let mut detector = load_default_detector(config)?;
            check_detector(&mut detector, config.camera.width, config.camera.height).map(|_| ())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_requires_one_executed_test() {
        let mut report = TestReport::default();
        assert!(!report.all_passed());

        report.push("Camera", TestOutcome::Skipped);
        assert!(!report.all_passed());
        assert_eq!(report.exit_code(), 1);

        report.push("Audio", TestOutcome::Passed);
        assert!(report.all_passed());
        assert_eq!(report.exit_code(), 0);

        report.push("Detector", TestOutcome::Failed("model not found".to_string()));
        assert!(!report.all_passed());
    }

    #[test]
    fn test_report_display() {
        let mut report = TestReport::default();
        report.push("Camera", TestOutcome::Skipped);
        report.push("Audio", TestOutcome::Failed("busy".to_string()));
        let text = report.to_string();
        assert!(text.contains("Camera: SKIPPED"));
        assert!(text.contains("Audio: FAILED (busy)"));
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: Result<(), String> = Ok(());
        assert_eq!(TestOutcome::from(ok), TestOutcome::Passed);
        let err: Result<(), String> = Err("x".to_string());
        assert_eq!(TestOutcome::from(err), TestOutcome::Failed("x".to_string()));
    }

    use crate::backends::camera::types::RgbFrame;
    use crate::detection::HandLandmarks;
    use crate::errors::{AudioError, CameraError, DetectorError};
    use std::cell::RefCell;

    fn camera_error() -> AppError {
        CameraError::NoBackendAvailable.into()
    }

    #[test]
    fn test_camera_failure_aborts_remaining_checks() {
        let calls = RefCell::new(Vec::new());
        let report = run_checks(
            false,
            || {
                calls.borrow_mut().push("camera");
                Err(camera_error())
            },
            || {
                calls.borrow_mut().push("audio");
                Ok(())
            },
            || {
                calls.borrow_mut().push("detector");
                Ok(())
            },
        );

        assert_eq!(*calls.borrow(), vec!["camera"]);
        assert_eq!(report.results().len(), 1);
        assert!(matches!(report.outcome("Camera"), Some(TestOutcome::Failed(_))));
        assert!(report.outcome("Audio").is_none());
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_skipped_camera_runs_audio_and_detector() {
        let calls = RefCell::new(Vec::new());
        let report = run_checks(
            true,
            || {
                calls.borrow_mut().push("camera");
                Ok(())
            },
            || {
                calls.borrow_mut().push("audio");
                Ok(())
            },
            || {
                calls.borrow_mut().push("detector");
                Ok(())
            },
        );

        assert_eq!(*calls.borrow(), vec!["audio", "detector"]);
        assert_eq!(report.outcome("Camera"), Some(&TestOutcome::Skipped));
        assert!(report.all_passed());
    }

    #[test]
    fn test_audio_failure_still_runs_detector() {
        let report = run_checks(
            false,
            || Ok(()),
            || Err(AudioError::RecordingFailed("busy".to_string()).into()),
            || Err(DetectorError::ModelNotFound("hand_landmark.onnx".to_string()).into()),
        );

        let names: Vec<_> = report.results().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["Camera", "Audio", "Detector"]);
        assert_eq!(report.outcome("Camera"), Some(&TestOutcome::Passed));
        assert!(matches!(report.outcome("Audio"), Some(TestOutcome::Failed(r)) if r.contains("busy")));
        assert!(matches!(report.outcome("Detector"), Some(TestOutcome::Failed(r)) if r.contains("hand_landmark.onnx")));
        assert_eq!(report.exit_code(), 1);
    }

    struct SilentAudio {
        recorded: Vec<(PathBuf, u32)>,
    }

    impl AudioBackend for SilentAudio {
        fn play(&mut self, _path: &Path) -> Result<(), AudioError> {
            Ok(())
        }

        fn record(&mut self, path: &Path, duration_secs: u32) -> Result<(), AudioError> {
            self.recorded.push((path.to_path_buf(), duration_secs));
            Ok(())
        }
    }

    #[test]
    fn test_check_audio_records_clip() {
        let mut audio = SilentAudio { recorded: Vec::new() };
        check_audio(&mut audio, Path::new("test_record.wav"), 1).unwrap();
        assert_eq!(audio.recorded, vec![(PathBuf::from("test_record.wav"), 1)]);
    }

    struct FrameSpy {
        seen: Option<(u32, u32)>,
    }

    impl LandmarkDetector for FrameSpy {
        fn detect(&mut self, frame: &RgbFrame) -> Result<Vec<HandLandmarks>, DetectorError> {
            assert!(frame.data.iter().all(|&v| v == 0));
            self.seen = Some((frame.width, frame.height));
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_check_detector_uses_black_frame_at_capture_size() {
        let mut detector = FrameSpy { seen: None };
        check_detector(&mut detector, 320, 240).unwrap();
        assert_eq!(detector.seen, Some((320, 240)));
    }
}
