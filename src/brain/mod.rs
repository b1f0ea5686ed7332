// SPDX-License-Identifier: GPL-3.0-only

//! Gesture-driven control loop
//!
//! ```text
//! camera ──BGR──▶ detector ──landmarks──▶ classifier ──gesture──▶ audio
//! ```
//!
//! - pinch plays the beep (falling back to the welcome sound)
//! - open palm records a short clip from the microphone
//!
//! Each action has its own cooldown. Action failures are logged and never
//! stop the loop.

pub mod run_loop;
pub mod timing;

pub use run_loop::{Deadline, LoopAction, StopSignal};
pub use timing::{Cooldown, FpsMeter};

use crate::backends::audio::{Audio, AudioBackend};
use crate::backends::camera::format_converters::bgr_to_rgb;
use crate::backends::camera::{BgrFrame, Camera};
use crate::config::{BrainConfig, Config};
use crate::detection::{Gesture, GestureClassifier, HandLandmarker, LandmarkDetector, load_default_detector};
use crate::errors::AppResult;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Outcome of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames handed to the detector
    pub frames: u64,
    /// Frames the camera had nothing for
    pub empty_frames: u64,
    /// Ended by the stop signal rather than the deadline
    pub interrupted: bool,
}

/// The control loop state
pub struct RobotBrain<D = HandLandmarker, A = Audio> {
    camera: Camera,
    detector: D,
    audio: A,
    classifier: GestureClassifier,
    config: BrainConfig,
    pinch_cooldown: Cooldown,
    palm_cooldown: Cooldown,
    fps: FpsMeter,
}

impl RobotBrain {
    /// Open the camera, set up audio and load the landmark model
    pub fn new(config: &Config) -> AppResult<Self> {
        info!("Initializing robot brain");

        let camera = Camera::open(&config.camera)?;
        let audio = Audio::new(config.audio.clone());
        let detector = load_default_detector(config)?;

        Ok(Self::with_parts(camera, detector, audio, config))
    }
}

impl<D: LandmarkDetector, A: AudioBackend> RobotBrain<D, A> {
    /// Assemble from already constructed parts
    pub fn with_parts(camera: Camera, detector: D, audio: A, config: &Config) -> Self {
        let cooldown = config.brain.cooldown();
        let brain = Self {
            camera,
            detector,
            audio,
            classifier: GestureClassifier::new(config.gesture.clone()),
            config: config.brain.clone(),
            pinch_cooldown: Cooldown::new(cooldown),
            palm_cooldown: Cooldown::new(cooldown),
            fps: FpsMeter::new(config.brain.fps_log_interval),
        };

        info!(
            backend = %brain.camera.backend_type(),
            cooldown_ms = cooldown.as_millis() as u64,
            "Robot brain ready, waiting for gestures"
        );
        brain
    }

    /// Frames processed so far
    pub fn frame_count(&self) -> u64 {
        self.fps.frames()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Run detection on one frame and fire the matching actions
    ///
    /// Returns the actions that actually started (suppressed triggers are not
    /// included). Detector errors are logged; the frame still counts.
    pub fn process_frame(&mut self, frame: &BgrFrame) -> Vec<Gesture> {
        let rgb = bgr_to_rgb(frame);
        let mut fired = Vec::new();

        match self.detector.detect(&rgb) {
            Ok(hands) => {
                for hand in &hands {
                    let Some(gesture) = self.classifier.classify(hand) else {
                        continue;
                    };
                    let started = match gesture {
                        Gesture::Pinch => self.trigger_pinch_action(),
                        Gesture::OpenPalm => self.trigger_palm_action(),
                    };
                    if started {
                        fired.push(gesture);
                    }
                }
            }
            Err(e) => warn!(error = %e, "Landmark detection failed"),
        }

        if let Some(fps) = self.fps.tick(Instant::now()) {
            info!(fps = format_args!("{:.1}", fps), frames = self.fps.frames(), "Processing rate");
        }

        fired
    }

    /// Pinch: play the beep, falling back to the welcome sound
    fn trigger_pinch_action(&mut self) -> bool {
        if !self.pinch_cooldown.try_fire(Instant::now()) {
            return false;
        }

        info!("Pinch detected, playing beep");
        if let Err(e) = self.audio.play(&self.config.beep_file) {
            warn!(file = %self.config.beep_file.display(), error = %e, "Beep failed, trying fallback");
            if let Err(e) = self.audio.play(&self.config.welcome_file) {
                error!(file = %self.config.welcome_file.display(), error = %e, "Playback failed");
            }
        }
        true
    }

    /// Open palm: record a short clip
    fn trigger_palm_action(&mut self) -> bool {
        if !self.palm_cooldown.try_fire(Instant::now()) {
            return false;
        }

        info!(secs = self.config.record_secs, "Open palm detected, recording");
        match self.audio.record(&self.config.recording_file, self.config.record_secs) {
            Ok(()) => info!(file = %self.config.recording_file.display(), "Recording saved"),
            Err(e) => error!(error = %e, "Recording failed"),
        }
        true
    }

    /// Poll frames until `duration` elapses or `stop` is raised
    ///
    /// `None` runs until stopped. The camera is closed on every exit path,
    /// including a camera error, which is returned after cleanup.
    pub fn run(&mut self, duration: Option<Duration>, stop: &StopSignal) -> AppResult<RunSummary> {
        let deadline = Deadline::start(duration);
        let mut empty_frames = 0u64;
        let frames_before = self.frame_count();

        info!(duration_secs = duration.map(|d| d.as_secs_f64()), "Starting main loop");

        let result = loop {
            if run_loop::next_action(&deadline, stop) == LoopAction::Stop {
                break Ok(());
            }

            match self.camera.get_frame_bgr() {
                Ok(Some(frame)) => {
                    self.process_frame(&frame);
                }
                Ok(None) => empty_frames += 1,
                Err(e) => break Err(e),
            }
        };

        let summary = RunSummary {
            frames: self.frame_count() - frames_before,
            empty_frames,
            interrupted: stop.is_stopped(),
        };

        if summary.interrupted {
            info!("Interrupted by user");
        }
        info!(frames = summary.frames, empty_frames, "Shutting down");
        self.camera.close();

        result?;
        Ok(summary)
    }
}
