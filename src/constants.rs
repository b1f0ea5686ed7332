// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants
//!
//! Hardware values here match what the board's camera and sound card expect.
//! Most of them can be overridden through [`crate::config::Config`].

/// Camera hardware defaults
pub mod camera {
    /// Sensor index passed to the vendor library
    pub const CAMERA_INDEX: i32 = 0;

    /// Capture frame rate
    pub const FPS: u32 = 30;

    /// Capture width in pixels
    pub const WIDTH: u32 = 320;

    /// Capture height in pixels
    pub const HEIGHT: u32 = 240;

    /// MIPI host channel, -1 lets the vendor library detect it
    pub const MIPI_CHANNEL: i32 = -1;

    /// Number of `/dev/videoN` nodes tried by the V4L2 backend
    pub const V4L2_DEVICE_COUNT: u32 = 4;

    /// Frame fetch timeout handed to the vendor library (milliseconds)
    pub const MIPI_FRAME_TIMEOUT_MS: i32 = 2000;

    /// Upper bound for each `pgrep` during the pre-open cleanup
    pub const CLEANUP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

    /// Memory-mapped buffers requested from V4L2 drivers
    pub const V4L2_BUFFER_COUNT: u32 = 4;
}

/// Sound card defaults for the `tinyalsa` tools
pub mod audio {
    use std::time::Duration;

    /// ALSA card number
    pub const CARD: u32 = 0;

    /// Capture device (microphone array)
    pub const DEVICE_REC: u32 = 1;

    /// Playback device (speaker)
    pub const DEVICE_PLAY: u32 = 0;

    /// Microphone channels
    pub const CHANNELS: u32 = 4;

    /// Sample rate in Hz
    pub const RATE: u32 = 48_000;

    /// Bits per sample
    pub const BITS: u32 = 16;

    /// Period count
    pub const FRAGMENTS: u32 = 4;

    /// Period size
    pub const FRAGMENT_SIZE: u32 = 512;

    /// Upper bound for `lsof` during device cleanup
    pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

    /// Directory whose device nodes are checked with `lsof`
    pub const SOUND_DEVICE_DIR: &str = "/dev/snd";
}

/// Gesture thresholds in normalized image coordinates
pub mod gesture {
    /// Thumb tip to index tip distance below which a pinch is reported
    pub const PINCH_THRESHOLD: f32 = 0.05;

    /// How much further from the wrist a tip must be than its joint
    pub const FINGER_EXTEND_THRESHOLD: f32 = 0.05;

    /// Extended fingers needed for an open palm
    pub const PALM_MIN_EXTENDED: usize = 4;

    /// Minimum hand presence score
    pub const MIN_DETECTION_CONFIDENCE: f32 = 0.5;

    /// Minimum presence score to keep tracking a hand in its crop
    pub const MIN_TRACKING_CONFIDENCE: f32 = 0.5;

    /// Hands reported per frame
    pub const MAX_NUM_HANDS: usize = 1;
}

/// Files used by the gesture actions
pub mod files {
    /// Played on pinch
    pub const BEEP_FILE: &str = "beep.wav";

    /// Fallback when the beep cannot be played
    pub const WELCOME_FILE: &str = "welcome.wav";

    /// Written on open palm
    pub const USER_RECORDING: &str = "user.wav";

    /// Default ONNX hand landmark model
    pub const LANDMARK_MODEL: &str = "hand_landmark.onnx";

    /// Written by `photo` and `selftest`
    pub const TEST_PHOTO: &str = "test_photo.jpg";

    /// Written by `record` and `selftest`
    pub const TEST_RECORDING: &str = "test_record.wav";
}

/// Timing constants
pub mod timing {
    use std::time::Duration;

    /// Frame counter modulo for periodic FPS logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Minimum time between two triggers of the same gesture
    pub const GESTURE_COOLDOWN: Duration = Duration::from_secs(1);

    /// Length of the palm recording in seconds
    pub const PALM_RECORD_SECS: u32 = 2;

    /// Default runtime of the `run` command in seconds
    pub const DEFAULT_RUN_SECS: u64 = 60;

    /// Detector latency budget checked by `selftest`
    pub const DETECTOR_BUDGET_MS: u128 = 50;
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nv12_frame_fits_default_size() {
        // NV12 needs even dimensions for the 2x2 chroma blocks
        assert_eq!(camera::WIDTH % 2, 0);
        assert_eq!(camera::HEIGHT % 2, 0);
    }
}
