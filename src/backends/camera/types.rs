// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Instant;

/// Camera backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendType {
    /// Try MIPI first, then V4L2
    #[default]
    Auto,
    /// MIPI sensor through the vendor VIO library
    Mipi,
    /// USB/ISP camera through Video4Linux2
    V4l2,
}

impl CameraBackendType {
    /// Concrete backends in the order `Auto` tries them
    pub const FALLBACK_ORDER: [CameraBackendType; 2] =
        [CameraBackendType::Mipi, CameraBackendType::V4l2];

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraBackendType::Auto => "auto",
            CameraBackendType::Mipi => "mipi",
            CameraBackendType::V4l2 => "v4l2",
        }
    }
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CameraBackendType {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(CameraBackendType::Auto),
            "mipi" => Ok(CameraBackendType::Mipi),
            "v4l2" => Ok(CameraBackendType::V4l2),
            other => Err(CameraError::UnknownBackend(other.to_string())),
        }
    }
}

/// Requested capture format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
}

impl CameraFormat {
    pub fn new(width: u32, height: u32, framerate: u32) -> Self {
        Self {
            width,
            height,
            framerate,
        }
    }

    /// Bytes in one NV12 frame of this size
    pub fn nv12_len(&self) -> usize {
        let pixels = self.width as usize * self.height as usize;
        pixels + pixels / 2
    }

    /// Bytes in one BGR frame of this size
    pub fn bgr_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} @ {}fps", self.width, self.height, self.framerate)
    }
}

/// Pixel layouts a V4L2 device may deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Packed 4:2:2 (Y0 U Y1 V)
    YUYV,
    /// Semi-planar 4:2:0 (Y plane + interleaved UV plane)
    NV12,
    /// Motion JPEG, one JPEG per frame
    MJPEG,
    /// 24-bit B G R
    BGR24,
    /// 24-bit R G B
    RGB24,
}

impl PixelFormat {
    /// Formats requested from V4L2 drivers, most preferred first
    pub const PREFERRED: [PixelFormat; 5] = [
        PixelFormat::BGR24,
        PixelFormat::YUYV,
        PixelFormat::NV12,
        PixelFormat::MJPEG,
        PixelFormat::RGB24,
    ];

    /// V4L2 FourCC code
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            PixelFormat::YUYV => *b"YUYV",
            PixelFormat::NV12 => *b"NV12",
            PixelFormat::MJPEG => *b"MJPG",
            PixelFormat::BGR24 => *b"BGR3",
            PixelFormat::RGB24 => *b"RGB3",
        }
    }

    /// Map a V4L2 FourCC back to a known format
    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        Self::PREFERRED.into_iter().find(|f| &f.fourcc() == code)
    }
}

/// One camera frame in interleaved 8-bit B,G,R order
#[derive(Clone, PartialEq, Eq)]
pub struct BgrFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl BgrFrame {
    /// Wrap a buffer, checking it holds exactly `width * height * 3` bytes
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CameraError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CameraError::InvalidFrame(format!(
                "BGR buffer is {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// All-black frame
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 3],
        }
    }

    /// Pixel at (x, y) as `[b, g, r]`
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// `(height, width, channels)`, the shape the frame would have as an image array
    pub fn shape(&self) -> (u32, u32, u32) {
        (self.height, self.width, 3)
    }
}

impl std::fmt::Debug for BgrFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BgrFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("data", &format_args!("{} bytes", self.data.len()))
            .finish()
    }
}

/// One frame in interleaved R,G,B order, as the landmark detector expects
#[derive(Clone, PartialEq, Eq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub captured_at: Instant,
}

impl std::fmt::Debug for RgbFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgbFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("data", &format_args!("{} bytes", self.data.len()))
            .finish()
    }
}

/// Device information from V4L2 capability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Name of the device (V4L2 card)
    pub card: String,
    /// Driver name (V4L2 driver)
    pub driver: String,
    /// Device path (e.g., /dev/video0)
    pub path: String,
    /// Real device path (resolved symlinks)
    pub real_path: String,
    /// Node reports video capture capability
    pub can_capture: bool,
}
