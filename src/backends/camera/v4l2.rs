// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera backend
//!
//! Used for USB cameras and as the fallback when the MIPI pipeline cannot be
//! opened. Tries `/dev/video0..N` in order and keeps the first node that
//! accepts the format and actually delivers a frame.

use super::format_converters::{resize_bgr, to_bgr_frame};
use super::types::{BgrFrame, CameraBackendType, CameraFormat, PixelFormat};
use super::v4l2_utils::video_node_path;
use super::CameraBackend;
use crate::constants;
use crate::errors::CameraError;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// An opened, streaming capture node
struct ActiveDevice {
    path: String,
    pixel_format: PixelFormat,
    width: u32,
    height: u32,
    /// Bytes per line reported by the driver
    stride: u32,
    // Declared before the device so buffers are unmapped first
    stream: Stream<'static>,
    _device: Device,
}

impl ActiveDevice {
    /// Open a node, negotiate a format and start streaming
    fn open(path: &str, format: &CameraFormat) -> Result<Self, String> {
        let device = Device::with_path(path).map_err(|e| format!("open: {}", e))?;
        let (pixel_format, actual) = negotiate_format(&device, format)?;

        if let Err(e) = device.set_params(&Parameters::with_fps(format.framerate)) {
            debug!(path, error = %e, "Device rejected frame rate, keeping its default");
        }

        let stream = Stream::with_buffers(&device, Type::VideoCapture, constants::camera::V4L2_BUFFER_COUNT)
            .map_err(|e| format!("stream: {}", e))?;

        Ok(Self {
            path: path.to_string(),
            pixel_format,
            width: actual.width,
            height: actual.height,
            stride: actual.stride,
            stream,
            _device: device,
        })
    }

    /// Dequeue one buffer and convert it to BGR at the native device size
    fn read_bgr(&mut self) -> Result<BgrFrame, String> {
        let (buf, meta) = self.stream.next().map_err(|e| format!("dequeue: {}", e))?;

        // MJPEG buffers are only partially filled
        let used = meta.bytesused as usize;
        let data = if used > 0 && used <= buf.len() { &buf[..used] } else { buf };

        to_bgr_frame(self.pixel_format, data, self.width, self.height, self.stride)
            .map_err(|e| e.to_string())
    }
}

/// Ask the driver for each supported pixel format until one sticks
///
/// Drivers answer `S_FMT` with the closest format they support, so the
/// returned format is checked rather than trusted.
fn negotiate_format(device: &Device, format: &CameraFormat) -> Result<(PixelFormat, Format), String> {
    for wanted in PixelFormat::PREFERRED {
        let requested = Format::new(format.width, format.height, FourCC::new(&wanted.fourcc()));
        let actual = match device.set_format(&requested) {
            Ok(actual) => actual,
            Err(e) => {
                debug!(fourcc = ?wanted, error = %e, "Format rejected");
                continue;
            }
        };

        if let Some(pixel_format) = PixelFormat::from_fourcc(&actual.fourcc.repr) {
            debug!(
                fourcc = ?pixel_format,
                width = actual.width,
                height = actual.height,
                stride = actual.stride,
                "V4L2 format negotiated"
            );
            return Ok((pixel_format, actual));
        }
    }

    Err("no supported pixel format".to_string())
}

/// V4L2 camera backend
pub struct V4l2Backend {
    device_count: u32,
    format: Option<CameraFormat>,
    active: Option<ActiveDevice>,
}

impl Default for V4l2Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl V4l2Backend {
    pub fn new() -> Self {
        Self::with_device_count(constants::camera::V4L2_DEVICE_COUNT)
    }

    /// Backend probing `/dev/video0` through `/dev/video{count-1}`
    pub fn with_device_count(device_count: u32) -> Self {
        Self {
            device_count,
            format: None,
            active: None,
        }
    }

    /// Node path of the device in use
    pub fn device_path(&self) -> Option<&str> {
        self.active.as_ref().map(|d| d.path.as_str())
    }

    pub fn candidate_paths(&self) -> Vec<String> {
        (0..self.device_count).map(video_node_path).collect()
    }
}

impl CameraBackend for V4l2Backend {
    fn open(&mut self, format: &CameraFormat) -> Result<(), CameraError> {
        if self.is_open() {
            self.close();
        }

        for path in self.candidate_paths() {
            let mut device = match ActiveDevice::open(&path, format) {
                Ok(device) => device,
                Err(reason) => {
                    debug!(path = %path, reason = %reason, "V4L2 node unusable");
                    continue;
                }
            };

            // A node can accept a format and still never deliver (metadata nodes)
            match device.read_bgr() {
                Ok(frame) => {
                    info!(
                        path = %path,
                        fourcc = ?device.pixel_format,
                        native = %format!("{}x{}", frame.width, frame.height),
                        format = %format,
                        "V4L2 camera opened"
                    );
                    self.active = Some(device);
                    self.format = Some(*format);
                    return Ok(());
                }
                Err(reason) => {
                    debug!(path = %path, reason = %reason, "V4L2 test frame failed");
                }
            }
        }

        Err(CameraError::OpenFailed {
            backend: "v4l2",
            reason: format!("no usable device among {} tried", self.device_count),
        })
    }

    fn capture_frame(&mut self) -> Option<BgrFrame> {
        let format = self.format?;
        let device = self.active.as_mut()?;

        match device.read_bgr() {
            Ok(frame) => Some(resize_bgr(frame, format.width, format.height)),
            Err(reason) => {
                warn!(path = %device.path, reason = %reason, "Failed to read V4L2 frame");
                None
            }
        }
    }

    fn close(&mut self) {
        self.format = None;
        if let Some(device) = self.active.take() {
            debug!(path = %device.path, "V4L2 camera closed");
        }
    }

    fn is_open(&self) -> bool {
        self.active.is_some()
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn is_available(&self) -> bool {
        self.candidate_paths()
            .iter()
            .any(|path| std::path::Path::new(path).exists())
    }
}
