// SPDX-License-Identifier: GPL-3.0-only

//! Shared V4L2 utility functions
//!
//! Device discovery used by the V4L2 backend and the `list` command.

use super::types::DeviceInfo;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use tracing::debug;

/// VIDIOC_QUERYCAP ioctl number
const VIDIOC_QUERYCAP: libc::c_ulong = 0x80685600;

/// V4L2 capability flag for single-planar video capture
const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x00000001;

/// Set when `device_caps` is filled in
const V4L2_CAP_DEVICE_CAPS: u32 = 0x80000000;

/// V4L2 capability structure for VIDIOC_QUERYCAP ioctl
#[repr(C)]
struct V4l2Capability {
    driver: [u8; 16],
    card: [u8; 32],
    bus_info: [u8; 32],
    version: u32,
    capabilities: u32,
    device_caps: u32,
    reserved: [u32; 3],
}

impl V4l2Capability {
    fn effective_caps(&self) -> u32 {
        if self.capabilities & V4L2_CAP_DEVICE_CAPS != 0 {
            self.device_caps
        } else {
            self.capabilities
        }
    }
}

/// Query V4L2 capabilities for an open file descriptor.
///
/// Issues the `VIDIOC_QUERYCAP` ioctl and returns the capability struct,
/// or `None` if the ioctl fails.
fn query_v4l2_cap(fd: RawFd) -> Option<V4l2Capability> {
    let mut cap: V4l2Capability = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCAP as _, &mut cap as *mut V4l2Capability) };
    if result < 0 { None } else { Some(cap) }
}

/// Decode a NUL-padded C string field
fn c_field(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).trim().to_string()
}

/// Path of the N-th video node
pub fn video_node_path(index: u32) -> String {
    format!("/dev/video{}", index)
}

/// Parse the index out of a `videoN` node name
pub fn parse_video_index(name: &str) -> Option<u32> {
    name.strip_prefix("video")?.parse().ok()
}

/// Build DeviceInfo from a V4L2 device path
///
/// Resolves symlinks and queries driver and card names. A node that cannot
/// be opened still yields an entry with empty names.
pub fn build_device_info(v4l2_path: &str) -> DeviceInfo {
    let real_path = std::fs::canonicalize(v4l2_path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| v4l2_path.to_string());

    let cap = std::fs::File::open(v4l2_path)
        .ok()
        .and_then(|file| query_v4l2_cap(file.as_raw_fd()));

    let info = match cap {
        Some(cap) => DeviceInfo {
            card: c_field(&cap.card),
            driver: c_field(&cap.driver),
            path: v4l2_path.to_string(),
            real_path,
            can_capture: cap.effective_caps() & V4L2_CAP_VIDEO_CAPTURE != 0,
        },
        None => DeviceInfo {
            path: v4l2_path.to_string(),
            real_path,
            ..Default::default()
        },
    };

    debug!(path = %info.path, driver = %info.driver, card = %info.card, "Queried V4L2 node");
    info
}

/// Enumerate `/dev/videoN` nodes, sorted by index
pub fn enumerate_video_devices() -> Vec<DeviceInfo> {
    enumerate_video_devices_in(Path::new("/dev"))
}

fn enumerate_video_devices_in(dev_dir: &Path) -> Vec<DeviceInfo> {
    let entries = match std::fs::read_dir(dev_dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut indices: Vec<u32> = entries
        .flatten()
        .filter_map(|e| parse_video_index(&e.file_name().to_string_lossy()))
        .collect();
    indices.sort_unstable();

    indices
        .into_iter()
        .map(|index| {
            let path = dev_dir.join(format!("video{}", index));
            build_device_info(&path.to_string_lossy())
        })
        .collect()
}
