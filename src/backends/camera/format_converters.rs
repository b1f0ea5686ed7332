// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion to the BGR layout used throughout the crate
//!
//! YUV conversions use BT.601 video-range integer coefficients, which is what
//! OpenCV's `COLOR_YUV2BGR_NV12` does, so frames look the same as the
//! vendor's own tooling.

use super::types::{BgrFrame, PixelFormat, RgbFrame};
use crate::errors::CameraError;
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb};
use std::borrow::Cow;
use std::time::Instant;

/// Convert one YUV sample to `[b, g, r]`
#[inline]
fn yuv_to_bgr(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;

    [
        b.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        r.clamp(0, 255) as u8,
    ]
}

fn check_even(width: u32, height: u32) -> Result<(), CameraError> {
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(CameraError::InvalidFrame(format!(
            "4:2:0 frames need non-zero even dimensions, got {}x{}",
            width, height
        )));
    }
    Ok(())
}

/// Convert an NV12 buffer to BGR
///
/// NV12 layout: `width * height` luma bytes followed by `width * height / 2`
/// bytes of interleaved U,V, one pair per 2x2 pixel block. Trailing bytes
/// (some drivers pad the buffer) are ignored.
pub fn nv12_to_bgr(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, CameraError> {
    check_even(width, height)?;

    let w = width as usize;
    let h = height as usize;
    let y_size = w * h;
    let expected = y_size + y_size / 2;
    if data.len() < expected {
        return Err(CameraError::InvalidFrame(format!(
            "NV12 buffer is {} bytes, expected {} for {}x{}",
            data.len(),
            expected,
            width,
            height
        )));
    }

    let (y_plane, uv_plane) = data.split_at(y_size);
    let mut bgr = vec![0u8; w * h * 3];

    for row in 0..h {
        let uv_row = &uv_plane[(row / 2) * w..(row / 2) * w + w];
        let y_row = &y_plane[row * w..row * w + w];
        let out_row = &mut bgr[row * w * 3..(row + 1) * w * 3];

        for col in 0..w {
            let uv_idx = (col / 2) * 2;
            let px = yuv_to_bgr(y_row[col], uv_row[uv_idx], uv_row[uv_idx + 1]);
            out_row[col * 3..col * 3 + 3].copy_from_slice(&px);
        }
    }

    Ok(bgr)
}

/// Convert packed YUYV (Y0 U Y1 V) to BGR
pub fn yuyv_to_bgr(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, CameraError> {
    if width % 2 != 0 {
        return Err(CameraError::InvalidFrame(format!(
            "YUYV frames need an even width, got {}",
            width
        )));
    }

    let pixel_count = width as usize * height as usize;
    if data.len() < pixel_count * 2 {
        return Err(CameraError::InvalidFrame(format!(
            "YUYV buffer is {} bytes, expected {}",
            data.len(),
            pixel_count * 2
        )));
    }

    let mut bgr = Vec::with_capacity(pixel_count * 3);

    // YUYV: Y0 U Y1 V - processes 2 pixels at a time
    for chunk in data[..pixel_count * 2].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        bgr.extend_from_slice(&yuv_to_bgr(y0, u, v));
        bgr.extend_from_slice(&yuv_to_bgr(y1, u, v));
    }

    Ok(bgr)
}

/// Swap the first and third channel of every 3-byte pixel
///
/// Turns BGR into RGB and back.
pub fn swap_red_blue(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for px in data.chunks_exact(3) {
        out.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    out
}

/// Decode one MJPEG frame to BGR
pub fn mjpeg_to_bgr(data: &[u8]) -> Result<(u32, u32, Vec<u8>), CameraError> {
    let decoded = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| CameraError::InvalidFrame(format!("MJPEG decode failed: {}", e)))?
        .to_rgb8();
    let (width, height) = decoded.dimensions();
    Ok((width, height, swap_red_blue(decoded.as_raw())))
}

/// Convert a raw device buffer of the given format to a BGR frame
///
/// `stride` is the driver's bytes per line, 0 for packed rows.
pub fn to_bgr_frame(
    format: PixelFormat,
    data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
) -> Result<BgrFrame, CameraError> {
    let w = width as usize;
    let rows = height as usize;
    match format {
        PixelFormat::NV12 => {
            // Both planes share the stride; the UV plane adds half the rows
            let packed = pack_rows(data, w, stride as usize, rows + rows / 2)?;
            BgrFrame::new(width, height, nv12_to_bgr(&packed, width, height)?)
        }
        PixelFormat::YUYV => {
            let packed = pack_rows(data, w * 2, stride as usize, rows)?;
            BgrFrame::new(width, height, yuyv_to_bgr(&packed, width, height)?)
        }
        PixelFormat::MJPEG => {
            let (w, h, bgr) = mjpeg_to_bgr(data)?;
            BgrFrame::new(w, h, bgr)
        }
        PixelFormat::BGR24 => {
            let packed = pack_rows(data, w * 3, stride as usize, rows)?;
            BgrFrame::new(width, height, packed.into_owned())
        }
        PixelFormat::RGB24 => {
            let packed = pack_rows(data, w * 3, stride as usize, rows)?;
            BgrFrame::new(width, height, swap_red_blue(&packed))
        }
    }
}

/// Drop per-row padding so rows of `row_bytes` are contiguous
///
/// `stride` is the driver's bytes per line; 0 or anything not larger than
/// `row_bytes` means the buffer is already packed.
pub fn pack_rows(data: &[u8], row_bytes: usize, stride: usize, rows: usize) -> Result<Cow<'_, [u8]>, CameraError> {
    let packed_len = row_bytes * rows;
    if stride <= row_bytes {
        return data
            .get(..packed_len)
            .map(Cow::Borrowed)
            .ok_or_else(|| short_buffer(data.len(), packed_len));
    }

    // The last row does not need its padding
    let needed = stride * rows.saturating_sub(1) + row_bytes;
    if rows > 0 && data.len() < needed {
        return Err(short_buffer(data.len(), needed));
    }

    let mut out = Vec::with_capacity(packed_len);
    for row in data.chunks(stride).take(rows) {
        out.extend_from_slice(&row[..row_bytes]);
    }
    Ok(Cow::Owned(out))
}

fn short_buffer(len: usize, expected: usize) -> CameraError {
    CameraError::InvalidFrame(format!("buffer is {} bytes, expected {}", len, expected))
}

pub fn resize_bgr(frame: BgrFrame, width: u32, height: u32) -> BgrFrame {
    if frame.width == width && frame.height == height {
        return frame;
    }

    // Channel order does not matter to the filter, so treat BGR as RGB
    let Some(src) =
        ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(frame.width, frame.height, frame.data)
    else {
        return BgrFrame::black(width, height);
    };
    let resized = imageops::resize(&src, width, height, FilterType::Triangle);

    BgrFrame {
        width,
        height,
        data: resized.into_raw(),
    }
}

/// Convert a BGR frame to the RGB layout the landmark detector consumes
pub fn bgr_to_rgb(frame: &BgrFrame) -> RgbFrame {
    RgbFrame {
        width: frame.width,
        height: frame.height,
        data: swap_red_blue(&frame.data),
        captured_at: Instant::now(),
    }
}

/// Wrap a BGR frame as an `image` RGB buffer (for saving to disk)
pub fn bgr_to_image(frame: &BgrFrame) -> Option<image::RgbImage> {
    ImageBuffer::from_raw(frame.width, frame.height, swap_red_blue(&frame.data))
}
