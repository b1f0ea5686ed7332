// SPDX-License-Identifier: GPL-3.0-only

//! MIPI sensor backend through the board's VIO library
//!
//! The sensor pipeline (MIPI host -> ISP -> VPS) is owned by `libspcdev`. It
//! scales into two output channels; frames are read as NV12 from the channel
//! whose size matches the requested one and converted to BGR here.
//!
//! The library is loaded with `dlopen` when the camera is opened, so a board
//! image without it only fails at runtime and `auto` falls through to V4L2.
//!
//! The C entry points take no frame rate (the sensor runs at the rate of its
//! configured mode) and pick the VPS output channel by frame size, so the
//! requested fps only shows up in the logs and no channel number is passed.

use super::CameraBackend;
use super::format_converters::nv12_to_bgr;
use super::types::{BgrFrame, CameraBackendType, CameraFormat};
use crate::constants;
use crate::errors::CameraError;
use std::ffi::{CStr, CString, c_char, c_void};
use std::ptr::NonNull;
use tracing::{debug, info, warn};

/// Locations the board image installs the VIO library to
pub const LIBRARY_PATHS: [&str; 3] = [
    "/usr/lib/libspcdev.so",
    "/usr/lib/hobot/libspcdev.so",
    "/usr/lib/aarch64-linux-gnu/libspcdev.so",
];

type InitFn = unsafe extern "C" fn() -> *mut c_void;
type ReleaseFn = unsafe extern "C" fn(*mut c_void);
type OpenCameraFn = unsafe extern "C" fn(*mut c_void, i32, i32, i32, *mut i32, *mut i32) -> i32;
type GetFrameFn = unsafe extern "C" fn(*mut c_void, *mut c_char, i32, i32, i32) -> i32;
type CloseFn = unsafe extern "C" fn(*mut c_void) -> i32;

/// Last `dlerror()` message
fn dl_error() -> String {
    // SAFETY: dlerror returns null or a thread-local C string
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        "unknown dlopen error".to_string()
    } else {
        // SAFETY: non-null, NUL terminated, valid until the next dl* call
        unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
    }
}

/// `libspcdev` opened with `dlopen` and its entry points
struct VioLibrary {
    handle: NonNull<c_void>,
    init: InitFn,
    release: ReleaseFn,
    open_camera: OpenCameraFn,
    get_frame: GetFrameFn,
    close: CloseFn,
}

impl VioLibrary {
    /// Open the first of `paths` that loads
    fn load(paths: &[&str]) -> Result<Self, String> {
        let mut errors = Vec::new();
        for path in paths {
            match Self::load_path(path) {
                Ok(lib) => {
                    debug!(path, "VIO library loaded");
                    return Ok(lib);
                }
                Err(e) => errors.push(e),
            }
        }
        Err(errors.join("; "))
    }

    fn load_path(path: &str) -> Result<Self, String> {
        let c_path = CString::new(path).map_err(|e| e.to_string())?;
        // SAFETY: valid C string; the handle is closed in Drop
        let raw = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        let handle = NonNull::new(raw).ok_or_else(dl_error)?;

        let symbol = |name: &CStr| -> Result<*mut c_void, String> {
            // SAFETY: handle is a live dlopen handle
            let sym = unsafe { libc::dlsym(handle.as_ptr(), name.as_ptr()) };
            if sym.is_null() {
                Err(format!("{}: missing symbol {}", path, name.to_string_lossy()))
            } else {
                Ok(sym)
            }
        };

        let resolved = (|| {
            // SAFETY: the symbols are the documented libspcdev C functions with
            // these exact signatures
            unsafe {
                Ok::<_, String>(Self {
                    handle,
                    init: std::mem::transmute::<*mut c_void, InitFn>(symbol(c"sp_init_vio_module")?),
                    release: std::mem::transmute::<*mut c_void, ReleaseFn>(symbol(c"sp_release_vio_module")?),
                    open_camera: std::mem::transmute::<*mut c_void, OpenCameraFn>(symbol(c"sp_open_camera")?),
                    get_frame: std::mem::transmute::<*mut c_void, GetFrameFn>(symbol(c"sp_vio_get_frame")?),
                    close: std::mem::transmute::<*mut c_void, CloseFn>(symbol(c"sp_vio_close")?),
                })
            }
        })();

        if resolved.is_err() {
            // SAFETY: nothing from this handle escaped
            unsafe { libc::dlclose(handle.as_ptr()) };
        }
        resolved
    }
}

impl Drop for VioLibrary {
    fn drop(&mut self) {
        // SAFETY: handle came from dlopen and no entry point outlives self
        unsafe { libc::dlclose(self.handle.as_ptr()) };
    }
}

/// An opened VIO module object together with the library it came from
struct VioSession {
    obj: NonNull<c_void>,
    // Dropped after the Drop impl below has released `obj`
    lib: VioLibrary,
}

// The VIO object is only ever touched through `&mut MipiBackend`
unsafe impl Send for VioSession {}

impl VioSession {
    fn open(lib: VioLibrary, index: i32, format: &CameraFormat) -> Result<Self, CameraError> {
        // SAFETY: entry point resolved from the loaded library
        let raw = unsafe { (lib.init)() };
        let obj = NonNull::new(raw).ok_or_else(|| CameraError::OpenFailed {
            backend: "mipi",
            reason: "sp_init_vio_module returned null".to_string(),
        })?;

        // From here on Drop releases the module, including on failure
        let session = Self { obj, lib };

        let (mut widths, mut heights) = vps_channel_sizes(format);
        // SAFETY: obj is live; the arrays hold the channel count passed
        let ret = unsafe {
            (session.lib.open_camera)(
                session.obj.as_ptr(),
                index,
                constants::camera::MIPI_CHANNEL,
                widths.len() as i32,
                widths.as_mut_ptr(),
                heights.as_mut_ptr(),
            )
        };
        if ret != 0 {
            return Err(CameraError::OpenFailed {
                backend: "mipi",
                reason: format!("sp_open_camera returned {}", ret),
            });
        }

        Ok(session)
    }

    fn read_nv12(&mut self, format: &CameraFormat) -> Option<Vec<u8>> {
        let mut buffer = vec![0u8; format.nv12_len()];
        // SAFETY: the buffer holds exactly one NV12 frame of this size
        let ret = unsafe {
            (self.lib.get_frame)(
                self.obj.as_ptr(),
                buffer.as_mut_ptr().cast(),
                format.width as i32,
                format.height as i32,
                constants::camera::MIPI_FRAME_TIMEOUT_MS,
            )
        };
        if ret != 0 {
            debug!(ret, "VIO returned no frame");
            return None;
        }
        Some(buffer)
    }
}

impl Drop for VioSession {
    fn drop(&mut self) {
        // SAFETY: obj came from sp_init_vio_module and is released once
        unsafe {
            (self.lib.close)(self.obj.as_ptr());
            (self.lib.release)(self.obj.as_ptr());
        }
    }
}

/// Output sizes for the two VPS channels the library opens
///
/// Both channels are configured with the same size, so the NV12 read for
/// that size comes off the scaler output channel.
pub fn vps_channel_sizes(format: &CameraFormat) -> ([i32; 2], [i32; 2]) {
    let w = format.width as i32;
    let h = format.height as i32;
    ([w, w], [h, h])
}

/// MIPI camera backend
pub struct MipiBackend {
    index: i32,
    format: Option<CameraFormat>,
    session: Option<VioSession>,
}

impl MipiBackend {
    pub fn new(index: i32) -> Self {
        Self {
            index,
            format: None,
            session: None,
        }
    }

    /// Sensor index this backend opens
    pub fn index(&self) -> i32 {
        self.index
    }
}

impl CameraBackend for MipiBackend {
    fn open(&mut self, format: &CameraFormat) -> Result<(), CameraError> {
        if self.is_open() {
            self.close();
        }

        let (widths, heights) = vps_channel_sizes(format);
        debug!(
            index = self.index,
            channel = constants::camera::MIPI_CHANNEL,
            ?widths,
            ?heights,
            fps = format.framerate,
            "Opening MIPI camera"
        );

        let lib = VioLibrary::load(&LIBRARY_PATHS).map_err(|reason| CameraError::OpenFailed {
            backend: "mipi",
            reason: format!("VIO library not loadable: {}", reason),
        })?;
        self.session = Some(VioSession::open(lib, self.index, format)?);
        self.format = Some(*format);

        info!(index = self.index, format = %format, "MIPI camera opened");
        Ok(())
    }

    fn capture_frame(&mut self) -> Option<BgrFrame> {
        let format = self.format?;
        let nv12 = self.session.as_mut()?.read_nv12(&format)?;

        match nv12_to_bgr(&nv12, format.width, format.height)
            .and_then(|bgr| BgrFrame::new(format.width, format.height, bgr))
        {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, "Failed to convert MIPI frame");
                None
            }
        }
    }

    fn close(&mut self) {
        self.format = None;
        if self.session.take().is_some() {
            debug!(index = self.index, "MIPI camera closed");
        }
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Mipi
    }

    fn is_available(&self) -> bool {
        library_installed()
    }
}

impl Drop for MipiBackend {
    fn drop(&mut self) {
        self.close();
    }
}

/// Whether the VIO library is present on this system
pub fn library_installed() -> bool {
    LIBRARY_PATHS
        .iter()
        .any(|path| std::path::Path::new(path).exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sizes_duplicate_format() {
        let (w, h) = vps_channel_sizes(&CameraFormat::new(320, 240, 30));
        assert_eq!(w, [320, 320]);
        assert_eq!(h, [240, 240]);
    }

    #[test]
    fn test_closed_backend_yields_no_frames() {
        let mut backend = MipiBackend::new(0);
        assert!(!backend.is_open());
        assert!(backend.capture_frame().is_none());
        // Closing twice is harmless
        backend.close();
        backend.close();
    }

    #[test]
    fn test_missing_library_is_runtime_error() {
        let err = VioLibrary::load(&["/nonexistent/robot-brain/libspcdev.so"])
            .err()
            .unwrap();
        assert!(err.contains("libspcdev.so"));
    }

    #[test]
    fn test_library_without_vio_symbols_is_rejected() {
        // libc is always loadable but exports none of the VIO entry points
        let err = VioLibrary::load(&["libc.so.6"]).err().unwrap();
        assert!(err.contains("missing symbol sp_init_vio_module"));
    }

    #[test]
    fn test_open_fails_without_library() {
        if library_installed() {
            return;
        }
        let mut backend = MipiBackend::new(0);
        assert!(!backend.is_available());
        let err = backend.open(&CameraFormat::new(320, 240, 30)).unwrap_err();
        assert!(matches!(err, CameraError::OpenFailed { backend: "mipi", .. }));
        assert!(!backend.is_open());
    }
}
