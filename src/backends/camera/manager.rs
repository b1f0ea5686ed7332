// SPDX-License-Identifier: GPL-3.0-only

//! Camera handle lifecycle
//!
//! [`Camera`] owns exactly one opened backend. It provides:
//! - Backend selection with MIPI -> V4L2 fallback for `auto`
//! - Frame access that fails once the handle is closed
//! - Idempotent close, also run on drop (including while unwinding)

use super::types::*;
use super::{CameraBackend, candidate_backends, release_conflicting_processes};
use crate::config::CameraConfig;
use crate::errors::CameraError;
use tracing::{debug, info, warn};

/// An opened camera
pub struct Camera {
    /// `None` once closed
    backend: Option<Box<dyn CameraBackend>>,
    backend_type: CameraBackendType,
    format: CameraFormat,
}

impl Camera {
    /// Open the camera described by `config`
    ///
    /// Runs the conflicting-process cleanup first when enabled, then tries the
    /// configured backend (or every backend in fallback order for `auto`).
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        info!(
            backend = %config.backend,
            index = config.index,
            format = %config.format(),
            "Opening camera"
        );

        if config.cleanup_conflicts {
            release_conflicting_processes(config.use_sudo);
        }

        Self::open_with(
            config.backend,
            candidate_backends(config.backend, config.index),
            config.format(),
        )
    }

    /// Open the first of `candidates` that succeeds
    ///
    /// With `requested == Auto` an all-fail result is
    /// [`CameraError::NoBackendAvailable`]; otherwise the single backend's own
    /// error is returned.
    pub fn open_with(
        requested: CameraBackendType,
        candidates: Vec<Box<dyn CameraBackend>>,
        format: CameraFormat,
    ) -> Result<Self, CameraError> {
        let mut last_error = None;

        for mut backend in candidates {
            let backend_type = backend.backend_type();
            match backend.open(&format) {
                Ok(()) => {
                    info!(backend = %backend_type, format = %format, "Camera ready");
                    return Ok(Self {
                        backend: Some(backend),
                        backend_type,
                        format,
                    });
                }
                Err(e) => {
                    warn!(backend = %backend_type, error = %e, "Camera backend failed to open");
                    last_error = Some(e);
                }
            }
        }

        match (requested, last_error) {
            (CameraBackendType::Auto, _) | (_, None) => Err(CameraError::NoBackendAvailable),
            (_, Some(e)) => Err(e),
        }
    }

    /// Next frame as BGR at the configured size
    ///
    /// `Ok(None)` means the device had no frame this time; the caller should
    /// simply try again.
    pub fn get_frame_bgr(&mut self) -> Result<Option<BgrFrame>, CameraError> {
        let backend = self.backend.as_mut().ok_or(CameraError::NotInitialized)?;
        Ok(backend.capture_frame())
    }

    /// Release the device
    ///
    /// Safe to call any number of times. Release errors never surface.
    pub fn close(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.close();
            info!(backend = %self.backend_type, "Camera closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    /// Backend that was actually opened
    pub fn backend_type(&self) -> CameraBackendType {
        self.backend_type
    }

    pub fn format(&self) -> CameraFormat {
        self.format
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if self.backend.is_some() {
            debug!("Camera dropped while open, closing");
            self.close();
        }
    }
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera")
            .field("backend_type", &self.backend_type)
            .field("format", &self.format)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that opens (or not) on demand and counts closes
    struct ScriptedBackend {
        kind: CameraBackendType,
        opens: bool,
        open: bool,
        closes: Arc<AtomicUsize>,
    }

    impl ScriptedBackend {
        fn boxed(kind: CameraBackendType, opens: bool, closes: &Arc<AtomicUsize>) -> Box<dyn CameraBackend> {
            Box::new(Self {
                kind,
                opens,
                open: false,
                closes: Arc::clone(closes),
            })
        }
    }

    impl CameraBackend for ScriptedBackend {
        fn open(&mut self, _format: &CameraFormat) -> Result<(), CameraError> {
            if self.opens {
                self.open = true;
                Ok(())
            } else {
                Err(CameraError::OpenFailed {
                    backend: self.kind.as_str(),
                    reason: "scripted".to_string(),
                })
            }
        }

        fn capture_frame(&mut self) -> Option<BgrFrame> {
            self.open.then(|| BgrFrame::black(4, 2))
        }

        fn close(&mut self) {
            if self.open {
                self.open = false;
                self.closes.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn backend_type(&self) -> CameraBackendType {
            self.kind
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn format() -> CameraFormat {
        CameraFormat::new(4, 2, 30)
    }

    #[test]
    fn test_auto_falls_back_to_second_backend() {
        let closes = Arc::new(AtomicUsize::new(0));
        let camera = Camera::open_with(
            CameraBackendType::Auto,
            vec![
                ScriptedBackend::boxed(CameraBackendType::Mipi, false, &closes),
                ScriptedBackend::boxed(CameraBackendType::V4l2, true, &closes),
            ],
            format(),
        )
        .unwrap();
        assert_eq!(camera.backend_type(), CameraBackendType::V4l2);
    }

    #[test]
    fn test_auto_all_fail() {
        let closes = Arc::new(AtomicUsize::new(0));
        let err = Camera::open_with(
            CameraBackendType::Auto,
            vec![
                ScriptedBackend::boxed(CameraBackendType::Mipi, false, &closes),
                ScriptedBackend::boxed(CameraBackendType::V4l2, false, &closes),
            ],
            format(),
        )
        .unwrap_err();
        assert_eq!(err, CameraError::NoBackendAvailable);
    }

    #[test]
    fn test_explicit_backend_error_names_it() {
        let closes = Arc::new(AtomicUsize::new(0));
        let err = Camera::open_with(
            CameraBackendType::Mipi,
            vec![ScriptedBackend::boxed(CameraBackendType::Mipi, false, &closes)],
            format(),
        )
        .unwrap_err();
        assert!(matches!(err, CameraError::OpenFailed { backend: "mipi", .. }));
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_frames() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut camera = Camera::open_with(
            CameraBackendType::V4l2,
            vec![ScriptedBackend::boxed(CameraBackendType::V4l2, true, &closes)],
            format(),
        )
        .unwrap();

        assert_eq!(camera.get_frame_bgr().unwrap().unwrap().shape(), (2, 4, 3));

        camera.close();
        camera.close();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(camera.get_frame_bgr(), Err(CameraError::NotInitialized));

        drop(camera);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_closes() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let _camera = Camera::open_with(
                CameraBackendType::V4l2,
                vec![ScriptedBackend::boxed(CameraBackendType::V4l2, true, &closes)],
                format(),
            )
            .unwrap();
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
