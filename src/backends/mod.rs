// SPDX-License-Identifier: GPL-3.0-only

//! Hardware access layer for camera and audio
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Brain / CLI                    │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌─────────────┐    ┌──────────────────┐    │
//! │  │    Audio    │    │     Camera       │    │
//! │  │  (tinyalsa) │    │  (MIPI / V4L2)   │    │
//! │  └──────┬──────┘    └────────┬─────────┘    │
//! │         └──────────┬─────────┘              │
//! │             ┌──────┴──────┐                 │
//! │             │   System    │                 │
//! │             │  commands   │                 │
//! │             └─────────────┘                 │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`audio`]: WAV playback and capture through `tinyplay` / `tinycap`
//! - [`camera`]: Camera backends and the [`camera::Camera`] handle
//! - [`system`]: Command lines run for cleanup and audio

pub mod audio;
pub mod camera;
pub mod system;
