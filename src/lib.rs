//! Mirrors the user's pose with a monkey illustration.
//!
//! Webcam frames are run through body, hand and face landmark networks. The landmarks are
//! classified into one of a few poses ([`classify::PoseLabel`]) and the window shows the annotated
//! camera feed next to the illustration of the detected pose.
//!
//! # Configuration
//!
//! Settings are read from the environment at startup (see [`config::Config`]):
//!
//! - `MIMIC_MODEL_DIR`: directory with the ONNX landmark models (default `models`).
//! - `MIMIC_ASSET_DIR`: directory with the pose illustrations (default `assets`).
//! - `MIMIC_WEBCAM_NAME`: name of the webcam to open. Any supported webcam is used if unset.
//! - `MIMIC_TICK_MS`: milliseconds between two processed frames (default 25).
//! - `MIMIC_RAISED_HAND_THRESHOLD`, `MIMIC_HAND_TO_MOUTH_THRESHOLD`, `MIMIC_MOUTH_OPEN_THRESHOLD`:
//!   classifier thresholds.
//!
//! Log output is controlled with `RUST_LOG`.

use log::LevelFilter;

pub mod app;
pub mod body;
pub mod classify;
pub mod config;
pub mod estimator;
pub mod face;
pub mod gallery;
pub mod gui;
pub mod hand;
pub mod image;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod overlay;
pub mod timer;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library log at *debug* level, `wgpu` at *warn* level. `RUST_LOG`
/// overrides both.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
