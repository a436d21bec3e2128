//! Runtime configuration and startup errors.
//!
//! All settings come from environment variables and are read once at startup. Unset variables
//! fall back to their defaults; variables that are set but cannot be parsed are an error.

use std::{
    env::{self, VarError},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use anyhow::{bail, Context};
use thiserror::Error;

use crate::classify::Thresholds;

pub const MODEL_DIR_VAR: &str = "MIMIC_MODEL_DIR";
pub const ASSET_DIR_VAR: &str = "MIMIC_ASSET_DIR";
pub const WEBCAM_NAME_VAR: &str = "MIMIC_WEBCAM_NAME";
pub const TICK_MS_VAR: &str = "MIMIC_TICK_MS";
pub const RAISED_HAND_VAR: &str = "MIMIC_RAISED_HAND_THRESHOLD";
pub const HAND_TO_MOUTH_VAR: &str = "MIMIC_HAND_TO_MOUTH_THRESHOLD";
pub const MOUTH_OPEN_VAR: &str = "MIMIC_MOUTH_OPEN_THRESHOLD";

/// Application settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory containing the landmark estimation models.
    pub model_dir: PathBuf,
    /// Directory containing the pose illustrations.
    pub asset_dir: PathBuf,
    /// Name of the webcam to open. Any suitable camera is used when this is [`None`].
    pub webcam_name: Option<String>,
    /// Interval between two capture ticks.
    pub tick_interval: Duration,
    pub thresholds: Thresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            asset_dir: PathBuf::from("assets"),
            webcam_name: None,
            tick_interval: Duration::from_millis(25),
            thresholds: Thresholds::default(),
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(s)) => bail!(
                "invalid value set for `{}` variable: {}",
                key,
                s.to_string_lossy()
            ),
        })
    }

    /// Builds the configuration from an arbitrary variable lookup function.
    ///
    /// `lookup` returns `Ok(None)` for unset variables.
    pub fn from_lookup<F>(mut lookup: F) -> anyhow::Result<Self>
    where
        F: FnMut(&str) -> anyhow::Result<Option<String>>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(MODEL_DIR_VAR)? {
            config.model_dir = dir.into();
        }
        if let Some(dir) = lookup(ASSET_DIR_VAR)? {
            config.asset_dir = dir.into();
        }
        config.webcam_name = lookup(WEBCAM_NAME_VAR)?.filter(|name| !name.is_empty());

        if let Some(ms) = parse::<u64, _>(&mut lookup, TICK_MS_VAR)? {
            if ms == 0 {
                bail!("`{}` must be greater than zero", TICK_MS_VAR);
            }
            config.tick_interval = Duration::from_millis(ms);
        }

        let t = &mut config.thresholds;
        for (var, value) in [
            (RAISED_HAND_VAR, &mut t.raised_hand),
            (HAND_TO_MOUTH_VAR, &mut t.hand_to_mouth),
            (MOUTH_OPEN_VAR, &mut t.mouth_open),
        ] {
            if let Some(v) = parse::<f64, _>(&mut lookup, var)? {
                if !v.is_finite() {
                    bail!("`{}` must be a finite number, got {}", var, v);
                }
                *value = v;
            }
        }

        Ok(config)
    }
}

fn parse<T, F>(lookup: &mut F, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: FnMut(&str) -> anyhow::Result<Option<String>>,
{
    match lookup(key)? {
        Some(s) => {
            let value = s
                .trim()
                .parse()
                .with_context(|| format!("invalid value set for `{}` variable: '{}'", key, s))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Fatal errors that prevent the application from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The landmark estimation models could not be loaded.
    #[error("failed to load the landmark estimation models from '{}'", .model_dir.display())]
    Estimator {
        model_dir: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("invalid configuration")]
    Config(#[source] anyhow::Error),
    #[error("failed to open the application window")]
    Window(#[source] anyhow::Error),
}

impl StartupError {
    /// Returns the process exit code to terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::Estimator { .. } => 2,
            StartupError::Config(_) | StartupError::Window(_) => 1,
        }
    }

    /// Returns instructions for fixing the error, meant to be shown to the user.
    pub fn guidance(&self) -> Option<String> {
        match self {
            StartupError::Estimator { model_dir, .. } => Some(format!(
                "The landmark models could not be loaded. Place `pose_landmark_full.onnx`, \
                 `hand_landmark_full.onnx` and `face_landmark.onnx` in '{}', or point `{}` at the \
                 directory containing them.",
                model_dir.display(),
                MODEL_DIR_VAR,
            )),
            StartupError::Config(_) | StartupError::Window(_) => None,
        }
    }
}
