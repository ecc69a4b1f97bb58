//! Runtime configuration from environment variables.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `HANDSIGN_MODEL_DIR` | directory containing the ONNX models | `3rdparty/onnx` in the crate root |
//! | `HANDSIGN_MODEL_VARIANT` | `full` or `lite` | `full` |
//! | `HANDSIGN_WEBCAM_NAME` | webcam to open, by card name | first video device (`/dev/video0`) |
//!
//! Logging is configured separately through `RUST_LOG`, see [`crate::init_logger!`].

use std::{
    env::{self, VarError},
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, bail};

pub const MODEL_DIR_VAR: &str = "HANDSIGN_MODEL_DIR";
pub const MODEL_VARIANT_VAR: &str = "HANDSIGN_MODEL_VARIANT";
pub const WEBCAM_NAME_VAR: &str = "HANDSIGN_WEBCAM_NAME";

const DEFAULT_MODEL_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/3rdparty/onnx");

/// Size/accuracy trade-off of the hand networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelVariant {
    /// Faster, less accurate.
    Lite,
    /// MediaPipe's default (`model_complexity=1`).
    #[default]
    Full,
}

impl ModelVariant {
    pub fn palm_detection_file(self) -> &'static str {
        match self {
            Self::Lite => "palm_detection_lite.onnx",
            Self::Full => "palm_detection_full.onnx",
        }
    }

    pub fn hand_landmark_file(self) -> &'static str {
        match self {
            Self::Lite => "hand_landmark_lite.onnx",
            Self::Full => "hand_landmark_full.onnx",
        }
    }
}

impl FromStr for ModelVariant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lite" => Ok(Self::Lite),
            "full" => Ok(Self::Full),
            _ => bail!("unknown model variant '{s}' (expected `full` or `lite`)"),
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lite => "lite",
            Self::Full => "full",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    model_dir: PathBuf,
    variant: ModelVariant,
    webcam_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            variant: ModelVariant::default(),
            webcam_name: None,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self::from_lookup(|var| match env::var(var) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(raw)) => Err(anyhow!(
                "`{var}` is not valid UTF-8: {}",
                raw.to_string_lossy()
            )),
        })?;
        log::debug!("{config:?}");
        Ok(config)
    }

    /// Builds the configuration from `lookup`, which maps a variable name to its value.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(mut lookup: F) -> anyhow::Result<Self>
    where
        F: FnMut(&str) -> anyhow::Result<Option<String>>,
    {
        let mut get = |var| -> anyhow::Result<Option<String>> {
            Ok(lookup(var)?.filter(|value| !value.trim().is_empty()))
        };

        let mut config = Self::default();
        if let Some(dir) = get(MODEL_DIR_VAR)? {
            config.model_dir = dir.into();
        }
        if let Some(variant) = get(MODEL_VARIANT_VAR)? {
            config.variant = variant
                .trim()
                .parse()
                .map_err(|e| anyhow!("invalid `{MODEL_VARIANT_VAR}`: {e}"))?;
        }
        config.webcam_name = get(WEBCAM_NAME_VAR)?;
        Ok(config)
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn palm_detection_model(&self) -> PathBuf {
        self.model_dir.join(self.variant.palm_detection_file())
    }

    pub fn hand_landmark_model(&self) -> PathBuf {
        self.model_dir.join(self.variant.hand_landmark_file())
    }

    pub fn webcam_name(&self) -> Option<&str> {
        self.webcam_name.as_deref()
    }
}
