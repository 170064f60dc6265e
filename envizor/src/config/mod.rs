mod types;

pub use types::*;

use crate::{Error, Result};
use envizor_inference::inference::classify::{ClassifierOutput, ClassifierProfile, InputScaling};
use log::debug;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "envizor.yaml";

/// Loads the configuration. An explicit path must exist; otherwise
/// `CONFIG_PATH` or `envizor.yaml` is read when present and the built-in
/// defaults are used when it is not.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            if !path.is_file() {
                return Err(Error::not_found("Configuration file", path));
            }
            read(path)?
        }
        None => {
            let path = env::var("CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
            if path.is_file() {
                read(&path)?
            } else {
                debug!("{} not found, using default configuration", path.display());
                Config::default()
            }
        }
    };

    config.validate()?;
    Ok(config)
}

fn read(path: &Path) -> Result<Config> {
    debug!("Loading configuration from: {}", path.display());

    let config_str = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&config_str)?)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(Error::config(format!("{name} must be within [0, 1], got {value}")))
            }
        };
        unit("segment.conf_threshold", self.segment.conf_threshold)?;
        unit("segment.iou_threshold", self.segment.iou_threshold)?;
        unit("segment.mask_threshold", self.segment.mask_threshold)?;

        if self.segment.max_detections == 0 {
            return Err(Error::config("segment.max_detections must be positive"));
        }
        self.train_classify.classifier_profile()?;
        self.train_segment.classifier_profile()?;

        if self.classify.image_size == 0 || self.segment.image_size == 0 {
            return Err(Error::config("image_size must be positive"));
        }
        if self.segment.csv_name.is_empty() || self.segment.run_name.is_empty() {
            return Err(Error::config("segment.run_name and segment.csv_name must be set"));
        }

        Ok(())
    }
}

impl TrainConfig {
    /// The profile recorded in the class manifest of the trained model, if
    /// the task describes one.
    pub fn classifier_profile(&self) -> Result<Option<ClassifierProfile>> {
        if self.model_output.is_none() && self.input_scaling.is_none() {
            return Ok(None);
        }

        let output = self
            .model_output
            .as_deref()
            .map(str::parse::<ClassifierOutput>)
            .transpose()
            .map_err(|e| Error::config(format!("{e:#}")))?;
        let input = self
            .input_scaling
            .as_deref()
            .map(str::parse::<InputScaling>)
            .transpose()
            .map_err(|e| Error::config(format!("{e:#}")))?;

        Ok(Some(ClassifierProfile {
            output: output.unwrap_or_default(),
            input: input.unwrap_or_default(),
        }))
    }
}
