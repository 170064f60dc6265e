//! The boundary to the external training framework.
//!
//! Training itself is delegated to a program such as the `yolo` CLI. This
//! module checks the dataset layout, runs the program with templated
//! arguments, copies the best artifact to the configured weights path and
//! stores the class-name manifest beside it.

use crate::config::{Device, TrainConfig};
use crate::dataset::DataYaml;
use crate::labels::{ClassNames, ModelManifest};
use crate::{Error, Result};
use log::{debug, info, warn};
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::PathBuf;
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainTask {
    Classify,
    Segment,
}

#[derive(Debug, Clone)]
pub struct TrainJob {
    pub task: TrainTask,
    pub config: TrainConfig,
    pub device: Device,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainOutcome {
    pub run_dir: PathBuf,
    /// `None` when the run produced no artifact to copy.
    pub weights: Option<PathBuf>,
    pub manifest: PathBuf,
    pub evaluated: bool,
}

pub trait TrainingDriver {
    fn train(&self, job: &TrainJob) -> Result<TrainOutcome>;
}

/// Runs the configured program as a child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExternalTrainer;

impl Display for TrainTask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainTask::Classify => write!(f, "classification"),
            TrainTask::Segment => write!(f, "segmentation"),
        }
    }
}

impl TrainJob {
    pub fn new(task: TrainTask, config: TrainConfig, device: Device) -> Self {
        Self {
            task,
            config,
            device,
        }
    }

    pub fn run_dir(&self) -> PathBuf {
        self.config.project.join(&self.config.name)
    }

    /// Classification needs `train/` and `val/` under the dataset root;
    /// segmentation needs the data YAML.
    pub fn check_dataset(&self) -> Result<()> {
        let dataset = &self.config.dataset;
        match self.task {
            TrainTask::Classify => {
                for split in ["train", "val"] {
                    let dir = dataset.join(split);
                    if !dir.is_dir() {
                        return Err(Error::not_found("Dataset split", dir));
                    }
                }
                Ok(())
            }
            TrainTask::Segment => {
                if dataset.is_file() {
                    Ok(())
                } else {
                    Err(Error::not_found("Data YAML", dataset))
                }
            }
        }
    }

    pub fn class_names(&self) -> Result<ClassNames> {
        match self.task {
            TrainTask::Classify => ClassNames::from_split(&self.config.dataset.join("train")),
            TrainTask::Segment => DataYaml::load(&self.config.dataset)?.class_names(),
        }
    }

    fn has_test_split(&self) -> Result<bool> {
        Ok(match self.task {
            TrainTask::Classify => self.config.dataset.join("test").is_dir(),
            TrainTask::Segment => DataYaml::load(&self.config.dataset)?
                .resolve_split("test")
                .is_some(),
        })
    }

    /// Substitutes the placeholders of every template entry.
    pub fn render_args(&self, template: &[String], split: &str) -> Vec<String> {
        let config = &self.config;
        let values = [
            ("{data}", config.dataset.display().to_string()),
            ("{imgsz}", config.image_size.to_string()),
            ("{epochs}", config.epochs.to_string()),
            ("{batch}", config.batch.to_string()),
            ("{lr}", config.learning_rate.to_string()),
            ("{workers}", config.workers.to_string()),
            ("{seed}", config.seed.to_string()),
            ("{device}", self.device.trainer_device()),
            ("{project}", config.project.display().to_string()),
            ("{name}", config.name.clone()),
            ("{split}", split.to_string()),
            ("{run_dir}", self.run_dir().display().to_string()),
        ];

        template
            .iter()
            .map(|arg| {
                values
                    .iter()
                    .fold(arg.clone(), |acc, (key, value)| acc.replace(key, value))
            })
            .collect()
    }
}

impl TrainingDriver for ExternalTrainer {
    fn train(&self, job: &TrainJob) -> Result<TrainOutcome> {
        job.check_dataset()?;
        let classes = job.class_names()?;
        let config = &job.config;
        let profile = config.classifier_profile()?;
        info!(
            "Training {} model on {} with classes {:?}",
            job.task,
            config.dataset.display(),
            classes.names()
        );

        run_program(&config.program, &job.render_args(&config.args, "train"))?;
        if !config.export_args.is_empty() {
            run_program(&config.program, &job.render_args(&config.export_args, "train"))?;
        }

        let run_dir = job.run_dir();
        let artifact = run_dir.join(&config.artifact);
        let weights = if artifact.is_file() {
            if let Some(parent) = config
                .output_weights
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
            {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&artifact, &config.output_weights)?;
            info!("Saved best weights to {}", config.output_weights.display());
            Some(config.output_weights.clone())
        } else {
            warn!("No training artifact at {}", artifact.display());
            None
        };

        let manifest = ModelManifest::new(classes, profile).save_for(&config.output_weights)?;
        info!("Saved class names to {}", manifest.display());

        let evaluated = config.evaluate_test_split && evaluate_test_split(job)?;

        Ok(TrainOutcome {
            run_dir,
            weights,
            manifest,
            evaluated,
        })
    }
}

/// Test-split evaluation is best-effort: a missing split or a failing run
/// is reported and skipped.
fn evaluate_test_split(job: &TrainJob) -> Result<bool> {
    if job.config.evaluate_args.is_empty() {
        return Ok(false);
    }
    if !job.has_test_split()? {
        warn!("No test split in {}, skipping evaluation", job.config.dataset.display());
        return Ok(false);
    }

    info!("Evaluating on the test split");
    match run_program(
        &job.config.program,
        &job.render_args(&job.config.evaluate_args, "test"),
    ) {
        Ok(()) => Ok(true),
        Err(e) => {
            warn!("Skipping test evaluation: {e}");
            Ok(false)
        }
    }
}

fn run_program(program: &str, args: &[String]) -> Result<()> {
    debug!("Running {program} {}", args.join(" "));

    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| Error::training(format!("failed to launch '{program}': {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::training(format!("'{program}' exited with {status}")))
    }
}
