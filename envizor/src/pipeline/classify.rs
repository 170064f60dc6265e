use super::{handle_image_fault, image_name, require_dir, require_file};
use crate::config::{ClassifyConfig, Device};
use crate::dataset::LabeledSplit;
use crate::labels::{ClassNames, ModelManifest};
use crate::metrics::{ConfusionMatrix, EvaluationReport};
use crate::record::{write_records, ClassificationRecord, EvaluationRecord};
use crate::{Error, Result};
use envizor_inference::inference::classify::{ClassifyInference, ResNetClassifySession};
use envizor_media::scan::{scan_images, CLASSIFY_EXTENSIONS};
use envizor_media::Image;
use log::{info, warn};
use std::path::Path;

/// Runs a classifier over image folders and labelled splits, naming its
/// outputs through the class manifest stored with the weights.
pub struct ClassifierInference<M> {
    model: M,
    classes: ClassNames,
    fail_fast: bool,
}

impl ClassifierInference<ResNetClassifySession> {
    pub fn load(config: &ClassifyConfig, device: Device) -> Result<Self> {
        require_file("Model weights", &config.weights)?;
        let manifest = ModelManifest::load_for(&config.weights)?;
        let profile = manifest.profile.unwrap_or_default();

        let executor = device.execution_provider();
        info!("Device: {executor}");
        info!(
            "Loading classifier from {} ({} output, {} input scaling)",
            config.weights.display(),
            profile.output,
            profile.input
        );
        let model = ResNetClassifySession::new(&config.weights, executor, config.image_size)?
            .with_profile(profile);

        Ok(Self::new(model, manifest.classes).with_fail_fast(config.fail_fast))
    }
}

impl<M: ClassifyInference> ClassifierInference<M> {
    pub fn new(model: M, classes: ClassNames) -> Self {
        Self {
            model,
            classes,
            fail_fast: false,
        }
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn classes(&self) -> &ClassNames {
        &self.classes
    }

    fn classify(&self, path: &Path) -> Result<(usize, f32)> {
        let image = Image::open_file(path)?;
        let result = self.model.inference_classify(&image)?;
        self.classes.check_width(result.probabilities.len())?;

        if !result.confidence.is_finite() {
            return Err(Error::invalid_record(format!(
                "non-finite confidence for {}",
                path.display()
            )));
        }
        Ok((result.class_index, result.confidence))
    }

    /// Classifies every eligible image of `images_dir` in file-name order and
    /// writes one row per image to `output_csv`.
    pub fn run(&self, images_dir: &Path, output_csv: &Path) -> Result<Vec<ClassificationRecord>> {
        require_dir("Input directory", images_dir)?;
        let images = scan_images(images_dir, CLASSIFY_EXTENSIONS)?;
        if images.is_empty() {
            return Err(Error::NoImages(images_dir.to_path_buf()));
        }
        info!("Found {} image(s) in {}", images.len(), images_dir.display());

        let mut records = Vec::with_capacity(images.len());
        for path in &images {
            match self.classify(path) {
                Ok((index, confidence)) => {
                    let name = image_name(path);
                    let label = self.classes.get(index)?;
                    info!("{name} → {label} ({:.2}%)", confidence * 100.0);
                    records.push(ClassificationRecord::new(name, label, confidence));
                }
                Err(e) => handle_image_fault(path, e, self.fail_fast)?,
            }
        }

        write_records(output_csv, &records)?;
        info!("Saved predictions to {}", output_csv.display());
        Ok(records)
    }

    /// Scores the classifier against a labelled split. A missing split is
    /// skipped with a warning.
    pub fn evaluate(
        &self,
        split: Option<&Path>,
        output_csv: &Path,
    ) -> Result<Option<EvaluationReport>> {
        let Some(split) = split else {
            warn!("No test split configured, skipping evaluation");
            return Ok(None);
        };
        if !split.is_dir() {
            warn!("Test split {} not found, skipping evaluation", split.display());
            return Ok(None);
        }

        let labelled = LabeledSplit::scan(split, &self.classes)?;
        info!("Evaluating on {} image(s) from {}", labelled.len(), split.display());

        let mut confusion = ConfusionMatrix::new(self.classes.len());
        let mut records = Vec::with_capacity(labelled.len());
        for image in &labelled.images {
            match self.classify(&image.path) {
                Ok((predicted, _)) => {
                    confusion.record(image.label, predicted)?;
                    records.push(EvaluationRecord {
                        image_path: image.path.display().to_string(),
                        true_label: self.classes.get(image.label)?.to_string(),
                        predicted_label: self.classes.get(predicted)?.to_string(),
                    });
                }
                Err(e) => handle_image_fault(&image.path, e, self.fail_fast)?,
            }
        }

        let report = EvaluationReport::new(confusion, &self.classes)?;
        info!("Classification report:\n{report}");

        write_records(output_csv, &records)?;
        info!("Saved evaluation rows to {}", output_csv.display());
        Ok(Some(report))
    }
}
