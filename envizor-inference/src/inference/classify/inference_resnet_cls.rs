use crate::engine::inference_engine::{ExecutionProvider, OnnxSession};
use crate::utils::tensor::{argmax, rgb_to_nchw, softmax, IMAGENET_MEAN, IMAGENET_STD};
use anyhow::{anyhow, bail, Result};
use envizor_media::{Image, ResizeImage};
use log::debug;
use ort::inputs;
use ort::value::Tensor;
use parking_lot::Mutex;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

pub trait ClassifyInference {
    fn inference_classify(&self, image: &Image) -> Result<ClassifyResult>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyResult {
    pub class_index: usize,
    pub confidence: f32,
    pub probabilities: Vec<f32>,
}

/// What the last layer of the exported network emits.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ClassifierOutput {
    #[default]
    Logits,
    Probabilities,
}

/// How pixels are scaled before entering the network. Both divide by 255;
/// `ImageNet` then applies the ImageNet mean/std.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum InputScaling {
    #[default]
    ImageNet,
    Unit,
}

/// Pre- and post-processing an exported classifier expects. The default
/// matches a torchvision residual network.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassifierProfile {
    pub output: ClassifierOutput,
    pub input: InputScaling,
}

impl ClassifyResult {
    pub fn from_logits(logits: &[f32]) -> Result<Self> {
        Self::from_probabilities(softmax(logits))
    }

    /// Takes scores that are already a distribution, as emitted by networks
    /// ending in a softmax layer.
    pub fn from_probabilities(probabilities: Vec<f32>) -> Result<Self> {
        let (class_index, confidence) =
            argmax(&probabilities).ok_or_else(|| anyhow!("Model produced no class scores"))?;
        if !(0.0..=1.0).contains(&confidence) {
            bail!("Class score {confidence} is not a probability");
        }

        Ok(Self {
            class_index,
            confidence,
            probabilities,
        })
    }

    pub fn from_output(values: Vec<f32>, output: ClassifierOutput) -> Result<Self> {
        match output {
            ClassifierOutput::Logits => Self::from_logits(&values),
            ClassifierOutput::Probabilities => Self::from_probabilities(values),
        }
    }
}

impl FromStr for ClassifierOutput {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "logits" => Ok(Self::Logits),
            "probabilities" => Ok(Self::Probabilities),
            other => bail!("Unknown classifier output '{other}', expected logits or probabilities"),
        }
    }
}

impl Display for ClassifierOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierOutput::Logits => write!(f, "logits"),
            ClassifierOutput::Probabilities => write!(f, "probabilities"),
        }
    }
}

impl FromStr for InputScaling {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "imagenet" => Ok(Self::ImageNet),
            "unit" => Ok(Self::Unit),
            other => bail!("Unknown input scaling '{other}', expected imagenet or unit"),
        }
    }
}

impl Display for InputScaling {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InputScaling::ImageNet => write!(f, "imagenet"),
            InputScaling::Unit => write!(f, "unit"),
        }
    }
}

impl InputScaling {
    fn mean_std(&self) -> ([f32; 3], [f32; 3]) {
        match self {
            InputScaling::ImageNet => (IMAGENET_MEAN, IMAGENET_STD),
            InputScaling::Unit => ([0.0; 3], [1.0; 3]),
        }
    }
}

/// Single-label classifier exported to ONNX, fed square inputs scaled per its
/// [`ClassifierProfile`].
pub struct ResNetClassifySession {
    session: Mutex<OnnxSession>,
    image_size: u32,
    profile: ClassifierProfile,
}

impl ResNetClassifySession {
    pub fn new(
        model_path: impl AsRef<Path>,
        executor: ExecutionProvider,
        image_size: u32,
    ) -> Result<Self> {
        Ok(Self {
            session: Mutex::new(OnnxSession::new(model_path, executor)?),
            image_size,
            profile: ClassifierProfile::default(),
        })
    }

    pub fn with_profile(mut self, profile: ClassifierProfile) -> Self {
        self.profile = profile;
        self
    }
}

impl ClassifyInference for ResNetClassifySession {
    fn inference_classify(&self, image: &Image) -> Result<ClassifyResult> {
        let resized = image.resize_into((self.image_size, self.image_size))?;
        let (mean, std) = self.profile.input.mean_std();
        let tensor = rgb_to_nchw(resized.as_rgb(), mean, std);

        let scores = {
            let mut session = self.session.lock();
            let outputs = session.run(inputs![Tensor::from_array(tensor)?])?;
            outputs[0]
                .try_extract_array::<f32>()?
                .iter()
                .copied()
                .collect::<Vec<_>>()
        };
        debug!("Classifier produced {} {}", scores.len(), self.profile.output);

        ClassifyResult::from_output(scores, self.profile.output)
    }
}
