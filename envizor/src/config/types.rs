use envizor_inference::engine::inference_engine::ExecutionProvider;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub device: Device,
    pub classify: ClassifyConfig,
    pub segment: SegmentConfig,
    #[serde(deserialize_with = "classify_train")]
    pub train_classify: TrainConfig,
    #[serde(deserialize_with = "segment_train")]
    pub train_segment: TrainConfig,
}

/// Where inference runs. `auto` resolves to CUDA device 0 when the provider
/// loads, otherwise CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    #[default]
    Auto,
    Cpu,
    Cuda(i32),
    TensorRt(i32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    pub images_dir: PathBuf,
    pub weights: PathBuf,
    pub output_csv: PathBuf,
    pub image_size: u32,
    pub test_split: Option<PathBuf>,
    pub evaluation_csv: PathBuf,
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub images_dir: Option<PathBuf>,
    pub data_yaml: Option<PathBuf>,
    pub weights: PathBuf,
    pub image_size: u32,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub mask_threshold: f32,
    pub max_detections: usize,
    pub project_out: PathBuf,
    pub run_name: String,
    pub csv_name: String,
    pub save_visuals: bool,
    pub fail_fast: bool,
}

/// Arguments handed to the external training program. Every entry of `args`,
/// `export_args` and `evaluate_args` may use the placeholders `{data}`,
/// `{imgsz}`, `{epochs}`, `{batch}`, `{lr}`, `{workers}`, `{seed}`,
/// `{device}`, `{project}`, `{name}`, `{split}` and `{run_dir}`.
///
/// A YAML section only overrides the fields it names; the rest come from the
/// template of its own task ([`TrainConfig::classify`] or
/// [`TrainConfig::segment`]).
#[derive(Debug, Clone, Serialize)]
pub struct TrainConfig {
    pub program: String,
    pub args: Vec<String>,
    pub export_args: Vec<String>,
    pub evaluate_args: Vec<String>,
    pub dataset: PathBuf,
    pub image_size: u32,
    pub epochs: u32,
    pub batch: u32,
    pub learning_rate: f64,
    pub workers: u32,
    pub seed: u64,
    pub project: PathBuf,
    pub name: String,
    pub artifact: PathBuf,
    pub output_weights: PathBuf,
    pub evaluate_test_split: bool,
    /// `logits` or `probabilities`, recorded in the class manifest of a
    /// classifier.
    pub model_output: Option<String>,
    /// `imagenet` or `unit`, recorded alongside `model_output`.
    pub input_scaling: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct TrainOverrides {
    program: Option<String>,
    args: Option<Vec<String>>,
    export_args: Option<Vec<String>>,
    evaluate_args: Option<Vec<String>>,
    dataset: Option<PathBuf>,
    image_size: Option<u32>,
    epochs: Option<u32>,
    batch: Option<u32>,
    learning_rate: Option<f64>,
    workers: Option<u32>,
    seed: Option<u64>,
    project: Option<PathBuf>,
    name: Option<String>,
    artifact: Option<PathBuf>,
    output_weights: Option<PathBuf>,
    evaluate_test_split: Option<bool>,
    model_output: Option<String>,
    input_scaling: Option<String>,
}

macro_rules! override_fields {
    ($base:ident, $overrides:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $overrides.$field {
                $base.$field = value;
            }
        )+
    };
}

impl TrainOverrides {
    fn apply(self, mut base: TrainConfig) -> TrainConfig {
        let overrides = self;
        override_fields!(
            base,
            overrides,
            program,
            args,
            export_args,
            evaluate_args,
            dataset,
            image_size,
            epochs,
            batch,
            learning_rate,
            workers,
            seed,
            project,
            name,
            artifact,
            output_weights,
            evaluate_test_split,
        );
        if overrides.model_output.is_some() {
            base.model_output = overrides.model_output;
        }
        if overrides.input_scaling.is_some() {
            base.input_scaling = overrides.input_scaling;
        }
        base
    }
}

fn classify_train<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TrainConfig, D::Error> {
    TrainOverrides::deserialize(deserializer).map(|o| o.apply(TrainConfig::classify()))
}

fn segment_train<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TrainConfig, D::Error> {
    TrainOverrides::deserialize(deserializer).map(|o| o.apply(TrainConfig::segment()))
}

impl Device {
    pub fn execution_provider(&self) -> ExecutionProvider {
        match self {
            Device::Auto => ExecutionProvider::auto(),
            Device::Cpu => ExecutionProvider::CPU,
            Device::Cuda(id) => ExecutionProvider::CUDA(*id),
            Device::TensorRt(id) => ExecutionProvider::TensorRT(*id),
        }
    }

    /// Device argument for the external trainer: a GPU index or `cpu`.
    pub fn trainer_device(&self) -> String {
        match self.execution_provider() {
            ExecutionProvider::CPU => "cpu".to_string(),
            ExecutionProvider::CUDA(id) | ExecutionProvider::TensorRT(id) => id.to_string(),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (kind, id) = match s.split_once(':') {
            Some((kind, id)) => {
                let id = id
                    .parse::<i32>()
                    .map_err(|_| format!("Invalid device id in '{s}'"))?;
                (kind, id)
            }
            None => (s.as_str(), 0),
        };

        match kind {
            "auto" => Ok(Device::Auto),
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(id)),
            "tensorrt" => Ok(Device::TensorRt(id)),
            _ => Err(format!(
                "Invalid device: '{s}'. Valid devices: auto, cpu, cuda[:id], tensorrt[:id]"
            )),
        }
    }
}

impl TryFrom<String> for Device {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Device> for String {
    fn from(value: Device) -> Self {
        value.to_string()
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Auto => write!(f, "auto"),
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{id}"),
            Device::TensorRt(id) => write!(f, "tensorrt:{id}"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            device: Device::Auto,
            classify: ClassifyConfig::default(),
            segment: SegmentConfig::default(),
            train_classify: TrainConfig::classify(),
            train_segment: TrainConfig::segment(),
        }
    }
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("real_images"),
            weights: PathBuf::from("outputs/runs/landfill_classifier.onnx"),
            output_csv: PathBuf::from("outputs/preds/real_predictions.csv"),
            image_size: 224,
            test_split: Some(PathBuf::from("dataset_cls/test")),
            evaluation_csv: PathBuf::from("outputs/preds/test_predictions.csv"),
            fail_fast: false,
        }
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            images_dir: Some(PathBuf::from("real_images")),
            data_yaml: None,
            weights: PathBuf::from("outputs/runs/seg_best.onnx"),
            image_size: 1024,
            conf_threshold: 0.25,
            iou_threshold: 0.50,
            mask_threshold: 0.5,
            max_detections: 300,
            project_out: PathBuf::from("outputs/preds"),
            run_name: "seg_infer_real".to_string(),
            csv_name: "predictions_real.csv".to_string(),
            save_visuals: true,
            fail_fast: false,
        }
    }
}

impl SegmentConfig {
    pub fn run_dir(&self) -> PathBuf {
        self.project_out.join(&self.run_name)
    }

    pub fn csv_path(&self) -> PathBuf {
        self.run_dir().join(&self.csv_name)
    }
}

impl TrainConfig {
    pub fn classify() -> Self {
        Self {
            program: "yolo".to_string(),
            args: template(&[
                "classify",
                "train",
                "model=yolov8n-cls.pt",
                "data={data}",
                "imgsz={imgsz}",
                "epochs={epochs}",
                "batch={batch}",
                "lr0={lr}",
                "workers={workers}",
                "seed={seed}",
                "device={device}",
                "project={project}",
                "name={name}",
                "exist_ok=True",
            ]),
            export_args: export_template(),
            evaluate_args: template(&[
                "classify",
                "val",
                "model={run_dir}/weights/best.pt",
                "data={data}",
                "split={split}",
                "imgsz={imgsz}",
                "device={device}",
            ]),
            dataset: PathBuf::from("dataset_cls"),
            image_size: 224,
            epochs: 20,
            batch: 32,
            learning_rate: 1e-3,
            workers: 2,
            seed: 42,
            project: PathBuf::from("outputs/runs"),
            name: "cls_v1".to_string(),
            artifact: PathBuf::from("weights/best.onnx"),
            output_weights: PathBuf::from("outputs/runs/landfill_classifier.onnx"),
            evaluate_test_split: true,
            // the exported YOLO classifier ends in a softmax over /255 inputs
            model_output: Some("probabilities".to_string()),
            input_scaling: Some("unit".to_string()),
        }
    }

    pub fn segment() -> Self {
        Self {
            program: "yolo".to_string(),
            args: template(&[
                "segment",
                "train",
                "model=yolov8n-seg.pt",
                "data={data}",
                "imgsz={imgsz}",
                "epochs={epochs}",
                "batch={batch}",
                "lr0={lr}",
                "workers={workers}",
                "seed={seed}",
                "device={device}",
                "project={project}",
                "name={name}",
                "exist_ok=True",
            ]),
            export_args: export_template(),
            evaluate_args: template(&[
                "segment",
                "val",
                "model={run_dir}/weights/best.pt",
                "data={data}",
                "split={split}",
                "imgsz={imgsz}",
                "device={device}",
                "project={project}",
                "name={name}_test",
                "exist_ok=True",
            ]),
            dataset: PathBuf::from("dataset_seg/data.yaml"),
            image_size: 640,
            epochs: 50,
            batch: 8,
            learning_rate: 1e-2,
            workers: 2,
            seed: 0,
            project: PathBuf::from("outputs/runs"),
            name: "seg_v1".to_string(),
            artifact: PathBuf::from("weights/best.onnx"),
            output_weights: PathBuf::from("outputs/runs/seg_best.onnx"),
            evaluate_test_split: true,
            model_output: None,
            input_scaling: None,
        }
    }
}

fn template(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

fn export_template() -> Vec<String> {
    template(&[
        "export",
        "model={run_dir}/weights/best.pt",
        "format=onnx",
        "imgsz={imgsz}",
    ])
}

fn default_log_level() -> String {
    "info".to_string()
}
