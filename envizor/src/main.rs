#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use envizor::config::{self, Config, Device};
use envizor::pipeline::{ClassifierInference, SegmentationInference};
use envizor::train::{ExternalTrainer, TrainJob, TrainTask, TrainingDriver};
use log::{info, warn};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "envizor", version, about = "Landfill classification and segmentation pipelines")]
struct Cli {
    /// YAML configuration file (defaults to $CONFIG_PATH, then ./envizor.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// auto, cpu, cuda[:id] or tensorrt[:id]
    #[arg(short, long, global = true)]
    device: Option<Device>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify every image of a folder
    Classify(ClassifyArgs),
    /// Score the classifier on a labelled test split
    Evaluate(EvaluateArgs),
    /// Segment every image of a folder or of the data YAML test split
    Segment(SegmentArgs),
    /// Fine-tune the classifier through the external trainer
    TrainClassify(TrainArgs),
    /// Fine-tune the segmenter through the external trainer
    TrainSegment(TrainArgs),
}

#[derive(Args, Debug)]
struct ClassifyArgs {
    #[arg(long)]
    images: Option<PathBuf>,
    #[arg(long)]
    weights: Option<PathBuf>,
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    #[arg(long)]
    split: Option<PathBuf>,
    #[arg(long)]
    weights: Option<PathBuf>,
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SegmentArgs {
    #[arg(long)]
    images: Option<PathBuf>,
    #[arg(long, conflicts_with = "images")]
    data: Option<PathBuf>,
    #[arg(long)]
    weights: Option<PathBuf>,
    #[arg(long)]
    conf: Option<f32>,
    #[arg(long)]
    iou: Option<f32>,
    #[arg(long)]
    project: Option<PathBuf>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    no_visuals: bool,
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[arg(long)]
    dataset: Option<PathBuf>,
    #[arg(long)]
    epochs: Option<u32>,
    #[arg(long)]
    batch: Option<u32>,
    #[arg(long)]
    imgsz: Option<u32>,
    #[arg(long)]
    output: Option<PathBuf>,
}

fn validate_log_level(level: &str) -> Result<()> {
    level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .map_err(|_| {
            anyhow!(
                "Invalid log level: '{}'. Valid levels: error, warn, info, debug, trace",
                level
            )
        })?;
    Ok(())
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            validate_log_level(&config.log_level)?;
            tracing_subscriber::EnvFilter::try_new(&config.log_level)?
        }
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(device) = cli.device {
        config.device = device;
    }
    init_logging(&config)?;

    match cli.command {
        Command::Classify(args) => classify(config, args),
        Command::Evaluate(args) => evaluate(config, args),
        Command::Segment(args) => segment(config, args),
        Command::TrainClassify(args) => train(config, TrainTask::Classify, args),
        Command::TrainSegment(args) => train(config, TrainTask::Segment, args),
    }
}

fn classify(mut config: Config, args: ClassifyArgs) -> Result<()> {
    let cfg = &mut config.classify;
    if let Some(images) = args.images {
        cfg.images_dir = images;
    }
    if let Some(weights) = args.weights {
        cfg.weights = weights;
    }
    if let Some(output) = args.output {
        cfg.output_csv = output;
    }
    cfg.fail_fast |= args.fail_fast;

    let pipeline = ClassifierInference::load(cfg, config.device)?;
    let records = pipeline.run(&cfg.images_dir, &cfg.output_csv)?;
    info!("Classified {} image(s)", records.len());
    Ok(())
}

fn evaluate(mut config: Config, args: EvaluateArgs) -> Result<()> {
    let cfg = &mut config.classify;
    if args.split.is_some() {
        cfg.test_split = args.split;
    }
    if let Some(weights) = args.weights {
        cfg.weights = weights;
    }
    if let Some(output) = args.output {
        cfg.evaluation_csv = output;
    }

    let pipeline = ClassifierInference::load(cfg, config.device)?;
    if let Some(report) = pipeline.evaluate(cfg.test_split.as_deref(), &cfg.evaluation_csv)? {
        info!("Test accuracy: {:.2}%", report.accuracy * 100.0);
    }
    Ok(())
}

fn segment(mut config: Config, args: SegmentArgs) -> Result<()> {
    let cfg = &mut config.segment;
    if let Some(data) = args.data {
        cfg.images_dir = None;
        cfg.data_yaml = Some(data);
    }
    if args.images.is_some() {
        cfg.images_dir = args.images;
    }
    if let Some(weights) = args.weights {
        cfg.weights = weights;
    }
    if let Some(conf) = args.conf {
        cfg.conf_threshold = conf;
    }
    if let Some(iou) = args.iou {
        cfg.iou_threshold = iou;
    }
    if let Some(project) = args.project {
        cfg.project_out = project;
    }
    if let Some(name) = args.name {
        cfg.run_name = name;
    }
    cfg.save_visuals &= !args.no_visuals;
    cfg.fail_fast |= args.fail_fast;
    config.validate()?;

    let pipeline = SegmentationInference::load(&config.segment, config.device)?;
    match pipeline.run()? {
        Some(run) => info!(
            "Segmented {} image(s) from {} into {} polygon(s)",
            run.images,
            run.source.display(),
            run.records.len()
        ),
        None => warn!("Nothing to segment"),
    }
    Ok(())
}

fn train(config: Config, task: TrainTask, args: TrainArgs) -> Result<()> {
    let mut train = match task {
        TrainTask::Classify => config.train_classify,
        TrainTask::Segment => config.train_segment,
    };
    if let Some(dataset) = args.dataset {
        train.dataset = dataset;
    }
    if let Some(epochs) = args.epochs {
        train.epochs = epochs;
    }
    if let Some(batch) = args.batch {
        train.batch = batch;
    }
    if let Some(imgsz) = args.imgsz {
        train.image_size = imgsz;
    }
    if let Some(output) = args.output {
        train.output_weights = output;
    }

    let job = TrainJob::new(task, train, config.device);
    let outcome = ExternalTrainer.train(&job)?;
    match outcome.weights {
        Some(weights) => info!("Training finished, weights at {}", weights.display()),
        None => warn!("Training finished without an artifact in {}", outcome.run_dir.display()),
    }
    Ok(())
}
