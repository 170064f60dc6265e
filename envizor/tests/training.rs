use anyhow::Result;
use envizor::config::{Device, TrainConfig};
use envizor::labels::{ClassNames, ModelManifest};
use envizor_inference::inference::classify::{ClassifierOutput, InputScaling};
use envizor::train::{ExternalTrainer, TrainJob, TrainTask, TrainingDriver};
use envizor::Error;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn shell(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

fn classify_config(root: &Path, script: &str) -> Result<TrainConfig> {
    let dataset = root.join("dataset_cls");
    for dir in ["train/no_landfill", "train/illegal", "val/illegal", "test/illegal"] {
        fs::create_dir_all(dataset.join(dir))?;
    }

    Ok(TrainConfig {
        program: "sh".to_string(),
        args: shell(script),
        export_args: vec![],
        evaluate_args: shell("exit 3"),
        dataset,
        project: root.join("runs"),
        name: "cls".to_string(),
        artifact: "weights/best.onnx".into(),
        output_weights: root.join("models/landfill.onnx"),
        ..TrainConfig::classify()
    })
}

#[test]
fn artifact_and_manifest_are_published() -> Result<()> {
    let dir = tempdir()?;
    let config = classify_config(
        dir.path(),
        "mkdir -p {run_dir}/weights && printf onnx > {run_dir}/weights/best.onnx",
    )?;
    let job = TrainJob::new(TrainTask::Classify, config, Device::Cpu);

    let outcome = ExternalTrainer.train(&job)?;

    let weights = dir.path().join("models/landfill.onnx");
    assert_eq!(outcome.weights.as_deref(), Some(weights.as_path()));
    assert_eq!(fs::read_to_string(&weights)?, "onnx");
    assert_eq!(outcome.run_dir, dir.path().join("runs/cls"));

    // the evaluation script exits non-zero, which is only a warning
    assert!(!outcome.evaluated);

    let manifest = ModelManifest::load_for(&weights)?;
    assert_eq!(manifest.classes.names(), ["illegal", "no_landfill"]);
    let profile = manifest.profile.expect("classifier manifest carries a profile");
    assert_eq!(profile.output, ClassifierOutput::Probabilities);
    assert_eq!(profile.input, InputScaling::Unit);
    assert_eq!(outcome.manifest, ClassNames::manifest_path(&weights));
    Ok(())
}

#[test]
fn missing_artifact_is_not_an_error() -> Result<()> {
    let dir = tempdir()?;
    let config = classify_config(dir.path(), "true")?;
    let job = TrainJob::new(TrainTask::Classify, config, Device::Cpu);

    let outcome = ExternalTrainer.train(&job)?;

    assert!(outcome.weights.is_none());
    assert!(outcome.manifest.is_file());
    Ok(())
}

#[test]
fn failing_program_is_a_training_error() -> Result<()> {
    let dir = tempdir()?;
    let config = classify_config(dir.path(), "exit 1")?;
    let job = TrainJob::new(TrainTask::Classify, config, Device::Cpu);

    assert!(matches!(
        ExternalTrainer.train(&job),
        Err(Error::Training(_))
    ));
    Ok(())
}

#[test]
fn successful_evaluation_is_reported() -> Result<()> {
    let dir = tempdir()?;
    let mut config = classify_config(dir.path(), "true")?;
    config.evaluate_args = shell("test {split} = test");
    let job = TrainJob::new(TrainTask::Classify, config, Device::Cpu);

    assert!(ExternalTrainer.train(&job)?.evaluated);
    Ok(())
}

#[test]
fn segmentation_names_come_from_the_data_yaml() -> Result<()> {
    let dir = tempdir()?;
    let yaml = dir.path().join("dataset_seg/data.yaml");
    fs::create_dir_all(dir.path().join("dataset_seg"))?;
    fs::write(&yaml, "train: train/images\nval: valid/images\nnames: [landfill]\n")?;

    let config = TrainConfig {
        program: "sh".to_string(),
        args: shell("test -f {data}"),
        export_args: vec![],
        evaluate_args: shell("exit 1"),
        dataset: yaml,
        project: dir.path().join("runs"),
        output_weights: dir.path().join("seg_best.onnx"),
        ..TrainConfig::segment()
    };
    let job = TrainJob::new(TrainTask::Segment, config, Device::Cpu);

    let outcome = ExternalTrainer.train(&job)?;

    // no test split in the YAML, so evaluation never runs
    assert!(!outcome.evaluated);
    let manifest = ModelManifest::load_for(&dir.path().join("seg_best.onnx"))?;
    assert_eq!(manifest.classes.names(), ["landfill"]);
    assert_eq!(manifest.profile, None);
    Ok(())
}

#[test]
fn classification_dataset_needs_val_split() -> Result<()> {
    let dir = tempdir()?;
    let dataset = dir.path().join("dataset_cls");
    fs::create_dir_all(dataset.join("train/illegal"))?;

    let config = TrainConfig {
        program: "sh".to_string(),
        args: shell("true"),
        dataset,
        ..TrainConfig::classify()
    };
    let job = TrainJob::new(TrainTask::Classify, config, Device::Cpu);

    assert!(matches!(
        ExternalTrainer.train(&job),
        Err(Error::NotFound { .. })
    ));
    Ok(())
}
