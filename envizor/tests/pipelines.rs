use anyhow::Result;
use bitvec::prelude::*;
use envizor::config::SegmentConfig;
use envizor::labels::ClassNames;
use envizor::pipeline::{ClassifierInference, SegmentationInference};
use envizor::record::{read_evaluation_csv, read_segmentation_csv};
use envizor::Error;
use envizor_inference::inference::classify::{ClassifyInference, ClassifyResult};
use envizor_inference::inference::yolo::inference_yolo_seg::{
    YoloInferenceResult, YoloSegmentInference,
};
use envizor_inference::utils::graph::Box;
use envizor_media::Image;
use image::{Rgb, RgbImage};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const RED: Rgb<u8> = Rgb([255, 0, 0]);
const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

/// Calls red images class 0 and everything else class 1.
struct ColorClassifier {
    outputs: usize,
}

impl ClassifyInference for ColorClassifier {
    fn inference_classify(&self, image: &Image) -> Result<ClassifyResult> {
        let red = image.as_rgb().get_pixel(0, 0).0[0] > 128;
        let (class_index, confidence) = if red { (0, 0.9) } else { (1, 0.8) };

        let mut probabilities = vec![0.0; self.outputs];
        probabilities[class_index] = confidence;
        Ok(ClassifyResult {
            class_index,
            confidence,
            probabilities,
        })
    }
}

/// Finds one square instance plus one empty one in red images, nothing in
/// other images.
struct ColorSegmenter;

impl YoloSegmentInference for ColorSegmenter {
    fn inference_yolo(
        &self,
        image: &Image,
        _conf_thres: f32,
        _iou_thres: f32,
    ) -> Result<Vec<YoloInferenceResult>> {
        if image.as_rgb().get_pixel(0, 0).0[0] <= 128 {
            return Ok(vec![]);
        }

        let (width, height) = image.get_size();
        let square = (0..width * height)
            .map(|i| (2..8).contains(&(i % width)) && (2..8).contains(&(i / width)))
            .collect::<BitVec>();
        let boxed = Box { x1: 2.0, y1: 2.0, x2: 8.0, y2: 8.0 };

        Ok(vec![
            YoloInferenceResult {
                boxed,
                classify: 0,
                mask: square,
                mask_size: (width, height),
                score: 0.87,
            },
            YoloInferenceResult {
                boxed,
                classify: 0,
                mask: bitvec![0; (width * height) as usize],
                mask_size: (width, height),
                score: 0.3,
            },
        ])
    }
}

fn write_image(path: &Path, color: Rgb<u8>) -> Result<()> {
    Image::from_rgb(RgbImage::from_pixel(10, 10, color)).save(path)
}

fn classes() -> Result<ClassNames> {
    Ok(ClassNames::new(["illegal", "no_landfill"])?)
}

fn segment_config(root: &Path, images: Option<PathBuf>) -> SegmentConfig {
    SegmentConfig {
        images_dir: images,
        data_yaml: None,
        project_out: root.join("preds"),
        run_name: "run".to_string(),
        csv_name: "polygons.csv".to_string(),
        ..SegmentConfig::default()
    }
}

#[test]
fn classify_folder_skips_unreadable_images() -> Result<()> {
    let dir = tempdir()?;
    let images = dir.path().join("images");
    fs::create_dir(&images)?;
    write_image(&images.join("b.png"), RED)?;
    write_image(&images.join("a.jpg"), BLUE)?;
    fs::write(images.join("broken.png"), b"not an image")?;
    fs::write(images.join("notes.txt"), b"ignored")?;

    let output = dir.path().join("out/preds.csv");
    let pipeline = ClassifierInference::new(ColorClassifier { outputs: 2 }, classes()?);
    let records = pipeline.run(&images, &output)?;

    assert_eq!(records.len(), 2);
    assert_eq!(
        fs::read_to_string(&output)?,
        "image_name,predicted_label,confidence\n\
         a.jpg,no_landfill,0.8\n\
         b.png,illegal,0.9\n"
    );
    Ok(())
}

#[test]
fn fail_fast_stops_at_the_first_bad_image() -> Result<()> {
    let dir = tempdir()?;
    write_image(&dir.path().join("a.png"), RED)?;
    fs::write(dir.path().join("b.png"), b"not an image")?;

    let output = dir.path().join("preds.csv");
    let pipeline =
        ClassifierInference::new(ColorClassifier { outputs: 2 }, classes()?).with_fail_fast(true);

    assert!(matches!(
        pipeline.run(dir.path(), &output),
        Err(Error::Inference(_))
    ));
    assert!(!output.exists());
    Ok(())
}

#[test]
fn folder_without_images_is_fatal() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("notes.txt"), b"ignored")?;
    let pipeline = ClassifierInference::new(ColorClassifier { outputs: 2 }, classes()?);

    assert!(matches!(
        pipeline.run(dir.path(), &dir.path().join("preds.csv")),
        Err(Error::NoImages(_))
    ));
    assert!(matches!(
        pipeline.run(&dir.path().join("missing"), &dir.path().join("preds.csv")),
        Err(Error::NotFound { .. })
    ));
    Ok(())
}

#[test]
fn manifest_width_mismatch_aborts_the_run() -> Result<()> {
    let dir = tempdir()?;
    write_image(&dir.path().join("a.png"), RED)?;
    write_image(&dir.path().join("b.png"), BLUE)?;

    let pipeline = ClassifierInference::new(ColorClassifier { outputs: 3 }, classes()?);
    assert!(matches!(
        pipeline.run(dir.path(), &dir.path().join("preds.csv")),
        Err(Error::ClassNames(_))
    ));
    Ok(())
}

#[test]
fn evaluation_builds_report_and_rows() -> Result<()> {
    let dir = tempdir()?;
    let split = dir.path().join("test");
    fs::create_dir_all(split.join("illegal"))?;
    fs::create_dir_all(split.join("no_landfill"))?;
    write_image(&split.join("illegal/1.png"), RED)?;
    write_image(&split.join("illegal/2.png"), BLUE)?;
    write_image(&split.join("no_landfill/3.png"), BLUE)?;

    let output = dir.path().join("eval.csv");
    let pipeline = ClassifierInference::new(ColorClassifier { outputs: 2 }, classes()?);
    let report = pipeline
        .evaluate(Some(&split), &output)?
        .expect("split exists");

    assert_eq!(report.total, 3);
    assert!((report.accuracy - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(report.confusion.get(0, 1), 1);
    assert_eq!(report.per_class[1].support, 1);

    let rows = read_evaluation_csv(&output)?;
    let labels = rows
        .iter()
        .map(|row| (row.true_label.as_str(), row.predicted_label.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        labels,
        [
            ("illegal", "illegal"),
            ("illegal", "no_landfill"),
            ("no_landfill", "no_landfill"),
        ]
    );
    Ok(())
}

#[test]
fn absent_test_split_is_skipped() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("eval.csv");
    let pipeline = ClassifierInference::new(ColorClassifier { outputs: 2 }, classes()?);

    assert!(pipeline.evaluate(None, &output)?.is_none());
    assert!(pipeline
        .evaluate(Some(&dir.path().join("test")), &output)?
        .is_none());
    assert!(!output.exists());
    Ok(())
}

#[test]
fn segmentation_writes_polygons_and_overlays() -> Result<()> {
    let dir = tempdir()?;
    let images = dir.path().join("images");
    fs::create_dir(&images)?;
    write_image(&images.join("tile1.png"), RED)?;
    write_image(&images.join("tile2.bmp"), BLUE)?;

    let config = segment_config(dir.path(), Some(images.clone()));
    let run = SegmentationInference::new(ColorSegmenter, config)
        .run()?
        .expect("images_dir is set");

    assert_eq!(run.images, 2);
    assert_eq!(run.csv_path, dir.path().join("preds/run/polygons.csv"));

    // the empty mask has no outline and the blue tile has no detections,
    // so neither contributes a row
    assert_eq!(run.records.len(), 1);
    let record = &run.records[0];
    assert_eq!(record.image_name, "tile1.png");
    assert_eq!(record.confidence, 0.87);
    assert_eq!(record.polygon.len(), 4);
    for vertex in &record.polygon {
        assert!([2.0, 7.0].contains(&vertex.x) && [2.0, 7.0].contains(&vertex.y));
    }

    let parsed = read_segmentation_csv(&run.csv_path)?;
    assert_eq!(parsed, run.records);
    assert!(dir.path().join("preds/run/tile1.png").is_file());
    assert!(dir.path().join("preds/run/tile2.bmp").is_file());
    Ok(())
}

#[test]
fn segmentation_reads_the_data_yaml_test_split() -> Result<()> {
    let dir = tempdir()?;
    let test_images = dir.path().join("dataset/test/images");
    fs::create_dir_all(&test_images)?;
    write_image(&test_images.join("tile.png"), RED)?;
    let yaml = dir.path().join("dataset/data.yaml");
    fs::write(&yaml, "test: test/images\nnames: [landfill]\n")?;

    let mut config = segment_config(dir.path(), None);
    config.data_yaml = Some(yaml);
    config.save_visuals = false;

    let run = SegmentationInference::new(ColorSegmenter, config)
        .run()?
        .expect("test split is defined");

    assert_eq!(run.source, test_images);
    assert_eq!(run.records.len(), 1);
    assert!(!dir.path().join("preds/run/tile.png").exists());
    Ok(())
}

#[test]
fn data_yaml_without_test_split_produces_nothing() -> Result<()> {
    let dir = tempdir()?;
    let yaml = dir.path().join("data.yaml");
    fs::write(&yaml, "train: train/images\nval: valid/images\nnames: [landfill]\n")?;

    let mut config = segment_config(dir.path(), None);
    config.data_yaml = Some(yaml);

    let pipeline = SegmentationInference::new(ColorSegmenter, config.clone());
    assert!(pipeline.run()?.is_none());
    assert!(!config.csv_path().exists());
    Ok(())
}

#[test]
fn failed_overlay_keeps_the_detections() -> Result<()> {
    let dir = tempdir()?;
    let images = dir.path().join("images");
    fs::create_dir(&images)?;
    write_image(&images.join("tile1.png"), RED)?;
    // a directory where the overlay file should go makes the save fail
    fs::create_dir_all(dir.path().join("preds/run/tile1.png"))?;

    let config = segment_config(dir.path(), Some(images.clone()));
    let run = SegmentationInference::new(ColorSegmenter, config.clone())
        .run()?
        .expect("images_dir is set");

    assert_eq!(run.records.len(), 1);
    assert_eq!(run.records[0].image_name, "tile1.png");
    assert_eq!(read_segmentation_csv(&run.csv_path)?, run.records);

    let strict = SegmentConfig {
        fail_fast: true,
        ..config
    };
    assert!(SegmentationInference::new(ColorSegmenter, strict).run().is_err());
    Ok(())
}
