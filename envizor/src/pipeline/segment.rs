use super::{handle_image_fault, image_name, require_dir, require_file};
use crate::config::{Device, SegmentConfig};
use crate::dataset::DataYaml;
use crate::record::{write_records, SegmentationRecord};
use crate::{Error, Result};
use envizor_inference::inference::yolo::inference_yolo_seg::{
    ExtractPolygons, YoloInferenceResult, YoloSegmentInference, YoloSegmentSession,
};
use envizor_inference::utils::graph::Polygon;
use envizor_inference::utils::masks::ApplyMask;
use envizor_media::scan::{scan_images, SEGMENT_EXTENSIONS};
use envizor_media::{Image, RGB};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

const MASK_TINT: RGB = RGB(0, 96, 0);
const OUTLINE_COLOR: RGB = RGB(255, 0, 0);

#[derive(Debug, Clone)]
pub struct SegmentationRun {
    pub source: PathBuf,
    pub csv_path: PathBuf,
    pub images: usize,
    pub records: Vec<SegmentationRecord>,
}

pub struct SegmentationInference<M> {
    model: M,
    config: SegmentConfig,
}

impl SegmentationInference<YoloSegmentSession> {
    pub fn load(config: &SegmentConfig, device: Device) -> Result<Self> {
        require_file("Model weights", &config.weights)?;

        let executor = device.execution_provider();
        info!("Device: {executor}");
        info!("Loading segmenter from {}", config.weights.display());
        let model = YoloSegmentSession::new(&config.weights, executor, config.image_size)?
            .with_mask_threshold(config.mask_threshold)
            .with_max_detections(config.max_detections);

        Ok(Self::new(model, config.clone()))
    }
}

impl<M: YoloSegmentInference> SegmentationInference<M> {
    pub fn new(model: M, config: SegmentConfig) -> Self {
        Self { model, config }
    }

    /// The explicit image folder, otherwise the `test` split of the data
    /// YAML. `None` when the YAML defines no test split.
    pub fn resolve_source(&self) -> Result<Option<PathBuf>> {
        if let Some(dir) = &self.config.images_dir {
            return Ok(Some(dir.clone()));
        }

        let Some(yaml) = &self.config.data_yaml else {
            return Err(Error::config(
                "segmentation needs either segment.images_dir or segment.data_yaml",
            ));
        };

        let data = DataYaml::load(yaml)?;
        let test = data.resolve_split("test");
        if test.is_none() {
            warn!("'test' is not defined in {}, skipping predictions", yaml.display());
        }
        Ok(test)
    }

    pub fn run(&self) -> Result<Option<SegmentationRun>> {
        let Some(source) = self.resolve_source()? else {
            return Ok(None);
        };
        require_dir("Input directory", &source)?;

        let images = scan_images(&source, SEGMENT_EXTENSIONS)?;
        if images.is_empty() {
            return Err(Error::NoImages(source));
        }
        info!("Found {} image(s) in {}", images.len(), source.display());

        let run_dir = self.config.run_dir();
        fs::create_dir_all(&run_dir)?;

        let mut records = Vec::new();
        for path in &images {
            match self.segment(path, &run_dir) {
                Ok(mut rows) => records.append(&mut rows),
                Err(e) => handle_image_fault(path, e, self.config.fail_fast)?,
            }
        }

        let csv_path = self.config.csv_path();
        write_records(&csv_path, &records)?;
        info!(
            "Saved {} polygon(s) to {}",
            records.len(),
            csv_path.display()
        );

        Ok(Some(SegmentationRun {
            source,
            csv_path,
            images: images.len(),
            records,
        }))
    }

    fn segment(&self, path: &Path, run_dir: &Path) -> Result<Vec<SegmentationRecord>> {
        let name = image_name(path);
        let mut image = Image::open_file(path)?;

        let instances = self.model.inference_yolo(
            &image,
            self.config.conf_threshold,
            self.config.iou_threshold,
        )?;
        let polygons = instances.extract_polygons();
        info!("{name} → {} instance(s)", polygons.len());

        let records = polygons
            .iter()
            .map(|(score, polygon)| {
                SegmentationRecord::new(&name, *score, polygon.vertices().to_vec())
            })
            .collect();

        if self.config.save_visuals {
            let rendered = render_overlay(&mut image, &instances, &polygons)
                .and_then(|()| image.save(run_dir.join(&name)));
            if let Err(e) = rendered {
                if self.config.fail_fast {
                    return Err(e.into());
                }
                warn!("Overlay for {name} not saved: {e:#}");
            }
        }

        Ok(records)
    }
}

fn render_overlay(
    image: &mut Image,
    instances: &[YoloInferenceResult],
    polygons: &[(f32, Polygon)],
) -> anyhow::Result<()> {
    for instance in instances {
        image.layering_mask(&instance.mask, MASK_TINT)?;
    }
    for (_, polygon) in polygons {
        image.outline_polygon(polygon, OUTLINE_COLOR)?;
    }
    Ok(())
}
