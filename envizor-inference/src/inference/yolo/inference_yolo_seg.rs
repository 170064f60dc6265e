use crate::engine::inference_engine::{ExecutionProvider, OnnxSession};
use crate::inference::yolo::{NMSImplement, YoloCandidate};
use crate::utils::contour::MaskContour;
use crate::utils::graph::{Box, Polygon};
use crate::utils::tensor::{argmax, linear_interpolate, rgb_to_nchw, sigmoid};
use anyhow::{bail, Result};
use bitvec::prelude::*;
use envizor_media::{Image, Letterbox, ResizeImage, RGB};
use log::debug;
use ndarray::{s, Array2, Array3, ArrayView1, ArrayView2, Axis, Ix3, Ix4};
use ort::inputs;
use ort::value::Tensor;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::Path;

const PAD_COLOR: RGB = RGB(114, 114, 114);
const DEFAULT_MASK_THRESHOLD: f32 = 0.5;
const DEFAULT_MAX_DETECTIONS: usize = 300;

pub trait YoloSegmentInference {
    fn inference_yolo(
        &self,
        image: &Image,
        conf_thres: f32,
        iou_thres: f32,
    ) -> Result<Vec<YoloInferenceResult>>;
}

/// One instance in original-image coordinates. `mask` is row-major over
/// `mask_size`.
#[derive(Debug, Clone)]
pub struct YoloInferenceResult {
    pub boxed: Box<f32>,
    pub classify: usize,
    pub mask: BitVec,
    pub mask_size: (u32, u32),
    pub score: f32,
}

/// Turns instance masks into outlines, dropping instances whose mask has no
/// usable contour. Order is preserved.
pub trait ExtractPolygons {
    fn extract_polygons(&self) -> Vec<(f32, Polygon)>;
}

impl ExtractPolygons for [YoloInferenceResult] {
    fn extract_polygons(&self) -> Vec<(f32, Polygon)> {
        self.par_iter()
            .filter_map(|instance| {
                let (width, height) = instance.mask_size;
                instance
                    .mask
                    .extract_polygon(width, height)
                    .map(|polygon| (instance.score, polygon))
            })
            .collect()
    }
}

pub struct YoloSegmentSession {
    session: Mutex<OnnxSession>,
    input_size: u32,
    mask_threshold: f32,
    max_detections: usize,
}

impl YoloSegmentSession {
    pub fn new(
        model_path: impl AsRef<Path>,
        executor: ExecutionProvider,
        input_size: u32,
    ) -> Result<Self> {
        Ok(Self {
            session: Mutex::new(OnnxSession::new(model_path, executor)?),
            input_size,
            mask_threshold: DEFAULT_MASK_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
        })
    }

    pub fn with_mask_threshold(mut self, mask_threshold: f32) -> Self {
        self.mask_threshold = mask_threshold;
        self
    }

    pub fn with_max_detections(mut self, max_detections: usize) -> Self {
        self.max_detections = max_detections;
        self
    }
}

impl YoloSegmentInference for YoloSegmentSession {
    fn inference_yolo(
        &self,
        image: &Image,
        conf_thres: f32,
        iou_thres: f32,
    ) -> Result<Vec<YoloInferenceResult>> {
        let (boxed_image, letterbox) = image.letterbox_into(self.input_size, PAD_COLOR)?;
        let tensor = rgb_to_nchw(boxed_image.as_rgb(), [0.0; 3], [1.0; 3]);

        let (predictions, protos) = {
            let mut session = self.session.lock();
            let outputs = session.run(inputs![Tensor::from_array(tensor)?])?;

            let predictions = outputs["output0"]
                .try_extract_array::<f32>()?
                .into_dimensionality::<Ix3>()?
                .index_axis_move(Axis(0), 0)
                .reversed_axes()
                .as_standard_layout()
                .into_owned();
            let protos = outputs["output1"]
                .try_extract_array::<f32>()?
                .into_dimensionality::<Ix4>()?
                .index_axis_move(Axis(0), 0)
                .to_owned();

            (predictions, protos)
        };
        debug!(
            "predictions: {:?}, protos: {:?}",
            predictions.shape(),
            protos.shape()
        );

        let mut candidates =
            decode_candidates(predictions.view(), protos.dim().0, conf_thres, &letterbox)?
                .non_maximum_suppression(iou_thres);
        candidates.truncate(self.max_detections);
        debug!("{} candidates after NMS", candidates.len());

        let mask_threshold = self.mask_threshold;
        candidates
            .into_par_iter()
            .map(|candidate| {
                let mask = compose_mask(
                    &candidate.coefficients,
                    &protos,
                    &letterbox,
                    &candidate.boxed,
                    mask_threshold,
                )?;

                Ok(YoloInferenceResult {
                    boxed: candidate.boxed,
                    classify: candidate.classify,
                    mask,
                    mask_size: letterbox.origin_size,
                    score: candidate.score,
                })
            })
            .collect()
    }
}

/// Reads `[N, 4 + classes + masks]` rows (centre box, class scores, mask
/// coefficients) and keeps those whose best class clears `conf_thres`.
pub fn decode_candidates(
    predictions: ArrayView2<f32>,
    num_masks: usize,
    conf_thres: f32,
    letterbox: &Letterbox,
) -> Result<Vec<YoloCandidate>> {
    let width = predictions.ncols();
    if width <= 4 + num_masks {
        bail!(
            "Prediction rows of width {} leave no room for class scores next to {} mask coefficients",
            width,
            num_masks
        );
    }
    let num_classes = width - 4 - num_masks;

    let candidates = predictions
        .axis_iter(Axis(0))
        .into_par_iter()
        .filter_map(|row| {
            let scores = row.slice(s![4..4 + num_classes]).to_vec();
            let (classify, score) = argmax(&scores)?;
            if score <= conf_thres {
                return None;
            }

            let canvas = Box::from_center(row[0], row[1], row[2], row[3]);
            let (x1, y1) = letterbox.to_origin(canvas.x1, canvas.y1);
            let (x2, y2) = letterbox.to_origin(canvas.x2, canvas.y2);

            Some(YoloCandidate {
                boxed: Box { x1, y1, x2, y2 },
                classify,
                score,
                coefficients: row.slice(s![4 + num_classes..]).to_vec(),
            })
        })
        .collect();

    Ok(candidates)
}

/// `sigmoid(coefficients · protos)`, cropped to the letterboxed content,
/// upscaled to the original resolution and clipped to the instance box.
pub fn compose_mask(
    coefficients: &[f32],
    protos: &Array3<f32>,
    letterbox: &Letterbox,
    boxed: &Box<f32>,
    threshold: f32,
) -> Result<BitVec> {
    let (num_masks, proto_height, proto_width) = protos.dim();
    if coefficients.len() != num_masks {
        bail!(
            "{} mask coefficients for {} prototypes",
            coefficients.len(),
            num_masks
        );
    }

    let flat = protos
        .view()
        .into_shape_with_order((num_masks, proto_height * proto_width))?;
    let mask = ArrayView1::from(coefficients)
        .dot(&flat)
        .into_shape_with_order((proto_height, proto_width))?;
    let mask: Array2<f32> = sigmoid(mask);

    let ratio_x = proto_width as f32 / letterbox.target as f32;
    let ratio_y = proto_height as f32 / letterbox.target as f32;
    let (scaled_width, scaled_height) = letterbox.scaled_size();

    let left = ((letterbox.pad_x * ratio_x).floor() as usize).min(proto_width - 1);
    let top = ((letterbox.pad_y * ratio_y).floor() as usize).min(proto_height - 1);
    let right = (((letterbox.pad_x + scaled_width as f32) * ratio_x).ceil() as usize)
        .clamp(left + 1, proto_width);
    let bottom = (((letterbox.pad_y + scaled_height as f32) * ratio_y).ceil() as usize)
        .clamp(top + 1, proto_height);

    let cropped = mask.slice(s![top..bottom, left..right]).to_owned();
    let (width, height) = letterbox.origin_size;
    let full = linear_interpolate(cropped, (height as usize, width as usize));

    Ok(full
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            let x = (index % width as usize) as f32;
            let y = (index / width as usize) as f32;
            value > threshold && boxed.contains(x, y)
        })
        .collect::<BitVec>())
}
