//! Flat prediction rows and their CSV serialization.

mod reader;
mod writer;

pub use reader::{read_classification_csv, read_evaluation_csv, read_records, read_segmentation_csv};
pub use writer::write_records;

use crate::{Error, Result};
use csv::StringRecord;
use envizor_inference::utils::graph::Point;
use std::fmt::Write;

/// A record type with a fixed column schema.
pub trait PredictionRow: Sized {
    const HEADER: &'static [&'static str];

    /// Formatted fields in header order. Fails on values the record type
    /// does not admit.
    fn fields(&self) -> Result<Vec<String>>;

    fn from_fields(fields: &StringRecord) -> Result<Self>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRecord {
    pub image_name: String,
    pub predicted_label: String,
    pub confidence: f32,
}

/// One detected instance. An image yields as many records as surviving
/// instances, and none when nothing was detected.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationRecord {
    pub image_name: String,
    pub confidence: f32,
    pub polygon: Vec<Point<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    pub image_path: String,
    pub true_label: String,
    pub predicted_label: String,
}

impl ClassificationRecord {
    pub fn new(
        image_name: impl Into<String>,
        predicted_label: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            image_name: image_name.into(),
            predicted_label: predicted_label.into(),
            confidence,
        }
    }
}

impl SegmentationRecord {
    pub fn new(image_name: impl Into<String>, confidence: f32, polygon: Vec<Point<f32>>) -> Self {
        Self {
            image_name: image_name.into(),
            confidence,
            polygon,
        }
    }
}

impl PredictionRow for ClassificationRecord {
    const HEADER: &'static [&'static str] = &["image_name", "predicted_label", "confidence"];

    fn fields(&self) -> Result<Vec<String>> {
        check_text("image_name", &self.image_name)?;
        check_text("predicted_label", &self.predicted_label)?;
        check_confidence(self.confidence)?;

        Ok(vec![
            self.image_name.clone(),
            self.predicted_label.clone(),
            self.confidence.to_string(),
        ])
    }

    fn from_fields(fields: &StringRecord) -> Result<Self> {
        let record = Self {
            image_name: field(fields, 0)?.to_string(),
            predicted_label: field(fields, 1)?.to_string(),
            confidence: parse_confidence(field(fields, 2)?)?,
        };
        check_text("image_name", &record.image_name)?;
        check_text("predicted_label", &record.predicted_label)?;
        Ok(record)
    }
}

impl PredictionRow for SegmentationRecord {
    const HEADER: &'static [&'static str] = &["image_name", "confidence", "polygon_px"];

    fn fields(&self) -> Result<Vec<String>> {
        check_text("image_name", &self.image_name)?;
        check_confidence(self.confidence)?;

        Ok(vec![
            self.image_name.clone(),
            self.confidence.to_string(),
            format_polygon(&self.polygon)?,
        ])
    }

    fn from_fields(fields: &StringRecord) -> Result<Self> {
        let record = Self {
            image_name: field(fields, 0)?.to_string(),
            confidence: parse_confidence(field(fields, 1)?)?,
            polygon: parse_polygon(field(fields, 2)?)?,
        };
        check_text("image_name", &record.image_name)?;
        Ok(record)
    }
}

impl PredictionRow for EvaluationRecord {
    const HEADER: &'static [&'static str] = &["image_path", "true_label", "predicted_label"];

    fn fields(&self) -> Result<Vec<String>> {
        check_text("image_path", &self.image_path)?;
        check_text("true_label", &self.true_label)?;
        check_text("predicted_label", &self.predicted_label)?;

        Ok(vec![
            self.image_path.clone(),
            self.true_label.clone(),
            self.predicted_label.clone(),
        ])
    }

    fn from_fields(fields: &StringRecord) -> Result<Self> {
        Ok(Self {
            image_path: field(fields, 0)?.to_string(),
            true_label: field(fields, 1)?.to_string(),
            predicted_label: field(fields, 2)?.to_string(),
        })
    }
}

/// `x1,y1;x2,y2;...` with two decimals per coordinate.
pub fn format_polygon(vertices: &[Point<f32>]) -> Result<String> {
    if vertices.is_empty() {
        return Err(Error::invalid_record("polygon has no vertices"));
    }

    let mut out = String::with_capacity(vertices.len() * 14);
    for (i, p) in vertices.iter().enumerate() {
        if !p.x.is_finite() || !p.y.is_finite() {
            return Err(Error::invalid_record(format!(
                "polygon vertex {i} is not finite: ({}, {})",
                p.x, p.y
            )));
        }
        if i > 0 {
            out.push(';');
        }
        let _ = write!(out, "{:.2},{:.2}", p.x, p.y);
    }
    Ok(out)
}

pub fn parse_polygon(text: &str) -> Result<Vec<Point<f32>>> {
    if text.trim().is_empty() {
        return Err(Error::invalid_record("polygon has no vertices"));
    }

    text.split(';')
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| Error::invalid_record(format!("malformed vertex '{pair}'")))?;
            let coord = |v: &str| {
                v.trim()
                    .parse::<f32>()
                    .map_err(|_| Error::invalid_record(format!("malformed vertex '{pair}'")))
            };
            Ok(Point::new(coord(x)?, coord(y)?))
        })
        .collect()
}

fn field(fields: &StringRecord, index: usize) -> Result<&str> {
    fields
        .get(index)
        .ok_or_else(|| Error::invalid_record(format!("missing field {index}")))
}

fn check_text(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        Err(Error::invalid_record(format!("{name} is empty")))
    } else {
        Ok(())
    }
}

fn check_confidence(confidence: f32) -> Result<()> {
    if confidence.is_finite() && (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(Error::invalid_record(format!(
            "confidence {confidence} is outside [0, 1]"
        )))
    }
}

fn parse_confidence(text: &str) -> Result<f32> {
    let confidence = text
        .trim()
        .parse::<f32>()
        .map_err(|_| Error::invalid_record(format!("malformed confidence '{text}'")))?;
    check_confidence(confidence)?;
    Ok(confidence)
}
