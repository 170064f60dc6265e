use super::{ClassificationRecord, EvaluationRecord, PredictionRow, SegmentationRecord};
use crate::{Error, Result};
use csv::ReaderBuilder;
use std::path::Path;

pub fn read_records<R: PredictionRow>(path: &Path) -> Result<Vec<R>> {
    if !path.is_file() {
        return Err(Error::not_found("Prediction CSV", path));
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.len() != R::HEADER.len() {
        return Err(Error::Schema {
            expected: R::HEADER.len(),
            found: headers.len(),
        });
    }
    if headers.iter().ne(R::HEADER.iter().copied()) {
        return Err(Error::invalid_record(format!(
            "unexpected header {:?}, expected {:?}",
            headers.iter().collect::<Vec<_>>(),
            R::HEADER
        )));
    }

    reader
        .records()
        .map(|row| {
            let row = row?;
            if row.len() != R::HEADER.len() {
                return Err(Error::Schema {
                    expected: R::HEADER.len(),
                    found: row.len(),
                });
            }
            R::from_fields(&row)
        })
        .collect()
}

pub fn read_classification_csv(path: &Path) -> Result<Vec<ClassificationRecord>> {
    read_records(path)
}

pub fn read_segmentation_csv(path: &Path) -> Result<Vec<SegmentationRecord>> {
    read_records(path)
}

pub fn read_evaluation_csv(path: &Path) -> Result<Vec<EvaluationRecord>> {
    read_records(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn wrong_header_is_rejected() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("preds.csv");
        fs::write(&path, "image,label,score\na.png,illegal,0.5\n")?;

        assert!(matches!(
            read_classification_csv(&path),
            Err(Error::InvalidRecord(_))
        ));
        Ok(())
    }

    #[test]
    fn short_row_is_a_schema_error() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("preds.csv");
        fs::write(&path, "image_name,predicted_label,confidence\na.png,illegal\n")?;

        assert!(matches!(
            read_classification_csv(&path),
            Err(Error::Schema { expected: 3, found: 2 })
        ));
        Ok(())
    }

    #[test]
    fn missing_file_is_not_found() {
        assert!(matches!(
            read_segmentation_csv(Path::new("/nonexistent/preds.csv")),
            Err(Error::NotFound { .. })
        ));
    }
}
