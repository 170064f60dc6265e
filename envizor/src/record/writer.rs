use super::PredictionRow;
use crate::{Error, Result};
use csv::{Terminator, WriterBuilder};
use log::debug;
use std::fs::{self, File};
use std::path::Path;

/// Writes `records` under their header, replacing any existing file.
///
/// Every row is formatted and checked against the header before the file is
/// touched, so a rejected batch never leaves a partial file behind. Equal
/// input always yields byte-identical output.
pub fn write_records<R: PredictionRow>(path: &Path, records: &[R]) -> Result<()> {
    let rows = records
        .iter()
        .map(|record| {
            let fields = record.fields()?;
            if fields.len() != R::HEADER.len() {
                return Err(Error::Schema {
                    expected: R::HEADER.len(),
                    found: fields.len(),
                });
            }
            Ok(fields)
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(file);

    writer.write_record(R::HEADER)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    debug!("Wrote {} row(s) to {}", rows.len(), path.display());
    Ok(())
}
