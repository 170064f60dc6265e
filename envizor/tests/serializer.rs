use envizor::record::{
    read_classification_csv, read_segmentation_csv, write_records, ClassificationRecord,
    SegmentationRecord,
};
use envizor::Error;
use envizor_inference::utils::graph::Point;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;

fn classification_sample() -> Vec<ClassificationRecord> {
    vec![
        ClassificationRecord::new("cat1.jpg", "illegal", 0.93),
        ClassificationRecord::new("cat2.jpg", "no_landfill", 0.81),
    ]
}

fn segmentation_sample() -> Vec<SegmentationRecord> {
    vec![
        SegmentationRecord::new(
            "tile7.png",
            0.40,
            vec![Point::new(1.234, 5.678), Point::new(2.0, 3.0)],
        ),
        SegmentationRecord::new(
            "tile7.png",
            0.77,
            vec![
                Point::new(10.0, 10.0),
                Point::new(20.0, 10.0),
                Point::new(20.0, 20.0),
            ],
        ),
    ]
}

#[test]
fn classification_csv_layout() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("preds.csv");

    write_records(&path, &classification_sample())?;

    assert_eq!(
        fs::read_to_string(&path)?,
        "image_name,predicted_label,confidence\n\
         cat1.jpg,illegal,0.93\n\
         cat2.jpg,no_landfill,0.81\n"
    );
    Ok(())
}

#[test]
fn segmentation_csv_quotes_the_polygon_field() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("preds.csv");

    write_records(&path, &segmentation_sample())?;

    assert_eq!(
        fs::read_to_string(&path)?,
        "image_name,confidence,polygon_px\n\
         tile7.png,0.4,\"1.23,5.68;2.00,3.00\"\n\
         tile7.png,0.77,\"10.00,10.00;20.00,10.00;20.00,20.00\"\n"
    );
    Ok(())
}

#[test]
fn classification_round_trip_keeps_order_and_values() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("preds.csv");
    let records = vec![
        ClassificationRecord::new("z.png", "non_illegal", 0.333_333_34),
        ClassificationRecord::new("a.png", "illegal", 1.0),
        ClassificationRecord::new("m, with comma.png", "no_landfill", 0.0),
    ];

    write_records(&path, &records)?;
    assert_eq!(read_classification_csv(&path)?, records);
    Ok(())
}

#[test]
fn segmentation_round_trip_within_rounding() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("preds.csv");
    let records = vec![
        SegmentationRecord::new(
            "a.tif",
            0.51,
            vec![
                Point::new(0.004, 1023.996),
                Point::new(512.125, 3.3333),
                Point::new(77.777, 88.888),
            ],
        ),
        SegmentationRecord::new(
            "b.png",
            0.99,
            vec![Point::new(1.0, 1.0), Point::new(4.0, 1.0), Point::new(4.0, 4.0)],
        ),
    ];

    write_records(&path, &records)?;
    let parsed = read_segmentation_csv(&path)?;

    assert_eq!(parsed.len(), records.len());
    for (read, written) in parsed.iter().zip(&records) {
        assert_eq!(read.image_name, written.image_name);
        assert_eq!(read.confidence, written.confidence);
        assert_eq!(read.polygon.len(), written.polygon.len());
        for (p, q) in read.polygon.iter().zip(&written.polygon) {
            assert!((p.x - q.x).abs() <= 0.01 && (p.y - q.y).abs() <= 0.01);
        }
    }
    Ok(())
}

#[test]
fn rewriting_is_byte_identical() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("preds.csv");

    write_records(&path, &segmentation_sample())?;
    let first = fs::read(&path)?;
    write_records(&path, &segmentation_sample())?;
    let second = fs::read(&path)?;

    assert_eq!(first, second);
    Ok(())
}

#[test]
fn existing_file_is_replaced() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("preds.csv");
    fs::write(&path, "stale\ncontent\nthat is longer than the new file\n")?;

    write_records(&path, &classification_sample()[..1])?;

    assert_eq!(
        fs::read_to_string(&path)?,
        "image_name,predicted_label,confidence\ncat1.jpg,illegal,0.93\n"
    );
    Ok(())
}

#[test]
fn empty_run_writes_only_the_header() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("preds.csv");

    write_records::<SegmentationRecord>(&path, &[])?;

    assert_eq!(fs::read_to_string(&path)?, "image_name,confidence,polygon_px\n");
    assert!(read_segmentation_csv(&path)?.is_empty());
    Ok(())
}

#[test]
fn invalid_record_leaves_no_file() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("preds.csv");
    let mut records = segmentation_sample();
    records.push(SegmentationRecord::new("tile8.png", 0.5, vec![]));

    let err = write_records(&path, &records).unwrap_err();
    assert!(matches!(err, Error::InvalidRecord(_)));
    assert!(!path.exists());
    Ok(())
}
