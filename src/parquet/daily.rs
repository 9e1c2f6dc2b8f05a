//! Load a daily gridded collection from a long-format parquet table.
//!
//! One row per pixel per day: `date` (Date32), `lon`, `lat` (pixel centre,
//! Float32 or Float64) and `value` (Float32, nullable). The grid is inferred
//! from the distinct coordinates; pixels absent on a day are no-data.

use std::{collections::BTreeMap, fs::File, path::Path};

use arrow::{
    array::{Array, ArrayRef, Date32Array, Float32Array, Float64Array},
    compute::cast,
    datatypes::DataType,
    record_batch::RecordBatch,
};
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::{
    backend::local::Frame,
    error::BackendError,
    raster::{Grid, Raster},
};

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Coordinates closer than this (degrees) are the same pixel centre.
const COORD_TOLERANCE: f64 = 1e-6;

struct Row {
    date: i32,
    lon: f64,
    lat: f64,
    value: Option<f32>,
}

pub fn load_daily(file_path: &Path) -> Result<(Grid, Vec<Frame>), BackendError> {
    let file = File::open(file_path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        read_batch(&batch?, &mut rows)?;
    }

    let grid = infer_grid(&rows)?;
    let mut days: BTreeMap<i32, Vec<Option<f32>>> = BTreeMap::new();
    for row in &rows {
        let index = grid.index_of(row.lon, row.lat).ok_or_else(|| {
            BackendError::Malformed(format!("({}, {}) is off the grid", row.lon, row.lat))
        })?;
        days.entry(row.date).or_insert_with(|| vec![None; grid.len()])[index] = row.value;
    }

    let mut frames = Vec::with_capacity(days.len());
    for (days_since_epoch, values) in days {
        let date = NaiveDate::from_num_days_from_ce_opt(days_since_epoch + UNIX_EPOCH_DAYS_FROM_CE)
            .ok_or_else(|| BackendError::Malformed(format!("date {days_since_epoch} out of range")))?;
        frames.push(Frame::new(date, Raster::from_values(grid, values)?));
    }

    Ok((grid, frames))
}

fn read_batch(batch: &RecordBatch, rows: &mut Vec<Row>) -> Result<(), BackendError> {
    let dates = column(batch, "date", &DataType::Date32)?;
    let lons = column(batch, "lon", &DataType::Float64)?;
    let lats = column(batch, "lat", &DataType::Float64)?;
    let values = column(batch, "value", &DataType::Float32)?;

    let dates = downcast::<Date32Array>(&dates, "date")?;
    let lons = downcast::<Float64Array>(&lons, "lon")?;
    let lats = downcast::<Float64Array>(&lats, "lat")?;
    let values = downcast::<Float32Array>(&values, "value")?;

    for i in 0..batch.num_rows() {
        if dates.is_null(i) || lons.is_null(i) || lats.is_null(i) {
            return Err(BackendError::Malformed(format!("row {i} has no date or position")));
        }
        rows.push(Row {
            date: dates.value(i),
            lon: lons.value(i),
            lat: lats.value(i),
            value: (!values.is_null(i)).then(|| values.value(i)),
        });
    }

    Ok(())
}

fn column(batch: &RecordBatch, name: &str, data_type: &DataType) -> Result<ArrayRef, BackendError> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| BackendError::Malformed(format!("missing column '{name}'")))?;

    Ok(cast(array, data_type)?)
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, name: &str) -> Result<&'a T, BackendError> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| BackendError::Malformed(format!("column '{name}' has the wrong type")))
}

fn distinct(mut coords: Vec<f64>) -> Vec<f64> {
    coords.sort_by(f64::total_cmp);
    coords.dedup_by(|a, b| (*a - *b).abs() < COORD_TOLERANCE);
    coords
}

fn min_spacing(coords: &[f64]) -> Option<f64> {
    coords
        .windows(2)
        .map(|w| w[1] - w[0])
        .reduce(f64::min)
}

fn infer_grid(rows: &[Row]) -> Result<Grid, BackendError> {
    let lons = distinct(rows.iter().map(|r| r.lon).collect());
    let lats = distinct(rows.iter().map(|r| r.lat).collect());

    let (Some(&min_lon), Some(&max_lon), Some(&min_lat), Some(&max_lat)) =
        (lons.first(), lons.last(), lats.first(), lats.last())
    else {
        return Err(BackendError::Malformed("collection has no rows".to_string()));
    };

    let cell = match (min_spacing(&lons), min_spacing(&lats)) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => {
            return Err(BackendError::Malformed(
                "cannot infer pixel size from a single pixel".to_string(),
            ))
        }
    };

    Ok(Grid {
        origin_lon: min_lon,
        origin_lat: max_lat,
        cell,
        width: ((max_lon - min_lon) / cell).round() as usize + 1,
        height: ((max_lat - min_lat) / cell).round() as usize + 1,
    })
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use arrow::datatypes::{Field, Schema};
    use chrono::Datelike;
    use parquet::arrow::ArrowWriter;
    use tempfile::NamedTempFile;

    use super::*;

    // Writes (day offset from 2000-03-01, lon, lat, value) rows.
    fn write_fixture(rows: &[(i32, f32, f32, Option<f32>)]) -> NamedTempFile {
        let temp_file = NamedTempFile::new().unwrap();
        let base = NaiveDate::from_ymd_opt(2000, 3, 1).unwrap().num_days_from_ce()
            - UNIX_EPOCH_DAYS_FROM_CE;

        let schema = Arc::new(Schema::new(vec![
            Field::new("date", DataType::Date32, false),
            Field::new("lon", DataType::Float32, false),
            Field::new("lat", DataType::Float32, false),
            Field::new("value", DataType::Float32, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Date32Array::from(
                    rows.iter().map(|r| base + r.0).collect::<Vec<_>>(),
                )),
                Arc::new(Float32Array::from(rows.iter().map(|r| r.1).collect::<Vec<_>>())),
                Arc::new(Float32Array::from(rows.iter().map(|r| r.2).collect::<Vec<_>>())),
                Arc::new(Float32Array::from(rows.iter().map(|r| r.3).collect::<Vec<_>>())),
            ],
        )
        .unwrap();

        let file = File::create(temp_file.path()).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        temp_file
    }

    #[test]
    fn should_load_frames_on_inferred_grid() {
        let file = write_fixture(&[
            (0, 36.0, 0.5, Some(1.0)),
            (0, 36.5, 0.5, Some(2.0)),
            (0, 36.0, 0.0, None),
            (0, 36.5, 0.0, Some(4.0)),
            (1, 36.0, 0.5, Some(5.0)),
        ]);

        let (grid, frames) = load_daily(file.path()).unwrap();

        assert_eq!((grid.width, grid.height), (2, 2));
        assert_eq!(grid.cell, 0.5);
        assert_eq!((grid.origin_lon, grid.origin_lat), (36.0, 0.5));

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].date, NaiveDate::from_ymd_opt(2000, 3, 1).unwrap());
        assert_eq!(frames[0].raster.values, vec![Some(1.0), Some(2.0), None, Some(4.0)]);
        assert_eq!(frames[1].date, NaiveDate::from_ymd_opt(2000, 3, 2).unwrap());
        assert_eq!(frames[1].raster.values, vec![Some(5.0), None, None, None]);
    }

    #[test]
    fn should_reject_single_pixel_collection() {
        let file = write_fixture(&[(0, 36.0, 0.5, Some(1.0)), (1, 36.0, 0.5, Some(2.0))]);

        assert!(matches!(load_daily(file.path()), Err(BackendError::Malformed(_))));
    }
}
