//! Save the results table to a parquet file.

use std::{fs::File, path::PathBuf, sync::Arc};

use anyhow::Result;
use arrow::{
    array::{ArrayRef, Float64Array, TimestampSecondArray},
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};

use crate::table::ResultRow;

pub fn save_results(rows: &[ResultRow], file_path: &PathBuf) -> Result<()> {
    let file = File::create(file_path)?;

    let schema = Arc::new(Schema::new(vec![
        Field::new("date", DataType::Timestamp(TimeUnit::Second, None), false),
        Field::new("mean", DataType::Float64, false),
        Field::new("sum", DataType::Float64, false),
    ]));

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let num_rows = rows.len();

    let mut dates = Vec::with_capacity(num_rows);
    let mut means = Vec::with_capacity(num_rows);
    let mut sums = Vec::with_capacity(num_rows);

    for row in rows {
        dates.push(row.date.and_utc().timestamp());
        means.push(row.mean);
        sums.push(row.sum);
    }

    let columns: Vec<(&str, ArrayRef)> = vec![
        ("date", Arc::new(TimestampSecondArray::from(dates))),
        ("mean", Arc::new(Float64Array::from(means))),
        ("sum", Arc::new(Float64Array::from(sums))),
    ];

    let batch = RecordBatch::try_from_iter(columns)?;

    writer.write(&batch)?;

    writer.close()?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::fs;

    use arrow::array::Array;
    use chrono::NaiveDateTime;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::NamedTempFile;

    use super::*;

    fn rows_fixture() -> Vec<ResultRow> {
        ["2018-01-01 17:00:00", "2018-01-03 05:00:00"]
            .iter()
            .enumerate()
            .map(|(i, date)| ResultRow {
                date: NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S").unwrap(),
                mean: 0.25 * (i + 1) as f64,
                sum: 10.0 * (i + 1) as f64,
            })
            .collect()
    }

    #[test]
    fn should_write_schema_and_values() {
        let rows = rows_fixture();
        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path().to_path_buf();

        save_results(&rows, &temp_path).unwrap();

        let file = fs::File::open(&temp_path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();

        let mut total_rows = 0;
        for batch_result in reader {
            let batch = batch_result.unwrap();
            total_rows += batch.num_rows();

            let schema = batch.schema();
            assert_eq!(schema.fields().len(), 3);
            assert_eq!(schema.field(0).name(), "date");
            assert_eq!(schema.field(1).name(), "mean");
            assert_eq!(schema.field(2).name(), "sum");

            let dates = batch
                .column(0)
                .as_any()
                .downcast_ref::<TimestampSecondArray>()
                .unwrap();
            let sums = batch
                .column(2)
                .as_any()
                .downcast_ref::<Float64Array>()
                .unwrap();

            assert_eq!(dates.null_count(), 0);
            assert_eq!(dates.value(0), rows[0].date.and_utc().timestamp());
            assert_eq!(sums.value(1), 20.0);
        }

        assert_eq!(total_rows, 2);
    }

    #[test]
    fn should_write_empty_table() {
        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path().to_path_buf();

        save_results(&[], &temp_path).unwrap();

        assert!(fs::metadata(&temp_path).unwrap().len() > 0);
    }
}
