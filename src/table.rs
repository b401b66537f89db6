//! Date-indexed results table, persisted as CSV across runs.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use tracing::{debug, info};

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const HEADER: [&str; 3] = ["Date", "mean", "sum"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultRow {
    pub date: NaiveDateTime,
    pub mean: f64,
    pub sum: f64,
}

#[derive(Debug, Clone)]
/// Results keyed by bucket time. Tracks whether it differs from disk.
pub struct ResultTable {
    path: PathBuf,
    rows: BTreeMap<NaiveDateTime, ResultRow>,
    dirty: bool,
    writes: usize,
}

impl ResultTable {
    /// Loads the table at `path`, or starts an empty one if there is none.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let mut table = ResultTable {
            path: path.to_path_buf(),
            rows: BTreeMap::new(),
            dirty: false,
            writes: 0,
        };

        if !path.exists() {
            debug!("No results table at {}, starting empty", path.display());
            return Ok(table);
        }

        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Could not open results table {}", path.display()))?;

        let headers = reader.headers()?.clone();
        if headers.iter().collect::<Vec<_>>() != HEADER {
            bail!(
                "Results table {} has header {:?}, expected {:?}",
                path.display(),
                headers,
                HEADER
            );
        }

        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let row = parse_row(&record)
                .with_context(|| format!("Bad row {} in {}", line + 2, path.display()))?;
            table.rows.insert(row.date, row);
        }

        debug!("Loaded {} rows from {}", table.rows.len(), path.display());

        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of times `save` wrote the file.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn get(&self, date: &NaiveDateTime) -> Option<&ResultRow> {
        self.rows.get(date)
    }

    pub fn rows(&self) -> impl Iterator<Item = &ResultRow> {
        self.rows.values()
    }

    /// Inserts or replaces the row for `row.date`.
    pub fn upsert(&mut self, row: ResultRow) {
        let unchanged = self.rows.get(&row.date).is_some_and(|old| same_row(old, &row));
        if !unchanged {
            self.rows.insert(row.date, row);
            self.dirty = true;
        }
    }

    pub fn remove(&mut self, date: &NaiveDateTime) -> Option<ResultRow> {
        let removed = self.rows.remove(date);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Writes the table if anything changed since the last load or save.
    ///
    /// Returns whether the file was written.
    pub fn save(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(&self.path)
            .with_context(|| format!("Could not write results table {}", self.path.display()))?;
        writer.write_record(HEADER)?;
        for row in self.rows.values() {
            writer.write_record([
                row.date.format(DATE_FORMAT).to_string(),
                row.mean.to_string(),
                row.sum.to_string(),
            ])?;
        }
        writer.flush()?;

        self.dirty = false;
        self.writes += 1;
        info!("Saved {} rows to {}", self.rows.len(), self.path.display());

        Ok(true)
    }
}

fn parse_row(record: &csv::StringRecord) -> Result<ResultRow> {
    let field = |i: usize| record.get(i).context("missing field");

    Ok(ResultRow {
        date: NaiveDateTime::parse_from_str(field(0)?, DATE_FORMAT)?,
        mean: field(1)?.parse()?,
        sum: field(2)?.parse()?,
    })
}

fn same_row(a: &ResultRow, b: &ResultRow) -> bool {
    a.date == b.date && a.mean.to_bits() == b.mean.to_bits() && a.sum.to_bits() == b.sum.to_bits()
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn row(date: &str, mean: f64, sum: f64) -> ResultRow {
        ResultRow {
            date: NaiveDateTime::parse_from_str(date, DATE_FORMAT).unwrap(),
            mean,
            sum,
        }
    }

    #[test]
    fn should_start_empty_without_file() {
        let dir = TempDir::new().unwrap();
        let table = ResultTable::load_or_default(&dir.path().join("results.csv")).unwrap();

        assert!(table.is_empty());
        assert!(!table.is_dirty());
    }

    #[test]
    fn should_persist_rows_in_date_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");

        let mut table = ResultTable::load_or_default(&path).unwrap();
        table.upsert(row("2018-01-03 05:00:00", 0.5, 10.0));
        table.upsert(row("2018-01-01 17:00:00", 0.25, 4.0));
        assert!(table.save().unwrap());

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "Date,mean,sum\n2018-01-01 17:00:00,0.25,4\n2018-01-03 05:00:00,0.5,10\n"
        );

        let reloaded = ResultTable::load_or_default(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.rows().next(), Some(&row("2018-01-01 17:00:00", 0.25, 4.0)));
    }

    #[test]
    fn should_replace_existing_row() {
        let dir = TempDir::new().unwrap();
        let mut table = ResultTable::load_or_default(&dir.path().join("r.csv")).unwrap();

        table.upsert(row("2018-01-01 17:00:00", 0.25, 4.0));
        table.upsert(row("2018-01-01 17:00:00", 0.5, 8.0));

        assert_eq!(table.len(), 1);
        assert_eq!(table.rows().next().unwrap().sum, 8.0);
    }

    #[test]
    fn should_not_write_when_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");

        let mut table = ResultTable::load_or_default(&path).unwrap();
        table.upsert(row("2018-01-01 17:00:00", 0.25, 4.0));
        table.save().unwrap();

        let mut table = ResultTable::load_or_default(&path).unwrap();
        table.upsert(row("2018-01-01 17:00:00", 0.25, 4.0));
        assert!(!table.is_dirty());
        assert!(!table.save().unwrap());
        assert_eq!(table.writes(), 0);
    }

    #[test]
    fn should_remove_row() {
        let dir = TempDir::new().unwrap();
        let mut table = ResultTable::load_or_default(&dir.path().join("r.csv")).unwrap();
        let date = row("2018-01-01 17:00:00", 0.0, 0.0).date;

        assert!(table.remove(&date).is_none());
        assert!(!table.is_dirty());

        table.upsert(row("2018-01-01 17:00:00", 0.0, 0.0));
        table.save().unwrap();
        assert!(table.remove(&date).is_some());
        assert!(table.is_dirty());
    }

    #[test]
    fn should_reject_foreign_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");
        fs::write(&path, "when,value\n2018-01-01,1\n").unwrap();

        assert!(ResultTable::load_or_default(&path).is_err());
    }
}
