use std::{
    collections::VecDeque,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::NaiveDate;
use decoder::RawRow;
use flate2::read::GzDecoder;
use serde::Deserialize;

use crate::{Batch, ConnectorError, SourceAdapter, DEFAULT_BATCH_SIZE};

/// One row as it appears in a historical `YYYY-MM-DD*<vehicle>.csv.gz` blob,
/// mirroring the raw-row shape of the source adapter contract. `raw_data` is
/// hex-encoded, same as the live broker payload.
#[derive(Debug, Deserialize)]
struct HistoricalCsvRow {
    #[allow(dead_code)]
    message_type: String,
    #[allow(dead_code)]
    ntp_timestamp: String,
    #[allow(dead_code)]
    ntp_ok: bool,
    #[allow(dead_code)]
    eke_timestamp: String,
    mqtt_timestamp: chrono::DateTime<chrono::Utc>,
    mqtt_topic: String,
    raw_data: String,
}

/// Streams gzip-compressed, newline-delimited-CSV blobs named
/// `YYYY-MM-DD*<vehicle>.csv.gz` from a local directory, batching rows
/// before handing them to the pipeline (`BYTEWAX_BATCH_SIZE`).
pub struct HistoricalBackfillAdapter {
    vehicle: String,
    batch_size: usize,
    pending_files: VecDeque<PathBuf>,
    current: Option<csv::Reader<GzDecoder<BufReader<File>>>>,
}

impl HistoricalBackfillAdapter {
    pub fn new(
        directory: &Path,
        vehicle: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        batch_size: Option<usize>,
    ) -> Result<Self, ConnectorError> {
        if !directory.is_dir() {
            return Err(ConnectorError::MissingDirectory(
                directory.display().to_string(),
            ));
        }

        let suffix = format!("{vehicle}.csv.gz");
        let mut files: Vec<PathBuf> = std::fs::read_dir(directory)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.ends_with(&suffix)))
            .filter(|path| blob_date(path).map_or(true, |d| within_range(d, start_date, end_date)))
            .collect();
        files.sort();

        log::info!(
            "backfill adapter for vehicle {vehicle}: {} matching blob(s) in {}",
            files.len(),
            directory.display()
        );

        Ok(Self {
            vehicle: vehicle.to_string(),
            batch_size: batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            pending_files: files.into(),
            current: None,
        })
    }

    fn advance_file(&mut self) -> Result<bool, ConnectorError> {
        let Some(path) = self.pending_files.pop_front() else {
            self.current = None;
            return Ok(false);
        };
        log::info!("opening backfill blob {}", path.display());
        let file = File::open(&path)?;
        let decoder = GzDecoder::new(BufReader::new(file));
        self.current = Some(csv::Reader::from_reader(decoder));
        Ok(true)
    }
}

#[async_trait]
impl SourceAdapter for HistoricalBackfillAdapter {
    async fn next_batch(&mut self) -> Result<Option<Batch>, ConnectorError> {
        let mut batch: Batch = Vec::new();

        loop {
            if self.current.is_none() && !self.advance_file()? {
                break;
            }

            let reader = self.current.as_mut().unwrap();
            for record in reader.deserialize::<HistoricalCsvRow>() {
                let row = record?;
                batch.push((
                    self.vehicle.clone(),
                    RawRow {
                        mqtt_topic: row.mqtt_topic,
                        mqtt_timestamp: row.mqtt_timestamp,
                        raw_hex: row.raw_data,
                    },
                ));
                if batch.len() >= self.batch_size {
                    return Ok(Some(batch));
                }
            }
            // this file's rows are all consumed; move on to the next blob.
            self.current = None;
        }

        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }

    async fn ack(&mut self, batch: &Batch) -> Result<(), ConnectorError> {
        log::debug!("acked backfill batch of {} row(s)", batch.len());
        Ok(())
    }
}

fn blob_date(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let prefix = name.get(0..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

fn within_range(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_errors() {
        let result = HistoricalBackfillAdapter::new(
            Path::new("/nonexistent/path/for/eke/backfill"),
            "12",
            None,
            None,
            None,
        );
        assert!(matches!(result, Err(ConnectorError::MissingDirectory(_))));
    }

    #[test]
    fn blob_date_parses_prefix() {
        let path = Path::new("2024-05-01_south_12.csv.gz");
        assert_eq!(
            blob_date(path),
            Some(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
        );
    }
}
