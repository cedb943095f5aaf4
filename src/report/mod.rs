//! Append-only CSV result files, one per flow per process run.

use crate::flows::FlowResult;
use chrono::Local;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

/// Display format for hop start times (always UTC).
pub const START_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Format of the run stamp embedded in result file names.
pub const RUN_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const FIELDS: [&str; 4] = ["start_time", "response_duration", "response_code", "response_reason"];

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to open result file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write result row to {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Flatten a flow result into `{hop}.{field}` columns, hops in recorded order.
pub fn flatten(flow: &FlowResult) -> Vec<(String, String)> {
    let mut row = Vec::with_capacity(flow.len() * FIELDS.len());
    for (hop, r) in flow.iter() {
        let values = [
            r.start_time.format(START_TIME_FORMAT).to_string(),
            format!("{:.3}", r.duration),
            r.status_code.to_string(),
            r.reason.clone(),
        ];
        for (field, value) in FIELDS.iter().zip(values) {
            row.push((format!("{}.{}", hop, field), value));
        }
    }
    row
}

/// Writes flow results to `{output_dir}/{basename}_{run_stamp}.csv`.
///
/// The header is written only when the file does not exist yet. Rows are
/// written in their own column order, so a file must only ever receive one
/// hop set or later rows will not line up with the header.
pub struct Recorder {
    output_dir: PathBuf,
    run_stamp: String,
    /// Header written per file by this process; also serializes writes.
    headers: Mutex<HashMap<PathBuf, Vec<String>>>,
}

impl Recorder {
    /// Recorder stamped with the current local time.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::with_run_stamp(output_dir, Local::now().format(RUN_STAMP_FORMAT).to_string())
    }

    pub fn with_run_stamp(output_dir: impl Into<PathBuf>, run_stamp: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            run_stamp: run_stamp.into(),
            headers: Mutex::new(HashMap::new()),
        }
    }

    pub fn output_path(&self, basename: &str) -> PathBuf {
        self.output_dir.join(format!("{}_{}.csv", basename, self.run_stamp))
    }

    /// Append one row for `flow`. Returns the file written.
    pub fn record(&self, flow: &FlowResult, basename: &str) -> Result<PathBuf, RecordError> {
        let path = self.output_path(basename);
        let (columns, values): (Vec<String>, Vec<String>) = flatten(flow).into_iter().unzip();

        let mut headers = self.headers.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let write_header = !path.exists();

        append_row(&path, write_header.then_some(&columns), &values)?;

        if write_header {
            headers.insert(path.clone(), columns);
        } else if let Some(header) = headers.get(&path) {
            if *header != columns {
                warn!(path = %path.display(), "Row columns differ from file header; row will be misaligned");
            }
        }

        Ok(path)
    }
}

fn append_row(path: &Path, header: Option<&Vec<String>>, values: &[String]) -> Result<(), RecordError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| RecordError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let csv_err = |source| RecordError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if let Some(header) = header {
        writer.write_record(header).map_err(csv_err)?;
    }
    writer.write_record(values).map_err(csv_err)?;
    writer.flush().map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
