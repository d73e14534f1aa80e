//! The ingestion pipeline.
//!
//! One invocation runs four stages against a single [`FileLocator`]:
//!
//! ```text
//! head_size ─▶ size guard ─▶ get_bytes ─▶ parse_csv ─▶ derive + put
//!                 │              │            │             │
//!             Rejected(400)  Failed(500)  Rejected(400)  Failed(500)
//! ```
//!
//! Each stage returns a `Result`; the first error ends the invocation and is
//! mapped to an [`Outcome`]. Nothing is retried, and the metadata store is
//! only written once every earlier stage has succeeded.

use std::sync::Arc;

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::event::locator_from_event;
use crate::models::{FileLocator, InvocationResponse, MetadataRecord, Outcome, TabularDataset};
use crate::tabular::{self, TabularError};
use crate::traits::{Clock, MetadataStore, ObjectStore, SystemClock};

/// Largest object the pipeline will read: 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Table that receives metadata records.
pub const DEFAULT_TABLE: &str = "csv_metadata";

/// Format of [`MetadataRecord::upload_timestamp`].
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Tunables for [`IngestPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub max_file_size_bytes: u64,
    pub table: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_file_size_bytes: config.pipeline.max_file_size_bytes,
            table: config.pipeline.table.clone(),
        }
    }
}

/// Stage failure. Converted into an [`Outcome`] at the pipeline boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The triggering event could not be turned into a locator.
    #[error("{0:#}")]
    Event(anyhow::Error),

    /// The metadata-only size lookup failed.
    #[error("size lookup for {locator} failed: {cause:#}")]
    Lookup {
        locator: FileLocator,
        cause: anyhow::Error,
    },

    #[error("File size {size} bytes exceeds maximum allowed size of {max} bytes")]
    Oversize { size: u64, max: u64 },

    #[error("failed to fetch {locator}: {cause:#}")]
    Fetch {
        locator: FileLocator,
        cause: anyhow::Error,
    },

    #[error(transparent)]
    Parse(#[from] TabularError),

    #[error("failed to store metadata for '{filename}' in table '{table}': {cause:#}")]
    Store {
        filename: String,
        table: String,
        cause: anyhow::Error,
    },

    /// The invocation task panicked.
    #[error("invocation aborted: {0}")]
    Aborted(String),
}

impl PipelineError {
    /// Whether the uploaded data (not the environment) is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::Oversize { .. } | PipelineError::Parse(_))
    }

    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }

    /// Reason text reported to the invoker.
    pub fn reason(&self) -> String {
        match self {
            PipelineError::Oversize { .. } => self.to_string(),
            PipelineError::Parse(e) => format!("Error parsing CSV file: {}", e),
            _ => format!("Error processing CSV file: {}", self),
        }
    }

    pub fn into_outcome(self) -> Outcome {
        let reason = self.reason();
        if self.is_client_error() {
            Outcome::Rejected(reason)
        } else {
            Outcome::Failed(reason)
        }
    }
}

/// Reject sizes above `max`. A size equal to `max` is accepted.
pub fn check_size(size: u64, max: u64) -> Result<(), PipelineError> {
    if size > max {
        return Err(PipelineError::Oversize { size, max });
    }
    Ok(())
}

/// Build the metadata record for a parsed file.
pub fn derive_metadata(
    locator: &FileLocator,
    file_size_bytes: u64,
    dataset: &TabularDataset,
    now: NaiveDateTime,
) -> MetadataRecord {
    MetadataRecord {
        filename: locator.key.clone(),
        upload_timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
        file_size_bytes,
        row_count: dataset.row_count as u64,
        column_count: dataset.column_count() as u64,
        column_names: dataset.columns.clone(),
    }
}

/// Validates one uploaded file and records its metadata.
///
/// Collaborators are injected so the same pipeline runs against S3 and
/// SQLite in production and against in-memory doubles in tests.
pub struct IngestPipeline {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    clock: Arc<dyn Clock>,
    options: PipelineOptions,
}

impl IngestPipeline {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            objects,
            metadata,
            clock: Arc::new(SystemClock),
            options,
        }
    }

    /// Replace the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn metadata_store(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    /// Run all stages, stopping at the first failure.
    pub async fn run(&self, locator: &FileLocator) -> Result<MetadataRecord, PipelineError> {
        let size = self
            .objects
            .head_size(locator)
            .await
            .map_err(|cause| PipelineError::Lookup {
                locator: locator.clone(),
                cause,
            })?;

        check_size(size, self.options.max_file_size_bytes)?;

        let bytes = self
            .objects
            .get_bytes(locator)
            .await
            .map_err(|cause| PipelineError::Fetch {
                locator: locator.clone(),
                cause,
            })?;

        let dataset = tabular::parse_csv(&bytes)?;

        let record = derive_metadata(locator, size, &dataset, self.clock.now());
        info!(
            rows = record.row_count,
            columns = record.column_count,
            "Extracted metadata: {}",
            serde_json::to_string(&record).unwrap_or_default()
        );

        self.metadata
            .put(&self.options.table, &record.to_item())
            .await
            .map_err(|cause| PipelineError::Store {
                filename: record.filename.clone(),
                table: self.options.table.clone(),
                cause,
            })?;

        info!(table = %self.options.table, "Metadata for {} successfully stored", record.filename);
        Ok(record)
    }

    /// Run the pipeline for one locator and classify the result.
    pub async fn process(&self, locator: &FileLocator) -> Outcome {
        let span = tracing::info_span!(
            "invocation",
            request_id = %Uuid::new_v4(),
            store = self.objects.name(),
        );

        async {
            info!(bucket = %locator.bucket, key = %locator.key, "Processing file: {} from bucket: {}", locator.key, locator.bucket);
            match self.run(locator).await {
                Ok(record) => Outcome::Success(record),
                Err(err) => report(err),
            }
        }
        .instrument(span)
        .await
    }

    /// Decode an event notification, process its first record, and build the
    /// invocation response.
    pub async fn handle_event(&self, event: &serde_json::Value) -> InvocationResponse {
        let outcome = match locator_from_event(event) {
            Ok(locator) => self.process(&locator).await,
            Err(e) => report(PipelineError::Event(e)),
        };
        outcome.into()
    }

    /// [`handle_event`](Self::handle_event) on its own task, so a panic in a
    /// collaborator still yields a 500 response.
    pub async fn invoke(self: Arc<Self>, event: serde_json::Value) -> InvocationResponse {
        contain(tokio::spawn(async move { self.handle_event(&event).await })).await
    }

    /// [`process`](Self::process) for a known locator, behind the same panic
    /// boundary as [`invoke`](Self::invoke).
    pub async fn invoke_locator(self: Arc<Self>, locator: FileLocator) -> InvocationResponse {
        contain(tokio::spawn(async move {
            InvocationResponse::from(self.process(&locator).await)
        }))
        .await
    }
}

async fn contain(task: tokio::task::JoinHandle<InvocationResponse>) -> InvocationResponse {
    match task.await {
        Ok(response) => response,
        Err(join_err) => report(PipelineError::Aborted(join_err.to_string())).into(),
    }
}

/// Response for an event that never reached the pipeline (e.g. invalid JSON).
pub fn event_error_response(err: anyhow::Error) -> InvocationResponse {
    report(PipelineError::Event(err)).into()
}

fn report(err: PipelineError) -> Outcome {
    let outcome = err.into_outcome();
    match &outcome {
        Outcome::Rejected(reason) => error!(status = 400, "{}", reason),
        Outcome::Failed(reason) => error!(status = 500, "{}", reason),
        Outcome::Success(_) => {}
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_check_size_boundary() {
        assert!(check_size(DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_FILE_SIZE).is_ok());
        assert!(check_size(0, DEFAULT_MAX_FILE_SIZE).is_ok());
        let err = check_size(DEFAULT_MAX_FILE_SIZE + 1, DEFAULT_MAX_FILE_SIZE).unwrap_err();
        assert_eq!(
            err.reason(),
            "File size 10485761 bytes exceeds maximum allowed size of 10485760 bytes"
        );
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_derive_metadata() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 30)
            .unwrap();
        let ds = TabularDataset {
            columns: vec!["a".into(), "b".into()],
            row_count: 2,
        };
        let rec = derive_metadata(&FileLocator::new("bkt", "data/sample.csv"), 13, &ds, now);
        assert_eq!(rec.filename, "data/sample.csv");
        assert_eq!(rec.upload_timestamp, "2024-03-09 07:05:30");
        assert_eq!(rec.file_size_bytes, 13);
        assert_eq!(rec.row_count, 2);
        assert_eq!(rec.column_count, 2);
        assert_eq!(rec.column_names, vec!["a", "b"]);
    }

    #[test]
    fn test_error_classification() {
        let parse = PipelineError::from(TabularError::NoColumns);
        assert!(parse.is_client_error());
        assert_eq!(
            parse.reason(),
            "Error parsing CSV file: No columns to parse from file"
        );

        let fetch = PipelineError::Fetch {
            locator: FileLocator::new("b", "k.csv"),
            cause: anyhow::anyhow!("connection refused"),
        };
        assert_eq!(fetch.status_code(), 500);
        assert_eq!(
            fetch.reason(),
            "Error processing CSV file: failed to fetch s3://b/k.csv: connection refused"
        );
        assert!(matches!(fetch.into_outcome(), Outcome::Failed(_)));
    }

    #[test]
    fn test_cause_chain_in_reason() {
        let cause = anyhow::anyhow!("disk I/O error").context("insert failed");
        let err = PipelineError::Store {
            filename: "x.csv".into(),
            table: "csv_metadata".into(),
            cause,
        };
        let reason = err.reason();
        assert!(reason.contains("insert failed: disk I/O error"), "{}", reason);
    }
}
