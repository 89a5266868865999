//! # Document Pipeline
//!
//! Explicit job state for chunking documents, persisted through a
//! [`RecordStore`] instead of process-local maps. A failed run clears any
//! partial records so the document reads as unprocessed and can be retried.
use crate::chunking::record::Record;
use crate::chunking::Strategy;
use crate::spreadsheet::criteria::Criteria;
use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

/// Errors of the job state machine.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Job '{0}' cannot move from {1:?} to {2:?}")]
    InvalidTransition(String, JobStatus, JobStatus),
}

/// Processing state of one document.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Waiting,
    Processing,
    Success,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    /// Waiting or finished jobs may start; only a running job may finish.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (Self::Waiting, Self::Processing) => true,
            (Self::Processing, Self::Success | Self::Error) => true,
            (Self::Success | Self::Error, Self::Processing) => true,
            _ => false,
        }
    }
}

/// Job state of one document as kept by the store.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JobRecord {
    pub document_id: String,
    pub status: JobStatus,
    pub strategy: Strategy,
    pub record_count: usize,
    /// Failure message of the last run
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(document_id: &str, strategy: Strategy) -> Self {
        JobRecord {
            document_id: document_id.to_owned(),
            status: JobStatus::Waiting,
            strategy,
            record_count: 0,
            message: None,
            updated_at: Utc::now(),
        }
    }

    /// Moves to `next`, rejecting transitions the state machine does not allow
    pub fn transition(&mut self, next: JobStatus) -> Result<(), PipelineError> {
        if !self.status.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition(self.document_id.to_owned(), self.status, next));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Storage collaborator for job state and records, keyed by document id.
pub trait RecordStore {
    fn save_job(&self, job: &JobRecord) -> Result<()>;

    fn load_job(&self, document_id: &str) -> Result<Option<JobRecord>>;

    /// Replaces the records of a document
    fn save_records(&self, document_id: &str, records: Vec<Record>) -> Result<()>;

    fn load_records(&self, document_id: &str) -> Result<Vec<Record>>;

    fn clear_records(&self, document_id: &str) -> Result<()>;
}

/// In-memory store for tests and single-process hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: Mutex<HashMap<String, JobRecord>>,
    records: Mutex<HashMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("Memory store lock poisoned")
}

impl RecordStore for MemoryStore {
    fn save_job(&self, job: &JobRecord) -> Result<()> {
        self.jobs.lock().map_err(poisoned)?.insert(job.document_id.to_owned(), job.clone());
        Ok(())
    }

    fn load_job(&self, document_id: &str) -> Result<Option<JobRecord>> {
        Ok(self.jobs.lock().map_err(poisoned)?.get(document_id).cloned())
    }

    fn save_records(&self, document_id: &str, records: Vec<Record>) -> Result<()> {
        self.records.lock().map_err(poisoned)?.insert(document_id.to_owned(), records);
        Ok(())
    }

    fn load_records(&self, document_id: &str) -> Result<Vec<Record>> {
        Ok(self.records.lock().map_err(poisoned)?.get(document_id).cloned().unwrap_or_default())
    }

    fn clear_records(&self, document_id: &str) -> Result<()> {
        self.records.lock().map_err(poisoned)?.remove(document_id);
        Ok(())
    }
}

/// Chunks documents and records the outcome in a store.
pub struct Pipeline<S: RecordStore> {
    store: S,
    criteria: Criteria,
}

impl<S: RecordStore> Pipeline<S> {
    pub fn new(store: S, criteria: Criteria) -> Self {
        Pipeline { store, criteria }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Chunks the file at `path` as document `document_id`.
    pub fn process<P: AsRef<Path>>(&self, document_id: &str, path: P, strategy: Strategy) -> Result<JobRecord> {
        self.run(document_id, strategy, |criteria| crate::chunk_file(path, strategy, criteria))
    }

    /// Chunks uploaded content as document `document_id`.
    pub fn process_bytes(&self, document_id: &str, file_name: &str, bytes: Vec<u8>, strategy: Strategy) -> Result<JobRecord> {
        self.run(document_id, strategy, |criteria| crate::chunk_bytes(file_name, bytes, strategy, criteria))
    }

    fn run<F>(&self, document_id: &str, strategy: Strategy, chunk: F) -> Result<JobRecord>
    where
        F: FnOnce(&Criteria) -> Result<Vec<Record>, crate::ChunkerError>,
    {
        let mut job = self.store
            .load_job(document_id)
            .with_context(|| format!("Failed to load job '{document_id}'"))?
            .unwrap_or_else(|| JobRecord::new(document_id, strategy));
        job.strategy = strategy;
        job.transition(JobStatus::Processing)?;
        self.store.save_job(&job).with_context(|| format!("Failed to save job '{document_id}'"))?;
        tracing::info!(document_id, strategy = %strategy, "Processing document");

        match self.chunk_and_store(document_id, &mut job, chunk) {
            Ok(()) => {
                tracing::info!(document_id, records = job.record_count, "Document processed");
                Ok(job)
            }
            Err(error) => {
                tracing::warn!(document_id, error = %error, "Document processing failed");
                self.fail(&mut job, &error);
                Err(error.context(format!("Failed to chunk document '{document_id}'")))
            }
        }
    }

    /// Everything that may fail once the job is marked as processing
    fn chunk_and_store<F>(&self, document_id: &str, job: &mut JobRecord, chunk: F) -> Result<()>
    where
        F: FnOnce(&Criteria) -> Result<Vec<Record>, crate::ChunkerError>,
    {
        let records = chunk(&self.criteria)?;
        let count = records.len();
        self.store
            .save_records(document_id, records)
            .with_context(|| format!("Failed to save records of '{document_id}'"))?;
        let mut done = job.clone();
        done.record_count = count;
        done.message = None;
        done.transition(JobStatus::Success)?;
        self.store.save_job(&done).with_context(|| format!("Failed to save job '{document_id}'"))?;
        *job = done;
        Ok(())
    }

    /// Moves the job to `Error` so it can be retried; store failures here are only logged.
    fn fail(&self, job: &mut JobRecord, error: &anyhow::Error) {
        let document_id = job.document_id.to_owned();
        if let Err(clear_error) = self.store.clear_records(&document_id) {
            tracing::warn!(document_id, error = %clear_error, "Failed to clear partial records");
        }
        job.record_count = 0;
        job.message = Some(format!("{error:#}"));
        let saved = job
            .transition(JobStatus::Error)
            .map_err(anyhow::Error::new)
            .and_then(|()| self.store.save_job(job));
        if let Err(save_error) = saved {
            tracing::warn!(document_id, error = %save_error, "Failed to save failed job");
        }
    }
}
