//! Where queue samples come from.

use crate::sinfo::list_partitions;
use crate::squeue::{parse_queue_metrics, sample_queue};
use crate::types::QueueSnapshot;
use slurmq_parsers::CommandError;
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default upper bound for a single sinfo/squeue invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum SampleError {
    #[error("Failed to list partitions: {0}")]
    Partitions(#[source] CommandError),
    #[error("Failed to sample queue: {0}")]
    Queue(#[source] CommandError),
}

/// Programs and limits used to query SLURM.
#[derive(Debug, Clone)]
pub struct SlurmCommands {
    /// Partition-listing program
    pub sinfo: PathBuf,
    /// Job-listing program
    pub squeue: PathBuf,
    /// Limit for each command; the child is killed on expiry
    pub timeout: Duration,
}

impl Default for SlurmCommands {
    fn default() -> Self {
        Self {
            sinfo: PathBuf::from("sinfo"),
            squeue: PathBuf::from("squeue"),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// Source of partition listings and raw queue dumps.
pub trait QueueSource: Send + Sync + 'static {
    fn list_partitions(&self) -> impl Future<Output = Result<Vec<String>, CommandError>> + Send;

    fn sample_queue(&self) -> impl Future<Output = Result<Vec<u8>, CommandError>> + Send;
}

/// Queries the local SLURM installation through its CLI tools.
#[derive(Debug, Clone, Default)]
pub struct SlurmCli {
    commands: SlurmCommands,
}

impl SlurmCli {
    pub fn new(commands: SlurmCommands) -> Self {
        Self { commands }
    }
}

impl QueueSource for SlurmCli {
    async fn list_partitions(&self) -> Result<Vec<String>, CommandError> {
        list_partitions(&self.commands).await
    }

    async fn sample_queue(&self) -> Result<Vec<u8>, CommandError> {
        sample_queue(&self.commands).await
    }
}

/// Take one fresh sample: partitions, then the queue, then parse.
///
/// The two commands run one after the other, so a partition created or
/// removed in between can leave the dense key set out of step with the job
/// lines. The next sample picks the change up.
pub async fn sample_snapshot<S: QueueSource>(source: &S) -> Result<QueueSnapshot, SampleError> {
    let started = Instant::now();

    let partitions = source
        .list_partitions()
        .await
        .map_err(SampleError::Partitions)?;
    let raw = source.sample_queue().await.map_err(SampleError::Queue)?;
    let snapshot = parse_queue_metrics(&raw, &partitions);

    tracing::debug!(
        partitions = partitions.len(),
        bytes = raw.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "sampled queue"
    );

    Ok(snapshot)
}
