//! SLURM integration for slurmq.
//!
//! List partitions via sinfo, dump the queue via squeue, and fold the
//! result into per-state, per-partition job counts.

pub mod sinfo;
pub mod source;
pub mod squeue;
pub mod types;

pub use slurmq_parsers::CommandError;
pub use sinfo::{list_partitions, parse_partitions};
pub use source::{
    DEFAULT_COMMAND_TIMEOUT, QueueSource, SampleError, SlurmCli, SlurmCommands, sample_snapshot,
};
pub use squeue::{parse_job_line, parse_queue_metrics, sample_queue};
pub use types::{JobRecord, JobState, QueueSnapshot};
