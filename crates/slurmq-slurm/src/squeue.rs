//! Sample the SLURM queue via squeue and count jobs per state and partition.

use crate::source::SlurmCommands;
use crate::types::{JobRecord, JobState, QueueSnapshot};
use slurmq_parsers::{CommandError, non_empty_string, run_command_bytes, split_delimited};
use tokio::process::Command;

/// squeue output format:
/// %A - Job ID
/// %T - State (extended)
/// %r - Reason
/// %P - Partition
const SQUEUE_FORMAT: &str = "%A,%T,%r,%P";

/// Fields required per job line.
const SQUEUE_FIELDS: usize = 4;

/// Reason squeue reports for jobs waiting on another job.
const DEPENDENCY_REASON: &str = "Dependency";

/// Parse a single line of squeue output.
///
/// Extra fields are ignored: a pending job eligible for several partitions
/// prints them comma-separated, and only the first is kept.
pub fn parse_job_line(line: &str) -> Result<JobRecord, String> {
    let fields = split_delimited(line, ',', SQUEUE_FIELDS)?;

    Ok(JobRecord {
        job_id: fields[0].trim().to_string(),
        state: fields[1].trim().to_string(),
        reason: non_empty_string(fields[2]),
        partition: fields[3].trim().to_string(),
    })
}

/// Fold raw squeue output into per-state, per-partition counts.
///
/// Never fails. Lines without a comma or with too few fields are skipped,
/// and unknown state strings are ignored.
pub fn parse_queue_metrics(input: &[u8], partitions: &[String]) -> QueueSnapshot {
    let mut snapshot = QueueSnapshot::new(partitions.iter().cloned());
    let input = String::from_utf8_lossy(input);
    let mut skipped = 0usize;
    let mut unknown = 0usize;

    for line in input.split('\n') {
        if !line.contains(',') {
            continue;
        }

        let job = match parse_job_line(line) {
            Ok(job) => job,
            Err(e) => {
                tracing::debug!("Skipping squeue line: {}", e);
                skipped += 1;
                continue;
            }
        };

        let Some(state) = JobState::from_squeue(&job.state) else {
            unknown += 1;
            continue;
        };

        snapshot.increment(state, &job.partition);
        if state == JobState::Pending && job.reason.as_deref() == Some(DEPENDENCY_REASON) {
            snapshot.increment(JobState::PendingDependency, &job.partition);
        }
    }

    if skipped > 0 || unknown > 0 {
        tracing::debug!(skipped, unknown, "squeue lines not counted");
    }

    snapshot
}

/// Dump every job in every state with squeue, returning raw stdout.
pub async fn sample_queue(commands: &SlurmCommands) -> Result<Vec<u8>, CommandError> {
    let mut cmd = Command::new(&commands.squeue);
    cmd.args(["-a", "-r", "-h", "-o", SQUEUE_FORMAT, "--states=all"]);

    run_command_bytes(&mut cmd, "squeue", commands.timeout).await
}
