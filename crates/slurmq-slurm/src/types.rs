//! SLURM queue types.

use std::collections::BTreeMap;

/// SLURM job state as counted by the exporter.
///
/// `PendingDependency` never comes out of squeue directly: it refines
/// `Pending` for jobs whose reason is `Dependency` and is counted on top of
/// the `Pending` increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobState {
    Pending,
    PendingDependency,
    Running,
    Suspended,
    Cancelled,
    Completing,
    Completed,
    Configuring,
    Failed,
    Timeout,
    Preempted,
    NodeFail,
}

impl JobState {
    /// Every state, in exposition order.
    pub const ALL: [JobState; 12] = [
        JobState::Pending,
        JobState::PendingDependency,
        JobState::Running,
        JobState::Suspended,
        JobState::Cancelled,
        JobState::Completing,
        JobState::Completed,
        JobState::Configuring,
        JobState::Failed,
        JobState::Timeout,
        JobState::Preempted,
        JobState::NodeFail,
    ];

    /// Map an squeue `%T` state string to a state.
    ///
    /// Unknown strings map to `None` and are ignored by the caller, so new
    /// states added by a scheduler upgrade do not break sampling.
    pub fn from_squeue(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobState::Pending),
            "RUNNING" => Some(JobState::Running),
            "SUSPENDED" => Some(JobState::Suspended),
            "CANCELLED" => Some(JobState::Cancelled),
            "COMPLETING" => Some(JobState::Completing),
            "COMPLETED" => Some(JobState::Completed),
            "CONFIGURING" => Some(JobState::Configuring),
            "FAILED" => Some(JobState::Failed),
            "TIMEOUT" => Some(JobState::Timeout),
            "PREEMPTED" => Some(JobState::Preempted),
            "NODE_FAIL" => Some(JobState::NodeFail),
            _ => None,
        }
    }

    /// Gauge family name for this state.
    pub fn metric_name(self) -> &'static str {
        match self {
            JobState::Pending => "slurm_queue_pending",
            JobState::PendingDependency => "slurm_queue_pending_dependency",
            JobState::Running => "slurm_queue_running",
            JobState::Suspended => "slurm_queue_suspended",
            JobState::Cancelled => "slurm_queue_cancelled",
            JobState::Completing => "slurm_queue_completing",
            JobState::Completed => "slurm_queue_completed",
            JobState::Configuring => "slurm_queue_configuring",
            JobState::Failed => "slurm_queue_failed",
            JobState::Timeout => "slurm_queue_timeout",
            JobState::Preempted => "slurm_queue_preempted",
            JobState::NodeFail => "slurm_queue_node_fail",
        }
    }

    /// Help text for this state's gauge family.
    pub fn help(self) -> &'static str {
        match self {
            JobState::Pending => "Pending jobs in queue",
            JobState::PendingDependency => "Pending jobs because of dependency in queue",
            JobState::Running => "Running jobs in the cluster",
            JobState::Suspended => "Suspended jobs in the cluster",
            JobState::Cancelled => "Cancelled jobs in the cluster",
            JobState::Completing => "Completing jobs in the cluster",
            JobState::Completed => "Completed jobs in the cluster",
            JobState::Configuring => "Configuring jobs in the cluster",
            JobState::Failed => "Number of failed jobs",
            JobState::Timeout => "Jobs stopped by timeout",
            JobState::Preempted => "Number of preempted jobs",
            JobState::NodeFail => "Number of jobs stopped due to node fail",
        }
    }
}

/// One job line from squeue. Folded into a [`QueueSnapshot`] and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    /// SLURM job ID
    pub job_id: String,

    /// Raw `%T` state string
    pub state: String,

    /// Pending reason (`%r`), None when squeue reports none
    pub reason: Option<String>,

    /// Partition (`%P`)
    pub partition: String,
}

/// Job counts per state and partition for one sample.
///
/// Dense over the partitions it was created with: every state has an
/// entry for every one of them, zero or not. Partitions first seen in
/// job lines are added on increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    counts: BTreeMap<JobState, BTreeMap<String, u64>>,
}

impl QueueSnapshot {
    /// Zeroed table over all states and the given partitions.
    pub fn new<I, S>(partitions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let zeroed: BTreeMap<String, u64> =
            partitions.into_iter().map(|p| (p.into(), 0)).collect();
        let counts = JobState::ALL
            .iter()
            .map(|state| (*state, zeroed.clone()))
            .collect();
        Self { counts }
    }

    /// Add one job to `state` in `partition`.
    pub fn increment(&mut self, state: JobState, partition: &str) {
        let per_partition = self.counts.entry(state).or_default();
        match per_partition.get_mut(partition) {
            Some(count) => *count += 1,
            None => {
                per_partition.insert(partition.to_string(), 1);
            }
        }
    }

    /// Count for `state` in `partition`; 0 when the pair is absent.
    pub fn count(&self, state: JobState, partition: &str) -> u64 {
        self.counts
            .get(&state)
            .and_then(|p| p.get(partition))
            .copied()
            .unwrap_or(0)
    }

    /// Per-partition counts for one state.
    pub fn partitions(&self, state: JobState) -> impl Iterator<Item = (&str, u64)> {
        self.counts
            .get(&state)
            .into_iter()
            .flat_map(|p| p.iter().map(|(name, count)| (name.as_str(), *count)))
    }

    /// All (state, partition, count) entries in state then partition order.
    pub fn iter(&self) -> impl Iterator<Item = (JobState, &str, u64)> {
        self.counts.iter().flat_map(|(state, per_partition)| {
            per_partition
                .iter()
                .map(move |(name, count)| (*state, name.as_str(), *count))
        })
    }

    /// Total jobs counted across all partitions for one state.
    pub fn total(&self, state: JobState) -> u64 {
        self.partitions(state).map(|(_, count)| count).sum()
    }
}
