//! Prometheus collector that samples the queue on every scrape.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};
use slurmq_slurm::{JobState, QueueSnapshot, QueueSource, SlurmCli, sample_snapshot};
use std::collections::HashMap;
use tokio::runtime::Handle;

/// The only label carried by the queue gauges.
pub const PARTITION_LABEL: &str = "partition";

/// Exposes one gauge family per [`JobState`], labelled by partition.
///
/// Descriptors are built once in [`QueueCollector::new`]. Each call to
/// `collect` runs a fresh sinfo/squeue sample on the runtime behind
/// `handle` and blocks until it finishes, so `collect` must be called from
/// outside the runtime's worker threads (for example via
/// `tokio::task::spawn_blocking`). The handle must belong to a
/// multi-threaded runtime; a current-thread runtime cannot drive the
/// process and timer drivers from `Handle::block_on`.
pub struct QueueCollector<S: QueueSource = SlurmCli> {
    source: S,
    handle: Handle,
    descs: Vec<(JobState, Desc)>,
}

impl<S: QueueSource> QueueCollector<S> {
    pub fn new(source: S, handle: Handle) -> prometheus::Result<Self> {
        let descs = JobState::ALL
            .iter()
            .map(|state| {
                Desc::new(
                    state.metric_name().to_string(),
                    state.help().to_string(),
                    vec![PARTITION_LABEL.to_string()],
                    HashMap::new(),
                )
                .map(|desc| (*state, desc))
            })
            .collect::<prometheus::Result<Vec<_>>>()?;

        Ok(Self {
            source,
            handle,
            descs,
        })
    }

    /// Turn a snapshot into gauge families, one per state.
    ///
    /// Every (state, partition) entry in the snapshot becomes one sample.
    pub fn families(&self, snapshot: &QueueSnapshot) -> Vec<MetricFamily> {
        let mut families = Vec::with_capacity(self.descs.len());

        for (state, _) in &self.descs {
            let gauges = match GaugeVec::new(
                Opts::new(state.metric_name(), state.help()),
                &[PARTITION_LABEL],
            ) {
                Ok(gauges) => gauges,
                Err(e) => {
                    tracing::error!("Failed to build gauge {}: {}", state.metric_name(), e);
                    continue;
                }
            };

            for (partition, count) in snapshot.partitions(*state) {
                gauges.with_label_values(&[partition]).set(count as f64);
            }

            families.extend(gauges.collect());
        }

        families
    }
}

impl<S: QueueSource> Collector for QueueCollector<S> {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().map(|(_, desc)| desc).collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        match self.handle.block_on(sample_snapshot(&self.source)) {
            Ok(snapshot) => self.families(&snapshot),
            Err(e) => {
                tracing::error!("Queue sample failed, skipping scrape: {}", e);
                Vec::new()
            }
        }
    }
}

impl<S: QueueSource> std::fmt::Debug for QueueCollector<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueCollector")
            .field("families", &self.descs.len())
            .finish()
    }
}
