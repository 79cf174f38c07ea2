//! Prometheus exposition of SLURM queue counts.
//!
//! [`QueueCollector`] implements the describe/collect halves of
//! `prometheus::core::Collector`; the helpers below register it and
//! render a registry in the text exposition format.

pub mod collector;

pub use collector::{PARTITION_LABEL, QueueCollector};

use prometheus::{Encoder, Registry, TextEncoder};
use slurmq_slurm::QueueSource;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Failed to register collector: {0}")]
    Register(#[source] prometheus::Error),
    #[error("Failed to encode metrics: {0}")]
    Encode(#[source] prometheus::Error),
    #[error("Encoded metrics are not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Register a queue collector with `registry`.
pub fn register<S: QueueSource>(
    registry: &Registry,
    collector: QueueCollector<S>,
) -> Result<(), CollectorError> {
    registry
        .register(Box::new(collector))
        .map_err(CollectorError::Register)
}

/// Gather `registry` and render it in the text exposition format.
///
/// Gathering runs every registered collector, which for a
/// [`QueueCollector`] means running sinfo and squeue. Call from a blocking
/// context.
pub fn encode_text(registry: &Registry) -> Result<String, CollectorError> {
    let families = registry.gather();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&families, &mut buffer)
        .map_err(CollectorError::Encode)?;
    Ok(String::from_utf8(buffer)?)
}

/// Content type of [`encode_text`] output.
pub fn text_content_type() -> String {
    TextEncoder::new().format_type().to_string()
}
