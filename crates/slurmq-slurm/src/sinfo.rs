//! Discover SLURM partitions via sinfo.

use crate::source::SlurmCommands;
use slurmq_parsers::{CommandError, run_command};
use tokio::process::Command;

/// sinfo output format: `%P` - partition name, default partition suffixed with `*`.
const SINFO_FORMAT: &str = "%P";

/// Parse `sinfo --noheader -o %P` output into partition names.
///
/// Strips the default-partition marker and surrounding whitespace, keeps
/// the order sinfo printed, and drops blank lines.
pub fn parse_partitions(output: &str) -> Vec<String> {
    output
        .split('\n')
        .map(|line| {
            let line = line.trim_end_matches(['\r', ' ', '\t']);
            line.strip_suffix('*').unwrap_or(line).trim().to_string()
        })
        .filter(|name| !name.is_empty())
        .collect()
}

/// List partitions with sinfo.
pub async fn list_partitions(commands: &SlurmCommands) -> Result<Vec<String>, CommandError> {
    let mut cmd = Command::new(&commands.sinfo);
    cmd.args(["--noheader", "-o", SINFO_FORMAT]);

    let stdout = run_command(&mut cmd, "sinfo", commands.timeout).await?;
    let partitions = parse_partitions(&stdout);
    tracing::debug!(count = partitions.len(), "listed partitions");

    Ok(partitions)
}
