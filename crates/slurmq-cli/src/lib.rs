//! CLI argument parsing for slurmq.

use clap::Parser;
use slurmq_slurm::SlurmCommands;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "slurmq")]
#[command(about = "Export SLURM queue job counts per partition as Prometheus gauges")]
#[command(version)]
pub struct Args {
    /// Address to listen on for scrapes
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen_address: SocketAddr,

    /// Path under which metrics are served
    #[arg(long, default_value = "/metrics")]
    pub metrics_path: String,

    /// Seconds to wait for each sinfo/squeue call
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    pub command_timeout: u64,

    /// Partition-listing program
    #[arg(long, default_value = "sinfo")]
    pub sinfo: PathBuf,

    /// Job-listing program
    #[arg(long, default_value = "squeue")]
    pub squeue: PathBuf,

    /// Print one sample to stdout and exit
    #[arg(long)]
    pub once: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Commands used to query SLURM.
    pub fn slurm_commands(&self) -> SlurmCommands {
        SlurmCommands {
            sinfo: self.sinfo.clone(),
            squeue: self.squeue.clone(),
            timeout: Duration::from_secs(self.command_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["slurmq"]);
        assert_eq!(args.listen_address, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(args.metrics_path, "/metrics");
        assert!(!args.once);

        let commands = args.slurm_commands();
        assert_eq!(commands.sinfo, PathBuf::from("sinfo"));
        assert_eq!(commands.squeue, PathBuf::from("squeue"));
        assert_eq!(commands.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "slurmq",
            "--listen-address",
            "127.0.0.1:9341",
            "--command-timeout",
            "3",
            "--squeue",
            "/opt/slurm/bin/squeue",
            "--once",
        ]);
        assert_eq!(args.listen_address.port(), 9341);
        assert!(args.once);
        let commands = args.slurm_commands();
        assert_eq!(commands.timeout, Duration::from_secs(3));
        assert_eq!(commands.squeue, PathBuf::from("/opt/slurm/bin/squeue"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(Args::try_parse_from(["slurmq", "--command-timeout", "0"]).is_err());
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
