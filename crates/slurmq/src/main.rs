//! slurmq - SLURM queue exporter for Prometheus.

mod logging;
mod server;

use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};
use prometheus::Registry;
use slurmq_cli::Args;
use slurmq_metrics::QueueCollector;
use slurmq_slurm::SlurmCli;
use tokio::runtime::Handle;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let commands = args.slurm_commands();
    tracing::debug!(
        sinfo = %commands.sinfo.display(),
        squeue = %commands.squeue.display(),
        timeout_secs = commands.timeout.as_secs(),
        "SLURM commands"
    );

    let collector = QueueCollector::new(SlurmCli::new(commands), Handle::current())
        .into_diagnostic()
        .wrap_err("Failed to build queue collector")?;
    let registry = Registry::new();
    slurmq_metrics::register(&registry, collector).into_diagnostic()?;

    if args.once {
        let text = tokio::task::spawn_blocking(move || slurmq_metrics::encode_text(&registry))
            .await
            .into_diagnostic()?
            .into_diagnostic()?;
        print!("{text}");
        return Ok(());
    }

    let routes = server::Routes::new(args.metrics_path, registry);
    server::serve(args.listen_address, routes).await
}
