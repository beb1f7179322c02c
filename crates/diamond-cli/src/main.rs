mod commands;
mod opts;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::aggregate::AggregateArgs;
use commands::plan::PlanArgs;
use commands::reconcile::ReconcileArgs;
use commands::selectors::SelectorsArgs;
use opts::GlobalOpts;

#[derive(Parser, Debug)]
#[command(name = "dcut", version, about = "Diamond proxy facet cut reconciler")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the routable selectors of a facet
    Selectors(SelectorsArgs),

    /// Show the proxy's live selector routing
    Snapshot,

    /// Compute the cut toward a facet set without submitting it
    Plan(PlanArgs),

    /// Apply the cut toward a facet set and verify the result
    Reconcile(ReconcileArgs),

    /// Merge facet interfaces into one combined ABI
    Aggregate(AggregateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.opts.verbose);
    let opts = &cli.opts;

    match cli.command {
        Command::Selectors(args) => commands::selectors::cmd_selectors(opts, &args),
        Command::Snapshot => commands::snapshot::cmd_snapshot(opts).await,
        Command::Plan(args) => commands::plan::cmd_plan(opts, &args).await,
        Command::Reconcile(args) => commands::reconcile::cmd_reconcile(opts, &args).await,
        Command::Aggregate(args) => commands::aggregate::cmd_aggregate(opts, &args),
    }
}

fn setup_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();
}
