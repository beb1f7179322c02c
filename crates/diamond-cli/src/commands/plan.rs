//! `dcut plan` command: dry run.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use super::{TargetArgs, reconciler};
use crate::opts::{self, GlobalOpts};
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Permit an empty facet set to remove every live selector
    #[arg(long)]
    pub allow_teardown: bool,
}

pub async fn cmd_plan(opts: &GlobalOpts, args: &PlanArgs) -> Result<()> {
    let config = opts::load_project(opts)?;
    let names = args.target.resolve(&config)?;
    let rec = reconciler(opts, &config, args.allow_teardown)?;
    let plan = rec.plan(&names).await.context("plan cut")?;

    let data = if opts.json_output() {
        serde_json::to_value(&plan)?
    } else {
        json!(plan.render())
    };
    print_success(opts, data, Vec::new())
}
