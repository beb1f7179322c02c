//! `dcut aggregate` command: write the combined interface.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use diamond_cut::{ArtifactSource, aggregate_interface};
use serde_json::json;

use super::TargetArgs;
use crate::opts::{self, GlobalOpts};
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct AggregateArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output path for the combined ABI (default: aggregate.output in diamond.json)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn cmd_aggregate(opts: &GlobalOpts, args: &AggregateArgs) -> Result<()> {
    let config = opts::load_project(opts)?;
    let artifacts = opts::open_artifacts(opts, &config)?;
    let mut names = args.target.resolve(&config)?;
    if names.is_empty() {
        names = artifacts.names();
    }
    let filter = config.aggregate_filter()?;
    let result = aggregate_interface(&artifacts, &config.deployments, &names, &filter)
        .context("aggregate facet interfaces")?;

    let out = args.out.clone().or_else(|| config.aggregate_output());
    if let Some(path) = &out {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let body = serde_json::to_vec_pretty(&result.abi())?;
        fs::write(path, body).with_context(|| format!("write {}", path.display()))?;
    }

    let warnings: Vec<String> = result
        .shadowed
        .iter()
        .map(|e| format!("{} from {} shadowed by an earlier facet", e.signature, e.source_facet))
        .collect();
    let data = if opts.json_output() {
        json!({
            "kept": result.kept,
            "shadowed": result.shadowed,
            "skipped_facets": result.skipped_facets,
            "output": out,
        })
    } else {
        let mut text = format!(
            "{} elements kept, {} shadowed\n",
            result.kept.len(),
            result.shadowed.len()
        );
        match &out {
            Some(path) => text.push_str(&format!("wrote {}\n", path.display())),
            None => {
                text.push_str(&serde_json::to_string_pretty(&result.abi())?);
                text.push('\n');
            }
        }
        json!(text)
    };
    print_success(opts, data, warnings)
}
