//! `dcut selectors` command.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use clap::Args;
use diamond_abi::ExclusionList;
use diamond_cut::{ArtifactSource, FacetDescriptor};
use serde_json::json;

use crate::opts::{self, GlobalOpts};
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct SelectorsArgs {
    /// Facet (contract) name
    pub facet: String,

    /// Extra signatures to exclude, on top of diamond.json
    #[arg(long)]
    pub exclude: Vec<String>,
}

pub fn cmd_selectors(opts: &GlobalOpts, args: &SelectorsArgs) -> Result<()> {
    let config = opts::load_project(opts)?;
    let artifacts = opts::open_artifacts(opts, &config)?;
    let mut iface = artifacts
        .interface(&args.facet)
        .with_context(|| format!("load interface of '{}'", args.facet))?;
    if let Some(address) = config.deployments.get(&args.facet) {
        iface.address = Some(*address);
    }

    let exclusions = ExclusionList::new(config.exclude_signatures.iter().chain(&args.exclude))
        .context("parse exclusion list")?;
    let facet = FacetDescriptor::describe(&iface, &exclusions)?;

    let data = if opts.json_output() {
        json!({
            "facet": facet.name,
            "address": facet.address,
            "selectors": facet
                .selectors
                .iter()
                .map(|s| json!({ "selector": s, "signature": facet.label(s) }))
                .collect::<Vec<_>>(),
            "excluded": facet.excluded,
        })
    } else {
        let mut text = String::new();
        for selector in &facet.selectors {
            writeln!(text, "{selector}  {}", facet.label(selector))?;
        }
        json!(text)
    };
    let warnings = facet
        .excluded
        .iter()
        .map(|sig| format!("excluded {sig}"))
        .collect();
    print_success(opts, data, warnings)
}
