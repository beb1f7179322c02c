//! `dcut snapshot` command.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use diamond_cut::{DiamondProxy, read_snapshot};
use serde_json::json;

use crate::opts::{self, GlobalOpts};
use crate::output::print_success;

pub async fn cmd_snapshot(opts: &GlobalOpts) -> Result<()> {
    let config = opts::load_project(opts)?;
    let proxy = opts::connect(opts, &config)?;
    let snapshot = read_snapshot(&proxy, opts::timeout(opts, &config))
        .await
        .with_context(|| format!("read routing of {}", proxy.address()))?;

    let grouped = snapshot.by_facet();
    let data = if opts.json_output() {
        json!({
            "proxy": proxy.address(),
            "facets": grouped
                .iter()
                .map(|(facet, selectors)| json!({ "address": facet, "selectors": selectors }))
                .collect::<Vec<_>>(),
        })
    } else {
        let mut text = String::new();
        for (facet, selectors) in &grouped {
            writeln!(text, "{facet}  ({} selectors)", selectors.len())?;
            for selector in selectors {
                writeln!(text, "    {selector}")?;
            }
        }
        if grouped.is_empty() {
            writeln!(text, "no selectors routed")?;
        }
        json!(text)
    };
    print_success(opts, data, Vec::new())
}
