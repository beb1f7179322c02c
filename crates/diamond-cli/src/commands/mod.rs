//! CLI command handlers.

pub mod aggregate;
pub mod plan;
pub mod reconcile;
pub mod selectors;
pub mod snapshot;

use anyhow::{Context, Result};
use clap::Args;
use diamond_cut::config::ProjectConfig;
use diamond_cut::{FsArtifacts, Reconciler, RpcProxy};

use crate::opts::{self, GlobalOpts};

/// Facet set selection shared by the target-based commands.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Facet names, in declaration order
    pub facets: Vec<String>,

    /// Facet group from diamond.json; expanded before explicit names
    #[arg(short = 'g', long = "group")]
    pub groups: Vec<String>,
}

impl TargetArgs {
    pub fn resolve(&self, config: &ProjectConfig) -> Result<Vec<String>> {
        config
            .resolve_facets(&self.facets, &self.groups)
            .context("resolve target facets")
    }
}

/// Reconciler over the configured RPC endpoint and artifact tree.
pub fn reconciler(
    opts: &GlobalOpts,
    config: &ProjectConfig,
    allow_teardown: bool,
) -> Result<Reconciler<RpcProxy, FsArtifacts>> {
    let proxy = opts::connect(opts, config)?;
    let artifacts = opts::open_artifacts(opts, config)?;
    let mut run = config.reconcile_config().context("read reconcile options")?;
    run.allow_teardown = allow_teardown;
    run.apply.timeout = opts::timeout(opts, config);
    Ok(Reconciler::new(proxy, artifacts, run))
}
