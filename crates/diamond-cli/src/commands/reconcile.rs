//! `dcut reconcile` command.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use clap::Args;
use diamond_abi::Address;
use diamond_cut::InitializerSpec;
use serde_json::json;

use super::{TargetArgs, reconciler};
use crate::opts::{self, GlobalOpts};
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Permit an empty facet set to remove every live selector
    #[arg(long)]
    pub allow_teardown: bool,

    /// Contract called once in the cut transaction
    #[arg(long, requires = "init_signature")]
    pub init_target: Option<Address>,

    /// Initializer function signature, e.g. `init(uint256)`
    #[arg(long, requires = "init_target")]
    pub init_signature: Option<String>,

    /// ABI-encoded initializer arguments (hex)
    #[arg(long, requires = "init_signature")]
    pub init_args: Option<String>,
}

impl ReconcileArgs {
    fn initializer(&self) -> Result<Option<InitializerSpec>> {
        let (Some(target), Some(signature)) = (self.init_target, &self.init_signature) else {
            return Ok(None);
        };
        let args = match &self.init_args {
            Some(raw) => hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
                .context("decode --init-args")?,
            None => Vec::new(),
        };
        Ok(Some(InitializerSpec::from_signature(target, signature, args)?))
    }
}

pub async fn cmd_reconcile(opts: &GlobalOpts, args: &ReconcileArgs) -> Result<()> {
    let config = opts::load_project(opts)?;
    let names = args.target.resolve(&config)?;
    let init = args.initializer()?;
    let rec = reconciler(opts, &config, args.allow_teardown)?;

    let result = rec
        .reconcile(&names, init.as_ref())
        .await
        .context("reconcile facets")?;

    let mut warnings = Vec::new();
    if result.skipped && init.is_some() {
        warnings.push("routing already matched the target; initializer not run".to_string());
    }

    let data = if opts.json_output() {
        serde_json::to_value(&result)?
    } else {
        let mut text = String::new();
        if result.skipped {
            writeln!(text, "routing already matches target; nothing to cut")?;
        } else {
            for action in &result.applied {
                writeln!(
                    text,
                    "{:<8} {}  ({} selectors)",
                    action.kind,
                    action.facet_address,
                    action.selectors.len()
                )?;
            }
            if let Some(tx) = &result.tx {
                writeln!(text, "confirmed in {tx}")?;
            }
        }
        json!(text)
    };
    print_success(opts, data, warnings)
}
