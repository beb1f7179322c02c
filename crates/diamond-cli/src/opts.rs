//! Global CLI options and project resolution.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args};
use diamond_abi::Address;
use diamond_cut::config::{ProjectConfig, find_config};
use diamond_cut::{FsArtifacts, RpcProxy, load_config};

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Global options for CLI commands.
///
/// Flags win over `diamond.json`; every flag can also be set via env vars.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Project config file (env: DCUT_CONFIG, default: nearest diamond.json)
    #[arg(short = 'c', long, global = true, env = "DCUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON-RPC endpoint of the node (env: DCUT_RPC_URL)
    #[arg(long, global = true, env = "DCUT_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Diamond proxy address (env: DCUT_PROXY)
    #[arg(long, global = true, env = "DCUT_PROXY")]
    pub proxy: Option<Address>,

    /// Unlocked sender account for cut transactions (env: DCUT_FROM)
    #[arg(long, global = true, env = "DCUT_FROM")]
    pub from: Option<Address>,

    /// Artifact directory (env: DCUT_ARTIFACTS, default from config)
    #[arg(long, global = true, env = "DCUT_ARTIFACTS")]
    pub artifacts: Option<PathBuf>,

    /// Bound on each awaited network phase in milliseconds (env: DCUT_TIMEOUT_MS)
    #[arg(long, global = true, env = "DCUT_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// JSON output envelope
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output (implies --json)
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Suppress notices
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Raise log verbosity (-v info, -vv debug); RUST_LOG wins when set
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl GlobalOpts {
    pub fn json_output(&self) -> bool {
        self.json || self.pretty
    }
}

/// Load the project config.
///
/// Priority:
/// 1. `--config` / `DCUT_CONFIG`
/// 2. Walk up from CWD to the nearest `diamond.json`
/// 3. Defaults rooted at CWD
pub fn load_project(opts: &GlobalOpts) -> Result<ProjectConfig> {
    if let Some(path) = &opts.config {
        return load_config(path).with_context(|| format!("load config {}", path.display()));
    }
    let cwd = std::env::current_dir().context("get current directory")?;
    if let Some(found) = find_config(&cwd) {
        tracing::debug!(path = %found.display(), "using project config");
        return load_config(&found).with_context(|| format!("load config {}", found.display()));
    }
    tracing::debug!("no diamond.json found; using defaults");
    Ok(ProjectConfig {
        base_dir: cwd,
        ..ProjectConfig::default()
    })
}

pub fn timeout(opts: &GlobalOpts, config: &ProjectConfig) -> Duration {
    opts.timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.confirmation_timeout())
}

pub fn open_artifacts(opts: &GlobalOpts, config: &ProjectConfig) -> Result<FsArtifacts> {
    let root = match &opts.artifacts {
        Some(dir) => config.resolve(dir),
        None => config.artifacts_root(),
    };
    FsArtifacts::open(&root).with_context(|| format!("open artifacts at {}", root.display()))
}

pub fn proxy_address(opts: &GlobalOpts, config: &ProjectConfig) -> Result<Address> {
    opts.proxy.or(config.proxy).ok_or_else(|| {
        anyhow::anyhow!(
            "No proxy address. Pass --proxy <ADDR>, set DCUT_PROXY, or add \"proxy\" to diamond.json"
        )
    })
}

pub fn connect(opts: &GlobalOpts, config: &ProjectConfig) -> Result<RpcProxy> {
    let proxy = proxy_address(opts, config)?;
    let url = opts
        .rpc_url
        .as_deref()
        .or(config.rpc_url.as_deref())
        .unwrap_or(DEFAULT_RPC_URL);
    let mut client = RpcProxy::new(url, proxy).context("create rpc client")?;
    if let Some(from) = opts.from.or(config.from) {
        client = client.with_sender(from);
    }
    if let Some(interval) = config.poll_interval() {
        client = client.with_poll_interval(interval);
    }
    Ok(client)
}
