//! Project configuration (`diamond.json`) and the run-time options derived
//! from it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use diamond_abi::{Address, ExclusionList};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateFilter;
use crate::applier::ApplyOptions;
use crate::error::CutError;

pub const CONFIG_FILE: &str = "diamond.json";
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregateConfig {
    #[serde(default)]
    pub include_facets: Vec<String>,
    #[serde(default)]
    pub exclude_facets: Vec<String>,
    #[serde(default)]
    pub drop_elements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default = "default_artifacts")]
    pub artifacts: PathBuf,
    #[serde(default)]
    pub exclude_signatures: Vec<String>,
    #[serde(default)]
    pub groups: IndexMap<String, Vec<String>>,
    /// Deployed facet addresses; these win over addresses in artifacts.
    #[serde(default)]
    pub deployments: IndexMap<String, Address>,
    #[serde(default)]
    pub aggregate: AggregateConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    /// Directory relative paths resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_artifacts() -> PathBuf {
    PathBuf::from("artifacts")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            proxy: None,
            rpc_url: None,
            from: None,
            artifacts: default_artifacts(),
            exclude_signatures: Vec::new(),
            groups: IndexMap::new(),
            deployments: IndexMap::new(),
            aggregate: AggregateConfig::default(),
            confirmation_timeout_ms: None,
            poll_interval_ms: None,
            base_dir: PathBuf::from("."),
        }
    }
}

/// Read and validate a config file.
pub fn load_config(path: &Path) -> Result<ProjectConfig, CutError> {
    let bytes = std::fs::read(path)
        .map_err(|e| CutError::Config(format!("read {}: {e}", path.display())))?;
    let mut config: ProjectConfig = serde_json::from_slice(&bytes)
        .map_err(|e| CutError::Config(format!("parse {}: {e}", path.display())))?;
    if config.version != CONFIG_VERSION {
        return Err(CutError::Config(format!(
            "unsupported config version {} in {}",
            config.version,
            path.display()
        )));
    }
    config.base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(config)
}

/// Walk upward from `start` looking for a `diamond.json`.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start.to_path_buf());
    while let Some(dir) = current {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = dir.parent().map(|p| p.to_path_buf());
    }
    None
}

impl ProjectConfig {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn artifacts_root(&self) -> PathBuf {
        self.resolve(&self.artifacts)
    }

    pub fn exclusions(&self) -> Result<ExclusionList, CutError> {
        ExclusionList::new(&self.exclude_signatures)
            .map_err(|e| CutError::malformed("exclude_signatures", e))
    }

    pub fn confirmation_timeout(&self) -> Duration {
        self.confirmation_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| ApplyOptions::default().timeout)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(Duration::from_millis)
    }

    /// Expand groups, then append explicit names. Order is kept and
    /// duplicates are dropped.
    pub fn resolve_facets(&self, names: &[String], groups: &[String]) -> Result<Vec<String>, CutError> {
        let mut facets = IndexSet::new();
        for group in groups {
            let members = self
                .groups
                .get(group)
                .ok_or_else(|| CutError::UnknownGroup(group.clone()))?;
            facets.extend(members.iter().cloned());
        }
        facets.extend(names.iter().cloned());
        Ok(facets.into_iter().collect())
    }

    pub fn aggregate_filter(&self) -> Result<AggregateFilter, CutError> {
        AggregateFilter::new(
            &self.aggregate.include_facets,
            &self.aggregate.exclude_facets,
            self.aggregate.drop_elements.iter().cloned(),
        )
    }

    pub fn aggregate_output(&self) -> Option<PathBuf> {
        self.aggregate.output.as_deref().map(|p| self.resolve(p))
    }

    pub fn reconcile_config(&self) -> Result<ReconcileConfig, CutError> {
        Ok(ReconcileConfig {
            exclusions: self.exclusions()?,
            allow_teardown: false,
            apply: ApplyOptions {
                timeout: self.confirmation_timeout(),
                verify: true,
            },
            deployments: self.deployments.clone(),
        })
    }
}

/// Options of one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub exclusions: ExclusionList,
    pub allow_teardown: bool,
    pub apply: ApplyOptions,
    /// Facet addresses by name, overriding artifact addresses.
    pub deployments: IndexMap<String, Address>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            exclusions: ExclusionList::empty(),
            allow_teardown: false,
            apply: ApplyOptions::default(),
            deployments: IndexMap::new(),
        }
    }
}
