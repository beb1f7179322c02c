//! Where facet interface descriptions come from.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use diamond_abi::{AbiError, InterfaceDescription};
use indexmap::IndexMap;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no artifact named '{0}'")]
    NotFound(String),
    #[error("artifact name '{name}' is ambiguous: {}", display_paths(.paths))]
    Ambiguous { name: String, paths: Vec<PathBuf> },
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Abi(#[from] AbiError),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Lookup of compiled facet interfaces by contract name.
pub trait ArtifactSource: Send + Sync {
    fn interface(&self, name: &str) -> Result<InterfaceDescription, ArtifactError>;

    /// Every known contract name, sorted.
    fn names(&self) -> Vec<String>;
}

/// Artifacts on disk, indexed by file stem.
///
/// Covers Hardhat (`artifacts/**/X.sol/X.json`), Foundry (`out/X.sol/X.json`)
/// and hardhat-deploy (`deployments/<network>/X.json`) layouts. Debug files
/// and build-info dumps are ignored.
#[derive(Debug, Clone)]
pub struct FsArtifacts {
    root: PathBuf,
    index: IndexMap<String, Vec<PathBuf>>,
}

impl FsArtifacts {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        let mut files = Vec::new();
        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                ArtifactError::Io {
                    path,
                    source: e.into(),
                }
            })?;
            if !entry.file_type().is_file() || !is_artifact(entry.path()) {
                continue;
            }
            files.push(entry.into_path());
        }
        files.sort();

        let mut index: IndexMap<String, Vec<PathBuf>> = IndexMap::new();
        for path in files {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                index.entry(stem.to_string()).or_default().push(path);
            }
        }
        index.sort_keys();
        tracing::debug!(root = %root.display(), artifacts = index.len(), "indexed artifacts");
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> Result<&Path, ArtifactError> {
        match self.index.get(name).map(Vec::as_slice) {
            None | Some([]) => Err(ArtifactError::NotFound(name.to_string())),
            Some([path]) => Ok(path.as_path()),
            Some(paths) => Err(ArtifactError::Ambiguous {
                name: name.to_string(),
                paths: paths.to_vec(),
            }),
        }
    }
}

fn is_artifact(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
        return false;
    };
    if !file_name.ends_with(".json") || file_name.ends_with(".dbg.json") {
        return false;
    }
    !path
        .components()
        .any(|c| c.as_os_str() == "build-info" || c.as_os_str() == "solcInputs")
}

impl ArtifactSource for FsArtifacts {
    fn interface(&self, name: &str) -> Result<InterfaceDescription, ArtifactError> {
        let path = self.path_of(name)?;
        let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(InterfaceDescription::from_json(name, &bytes)?)
    }

    fn names(&self) -> Vec<String> {
        self.index.keys().cloned().collect()
    }
}

/// Interfaces held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemArtifacts {
    interfaces: IndexMap<String, InterfaceDescription>,
}

impl MemArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, iface: InterfaceDescription) {
        self.interfaces.insert(iface.name.clone(), iface);
    }

    pub fn with(mut self, iface: InterfaceDescription) -> Self {
        self.insert(iface);
        self
    }
}

impl ArtifactSource for MemArtifacts {
    fn interface(&self, name: &str) -> Result<InterfaceDescription, ArtifactError> {
        self.interfaces
            .get(name)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(name.to_string()))
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.interfaces.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    const ABI: &str = r#"{"abi": [{"type": "function", "name": "owner", "inputs": []}]}"#;

    #[test]
    fn indexes_hardhat_layout_and_skips_debug_files() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "contracts/facets/OwnershipFacet.sol/OwnershipFacet.json", ABI);
        write(tmp.path(), "contracts/facets/OwnershipFacet.sol/OwnershipFacet.dbg.json", "{}");
        write(tmp.path(), "build-info/abc123.json", "{}");

        let artifacts = FsArtifacts::open(tmp.path()).unwrap();
        assert_eq!(artifacts.names(), vec!["OwnershipFacet".to_string()]);
        let iface = artifacts.interface("OwnershipFacet").unwrap();
        assert_eq!(iface.functions().count(), 1);
        assert!(matches!(
            artifacts.interface("Missing"),
            Err(ArtifactError::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_stems_are_ambiguous() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a/Facet.sol/Facet.json", ABI);
        write(tmp.path(), "b/Facet.sol/Facet.json", ABI);
        let artifacts = FsArtifacts::open(tmp.path()).unwrap();
        match artifacts.interface("Facet") {
            Err(ArtifactError::Ambiguous { paths, .. }) => assert_eq!(paths.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn deployment_file_carries_address() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "deployments/localhost/FacetA.json",
            r#"{"address": "0x00000000000000000000000000000000000000a1", "abi": []}"#,
        );
        let iface = FsArtifacts::open(tmp.path())
            .unwrap()
            .interface("FacetA")
            .unwrap();
        assert!(iface.address.is_some());
    }
}
