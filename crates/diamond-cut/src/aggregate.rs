//! Interface aggregation: merge facet interfaces into one combined ABI.
//!
//! First-seen wins across facets. The seen-set lives for one call only.

use std::collections::HashMap;

use diamond_abi::{AbiEntry, EntryKind, InterfaceDescription, Selector};
use globset::{Glob, GlobSet, GlobSetBuilder};
use indexmap::IndexSet;
use serde::Serialize;

use crate::error::CutError;

/// A named ABI element together with the facet it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceElement {
    pub name: String,
    pub selector: Selector,
    pub kind: EntryKind,
    pub source_facet: String,
    pub signature: String,
    #[serde(skip)]
    pub entry: AbiEntry,
}

/// Which facets take part and which element names are dropped outright.
#[derive(Debug, Clone)]
pub struct AggregateFilter {
    include: Option<GlobSet>,
    exclude: GlobSet,
    drop: IndexSet<String>,
}

impl Default for AggregateFilter {
    fn default() -> Self {
        Self {
            include: None,
            exclude: GlobSet::empty(),
            drop: IndexSet::new(),
        }
    }
}

impl AggregateFilter {
    /// An empty `include` admits every facet not matched by `exclude`.
    pub fn new<I, E, D>(include: I, exclude: E, drop: D) -> Result<Self, CutError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let include: Vec<String> = include.into_iter().map(|p| p.as_ref().to_string()).collect();
        let include = if include.is_empty() {
            None
        } else {
            Some(build_globs(&include)?)
        };
        let exclude: Vec<String> = exclude.into_iter().map(|p| p.as_ref().to_string()).collect();
        Ok(Self {
            include,
            exclude: build_globs(&exclude)?,
            drop: drop.into_iter().map(Into::into).collect(),
        })
    }

    pub fn admits_facet(&self, name: &str) -> bool {
        let included = self.include.as_ref().is_none_or(|set| set.is_match(name));
        included && !self.exclude.is_match(name)
    }

    pub fn drops_element(&self, name: &str) -> bool {
        self.drop.contains(name)
    }
}

fn build_globs(patterns: &[String]) -> Result<GlobSet, CutError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| CutError::Config(format!("invalid facet pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| CutError::Config(format!("build facet patterns: {e}")))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateResult {
    pub kept: Vec<InterfaceElement>,
    pub shadowed: Vec<InterfaceElement>,
    /// Facets left out by the filter.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_facets: Vec<String>,
}

impl AggregateResult {
    /// The kept elements as a Solidity JSON ABI, in kept order.
    pub fn abi(&self) -> Vec<AbiEntry> {
        self.kept.iter().map(|e| e.entry.clone()).collect()
    }

    pub fn kept_names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.kept
            .iter()
            .map(|e| (e.name.as_str(), e.source_facet.as_str()))
    }
}

/// Merge `facets` in the given order.
///
/// An element whose name was already taken by an earlier facet is shadowed.
/// Overloads declared by the same facet are all kept. Constructors, fallback
/// and receive entries have no name and are left out.
pub fn aggregate(
    facets: &[InterfaceDescription],
    filter: &AggregateFilter,
) -> Result<AggregateResult, CutError> {
    let mut result = AggregateResult::default();
    let mut seen: HashMap<String, String> = HashMap::new();

    for facet in facets {
        if !filter.admits_facet(&facet.name) {
            tracing::debug!(facet = %facet.name, "facet filtered out of aggregate");
            result.skipped_facets.push(facet.name.clone());
            continue;
        }
        for entry in &facet.entries {
            let Some(name) = entry.name.as_deref().filter(|_| entry.kind.is_named()) else {
                continue;
            };
            if filter.drops_element(name) {
                continue;
            }
            let signature = entry
                .signature()
                .map_err(|e| CutError::malformed(&facet.name, e))?
                .unwrap_or_default();
            let element = InterfaceElement {
                name: name.to_string(),
                selector: Selector::of_signature(&signature),
                kind: entry.kind,
                source_facet: facet.name.clone(),
                signature,
                entry: entry.clone(),
            };
            match seen.get(name) {
                Some(owner) if *owner != facet.name => {
                    tracing::warn!(
                        element = %element.signature,
                        facet = %facet.name,
                        kept_from = %owner,
                        "interface element shadowed"
                    );
                    result.shadowed.push(element);
                }
                Some(_) => result.kept.push(element),
                None => {
                    seen.insert(name.to_string(), facet.name.clone());
                    result.kept.push(element);
                }
            }
        }
    }
    tracing::info!(
        kept = result.kept.len(),
        shadowed = result.shadowed.len(),
        "interfaces aggregated"
    );
    Ok(result)
}
