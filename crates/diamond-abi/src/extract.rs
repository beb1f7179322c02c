//! Selector extraction: the routable selector set of a facet.

use indexmap::{IndexMap, IndexSet};

use crate::error::AbiError;
use crate::interface::InterfaceDescription;
use crate::selector::Selector;
use crate::signature::canonicalize;

/// Function signatures that must never be routed through the proxy.
///
/// Entries match by exact canonical signature. A bare name such as
/// `initialize` is read as `initialize()` and leaves `initialize(uint256)`
/// routable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionList {
    signatures: IndexSet<String>,
}

impl ExclusionList {
    pub fn new<I, S>(entries: I) -> Result<Self, AbiError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut signatures = IndexSet::new();
        for entry in entries {
            signatures.insert(canonicalize(entry.as_ref())?);
        }
        Ok(Self { signatures })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, canonical: &str) -> bool {
        self.signatures.contains(canonical)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.signatures.iter().map(String::as_str)
    }
}

/// Selectors extracted from one facet interface, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedSelectors {
    /// Routable selectors mapped to their canonical signatures.
    pub selectors: IndexMap<Selector, String>,
    /// Canonical signatures dropped by the exclusion list.
    pub excluded: Vec<String>,
}

impl ExtractedSelectors {
    pub fn signature(&self, selector: &Selector) -> Option<&str> {
        self.selectors.get(selector).map(String::as_str)
    }
}

/// Compute the routable selector set of a facet.
///
/// Every function entry is canonicalized independently; a single malformed
/// signature fails the whole facet.
pub fn extract_selectors(
    iface: &InterfaceDescription,
    exclusions: &ExclusionList,
) -> Result<ExtractedSelectors, AbiError> {
    let mut out = ExtractedSelectors::default();
    for entry in iface.functions() {
        let Some(signature) = entry.signature()? else {
            continue;
        };
        if exclusions.contains(&signature) {
            out.excluded.push(signature);
            continue;
        }
        let selector = Selector::of_signature(&signature);
        match out.selectors.get(&selector) {
            None => {
                out.selectors.insert(selector, signature);
            }
            Some(existing) if *existing == signature => {}
            Some(existing) => {
                return Err(AbiError::malformed(
                    signature.clone(),
                    format!(
                        "selector {selector} clashes with '{existing}' in facet '{}'",
                        iface.name
                    ),
                ));
            }
        }
    }
    Ok(out)
}
