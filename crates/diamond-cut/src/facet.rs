use diamond_abi::signature::canonicalize;
use diamond_abi::{Address, ExclusionList, InterfaceDescription, Selector, extract_selectors};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::error::CutError;

pub use diamond_abi::codec::{CutAction, CutKind};

/// A facet as the planner sees it: a name, an address once deployed, and the
/// routable selectors derived from its interface.
///
/// Derived on every run from the interface description and the exclusion
/// list; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetDescriptor {
    pub name: String,
    pub address: Option<Address>,
    pub selectors: IndexSet<Selector>,
    /// Canonical signatures of the selectors, where known.
    #[serde(skip)]
    pub signatures: IndexMap<Selector, String>,
    /// Signatures removed by the exclusion list.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded: Vec<String>,
}

impl FacetDescriptor {
    /// Descriptor from raw selectors, without signature information.
    pub fn new(
        name: impl Into<String>,
        address: Option<Address>,
        selectors: impl IntoIterator<Item = Selector>,
    ) -> Self {
        Self {
            name: name.into(),
            address,
            selectors: selectors.into_iter().collect(),
            signatures: IndexMap::new(),
            excluded: Vec::new(),
        }
    }

    /// Extract the routable selectors of an interface.
    pub fn describe(iface: &InterfaceDescription, exclusions: &ExclusionList) -> Result<Self, CutError> {
        let extracted =
            extract_selectors(iface, exclusions).map_err(|e| CutError::malformed(&iface.name, e))?;
        Ok(Self {
            name: iface.name.clone(),
            address: iface.address,
            selectors: extracted.selectors.keys().copied().collect(),
            signatures: extracted.selectors,
            excluded: extracted.excluded,
        })
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Signature of a selector, or its hex form when unknown.
    pub fn label(&self, selector: &Selector) -> String {
        self.signatures
            .get(selector)
            .cloned()
            .unwrap_or_else(|| selector.to_hex())
    }
}

/// One-time call executed in the same transaction as the cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializerSpec {
    pub target_address: Address,
    pub function_selector: Selector,
    pub encoded_args: Vec<u8>,
}

impl InitializerSpec {
    pub fn new(target_address: Address, function_selector: Selector, encoded_args: Vec<u8>) -> Self {
        Self {
            target_address,
            function_selector,
            encoded_args,
        }
    }

    /// Build from a textual signature such as `init(uint256)` and
    /// already ABI-encoded arguments.
    pub fn from_signature(
        target_address: Address,
        signature: &str,
        encoded_args: Vec<u8>,
    ) -> Result<Self, CutError> {
        let canonical = canonicalize(signature).map_err(|e| CutError::malformed("initializer", e))?;
        Ok(Self::new(
            target_address,
            Selector::of_signature(&canonical),
            encoded_args,
        ))
    }

    /// Selector followed by the encoded arguments.
    pub fn calldata(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + self.encoded_args.len());
        data.extend_from_slice(self.function_selector.as_bytes());
        data.extend_from_slice(&self.encoded_args);
        data
    }
}
