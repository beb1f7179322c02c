use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::Address;
use crate::error::AbiError;
use crate::selector::{Selector, keccak256};
use crate::signature::canonical_signature;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Function,
    Event,
    Error,
    Constructor,
    Fallback,
    Receive,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Function => "function",
            EntryKind::Event => "event",
            EntryKind::Error => "error",
            EntryKind::Constructor => "constructor",
            EntryKind::Fallback => "fallback",
            EntryKind::Receive => "receive",
        }
    }

    /// Whether entries of this kind have a name and a selector.
    pub fn is_named(&self) -> bool {
        matches!(self, EntryKind::Function | EntryKind::Event | EntryKind::Error)
    }
}

fn default_kind() -> EntryKind {
    EntryKind::Function
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AbiParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_type: Option<String>,
}

impl AbiParam {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            components: Vec::new(),
            indexed: None,
            internal_type: None,
        }
    }

    pub fn tuple(name: impl Into<String>, ty: impl Into<String>, components: Vec<AbiParam>) -> Self {
        Self {
            components,
            ..Self::new(name, ty)
        }
    }
}

/// One entry of a Solidity JSON ABI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AbiEntry {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<AbiParam>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_mutability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
}

impl AbiEntry {
    pub fn function(name: impl Into<String>, inputs: Vec<AbiParam>) -> Self {
        Self::named(EntryKind::Function, name, inputs)
    }

    pub fn named(kind: EntryKind, name: impl Into<String>, inputs: Vec<AbiParam>) -> Self {
        Self {
            kind,
            name: Some(name.into()),
            inputs,
            outputs: (kind == EntryKind::Function).then(Vec::new),
            state_mutability: (kind == EntryKind::Function).then(|| "nonpayable".to_string()),
            anonymous: (kind == EntryKind::Event).then_some(false),
        }
    }

    /// Canonical signature of a function, event or error. `None` for
    /// constructors, fallback and receive entries.
    pub fn signature(&self) -> Result<Option<String>, AbiError> {
        if !self.kind.is_named() {
            return Ok(None);
        }
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| AbiError::malformed(format!("<unnamed {}>", self.kind.as_str()), "missing name"))?;
        canonical_signature(name, &self.inputs).map(Some)
    }

    /// Leading four bytes of the signature hash. For events this is a prefix of
    /// the topic, kept for display only.
    pub fn selector(&self) -> Result<Option<Selector>, AbiError> {
        Ok(self.signature()?.map(|sig| Selector::of_signature(&sig)))
    }

    /// Full 32-byte topic hash for events.
    pub fn event_topic(&self) -> Result<Option<[u8; 32]>, AbiError> {
        if self.kind != EntryKind::Event {
            return Ok(None);
        }
        Ok(self.signature()?.map(|sig| keccak256(sig.as_bytes())))
    }
}

/// Interface description of one facet as produced by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescription {
    pub name: String,
    pub entries: Vec<AbiEntry>,
    /// Deployed address, when the artifact records one.
    pub address: Option<Address>,
}

impl InterfaceDescription {
    pub fn new(name: impl Into<String>, entries: Vec<AbiEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
            address: None,
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Parse an artifact: either a bare ABI array or an object carrying an
    /// `abi` field (Hardhat, Foundry) and optionally an `address` field
    /// (hardhat-deploy).
    pub fn from_json(name: impl Into<String>, bytes: &[u8]) -> Result<Self, AbiError> {
        let name = name.into();
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| AbiError::Artifact(format!("{name}: invalid JSON: {e}")))?;
        let (abi, address) = match value {
            Value::Array(_) => (value, None),
            Value::Object(mut obj) => {
                let abi = obj
                    .remove("abi")
                    .ok_or_else(|| AbiError::Artifact(format!("{name}: artifact has no 'abi' field")))?;
                let address = match obj.remove("address") {
                    Some(Value::String(s)) => Some(
                        Address::from_hex_str(&s)
                            .map_err(|e| AbiError::Artifact(format!("{name}: address: {e}")))?,
                    ),
                    _ => None,
                };
                (abi, address)
            }
            _ => {
                return Err(AbiError::Artifact(format!(
                    "{name}: expected an ABI array or artifact object"
                )));
            }
        };
        let entries: Vec<AbiEntry> = serde_json::from_value(abi)
            .map_err(|e| AbiError::Artifact(format!("{name}: invalid ABI: {e}")))?;
        Ok(Self {
            name,
            entries,
            address,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &AbiEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::Function)
    }
}
