//! Solidity ABI primitives for diamond proxies: selectors, addresses, canonical
//! signatures, selector extraction and the loupe/cut call codec.

mod address;
pub mod codec;
mod error;
pub mod extract;
mod interface;
mod selector;
pub mod signature;

pub use address::Address;
pub use error::AbiError;
pub use extract::{ExclusionList, ExtractedSelectors, extract_selectors};
pub use interface::{AbiEntry, AbiParam, EntryKind, InterfaceDescription};
pub use selector::{Selector, keccak256};
