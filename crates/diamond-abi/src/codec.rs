//! ABI word codec for the two proxy calls the reconciler makes: the loupe
//! `facets()` enumeration and `diamondCut(...)`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::Address;
use crate::error::AbiError;
use crate::selector::Selector;

/// `facets()` on the diamond loupe.
pub const FACETS_SELECTOR: Selector = Selector::new([0x7a, 0x0e, 0xd6, 0x27]);
/// `diamondCut((address,uint8,bytes4[])[],address,bytes)`.
pub const DIAMOND_CUT_SELECTOR: Selector = Selector::new([0x1f, 0x93, 0x1c, 0x1c]);
/// `Error(string)` revert payload.
pub const ERROR_STRING_SELECTOR: Selector = Selector::new([0x08, 0xc3, 0x79, 0xa0]);

const WORD: usize = 32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum CutKind {
    Add,
    Replace,
    Remove,
}

impl CutKind {
    pub fn as_u8(&self) -> u8 {
        match self {
            CutKind::Add => 0,
            CutKind::Replace => 1,
            CutKind::Remove => 2,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self, AbiError> {
        match value {
            0 => Ok(CutKind::Add),
            1 => Ok(CutKind::Replace),
            2 => Ok(CutKind::Remove),
            other => Err(AbiError::Decode(format!("unknown facet cut action {other}"))),
        }
    }
}

impl fmt::Display for CutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            CutKind::Add => "add",
            CutKind::Replace => "replace",
            CutKind::Remove => "remove",
        })
    }
}

/// One routing mutation: the `FacetCut` struct of `diamondCut`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CutAction {
    pub kind: CutKind,
    pub facet_address: Address,
    pub selectors: Vec<Selector>,
}

/// Decoded `diamondCut` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiamondCutCall {
    pub actions: Vec<CutAction>,
    pub init: Address,
    pub calldata: Vec<u8>,
}

/// One `Facet { address facetAddress; bytes4[] functionSelectors; }` entry
/// of the loupe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoupeFacet {
    pub address: Address,
    pub selectors: Vec<Selector>,
}

pub fn encode_facets_call() -> Vec<u8> {
    FACETS_SELECTOR.as_bytes().to_vec()
}

/// Calldata for `diamondCut(actions, init, calldata)`.
pub fn encode_diamond_cut(actions: &[CutAction], init: Address, calldata: &[u8]) -> Vec<u8> {
    let cuts = encode_dynamic_array(actions.iter().map(encode_cut_tuple).collect());
    let mut out = Vec::with_capacity(4 + 3 * WORD + cuts.len() + calldata.len() + 2 * WORD);
    out.extend_from_slice(DIAMOND_CUT_SELECTOR.as_bytes());
    out.extend_from_slice(&usize_word(3 * WORD));
    out.extend_from_slice(&address_word(&init));
    out.extend_from_slice(&usize_word(3 * WORD + cuts.len()));
    out.extend_from_slice(&cuts);
    out.extend_from_slice(&encode_bytes(calldata));
    out
}

pub fn decode_diamond_cut(calldata: &[u8]) -> Result<DiamondCutCall, AbiError> {
    let body = strip_selector(calldata, DIAMOND_CUT_SELECTOR)?;
    let reader = Reader::new(body);
    let cuts_at = reader.usize_at(0)?;
    let init = reader.address_at(WORD)?;
    let data_at = reader.usize_at(2 * WORD)?;

    let count = reader.usize_at(cuts_at)?;
    let heads = offset(cuts_at, WORD)?;
    let mut actions = Vec::with_capacity(count.min(1024));
    for i in 0..count {
        let tuple = reader.element_at(heads, i)?;
        let facet_address = reader.address_at(tuple)?;
        let action = reader.usize_at(offset(tuple, WORD)?)?;
        let action = u8::try_from(action)
            .map_err(|_| AbiError::Decode(format!("facet cut action {action} out of range")))?;
        let selectors = reader.selector_array_at(reader.relative_at(tuple, 2 * WORD)?)?;
        actions.push(CutAction {
            kind: CutKind::from_u8(action)?,
            facet_address,
            selectors,
        });
    }
    let calldata = reader.bytes_at(data_at)?.to_vec();
    Ok(DiamondCutCall {
        actions,
        init,
        calldata,
    })
}

/// Decode the return data of `facets()`.
///
/// Empty return data means the target has no code (or no loupe) and reads
/// as no facets.
pub fn decode_facets(data: &[u8]) -> Result<Vec<LoupeFacet>, AbiError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let reader = Reader::new(data);
    let array_at = reader.usize_at(0)?;
    let count = reader.usize_at(array_at)?;
    let heads = offset(array_at, WORD)?;
    let mut facets = Vec::with_capacity(count.min(1024));
    for i in 0..count {
        let tuple = reader.element_at(heads, i)?;
        let address = reader.address_at(tuple)?;
        let selectors = reader.selector_array_at(reader.relative_at(tuple, WORD)?)?;
        facets.push(LoupeFacet { address, selectors });
    }
    Ok(facets)
}

/// Return data of `facets()`; the inverse of [`decode_facets`].
pub fn encode_facets(facets: &[LoupeFacet]) -> Vec<u8> {
    let tuples = facets
        .iter()
        .map(|facet| {
            let mut tuple = Vec::new();
            tuple.extend_from_slice(&address_word(&facet.address));
            tuple.extend_from_slice(&usize_word(2 * WORD));
            tuple.extend_from_slice(&encode_selector_array(&facet.selectors));
            tuple
        })
        .collect();
    let mut out = usize_word(WORD).to_vec();
    out.extend_from_slice(&encode_dynamic_array(tuples));
    out
}

/// Extract the message of an `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let body = strip_selector(data, ERROR_STRING_SELECTOR).ok()?;
    let reader = Reader::new(body);
    let at = reader.usize_at(0).ok()?;
    let bytes = reader.bytes_at(at).ok()?;
    String::from_utf8(bytes.to_vec()).ok()
}

pub fn encode_revert_reason(reason: &str) -> Vec<u8> {
    let mut out = ERROR_STRING_SELECTOR.as_bytes().to_vec();
    out.extend_from_slice(&usize_word(WORD));
    out.extend_from_slice(&encode_bytes(reason.as_bytes()));
    out
}

fn encode_cut_tuple(action: &CutAction) -> Vec<u8> {
    let mut tuple = Vec::with_capacity(3 * WORD + (action.selectors.len() + 1) * WORD);
    tuple.extend_from_slice(&address_word(&action.facet_address));
    tuple.extend_from_slice(&usize_word(action.kind.as_u8() as usize));
    tuple.extend_from_slice(&usize_word(3 * WORD));
    tuple.extend_from_slice(&encode_selector_array(&action.selectors));
    tuple
}

/// Length word, one offset word per element (relative to the first offset),
/// then the element encodings.
fn encode_dynamic_array(elements: Vec<Vec<u8>>) -> Vec<u8> {
    let mut out = usize_word(elements.len()).to_vec();
    let mut next = elements.len() * WORD;
    for element in &elements {
        out.extend_from_slice(&usize_word(next));
        next += element.len();
    }
    for element in elements {
        out.extend_from_slice(&element);
    }
    out
}

fn encode_selector_array(selectors: &[Selector]) -> Vec<u8> {
    let mut out = usize_word(selectors.len()).to_vec();
    for selector in selectors {
        let mut word = [0u8; WORD];
        word[..4].copy_from_slice(selector.as_bytes());
        out.extend_from_slice(&word);
    }
    out
}

fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = usize_word(bytes.len()).to_vec();
    out.extend_from_slice(bytes);
    let padding = (WORD - bytes.len() % WORD) % WORD;
    out.extend(std::iter::repeat_n(0u8, padding));
    out
}

fn usize_word(value: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

fn address_word(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn strip_selector(data: &[u8], expected: Selector) -> Result<&[u8], AbiError> {
    if data.len() < 4 || data[..4] != expected.as_bytes()[..] {
        return Err(AbiError::Decode(format!("calldata does not start with {expected}")));
    }
    Ok(&data[4..])
}

/// `base + rel`, failing instead of overflowing on hostile offsets.
fn offset(base: usize, rel: usize) -> Result<usize, AbiError> {
    base.checked_add(rel)
        .ok_or_else(|| AbiError::Decode(format!("offset {base} + {rel} overflows")))
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn word_at(&self, at: usize) -> Result<&'a [u8; WORD], AbiError> {
        at.checked_add(WORD)
            .and_then(|end| self.data.get(at..end))
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| {
                AbiError::Decode(format!(
                    "word at offset {at} out of bounds (len {})",
                    self.data.len()
                ))
            })
    }

    fn usize_at(&self, at: usize) -> Result<usize, AbiError> {
        let word = self.word_at(at)?;
        if word[..WORD - 8].iter().any(|b| *b != 0) {
            return Err(AbiError::Decode(format!("integer at offset {at} exceeds 64 bits")));
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&word[WORD - 8..]);
        usize::try_from(u64::from_be_bytes(buf))
            .map_err(|_| AbiError::Decode(format!("integer at offset {at} exceeds usize")))
    }

    /// Position of a value whose offset word sits at `base + rel`; the
    /// offset is relative to `base`.
    fn relative_at(&self, base: usize, rel: usize) -> Result<usize, AbiError> {
        offset(base, self.usize_at(offset(base, rel)?)?)
    }

    /// Position of element `index` of a dynamic array whose head words start
    /// at `heads`.
    fn element_at(&self, heads: usize, index: usize) -> Result<usize, AbiError> {
        let rel = index
            .checked_mul(WORD)
            .ok_or_else(|| AbiError::Decode(format!("element index {index} overflows")))?;
        self.relative_at(heads, rel)
    }

    fn address_at(&self, at: usize) -> Result<Address, AbiError> {
        Address::from_word(self.word_at(at)?)
    }

    fn selector_array_at(&self, at: usize) -> Result<Vec<Selector>, AbiError> {
        let len = self.usize_at(at)?;
        let mut selectors = Vec::with_capacity(len.min(1024));
        let first = offset(at, WORD)?;
        for i in 0..len {
            let at = i
                .checked_mul(WORD)
                .ok_or_else(|| AbiError::Decode(format!("selector index {i} overflows")))
                .and_then(|rel| offset(first, rel))?;
            let word = self.word_at(at)?;
            selectors.push(Selector::new([word[0], word[1], word[2], word[3]]));
        }
        Ok(selectors)
    }

    fn bytes_at(&self, at: usize) -> Result<&'a [u8], AbiError> {
        let len = self.usize_at(at)?;
        let start = offset(at, WORD)?;
        start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .ok_or_else(|| AbiError::Decode(format!("bytes at offset {at} out of bounds")))
    }
}
