//! Canonical Solidity signatures.
//!
//! A canonical signature is `name(t1,t2,...)` with every parameter type in its
//! canonical elementary form (`uint` becomes `uint256`, tuples expand to their
//! component list, and so on). Selectors are derived from this form only.

use crate::error::AbiError;
use crate::interface::AbiParam;

/// Canonical type string for an ABI parameter, expanding tuple components.
pub fn canonical_param(param: &AbiParam) -> Result<String, AbiError> {
    let ty = param.ty.trim();
    let (base, suffix) = split_array_suffix(ty);
    let suffix = canonical_array_suffix(suffix, ty)?;
    let base = if base == "tuple" {
        if param.components.is_empty() {
            return Err(AbiError::malformed(
                ty,
                "tuple parameter has no components",
            ));
        }
        let inner = param
            .components
            .iter()
            .map(canonical_param)
            .collect::<Result<Vec<_>, _>>()?;
        format!("({})", inner.join(","))
    } else {
        canonical_elementary(base, ty)?
    };
    Ok(format!("{base}{suffix}"))
}

/// Canonical `name(types)` signature for a named parameter list.
pub fn canonical_signature(name: &str, params: &[AbiParam]) -> Result<String, AbiError> {
    if !is_identifier(name) {
        return Err(AbiError::malformed(name, "invalid function name"));
    }
    let types = params
        .iter()
        .map(canonical_param)
        .collect::<Result<Vec<_>, AbiError>>()
        .map_err(|err| match err {
            AbiError::MalformedSignature { reason, .. } => {
                AbiError::malformed(display_signature(name, params), reason)
            }
            other => other,
        })?;
    Ok(format!("{name}({})", types.join(",")))
}

/// Parse a human-written signature and return its canonical form.
///
/// Accepts parameter names and data-location keywords after each type
/// (`transfer(address to, uint amount)`), `tuple(...)` as well as bare
/// `(...)` tuples, and a bare function name, which denotes the zero-argument
/// signature.
pub fn canonicalize(text: &str) -> Result<String, AbiError> {
    let trimmed = text.trim();
    let Some(open) = trimmed.find('(') else {
        if !is_identifier(trimmed) {
            return Err(AbiError::malformed(text, "invalid function name"));
        }
        return Ok(format!("{trimmed}()"));
    };
    let name = trimmed[..open].trim();
    if !is_identifier(name) {
        return Err(AbiError::malformed(text, "invalid function name"));
    }
    let mut parser = Parser {
        src: text,
        bytes: trimmed.as_bytes(),
        pos: open,
    };
    let params = parser.list()?;
    parser.skip_ws();
    if parser.pos != parser.bytes.len() {
        return Err(AbiError::malformed(text, "trailing characters after parameter list"));
    }
    Ok(format!("{name}({})", params.join(",")))
}

fn display_signature(name: &str, params: &[AbiParam]) -> String {
    let types: Vec<&str> = params.iter().map(|p| p.ty.as_str()).collect();
    format!("{name}({})", types.join(","))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn split_array_suffix(ty: &str) -> (&str, &str) {
    match ty.find('[') {
        Some(idx) => (&ty[..idx], &ty[idx..]),
        None => (ty, ""),
    }
}

fn canonical_array_suffix(suffix: &str, full: &str) -> Result<String, AbiError> {
    let mut out = String::with_capacity(suffix.len());
    let mut rest = suffix;
    while !rest.is_empty() {
        let Some(close) = rest.find(']') else {
            return Err(AbiError::malformed(full, "unterminated array suffix"));
        };
        if !rest.starts_with('[') {
            return Err(AbiError::malformed(full, "unexpected characters in array suffix"));
        }
        let len = &rest[1..close];
        if len.is_empty() {
            out.push_str("[]");
        } else {
            match len.parse::<u64>() {
                Ok(n) if n > 0 => out.push_str(&format!("[{n}]")),
                _ => {
                    return Err(AbiError::malformed(
                        full,
                        format!("invalid array length '{len}'"),
                    ));
                }
            }
        }
        rest = &rest[close + 1..];
    }
    Ok(out)
}

fn canonical_elementary(base: &str, full: &str) -> Result<String, AbiError> {
    let canonical = match base {
        "address" | "bool" | "string" | "bytes" | "function" => base.to_string(),
        "uint" => "uint256".into(),
        "int" => "int256".into(),
        "byte" => "bytes1".into(),
        "fixed" => "fixed128x18".into(),
        "ufixed" => "ufixed128x18".into(),
        _ => {
            if let Some(bits) = base.strip_prefix("uint") {
                int_width(bits, full)?;
            } else if let Some(bits) = base.strip_prefix("int") {
                int_width(bits, full)?;
            } else if let Some(size) = base.strip_prefix("bytes") {
                match size.parse::<u8>() {
                    Ok(n) if (1..=32).contains(&n) => {}
                    _ => return Err(AbiError::malformed(full, format!("invalid bytes size in '{base}'"))),
                }
            } else if let Some(spec) = base.strip_prefix("ufixed") {
                fixed_spec(spec, full)?;
            } else if let Some(spec) = base.strip_prefix("fixed") {
                fixed_spec(spec, full)?;
            } else {
                return Err(AbiError::malformed(full, format!("unresolved type '{base}'")));
            }
            base.to_string()
        }
    };
    Ok(canonical)
}

fn int_width(bits: &str, full: &str) -> Result<(), AbiError> {
    match bits.parse::<u16>() {
        Ok(n) if (8..=256).contains(&n) && n % 8 == 0 => Ok(()),
        _ => Err(AbiError::malformed(full, format!("invalid integer width '{bits}'"))),
    }
}

fn fixed_spec(spec: &str, full: &str) -> Result<(), AbiError> {
    let Some((m, n)) = spec.split_once('x') else {
        return Err(AbiError::malformed(full, "fixed-point type needs MxN"));
    };
    match (m.parse::<u16>(), n.parse::<u16>()) {
        (Ok(m), Ok(n)) if (8..=256).contains(&m) && m % 8 == 0 && n <= 80 => Ok(()),
        _ => Err(AbiError::malformed(full, format!("invalid fixed-point spec '{spec}'"))),
    }
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn list(&mut self) -> Result<Vec<String>, AbiError> {
        self.expect(b'(')?;
        let mut params = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b')') {
            self.pos += 1;
            return Ok(params);
        }
        loop {
            params.push(self.param()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => {
                    self.pos += 1;
                    return Ok(params);
                }
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
    }

    fn param(&mut self) -> Result<String, AbiError> {
        self.skip_ws();
        let base = if self.peek() == Some(b'(') {
            format!("({})", self.list()?.join(","))
        } else {
            let word = self.word();
            if word.is_empty() {
                return Err(self.error("missing parameter type"));
            }
            self.skip_ws();
            if word == "tuple" && self.peek() == Some(b'(') {
                format!("({})", self.list()?.join(","))
            } else {
                canonical_elementary(&word, self.src)?
            }
        };
        self.skip_ws();
        let suffix_start = self.pos;
        while self.peek() == Some(b'[') {
            while let Some(c) = self.peek() {
                self.pos += 1;
                if c == b']' {
                    break;
                }
            }
        }
        let suffix = canonical_array_suffix(&self.text(suffix_start, self.pos), self.src)?;
        // Trailing parameter names and keywords (`indexed`, `memory`, ...) carry
        // no type information.
        loop {
            self.skip_ws();
            if self.word().is_empty() {
                break;
            }
        }
        Ok(format!("{base}{suffix}"))
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'$' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.text(start, self.pos)
    }

    fn text(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.bytes[start..end]).into_owned()
    }

    fn expect(&mut self, c: u8) -> Result<(), AbiError> {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c as char)))
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn error(&self, reason: &str) -> AbiError {
        AbiError::malformed(self.src, format!("{reason} at offset {}", self.pos))
    }
}
