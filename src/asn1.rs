//! Minimal deterministic wire codec backing `Message::encode`/`decode`.
//!
//! Spec §1/§6 treats the ASN.1/DER codec for the RFC 4210/4211 structures as
//! an *external collaborator*: "assumed available, deterministic" and
//! explicitly out of scope to design in-tree (spec §1 Non-goals: "No in-tree
//! ASN.1 codec design"). This module is the seam's reference
//! implementation, not a PKIMessage ASN.1 grammar: a canonical, definite-
//! length, tag-prefixed binary framing sufficient to satisfy the round-trip
//! and byte-for-byte-for-identical-input properties spec §6/§8 require. A
//! production deployment swaps this module for a conformant DER encoder
//! without the rest of the engine noticing, since callers only ever see
//! `Message::encode`/`Message::decode`.

use crate::error::{CmpError, Result};

/// Appends a length-prefixed field to `buf`: a 4-byte big-endian length
/// followed by `bytes`.
pub fn write_field(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// A cursor over an encoded buffer, reading length-prefixed fields in the
/// order `write_field` wrote them.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Wraps `buf` for sequential field reads starting at offset 0.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Reads the next length-prefixed field.
    pub fn read_field(&mut self) -> Result<&'a [u8]> {
        if self.pos + 4 > self.buf.len() {
            return Err(CmpError::ErrorDecodingMessage(
                "truncated length prefix".to_string(),
            ));
        }
        let len_bytes: [u8; 4] = self.buf[self.pos..self.pos + 4]
            .try_into()
            .map_err(|_| CmpError::ErrorDecodingMessage("malformed length prefix".to_string()))?;
        let len = u32::from_be_bytes(len_bytes) as usize;
        self.pos += 4;
        if self.pos + len > self.buf.len() {
            return Err(CmpError::ErrorDecodingMessage(
                "field length exceeds remaining buffer".to_string(),
            ));
        }
        let value = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(value)
    }

    /// True if no bytes remain.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

/// Encodes a `u32` as a 4-byte field.
pub fn write_u32(buf: &mut Vec<u8>, v: u32) {
    write_field(buf, &v.to_be_bytes());
}

/// Decodes a `u32` field.
pub fn read_u32(r: &mut Reader<'_>) -> Result<u32> {
    let field = r.read_field()?;
    let bytes: [u8; 4] = field
        .try_into()
        .map_err(|_| CmpError::ErrorDecodingMessage("expected 4-byte u32 field".to_string()))?;
    Ok(u32::from_be_bytes(bytes))
}

/// Encodes a `bool` as a single-byte field.
pub fn write_bool(buf: &mut Vec<u8>, v: bool) {
    write_field(buf, &[v as u8]);
}

/// Decodes a `bool` field.
pub fn read_bool(r: &mut Reader<'_>) -> Result<bool> {
    let field = r.read_field()?;
    match field {
        [0] => Ok(false),
        [1] => Ok(true),
        _ => Err(CmpError::ErrorDecodingMessage("expected bool field".to_string())),
    }
}

/// Encodes `Some(bytes)`/`None` as a presence byte followed by the field.
pub fn write_option(buf: &mut Vec<u8>, v: Option<&[u8]>) {
    match v {
        Some(b) => {
            write_bool(buf, true);
            write_field(buf, b);
        }
        None => write_bool(buf, false),
    }
}

/// Decodes an optional field written by `write_option`.
pub fn read_option<'a>(r: &mut Reader<'a>) -> Result<Option<&'a [u8]>> {
    if read_bool(r)? {
        Ok(Some(r.read_field()?))
    } else {
        Ok(None)
    }
}

/// Encodes a list of already-encoded items as a count followed by the
/// concatenation of their length-prefixed bytes.
pub fn write_vec(buf: &mut Vec<u8>, items: &[Vec<u8>]) {
    write_u32(buf, items.len() as u32);
    for item in items {
        write_field(buf, item);
    }
}

/// Decodes a list written by `write_vec`, applying `decode_one` to each raw
/// field.
pub fn read_vec<'a, T>(
    r: &mut Reader<'a>,
    mut decode_one: impl FnMut(&'a [u8]) -> Result<T>,
) -> Result<Vec<T>> {
    let count = read_u32(r)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(decode_one(r.read_field()?)?);
    }
    Ok(out)
}
