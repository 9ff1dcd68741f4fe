//! Cross-reference parsing.
//!
//! Reads classic `xref` tables, cross-reference streams (PDF 1.5+) and hybrid
//! files whose trailer points at an `/XRefStm`. Sections are followed through
//! `/Prev` from newest to oldest; an entry from a newer section always wins.

use crate::error::{Error, Result};
use crate::lexer::skip_ws;
use crate::object::{Dict, Object};
use crate::parser::{parse_indirect_object_at, parse_object, rfind};
use std::collections::{HashMap, HashSet};

/// Location of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Unused object number
    Free,
    /// Object stored directly in the file at `offset`
    InUse {
        /// Byte offset of `id gen obj`
        offset: usize,
        /// Generation number
        generation: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the `/ObjStm`
        stream: u32,
        /// Index within the stream
        index: u32,
    },
}

/// Kind of cross-reference section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefKind {
    /// `xref` keyword table followed by `trailer`
    Table,
    /// `/Type /XRef` stream
    Stream,
}

/// Merged cross-reference data for one revision of a file.
#[derive(Debug, Clone)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Dict,
    kind: XRefKind,
    startxref: usize,
}

impl CrossRefTable {
    /// Entry for an object number.
    pub fn get(&self, id: u32) -> Option<&XRefEntry> {
        self.entries.get(&id)
    }

    /// Trailer of the newest section.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Kind of the newest section.
    pub fn kind(&self) -> XRefKind {
        self.kind
    }

    /// Offset of the newest section.
    pub fn startxref(&self) -> usize {
        self.startxref
    }

    /// Number of known object numbers (including free ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest object number present in any section.
    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }

    fn merge_older(&mut self, entries: HashMap<u32, XRefEntry>) {
        for (id, entry) in entries {
            self.entries.entry(id).or_insert(entry);
        }
    }
}

/// Locate the offset recorded after the last `startxref` keyword.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    // Only the tail of the file matters; tolerate trailing garbage.
    let tail_start = data.len().saturating_sub(4096);
    let tail = &data[tail_start..];
    let pos = rfind(tail, b"startxref")
        .ok_or_else(|| Error::InvalidPdf("startxref not found".to_string()))?;
    let digits: String = skip_ws(&tail[pos + b"startxref".len()..])
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .map(|&c| c as char)
        .collect();
    digits
        .parse()
        .map_err(|_| Error::InvalidPdf("startxref offset is not a number".to_string()))
}

/// Parse every cross-reference section reachable from the last `startxref`.
pub fn parse_xref(data: &[u8]) -> Result<CrossRefTable> {
    let startxref = find_startxref(data)?;
    let (entries, trailer, kind) = parse_section(data, startxref)?;
    log::debug!(
        "Newest xref section at {} is a {:?} with {} entries",
        startxref,
        kind,
        entries.len()
    );

    let mut table = CrossRefTable {
        entries,
        trailer: trailer.clone(),
        kind,
        startxref,
    };

    let mut visited = HashSet::from([startxref]);
    let mut prev = trailer.get("Prev").and_then(Object::as_integer);
    while let Some(offset) = prev {
        let offset = usize::try_from(offset)
            .map_err(|_| Error::InvalidPdf(format!("negative /Prev offset {}", offset)))?;
        if !visited.insert(offset) {
            log::warn!("xref /Prev chain loops back to offset {}; stopping", offset);
            break;
        }
        let (entries, older_trailer, _) = parse_section(data, offset)?;
        table.merge_older(entries);
        prev = older_trailer.get("Prev").and_then(Object::as_integer);
    }

    if !table.trailer.contains_key("Root") {
        return Err(Error::InvalidPdf("trailer has no /Root".to_string()));
    }
    Ok(table)
}

type Section = (HashMap<u32, XRefEntry>, Dict, XRefKind);

fn parse_section(data: &[u8], offset: usize) -> Result<Section> {
    let at = data.get(offset..).ok_or_else(|| Error::ParseError {
        offset,
        reason: "xref offset beyond end of file".to_string(),
    })?;

    if skip_ws(at).starts_with(b"xref") {
        let (mut entries, trailer) = parse_table(data, offset)?;
        // Hybrid file: the table's own entries override the companion stream.
        if let Some(stm) = trailer.get("XRefStm").and_then(Object::as_integer) {
            let (stream_entries, _) = parse_stream(data, stm.max(0) as usize)?;
            for (id, entry) in stream_entries {
                entries.entry(id).or_insert(entry);
            }
        }
        Ok((entries, trailer, XRefKind::Table))
    } else {
        let (entries, trailer) = parse_stream(data, offset)?;
        Ok((entries, trailer, XRefKind::Stream))
    }
}

fn read_uint(input: &[u8]) -> Option<(&[u8], u64)> {
    let input = skip_ws(input);
    let len = input.iter().take_while(|c| c.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }
    let value = std::str::from_utf8(&input[..len]).ok()?.parse().ok()?;
    Some((&input[len..], value))
}

fn parse_table(data: &[u8], offset: usize) -> Result<(HashMap<u32, XRefEntry>, Dict)> {
    let err = |reason: &str| Error::ParseError {
        offset,
        reason: reason.to_string(),
    };

    let mut cursor = &skip_ws(&data[offset..])[b"xref".len()..];
    let mut entries = HashMap::new();

    loop {
        cursor = skip_ws(cursor);
        if let Some(rest) = cursor.strip_prefix(b"trailer".as_slice()) {
            let (_, trailer) =
                parse_object(rest).map_err(|_| err("malformed trailer dictionary"))?;
            let Object::Dictionary(trailer) = trailer else {
                return Err(err("trailer is not a dictionary"));
            };
            return Ok((entries, trailer));
        }

        let (rest, first) = read_uint(cursor).ok_or_else(|| err("bad subsection header"))?;
        let (rest, count) = read_uint(rest).ok_or_else(|| err("bad subsection header"))?;
        cursor = rest;

        for i in 0..count {
            let (rest, field1) = read_uint(cursor).ok_or_else(|| err("bad xref entry"))?;
            let (rest, field2) = read_uint(rest).ok_or_else(|| err("bad xref entry"))?;
            let rest = skip_ws(rest);
            let kind = rest.first().copied().ok_or_else(|| err("truncated xref entry"))?;
            cursor = &rest[1..];

            let id = (first + i) as u32;
            let entry = match kind {
                b'n' => XRefEntry::InUse {
                    offset: field1 as usize,
                    generation: field2 as u16,
                },
                b'f' => XRefEntry::Free,
                _ => return Err(err("xref entry type is neither 'n' nor 'f'")),
            };
            entries.insert(id, entry);
        }
    }
}

fn parse_stream(data: &[u8], offset: usize) -> Result<(HashMap<u32, XRefEntry>, Dict)> {
    let (_, object) = parse_indirect_object_at(data, offset)?;
    let dict = object
        .as_dict()
        .filter(|d| d.get("Type").and_then(Object::as_name) == Some("XRef"))
        .cloned()
        .ok_or_else(|| Error::ParseError {
            offset,
            reason: "expected an xref table or /Type /XRef stream".to_string(),
        })?;

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .map(|w| w.iter().filter_map(Object::as_integer).map(|v| v.max(0) as usize).collect())
        .unwrap_or_default();
    if widths.len() != 3 {
        return Err(Error::InvalidPdf(format!("xref stream at {} has a bad /W", offset)));
    }

    let size = dict.get("Size").and_then(Object::as_integer).unwrap_or(0);
    let index: Vec<i64> = dict
        .get("Index")
        .and_then(Object::as_array)
        .map(|a| a.iter().filter_map(Object::as_integer).collect())
        .unwrap_or_else(|| vec![0, size]);

    let body = object.decode_stream_data()?;
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(Error::InvalidPdf(format!("xref stream at {} has zero-width rows", offset)));
    }
    let mut rows = body.chunks_exact(row_len);
    let mut entries = HashMap::new();

    for pair in index.chunks(2) {
        let [first, count] = pair else { break };
        for i in 0..*count {
            let Some(row) = rows.next() else {
                log::warn!("xref stream at {} is shorter than its /Index", offset);
                return Ok((entries, dict));
            };
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            // A zero-width type field defaults to type 1.
            let kind = if widths[0] == 0 { 1 } else { be_uint(f1) };
            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::InUse {
                    offset: be_uint(f2) as usize,
                    generation: be_uint(f3) as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: be_uint(f2) as u32,
                    index: be_uint(f3) as u32,
                },
                _ => continue,
            };
            entries.insert((first + i) as u32, entry);
        }
    }

    Ok((entries, dict))
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}
