//! Incremental updates.
//!
//! New and replaced objects are appended after the previous revision's
//! `%%EOF`, followed by a cross-reference section of the same kind as the
//! newest existing one and a trailer chaining back through `/Prev`. The bytes
//! of the previous revision are never touched.

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::writer::ObjectSerializer;
use crate::xref::{CrossRefTable, XRefKind};
use md5::{Digest, Md5};

/// Appends one incremental revision to a document.
#[derive(Debug)]
pub struct IncrementalWriter {
    data: Vec<u8>,
    base_len: usize,
    prev_startxref: usize,
    kind: XRefKind,
    trailer: Dict,
    next_id: u32,
    entries: Vec<(ObjectRef, usize)>,
    serializer: ObjectSerializer,
}

impl IncrementalWriter {
    /// Start an update on top of `base`, whose merged cross-reference data is
    /// `xref`. New object numbers start at `next_object_number`.
    pub fn new(base: Vec<u8>, xref: &CrossRefTable, next_object_number: u32) -> Self {
        let base_len = base.len();
        let mut data = base;
        if !data.ends_with(b"\n") && !data.ends_with(b"\r") {
            data.push(b'\n');
        }
        log::debug!(
            "Incremental update after {} bytes, previous xref {:?} at {}",
            base_len,
            xref.kind(),
            xref.startxref()
        );
        Self {
            data,
            base_len,
            prev_startxref: xref.startxref(),
            kind: xref.kind(),
            trailer: xref.trailer().clone(),
            next_id: next_object_number,
            entries: Vec::new(),
            serializer: ObjectSerializer::new(),
        }
    }

    /// Reserve a fresh object number.
    pub fn allocate(&mut self) -> ObjectRef {
        let r = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        r
    }

    /// Current length of the output.
    pub fn position(&self) -> usize {
        self.data.len()
    }

    fn begin(&mut self, r: ObjectRef) {
        self.entries.retain(|(existing, _)| existing.id != r.id);
        self.entries.push((r, self.data.len()));
        self.data.extend_from_slice(format!("{} {} obj\n", r.id, r.gen).as_bytes());
    }

    /// Append `obj` under `r`, replacing any earlier definition of the number.
    pub fn write_object(&mut self, r: ObjectRef, obj: &Object) {
        self.begin(r);
        self.serializer.write_object(&mut self.data, obj);
        self.data.extend_from_slice(b"\nendobj\n");
    }

    /// Append a pre-serialized object body; returns the offset of its first byte.
    pub fn write_raw_object(&mut self, r: ObjectRef, body: &[u8]) -> usize {
        self.begin(r);
        let body_offset = self.data.len();
        self.data.extend_from_slice(body);
        self.data.extend_from_slice(b"\nendobj\n");
        body_offset
    }

    /// Write the cross-reference section and trailer.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let root = self
            .trailer
            .get("Root")
            .cloned()
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root".to_string()))?;
        let info = self.trailer.get("Info").cloned();
        let new_id = Md5::digest(&self.data[self.base_len..]).to_vec();
        let original_id = self
            .trailer
            .get("ID")
            .and_then(|id| id.as_array())
            .and_then(|ids| ids.first())
            .and_then(|first| first.as_string())
            .map(|s| s.to_vec())
            .unwrap_or_else(|| new_id.clone());

        let mut trailer = Dict::new();
        trailer.insert("Root".to_string(), root);
        if let Some(info) = info {
            trailer.insert("Info".to_string(), info);
        }
        trailer.insert(
            "ID".to_string(),
            Object::Array(vec![Object::String(original_id), Object::String(new_id)]),
        );
        trailer.insert("Prev".to_string(), Object::Integer(self.prev_startxref as i64));

        let xref_offset = match self.kind {
            XRefKind::Table => self.write_table(trailer),
            XRefKind::Stream => self.write_stream(trailer),
        };
        self.data
            .extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
        log::debug!(
            "Incremental update of {} objects, xref at {}, {} bytes total",
            self.entries.len(),
            xref_offset,
            self.data.len()
        );
        Ok(self.data)
    }

    fn size(&self) -> u32 {
        let previous = self
            .trailer
            .get("Size")
            .and_then(|s| s.as_integer())
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(0);
        previous.max(self.next_id)
    }

    /// Entries sorted by number, grouped into runs of consecutive numbers.
    fn subsections(&self) -> Vec<Vec<(ObjectRef, usize)>> {
        let mut sorted = self.entries.clone();
        sorted.sort_by_key(|(r, _)| r.id);
        let mut groups: Vec<Vec<(ObjectRef, usize)>> = Vec::new();
        for entry in sorted {
            match groups.last_mut() {
                Some(group) if group.last().is_some_and(|(last, _)| last.id + 1 == entry.0.id) => {
                    group.push(entry)
                },
                _ => groups.push(vec![entry]),
            }
        }
        groups
    }

    fn write_table(&mut self, mut trailer: Dict) -> usize {
        let xref_offset = self.data.len();
        self.data.extend_from_slice(b"xref\n");
        for group in self.subsections() {
            self.data
                .extend_from_slice(format!("{} {}\n", group[0].0.id, group.len()).as_bytes());
            for (r, offset) in group {
                self.data
                    .extend_from_slice(format!("{:010} {:05} n\r\n", offset, r.gen).as_bytes());
            }
        }
        trailer.insert("Size".to_string(), Object::Integer(self.size() as i64));
        trailer.move_index(trailer.len() - 1, 0);
        self.data.extend_from_slice(b"trailer\n");
        let serialized = self.serializer.serialize(&Object::Dictionary(trailer));
        self.data.extend_from_slice(&serialized);
        self.data.push(b'\n');
        xref_offset
    }

    fn write_stream(&mut self, trailer: Dict) -> usize {
        let stream_ref = self.allocate();
        let xref_offset = self.data.len();
        self.entries.push((stream_ref, xref_offset));

        let max_offset = self.entries.iter().map(|(_, o)| *o).max().unwrap_or(0);
        let max_gen = self.entries.iter().map(|(r, _)| r.gen).max().unwrap_or(0);
        let offset_width = byte_width(max_offset as u64);
        let gen_width = byte_width(max_gen as u64);

        let mut index = Vec::new();
        let mut rows = Vec::new();
        for group in self.subsections() {
            index.push(Object::Integer(group[0].0.id as i64));
            index.push(Object::Integer(group.len() as i64));
            for (r, offset) in group {
                rows.push(1u8);
                rows.extend_from_slice(&be_bytes(offset as u64, offset_width));
                rows.extend_from_slice(&be_bytes(r.gen as u64, gen_width));
            }
        }

        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("XRef"));
        dict.insert("Size".to_string(), Object::Integer(self.size() as i64));
        dict.insert("Index".to_string(), Object::Array(index));
        dict.insert(
            "W".to_string(),
            Object::Array(vec![
                Object::Integer(1),
                Object::Integer(offset_width as i64),
                Object::Integer(gen_width as i64),
            ]),
        );
        dict.extend(trailer);

        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from(rows),
        };
        let serialized = self
            .serializer
            .serialize_indirect(stream_ref.id, stream_ref.gen, &stream);
        self.data.extend_from_slice(&serialized);
        xref_offset
    }
}

/// Bytes needed to hold `value` (at least one).
fn byte_width(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

fn be_bytes(value: u64, width: usize) -> Vec<u8> {
    value.to_be_bytes()[8 - width..].to_vec()
}
