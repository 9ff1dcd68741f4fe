//! Object streams (PDF 1.5+).
//!
//! A `/Type /ObjStm` stream packs `/N` objects: a header of `id offset` pairs
//! followed, from byte `/First`, by the objects themselves.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;

/// Decode an object stream and return its objects keyed by object number.
pub fn parse_object_stream(stream_obj: &Object) -> Result<HashMap<u32, Object>> {
    let dict = stream_obj
        .as_dict()
        .ok_or_else(|| Error::InvalidPdf("object stream is not a stream".to_string()))?;
    if dict.get("Type").and_then(Object::as_name) != Some("ObjStm") {
        return Err(Error::InvalidPdf("stream is not /Type /ObjStm".to_string()));
    }

    let count = dict.get("N").and_then(Object::as_integer).unwrap_or(0).max(0) as usize;
    let first = dict.get("First").and_then(Object::as_integer).unwrap_or(0).max(0) as usize;
    let data = stream_obj.decode_stream_data()?;
    if first > data.len() {
        return Err(Error::InvalidPdf(format!(
            "object stream /First {} beyond decoded length {}",
            first,
            data.len()
        )));
    }

    let mut header = &data[..first];
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let (rest, id) = token(header).map_err(|_| header_error())?;
        let (rest, offset) = token(rest).map_err(|_| header_error())?;
        match (id, offset) {
            (Token::Integer(id), Token::Integer(offset)) if id >= 0 && offset >= 0 => {
                pairs.push((id as u32, offset as usize));
            },
            _ => return Err(header_error()),
        }
        header = rest;
    }

    let body = &data[first..];
    let mut objects = HashMap::with_capacity(pairs.len());
    for (id, offset) in pairs {
        let Some(slice) = body.get(offset..) else {
            log::warn!("object {} offset {} lies outside its object stream", id, offset);
            continue;
        };
        match parse_object(slice) {
            Ok((_, object)) => {
                objects.insert(id, object);
            },
            Err(e) => log::warn!("object {} in object stream failed to parse: {:?}", id, e),
        }
    }
    Ok(objects)
}

fn header_error() -> Error {
    Error::InvalidPdf("malformed object stream header".to_string())
}
