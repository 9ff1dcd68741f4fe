//! PDF object parser.
//!
//! Builds [`Object`] values from lexer tokens by recursive descent. All entry
//! points return `IResult` except [`parse_indirect_object_at`], which converts
//! failures into crate errors carrying the byte offset.

use crate::error::{Error, Result};
use crate::lexer::{skip_ws, token, Token};
use crate::object::{Dict, Object, ObjectRef};
use nom::IResult;

/// Nesting limit for arrays and dictionaries.
const MAX_DEPTH: usize = 64;

fn fail<T>(input: &[u8]) -> IResult<&[u8], T> {
    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Verify)))
}

/// Parse one direct object (or `n g R` reference, or stream).
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_nested(input, 0)
}

fn parse_nested(input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    if depth > MAX_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }

    let (rest, tok) = token(input)?;
    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::Boolean(b) => Ok((rest, Object::Boolean(b))),
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::LiteralString(s) | Token::HexString(s) => Ok((rest, Object::String(s))),
        Token::Name(n) => Ok((rest, Object::Name(n))),
        Token::Integer(id) => {
            // "id gen R" is a reference; anything else leaves a plain integer.
            if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                if let Ok((after_r, Token::Keyword(b"R"))) = token(after_gen) {
                    if (0..=u32::MAX as i64).contains(&id) && (0..=u16::MAX as i64).contains(&gen)
                    {
                        return Ok((after_r, Object::Reference(ObjectRef::new(id as u32, gen as u16))));
                    }
                }
            }
            Ok((rest, Object::Integer(id)))
        },
        Token::ArrayStart => {
            let mut items = Vec::new();
            let mut cursor = rest;
            loop {
                if let Ok((after, Token::ArrayEnd)) = token(cursor) {
                    return Ok((after, Object::Array(items)));
                }
                let (after, item) = parse_nested(cursor, depth + 1)?;
                items.push(item);
                cursor = after;
            }
        },
        Token::DictStart => {
            let (after_dict, dict) = parse_dict_body(rest, depth)?;
            match token(after_dict) {
                Ok((after_kw, Token::Keyword(b"stream"))) => {
                    let (after_stream, data) = parse_stream_data(after_kw, &dict)?;
                    Ok((
                        after_stream,
                        Object::Stream {
                            dict,
                            data: bytes::Bytes::from(data),
                        },
                    ))
                },
                _ => Ok((after_dict, Object::Dictionary(dict))),
            }
        },
        _ => fail(input),
    }
}

fn parse_dict_body(input: &[u8], depth: usize) -> IResult<&[u8], Dict> {
    let mut dict = Dict::new();
    let mut cursor = input;
    loop {
        let (after, tok) = token(cursor)?;
        match tok {
            Token::DictEnd => return Ok((after, dict)),
            Token::Name(key) => {
                let (after_value, value) = parse_nested(after, depth + 1)?;
                // A null value is equivalent to an absent key.
                if !value.is_null() {
                    dict.insert(key, value);
                }
                cursor = after_value;
            },
            _ => return fail(cursor),
        }
    }
}

/// Read stream bytes following the `stream` keyword.
///
/// Uses a direct `/Length` when it lands on `endstream`, otherwise scans for
/// the `endstream` keyword.
fn parse_stream_data<'a>(input: &'a [u8], dict: &Dict) -> IResult<&'a [u8], Vec<u8>> {
    let body = match input {
        [b'\r', b'\n', rest @ ..] => rest,
        [b'\n', rest @ ..] | [b'\r', rest @ ..] => rest,
        other => other,
    };

    if let Some(length) = dict.get("Length").and_then(Object::as_integer) {
        let length = length.max(0) as usize;
        if length <= body.len() {
            let after = skip_ws(&body[length..]);
            if let Some(rest) = after.strip_prefix(b"endstream".as_slice()) {
                return Ok((rest, body[..length].to_vec()));
            }
        }
    }

    match find(body, b"endstream") {
        Some(pos) => {
            let mut end = pos;
            if end > 0 && body[end - 1] == b'\n' {
                end -= 1;
            }
            if end > 0 && body[end - 1] == b'\r' {
                end -= 1;
            }
            Ok((&body[pos + b"endstream".len()..], body[..end].to_vec()))
        },
        None => fail(input),
    }
}

/// Position of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Position of the last occurrence of `needle` in `haystack`.
pub fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Parse `id gen obj <object> endobj`.
pub fn parse_indirect_object(input: &[u8]) -> IResult<&[u8], (ObjectRef, Object)> {
    let (rest, id) = token(input)?;
    let (rest, gen) = token(rest)?;
    let (rest, kw) = token(rest)?;
    let (Token::Integer(id), Token::Integer(gen), Token::Keyword(b"obj")) = (id, gen, kw) else {
        return fail(input);
    };
    let (rest, object) = parse_object(rest)?;
    let rest = match token(rest) {
        Ok((after, Token::Keyword(b"endobj"))) => after,
        _ => rest,
    };
    Ok((rest, (ObjectRef::new(id as u32, gen as u16), object)))
}

/// Parse the indirect object that starts at `offset` in `data`.
pub fn parse_indirect_object_at(data: &[u8], offset: usize) -> Result<(ObjectRef, Object)> {
    let slice = data.get(offset..).ok_or_else(|| Error::ParseError {
        offset,
        reason: format!("offset beyond end of file ({} bytes)", data.len()),
    })?;
    parse_indirect_object(slice)
        .map(|(_, parsed)| parsed)
        .map_err(|e| Error::ParseError {
            offset,
            reason: format!("malformed indirect object: {:?}", e.map(|e| e.code)),
        })
}
