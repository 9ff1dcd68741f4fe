//! PDF tokenizer.
//!
//! Splits PDF syntax into tokens using `nom` combinators. String tokens are
//! returned already unescaped; bare words (`obj`, `R`, `stream`, `xref`, ...)
//! come back as [`Token::Keyword`] and are interpreted by the parser.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map, opt, recognize, value},
    sequence::{pair, preceded, tuple},
    IResult,
};

/// A lexical token.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    Integer(i64),
    Real(f64),
    /// Unescaped contents of a `( ... )` string
    LiteralString(Vec<u8>),
    /// Decoded contents of a `< ... >` string
    HexString(Vec<u8>),
    /// Name with `#xx` escapes resolved, without the slash
    Name(String),
    Boolean(bool),
    Null,
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    /// Any other bare word
    Keyword(&'a [u8]),
}

/// PDF whitespace characters.
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters.
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

/// Skip whitespace and comments.
pub fn skip_ws(mut input: &[u8]) -> &[u8] {
    loop {
        match input.first() {
            Some(&c) if is_whitespace(c) => input = &input[1..],
            Some(b'%') => {
                let end = input
                    .iter()
                    .position(|&c| c == b'\r' || c == b'\n')
                    .unwrap_or(input.len());
                input = &input[end..];
            },
            _ => return input,
        }
    }
}

fn number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
    )))(input)?;

    // A number must not run into a regular character ("12abc").
    if rest.first().is_some_and(|&c| is_regular(c) && c != b'.') {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    let text = std::str::from_utf8(text).unwrap_or("0");
    let token = if text.contains('.') {
        Token::Real(text.parse().unwrap_or(0.0))
    } else {
        match text.parse::<i64>() {
            Ok(i) => Token::Integer(i),
            Err(_) => Token::Real(text.parse().unwrap_or(0.0)),
        }
    };
    Ok((rest, token))
}

fn literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut out = Vec::new();
    let mut depth = 1usize;
    let mut i = 0;

    while i < body.len() {
        let c = body[i];
        i += 1;
        match c {
            b'\\' => {
                let Some(&next) = body.get(i) else { break };
                i += 1;
                match next {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0C),
                    b'0'..=b'7' => {
                        let mut code = (next - b'0') as u32;
                        for _ in 0..2 {
                            match body.get(i) {
                                Some(&d @ b'0'..=b'7') => {
                                    code = code * 8 + (d - b'0') as u32;
                                    i += 1;
                                },
                                _ => break,
                            }
                        }
                        out.push((code & 0xFF) as u8);
                    },
                    // Line continuation
                    b'\r' => {
                        if body.get(i) == Some(&b'\n') {
                            i += 1;
                        }
                    },
                    b'\n' => {},
                    other => out.push(other),
                }
            },
            b'(' => {
                depth += 1;
                out.push(c);
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[i..], Token::LiteralString(out)));
                }
                out.push(c);
            },
            b'\r' => {
                if body.get(i) == Some(&b'\n') {
                    i += 1;
                }
                out.push(b'\n');
            },
            _ => out.push(c),
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char)))
}

/// Decode hex digits, ignoring whitespace and padding an odd final digit with 0.
pub fn decode_hex(digits: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = digits
        .iter()
        .filter_map(|&c| (c as char).to_digit(16).map(|d| d as u8))
        .collect();
    nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, digits) = preceded(
        char('<'),
        take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
    )(input)?;
    let (rest, _) = char('>')(rest)?;
    Ok((rest, Token::HexString(decode_hex(digits))))
}

fn name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, raw) = preceded(char('/'), take_while(is_regular))(input)?;
    let mut decoded = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' {
            if let Some(byte) = raw
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
            {
                decoded.push(byte as char);
                i += 3;
                continue;
            }
        }
        decoded.push(raw[i] as char);
        i += 1;
    }
    Ok((rest, Token::Name(decoded)))
}

fn keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(take_while1(is_regular), |word: &[u8]| match word {
        b"true" => Token::Boolean(true),
        b"false" => Token::Boolean(false),
        b"null" => Token::Null,
        other => Token::Keyword(other),
    })(input)
}

/// Read the next token, skipping leading whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);
    alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
        hex_string,
        literal_string,
        name,
        number,
        keyword,
    ))(input)
}
