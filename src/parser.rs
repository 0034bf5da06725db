//! Recursive-descent object parser on top of the lexer.
//!
//! Parsing is lenient: streams with a wrong or indirect `/Length` are
//! recovered by scanning for `endstream`, and a CR-only line ending after
//! `stream` is accepted.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Object, ObjectRef};
use nom::IResult;
use std::collections::HashMap;

/// Decode the escape sequences of a literal string body.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            out.push(raw[i]);
            i += 1;
            continue;
        }

        let next = raw[i + 1];
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'(' | b')' | b'\\' => out.push(next),
            // Line continuation
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut code = (next - b'0') as u32;
                let mut digits = 1;
                while digits < 3 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            code = code * 8 + (d - b'0') as u32;
                            i += 1;
                            digits += 1;
                        },
                        _ => break,
                    }
                }
                out.push((code & 0xFF) as u8);
            },
            // Unknown escapes drop the backslash.
            other => out.push(other),
        }
    }

    out
}

/// Decode a hex string body. Whitespace is ignored and an odd final digit is
/// padded with zero.
pub fn decode_hex(hex: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex.iter().copied().filter(|c| !c.is_ascii_whitespace()).collect();
    let mut out = Vec::with_capacity(digits.len().div_ceil(2));

    for pair in digits.chunks(2) {
        let hi = hex_value(pair[0])?;
        let lo = match pair.get(1) {
            Some(&c) => hex_value(c)?,
            None => 0,
        };
        out.push(hi << 4 | lo);
    }
    Ok(out)
}

fn hex_value(c: u8) -> Result<u8> {
    (c as char)
        .to_digit(16)
        .map(|v| v as u8)
        .ok_or_else(|| Error::Decode(format!("invalid hex digit '{}'", c as char)))
}

/// Parse one direct object, recognising `N G R` references and streams.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (rest, tok) = token(input)?;

    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Integer(n) => {
            if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if n >= 0 && (0..=u16::MAX as i64).contains(&gen) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(n as u32, gen as u16))));
                    }
                }
            }
            Ok((rest, Object::Integer(n)))
        },
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string_escapes(raw)))),
        Token::HexString(raw) => match decode_hex(raw) {
            Ok(bytes) => Ok((rest, Object::String(bytes))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::HexDigit))),
        },
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::ArrayStart => parse_array(rest),
        Token::DictStart => {
            let (after_dict, dict) = parse_dictionary(rest)?;
            match token(after_dict) {
                Ok((body, Token::StreamStart)) => {
                    let (after_stream, data) = parse_stream_data(body, &dict)?;
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
        _ => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    }
}

fn parse_array(mut input: &[u8]) -> IResult<&[u8], Object> {
    let mut items = Vec::new();
    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(input) {
            return Ok((rest, Object::Array(items)));
        }
        let (rest, item) = parse_object(input)?;
        items.push(item);
        input = rest;
    }
}

fn parse_dictionary(mut input: &[u8]) -> IResult<&[u8], HashMap<String, Object>> {
    let mut dict = HashMap::new();
    loop {
        let (rest, tok) = token(input)?;
        match tok {
            Token::DictEnd => return Ok((rest, dict)),
            Token::Name(key) => {
                let (rest, value) = parse_object(rest)?;
                // A null value is equivalent to an absent key.
                if !value.is_null() {
                    dict.insert(key, value);
                }
                input = rest;
            },
            _ => {
                return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
            },
        }
    }
}

fn parse_stream_data<'a>(input: &'a [u8], dict: &HashMap<String, Object>) -> IResult<&'a [u8], Vec<u8>> {
    let body = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    if let Some(length) = dict.get("Length").and_then(|o| o.as_integer()) {
        let length = length.max(0) as usize;
        if length <= body.len() {
            if let Ok((rest, Token::StreamEnd)) = token(&body[length..]) {
                return Ok((rest, body[..length].to_vec()));
            }
        }
        log::debug!("Stream /Length {} does not reach endstream, scanning instead", length);
    }

    match find_subslice(body, b"endstream") {
        Some(end) => {
            let mut data_end = end;
            if data_end > 0 && body[data_end - 1] == b'\n' {
                data_end -= 1;
            }
            if data_end > 0 && body[data_end - 1] == b'\r' {
                data_end -= 1;
            }
            Ok((&body[end + b"endstream".len()..], body[..data_end].to_vec()))
        },
        None => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof))),
    }
}

pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parse `N G obj <object> endobj` and return the object's identity with it.
///
/// A missing `endobj` is tolerated.
pub fn parse_indirect_object(input: &[u8]) -> IResult<&[u8], (ObjectRef, Object)> {
    let (rest, id) = token(input)?;
    let (rest, gen) = token(rest)?;
    let (rest, kw) = token(rest)?;
    let (id, gen) = match (id, gen, kw) {
        (Token::Integer(id), Token::Integer(gen), Token::ObjStart)
            if id >= 0 && (0..=u16::MAX as i64).contains(&gen) =>
        {
            (id as u32, gen as u16)
        },
        _ => return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    };

    let (rest, object) = parse_object(rest)?;
    let rest = match token(rest) {
        Ok((after, Token::ObjEnd)) => after,
        _ => rest,
    };
    Ok((rest, (ObjectRef::new(id, gen), object)))
}

/// Build a [`Error::ParseError`] positioned at `offset` within the file.
pub(crate) fn parse_error(offset: usize, reason: impl Into<String>) -> Error {
    Error::ParseError {
        offset,
        reason: reason.into(),
    }
}
