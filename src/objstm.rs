//! Object streams (`/Type /ObjStm`, PDF 1.5+).
//!
//! The decoded stream starts with `/N` pairs of `object-number offset`; each
//! offset is relative to `/First`.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;

/// Unpack every object stored in an object stream.
///
/// Objects that fail to parse are skipped with a warning so a single bad
/// entry does not hide the rest of the stream.
pub fn parse_object_stream(stream_obj: &Object) -> Result<HashMap<u32, Object>> {
    let dict = match stream_obj {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            });
        },
    };
    if dict.get("Type").and_then(|o| o.as_name()) != Some("ObjStm") {
        return Err(Error::InvalidPdf("object stream without /Type /ObjStm".to_string()));
    }
    let count = dict
        .get("N")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("object stream without /N".to_string()))? as usize;
    let first = dict
        .get("First")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("object stream without /First".to_string()))? as usize;

    let data = stream_obj.decode_stream_data()?;
    if first > data.len() {
        return Err(Error::InvalidPdf(format!("/First {} beyond stream length {}", first, data.len())));
    }

    let mut header = &data[..first];
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let Ok((rest, Token::Integer(id))) = token(header) else { break };
        let Ok((rest, Token::Integer(offset))) = token(rest) else { break };
        pairs.push((id as u32, offset as usize));
        header = rest;
    }
    if pairs.len() != count {
        log::warn!("Object stream header lists {} of {} objects", pairs.len(), count);
    }

    let mut objects = HashMap::with_capacity(pairs.len());
    for (id, offset) in pairs {
        let Some(body) = data.get(first + offset..) else {
            log::warn!("Object {} offset {} lies outside its object stream", id, offset);
            continue;
        };
        match parse_object(body) {
            Ok((_, obj)) => {
                objects.insert(id, obj);
            },
            Err(e) => log::warn!("Skipping object {} in object stream: {}", id, e),
        }
    }
    Ok(objects)
}
