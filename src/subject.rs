//! Subject extraction from annotation dictionaries.
//!
//! Markup tools store the equipment label in `/Subj`, but older files use
//! `/Subject`, `/T` or even `/Contents`. Some exporters also write the label
//! as a hex dump of its bytes, which is translated back here.

use crate::object::Object;
use std::collections::HashMap;

/// Keys searched for a subject, in priority order.
pub const SUBJECT_KEYS: [&str; 4] = ["Subj", "Subject", "T", "Contents"];

/// Decode a PDF text string.
///
/// UTF-16BE and UTF-16LE are recognised by their byte order marks; anything
/// else is read as single-byte PDFDocEncoding (Latin-1 for printable text).
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(body) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let units: Vec<u16> = body.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode text as a PDF text string: plain bytes when every character fits
/// in Latin-1, UTF-16BE with BOM otherwise.
pub fn encode_text_string(text: &str) -> Object {
    if text.chars().all(|c| (c as u32) < 0x100) {
        return Object::String(text.chars().map(|c| c as u8).collect());
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes)
}

fn text_value(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes) => Some(decode_text_string(bytes)),
        Object::Name(name) => Some(name.clone()),
        _ => None,
    }
}

/// Raw subject of an annotation: the first non-empty value among
/// [`SUBJECT_KEYS`], or an empty string.
pub fn extract_subject(dict: &HashMap<String, Object>) -> String {
    SUBJECT_KEYS
        .iter()
        .filter_map(|key| dict.get(*key).and_then(text_value))
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// Heuristic for subjects stored as hex dumps.
///
/// The string must be at least four characters of even length, entirely hex
/// digits, and contain at least one decimal digit, so words such as `CAFE`
/// or `ABCDEF` stay as they are.
pub fn is_hex_encoded(s: &str) -> bool {
    s.len() >= 4
        && s.len() % 2 == 0
        && s.chars().all(|c| c.is_ascii_hexdigit())
        && s.chars().any(|c| c.is_ascii_digit())
}

/// Translate a hex-encoded subject back to text.
///
/// Bytes containing NULs are read as UTF-16BE when the length allows it;
/// otherwise as single bytes. NULs are stripped either way. Input that does
/// not decode is returned unchanged.
pub fn translate_hex_subject(hex: &str) -> String {
    let Ok(bytes) = crate::parser::decode_hex(hex.as_bytes()) else {
        return hex.to_string();
    };
    if hex.len() % 2 != 0 {
        return hex.to_string();
    }

    let decoded = if bytes.contains(&0) && bytes.len() % 2 == 0 {
        let units: Vec<u16> = bytes.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
        match String::from_utf16(&units) {
            Ok(s) => s,
            Err(_) => return hex.to_string(),
        }
    } else {
        if bytes.iter().any(|&b| b >= 0x80) {
            return hex.to_string();
        }
        bytes.iter().map(|&b| b as char).collect()
    };

    let cleaned: String = decoded.chars().filter(|&c| c != '\0').collect();
    if cleaned.is_empty() {
        hex.to_string()
    } else {
        cleaned
    }
}

/// Translate hex dumps, leave everything else untouched.
pub fn normalize_subject(raw: &str) -> String {
    if is_hex_encoded(raw) {
        translate_hex_subject(raw)
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(entries: &[(&str, Object)]) -> HashMap<String, Object> {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_subject_key_priority() {
        let d = dict(&[
            ("T", Object::String(b"Author".to_vec())),
            ("Subj", Object::String(b"AP - Cisco MR36H".to_vec())),
        ]);
        assert_eq!(extract_subject(&d), "AP - Cisco MR36H");
    }

    #[test]
    fn test_empty_subject_falls_through() {
        let d = dict(&[
            ("Subj", Object::String(Vec::new())),
            ("Contents", Object::String(b"Legend".to_vec())),
        ]);
        assert_eq!(extract_subject(&d), "Legend");
        assert_eq!(extract_subject(&HashMap::new()), "");
    }

    #[test]
    fn test_utf16_subjects() {
        let be = vec![0xFE, 0xFF, 0x00, b'A', 0x00, b'P'];
        let le = vec![0xFF, 0xFE, b'A', 0x00, b'P', 0x00];
        assert_eq!(decode_text_string(&be), "AP");
        assert_eq!(decode_text_string(&le), "AP");
        assert_eq!(decode_text_string(&[0xE9]), "é");
    }

    #[test]
    fn test_encode_text_string() {
        assert_eq!(encode_text_string("AP"), Object::String(b"AP".to_vec()));
        assert_eq!(
            encode_text_string("Ω"),
            Object::String(vec![0xFE, 0xFF, 0x03, 0xA9])
        );
    }

    #[test]
    fn test_is_hex_encoded() {
        assert!(is_hex_encoded("4150"));
        assert!(is_hex_encoded("41505f426964"));
        assert!(is_hex_encoded("00410050"));
        assert!(!is_hex_encoded("ABCDEF"));
        assert!(!is_hex_encoded("CAFE"));
        assert!(!is_hex_encoded("AP_Bid"));
        assert!(!is_hex_encoded("4150F"));
        assert!(!is_hex_encoded(""));
        assert!(!is_hex_encoded("41"));
        assert!(!is_hex_encoded("41GZ50"));
    }

    #[test]
    fn test_translate_hex_subject() {
        assert_eq!(translate_hex_subject("4150"), "AP");
        assert_eq!(translate_hex_subject("00410050"), "AP");
        assert_eq!(translate_hex_subject("4150005f426964"), "AP_Bid");
        assert_eq!(translate_hex_subject("ZZZZ"), "ZZZZ");
    }

    #[test]
    fn test_normalize_subject() {
        assert_eq!(normalize_subject("4150"), "AP");
        assert_eq!(normalize_subject("41505f426964"), "AP_Bid");
        assert_eq!(normalize_subject("ABCDEF"), "ABCDEF");
        assert_eq!(normalize_subject("AP - Cisco MR36H"), "AP - Cisco MR36H");
    }
}
