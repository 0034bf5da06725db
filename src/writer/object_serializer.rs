//! Byte-level serialization of [`Object`] values.
//!
//! Output is deterministic: dictionary keys are written in sorted order, so
//! an object that is read and written again without changes serializes to
//! the same bytes every time.

use crate::error::Result;
use crate::object::{Object, ObjectRef};
use std::collections::HashMap;
use std::io::Write;

/// Serializer for PDF objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSerializer;

impl ObjectSerializer {
    /// Create a serializer.
    pub fn new() -> Self {
        Self
    }

    /// Serialize a direct object.
    pub fn serialize(&self, obj: &Object) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj)?;
        Ok(buf)
    }

    /// Serialize to a lossy string, mostly for assertions and logs.
    pub fn serialize_to_string(&self, obj: &Object) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.serialize(obj)?).into_owned())
    }

    /// Write `{id} {gen} obj ... endobj` to `w`.
    pub fn write_indirect<W: Write>(&self, w: &mut W, r: ObjectRef, obj: &Object) -> std::io::Result<()> {
        writeln!(w, "{} {} obj", r.id, r.gen)?;
        self.write_object(w, obj)?;
        write!(w, "\nendobj\n")
    }

    fn write_object<W: Write>(&self, w: &mut W, obj: &Object) -> std::io::Result<()> {
        match obj {
            Object::Null => write!(w, "null"),
            Object::Boolean(b) => write!(w, "{}", b),
            Object::Integer(i) => write!(w, "{}", i),
            Object::Real(r) => write!(w, "{}", format_real(*r)),
            Object::String(s) => write_string(w, s),
            Object::Name(n) => write_name(w, n),
            Object::Array(arr) => {
                write!(w, "[")?;
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(w, " ")?;
                    }
                    self.write_object(w, item)?;
                }
                write!(w, "]")
            },
            Object::Dictionary(dict) => self.write_dictionary(w, dict),
            Object::Stream { dict, data } => {
                // Length always reflects the bytes actually written.
                let mut dict = dict.clone();
                dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
                self.write_dictionary(w, &dict)?;
                write!(w, "\nstream\n")?;
                w.write_all(data)?;
                write!(w, "\nendstream")
            },
            Object::Reference(r) => write!(w, "{} {} R", r.id, r.gen),
        }
    }

    fn write_dictionary<W: Write>(&self, w: &mut W, dict: &HashMap<String, Object>) -> std::io::Result<()> {
        let mut keys: Vec<&String> = dict.keys().collect();
        keys.sort();

        write!(w, "<<")?;
        for key in keys {
            write!(w, " ")?;
            write_name(w, key)?;
            write!(w, " ")?;
            self.write_object(w, &dict[key])?;
        }
        write!(w, " >>")
    }
}

/// Format a real with at most five decimals and no trailing zeros.
///
/// ```
/// use markup_swap::writer::format_real;
///
/// assert_eq!(format_real(1.0), "1");
/// assert_eq!(format_real(0.41), "0.41");
/// assert_eq!(format_real(-0.000001), "0");
/// ```
pub fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let formatted = format!("{:.5}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

fn write_string<W: Write>(w: &mut W, data: &[u8]) -> std::io::Result<()> {
    let printable = data
        .iter()
        .all(|&b| matches!(b, b'\n' | b'\r' | b'\t') || (0x20..=0x7E).contains(&b));

    if !printable {
        write!(w, "<")?;
        for byte in data {
            write!(w, "{:02X}", byte)?;
        }
        return write!(w, ">");
    }

    write!(w, "(")?;
    for &byte in data {
        match byte {
            b'(' => write!(w, "\\(")?,
            b')' => write!(w, "\\)")?,
            b'\\' => write!(w, "\\\\")?,
            b'\n' => write!(w, "\\n")?,
            b'\r' => write!(w, "\\r")?,
            b'\t' => write!(w, "\\t")?,
            _ => w.write_all(&[byte])?,
        }
    }
    write!(w, ")")
}

fn write_name<W: Write>(w: &mut W, name: &str) -> std::io::Result<()> {
    write!(w, "/")?;
    for byte in name.bytes() {
        let regular = (0x21..=0x7E).contains(&byte) && !crate::lexer::is_delimiter(byte) && byte != b'#';
        if regular {
            w.write_all(&[byte])?;
        } else {
            write!(w, "#{:02X}", byte)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_object;

    fn ser(obj: &Object) -> String {
        ObjectSerializer::new().serialize_to_string(obj).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(ser(&Object::Null), "null");
        assert_eq!(ser(&Object::Boolean(true)), "true");
        assert_eq!(ser(&Object::Integer(-12)), "-12");
        assert_eq!(ser(&Object::Real(2.5)), "2.5");
        assert_eq!(ser(&Object::Real(1.123456789)), "1.12346");
        assert_eq!(ser(&Object::Reference(ObjectRef::new(10, 0))), "10 0 R");
    }

    #[test]
    fn test_strings() {
        assert_eq!(ser(&Object::String(b"Hello".to_vec())), "(Hello)");
        assert_eq!(ser(&Object::String(b"a (b) \\".to_vec())), "(a \\(b\\) \\\\)");
        assert_eq!(ser(&Object::String(vec![0xFE, 0xFF, 0x00, 0x41])), "<FEFF0041>");
    }

    #[test]
    fn test_names() {
        assert_eq!(ser(&Object::Name("HelvBld".to_string())), "/HelvBld");
        assert_eq!(ser(&Object::Name("AP - Cisco".to_string())), "/AP#20-#20Cisco");
        assert_eq!(ser(&Object::Name("a#b".to_string())), "/a#23b");
    }

    #[test]
    fn test_dictionary_keys_sorted() {
        let mut dict = HashMap::new();
        dict.insert("Type".to_string(), Object::Name("Annot".to_string()));
        dict.insert("F".to_string(), Object::Integer(4));
        assert_eq!(ser(&Object::Dictionary(dict)), "<< /F 4 /Type /Annot >>");
    }

    #[test]
    fn test_stream_length_is_rewritten() {
        let mut dict = HashMap::new();
        dict.insert("Length".to_string(), Object::Reference(ObjectRef::new(9, 0)));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"q Q"),
        };
        let out = ser(&stream);
        assert!(out.starts_with("<< /Length 3 >>\nstream\nq Q\nendstream"));
    }

    #[test]
    fn test_output_parses_back() {
        let mut bs = HashMap::new();
        bs.insert("W".to_string(), Object::Real(0.75));
        let mut dict = HashMap::new();
        dict.insert("BS".to_string(), Object::Dictionary(bs));
        dict.insert("Subj".to_string(), Object::String(b"AP - Cisco (x)".to_vec()));
        dict.insert(
            "Rect".to_string(),
            Object::Array(vec![Object::Real(1.5), Object::Integer(2), Object::Real(3.25), Object::Integer(4)]),
        );
        let original = Object::Dictionary(dict);
        let bytes = ObjectSerializer::new().serialize(&original).unwrap();
        let (_, parsed) = parse_object(&bytes).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_write_indirect() {
        let mut buf = Vec::new();
        ObjectSerializer::new()
            .write_indirect(&mut buf, ObjectRef::new(3, 0), &Object::Integer(42))
            .unwrap();
        assert_eq!(buf, b"3 0 obj\n42\nendobj\n");
    }
}
