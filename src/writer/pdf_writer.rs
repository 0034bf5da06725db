//! Whole-file PDF writer.
//!
//! Emits a complete, non-incremental file: header, every object in
//! ascending object-number order, one classic cross-reference table and the
//! trailer. Gaps in the object numbering become free xref entries.

use super::object_serializer::ObjectSerializer;
use crate::error::Result;
use crate::object::{Object, ObjectRef};
use std::collections::HashMap;
use std::io::Write;

/// Configuration for file output.
#[derive(Debug, Clone)]
pub struct PdfWriterConfig {
    /// Version written in the `%PDF-x.y` header
    pub version: String,
}

impl Default for PdfWriterConfig {
    fn default() -> Self {
        Self {
            version: "1.7".to_string(),
        }
    }
}

impl PdfWriterConfig {
    /// Override the header version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Writes a set of indirect objects plus trailer entries to bytes.
#[derive(Debug, Default)]
pub struct PdfWriter {
    config: PdfWriterConfig,
}

impl PdfWriter {
    /// Create a writer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with explicit settings.
    pub fn with_config(config: PdfWriterConfig) -> Self {
        Self { config }
    }

    /// Serialize `objects` (must be sorted by object number) and `trailer`.
    ///
    /// `/Size` is computed here; any `/Size` in `trailer` is ignored.
    pub fn write<'a, I>(&self, objects: I, trailer: &HashMap<String, Object>) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = (ObjectRef, &'a Object)>,
    {
        let serializer = ObjectSerializer::new();
        let mut out = Vec::new();
        writeln!(out, "%PDF-{}", self.config.version)?;
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let mut offsets: Vec<(ObjectRef, usize)> = Vec::new();
        for (r, obj) in objects {
            offsets.push((r, out.len()));
            serializer.write_indirect(&mut out, r, obj)?;
        }

        let size = offsets.last().map(|(r, _)| r.id + 1).unwrap_or(1);
        let xref_start = out.len();
        writeln!(out, "xref")?;
        writeln!(out, "0 {}", size)?;
        writeln!(out, "0000000000 65535 f ")?;
        let mut listed = offsets.iter().peekable();
        for id in 1..size {
            match listed.peek() {
                Some((r, offset)) if r.id == id => {
                    writeln!(out, "{:010} {:05} n ", offset, r.gen)?;
                    listed.next();
                },
                _ => writeln!(out, "0000000000 00001 f ")?,
            }
        }

        let mut trailer = trailer.clone();
        trailer.insert("Size".to_string(), Object::Integer(size as i64));
        writeln!(out, "trailer")?;
        out.extend_from_slice(&serializer.serialize(&Object::Dictionary(trailer))?);
        writeln!(out)?;
        writeln!(out, "startxref")?;
        writeln!(out, "{}", xref_start)?;
        write!(out, "%%EOF\n")?;

        log::debug!("Wrote {} objects, {} bytes", offsets.len(), out.len());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xref::{find_xref_offset, parse_xref, XRefEntry};

    fn sample() -> Vec<(ObjectRef, Object)> {
        let mut catalog = HashMap::new();
        catalog.insert("Type".to_string(), Object::Name("Catalog".to_string()));
        vec![
            (ObjectRef::new(1, 0), Object::Dictionary(catalog)),
            (ObjectRef::new(4, 0), Object::Integer(7)),
        ]
    }

    fn write(objects: &[(ObjectRef, Object)]) -> Vec<u8> {
        let mut trailer = HashMap::new();
        trailer.insert("Root".to_string(), Object::Reference(ObjectRef::new(1, 0)));
        PdfWriter::new()
            .write(objects.iter().map(|(r, o)| (*r, o)), &trailer)
            .unwrap()
    }

    #[test]
    fn test_header_and_trailer() {
        let bytes = write(&sample());
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.7\n"));
        assert!(text.contains("/Size 5"));
        assert!(text.contains("/Root 1 0 R"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let bytes = write(&sample());
        let table = parse_xref(&bytes, find_xref_offset(&bytes).unwrap()).unwrap();
        match table.get(4) {
            Some(XRefEntry::Offset { offset, .. }) => assert!(bytes[offset..].starts_with(b"4 0 obj")),
            other => panic!("unexpected entry {:?}", other),
        }
        assert_eq!(table.get(2), Some(XRefEntry::Free));
        assert_eq!(table.get(3), Some(XRefEntry::Free));
    }

    #[test]
    fn test_custom_version() {
        let writer = PdfWriter::with_config(PdfWriterConfig::default().with_version("1.6"));
        let bytes = writer.write(std::iter::empty(), &HashMap::new()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.6"));
    }
}
