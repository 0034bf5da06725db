//! Cross-reference reading.
//!
//! Both classic `xref` tables and PDF 1.5 cross-reference streams are
//! understood, and `/Prev` chains from incremental updates are merged with
//! newer sections taking precedence.

use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::parser::{parse_indirect_object, parse_object};
use std::collections::HashMap;

/// Where an object's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Unused object number
    Free,
    /// Object stored directly in the file at a byte offset
    Offset {
        /// Byte offset of `N G obj`
        offset: usize,
        /// Generation number
        gen: u16,
    },
    /// Object stored inside an object stream (PDF 1.5+)
    Compressed {
        /// Object number of the containing `/ObjStm`
        stream: u32,
        /// Index within that stream
        index: u32,
    },
}

/// Merged cross-reference data plus the newest trailer.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: HashMap<String, Object>,
}

impl CrossRefTable {
    /// Entry for an object number, if any section listed it.
    pub fn get(&self, id: u32) -> Option<XRefEntry> {
        self.entries.get(&id).copied()
    }

    /// Iterate all listed object numbers and their entries.
    pub fn entries(&self) -> impl Iterator<Item = (u32, XRefEntry)> + '_ {
        self.entries.iter().map(|(id, e)| (*id, *e))
    }

    /// Number of entries (free ones included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no section listed any object.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Trailer dictionary of the newest section.
    pub fn trailer(&self) -> &HashMap<String, Object> {
        &self.trailer
    }

    /// Fold an older section in. Entries and trailer keys already present win.
    fn merge_older(&mut self, older: CrossRefTable) {
        for (id, entry) in older.entries {
            self.entries.entry(id).or_insert(entry);
        }
        for (key, value) in older.trailer {
            if key != "Prev" {
                self.trailer.entry(key).or_insert(value);
            }
        }
    }
}

/// Locate the offset named after the last `startxref` keyword.
pub fn find_xref_offset(data: &[u8]) -> Result<usize> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = String::from_utf8_lossy(&data[tail_start..]);
    let pos = tail.rfind("startxref").ok_or(Error::InvalidXref)?;
    tail[pos + "startxref".len()..]
        .split_ascii_whitespace()
        .next()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&offset| offset < data.len())
        .ok_or(Error::InvalidXref)
}

/// Read the cross-reference section at `offset` and every `/Prev` behind it.
pub fn parse_xref(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let mut visited = Vec::new();
    parse_xref_chain(data, offset, &mut visited)
}

fn parse_xref_chain(data: &[u8], offset: usize, visited: &mut Vec<usize>) -> Result<CrossRefTable> {
    if visited.len() > 100 || visited.contains(&offset) {
        return Err(Error::InvalidPdf("xref /Prev chain is circular or too deep".to_string()));
    }
    visited.push(offset);

    let section = data.get(offset..).ok_or(Error::InvalidXref)?;
    let trimmed_start = section.iter().position(|c| !c.is_ascii_whitespace()).unwrap_or(0);
    let section = &section[trimmed_start..];

    let mut table = if section.starts_with(b"xref") {
        parse_classic_section(data, offset + trimmed_start)?
    } else {
        parse_xref_stream(section)?
    };

    // Hybrid files point at an extra xref stream from the classic trailer.
    if let Some(stm) = table.trailer.get("XRefStm").and_then(|o| o.as_integer()) {
        match data.get(stm as usize..).map(parse_xref_stream) {
            Some(Ok(extra)) => {
                for (id, entry) in extra.entries {
                    table.entries.entry(id).or_insert(entry);
                }
            },
            _ => log::warn!("Ignoring unreadable /XRefStm at offset {}", stm),
        }
    }

    if let Some(prev) = table.trailer.remove("Prev").and_then(|o| o.as_integer()) {
        log::debug!("Following /Prev to xref section at {}", prev);
        let older = parse_xref_chain(data, prev.max(0) as usize, visited)?;
        table.merge_older(older);
    }

    Ok(table)
}

fn parse_classic_section(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let body = &data[offset + b"xref".len()..];
    let trailer_pos = crate::parser::find_subslice(body, b"trailer").ok_or(Error::InvalidXref)?;
    let listing = String::from_utf8_lossy(&body[..trailer_pos]);

    let mut table = CrossRefTable::default();
    let mut words = listing.split_ascii_whitespace();
    while let Some(first) = words.next() {
        let start: u32 = first.parse().map_err(|_| Error::InvalidXref)?;
        let count: u32 = words.next().and_then(|w| w.parse().ok()).ok_or(Error::InvalidXref)?;
        for i in 0..count {
            let off = words.next().and_then(|w| w.parse::<usize>().ok());
            let gen = words.next().and_then(|w| w.parse::<u16>().ok());
            let kind = words.next();
            let entry = match (off, gen, kind) {
                (Some(offset), Some(gen), Some("n")) => XRefEntry::Offset { offset, gen },
                (Some(_), Some(_), Some("f")) => XRefEntry::Free,
                _ => return Err(Error::InvalidXref),
            };
            table.entries.insert(start + i, entry);
        }
    }

    let after = &body[trailer_pos + b"trailer".len()..];
    table.trailer = match parse_object(after) {
        Ok((_, Object::Dictionary(d))) => d,
        _ => return Err(Error::InvalidPdf("unreadable trailer dictionary".to_string())),
    };
    Ok(table)
}

fn parse_xref_stream(section: &[u8]) -> Result<CrossRefTable> {
    let (_, (_, obj)) = parse_indirect_object(section)
        .map_err(|e| Error::InvalidPdf(format!("xref stream: {}", e)))?;
    let dict = match &obj {
        Object::Stream { dict, .. } => dict,
        _ => return Err(Error::InvalidPdf("xref stream is not a stream object".to_string())),
    };
    if dict.get("Type").and_then(|o| o.as_name()) != Some("XRef") {
        return Err(Error::InvalidXref);
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|o| o.as_array())
        .map(|arr| arr.iter().filter_map(|o| o.as_integer()).map(|w| w.max(0) as usize).collect())
        .unwrap_or_default();
    if widths.len() != 3 {
        return Err(Error::InvalidPdf("invalid /W array in xref stream".to_string()));
    }
    let size = dict.get("Size").and_then(|o| o.as_integer()).ok_or(Error::InvalidXref)?;
    let ranges: Vec<(u32, u32)> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(index) => index
            .chunks(2)
            .filter_map(|pair| match pair {
                [s, c] => Some((s.as_integer()? as u32, c.as_integer()? as u32)),
                _ => None,
            })
            .collect(),
        None => vec![(0, size as u32)],
    };

    let decoded = obj.decode_stream_data()?;
    let row = widths.iter().sum::<usize>();
    if row == 0 {
        return Err(Error::InvalidXref);
    }
    let mut rows = decoded.chunks_exact(row);

    let mut table = CrossRefTable::default();
    for (start, count) in ranges {
        for id in start..start.saturating_add(count) {
            let Some(bytes) = rows.next() else {
                return Err(Error::InvalidPdf("truncated xref stream data".to_string()));
            };
            let (f1, rest) = bytes.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            let kind = if widths[0] == 0 { 1 } else { read_int(f1) };
            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::Offset {
                    offset: read_int(f2) as usize,
                    gen: read_int(f3) as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: read_int(f2) as u32,
                    index: read_int(f3) as u32,
                },
                // Unknown types are treated as null references.
                _ => XRefEntry::Free,
            };
            table.entries.insert(id, entry);
        }
    }
    table.trailer = dict.clone();
    Ok(table)
}

fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// The trailer's `/Root` reference, if present.
pub fn root_ref(trailer: &HashMap<String, Object>) -> Option<ObjectRef> {
    trailer.get("Root").and_then(|o| o.as_reference())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classic_file() -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let off1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        let xref = pdf.len();
        pdf.extend_from_slice(
            format!(
                "xref\n0 2\n0000000000 65535 f \n{:010} 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                off1, xref
            )
            .as_bytes(),
        );
        pdf
    }

    #[test]
    fn test_find_xref_offset() {
        let pdf = classic_file();
        let off = find_xref_offset(&pdf).unwrap();
        assert!(pdf[off..].starts_with(b"xref"));
    }

    #[test]
    fn test_find_xref_offset_missing() {
        assert!(matches!(find_xref_offset(b"%PDF-1.4\nno trailer"), Err(Error::InvalidXref)));
    }

    #[test]
    fn test_parse_classic_table() {
        let pdf = classic_file();
        let table = parse_xref(&pdf, find_xref_offset(&pdf).unwrap()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0), Some(XRefEntry::Free));
        assert!(matches!(table.get(1), Some(XRefEntry::Offset { offset: 9, gen: 0 })));
        assert_eq!(root_ref(table.trailer()), Some(ObjectRef::new(1, 0)));
    }

    #[test]
    fn test_parse_xref_stream() {
        let rows: Vec<u8> = vec![0, 0, 0, 0, 1, 0, 9, 0, 2, 0, 3, 0];
        let mut pdf = b"%PDF-1.5\n".to_vec();
        let off = pdf.len();
        pdf.extend_from_slice(
            format!(
                "5 0 obj\n<< /Type /XRef /Size 3 /W [1 2 1] /Root 1 0 R /Length {} >>\nstream\n",
                rows.len()
            )
            .as_bytes(),
        );
        pdf.extend_from_slice(&rows);
        pdf.extend_from_slice(b"\nendstream\nendobj\n");

        let table = parse_xref(&pdf, off).unwrap();
        assert_eq!(table.get(0), Some(XRefEntry::Free));
        assert_eq!(table.get(1), Some(XRefEntry::Offset { offset: 9, gen: 0 }));
        assert_eq!(table.get(2), Some(XRefEntry::Compressed { stream: 3, index: 0 }));
    }

    #[test]
    fn test_prev_chain_newer_wins() {
        let mut pdf = classic_file();
        let first_xref = find_xref_offset(&pdf).unwrap();
        let off1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Updated true >>\nendobj\n");
        let xref = pdf.len();
        pdf.extend_from_slice(
            format!(
                "xref\n1 1\n{:010} 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
                off1, first_xref, xref
            )
            .as_bytes(),
        );
        let table = parse_xref(&pdf, find_xref_offset(&pdf).unwrap()).unwrap();
        assert_eq!(table.get(1), Some(XRefEntry::Offset { offset: off1, gen: 0 }));
        assert_eq!(table.get(0), Some(XRefEntry::Free));
        assert!(!table.trailer().contains_key("Prev"));
    }

    #[test]
    fn test_circular_prev_is_rejected() {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let xref = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev {} >>\n", xref).as_bytes());
        assert!(parse_xref(&pdf, xref).is_err());
    }
}
