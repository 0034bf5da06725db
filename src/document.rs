//! In-memory PDF document.
//!
//! A [`PdfDocument`] is an arena of indirect objects keyed by object number
//! plus the trailer. Everything is loaded eagerly when the file is opened;
//! objects packed in object streams are unpacked and the container streams
//! are dropped, so [`PdfDocument::to_bytes`] always writes a plain file with
//! a classic cross-reference table.

use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::{parse_error, parse_indirect_object, parse_object};
use crate::writer::PdfWriter;
use crate::xref::{find_xref_offset, parse_xref, root_ref, CrossRefTable, XRefEntry};
use lazy_static::lazy_static;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Maximum depth when following reference chains or walking the page tree.
const MAX_RECURSION_DEPTH: usize = 64;

/// Trailer keys carried from the input into the written file.
const KEPT_TRAILER_KEYS: [&str; 3] = ["Root", "Info", "ID"];

lazy_static! {
    static ref RE_OBJ_HEADER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(\d+)\s+(\d+)\s+obj\b").expect("static regex");
    static ref RE_TRAILER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"trailer\s*<<").expect("static regex");
}

#[derive(Debug, Clone)]
struct Stored {
    gen: u16,
    object: Object,
}

/// An editable PDF document.
///
/// # Example
///
/// ```no_run
/// use markup_swap::document::PdfDocument;
///
/// let doc = PdfDocument::open("markups.pdf")?;
/// println!("{} page(s)", doc.page_count()?);
/// # Ok::<(), markup_swap::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct PdfDocument {
    version: (u8, u8),
    objects: BTreeMap<u32, Stored>,
    trailer: HashMap<String, Object>,
    next_id: u32,
}

impl PdfDocument {
    /// Open and fully load a PDF file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(&data)
    }

    /// Load a document from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let version = parse_header(data)?;

        let (objects, trailer) = match load_via_xref(data) {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("Cross-reference data unusable ({}), scanning for objects", e);
                reconstruct(data)?
            },
        };

        if trailer.contains_key("Encrypt") {
            return Err(Error::InvalidPdf("encrypted documents are not supported".to_string()));
        }

        let mut doc = Self {
            version,
            next_id: objects.keys().next_back().map(|id| id + 1).unwrap_or(1),
            objects,
            trailer: trailer
                .into_iter()
                .filter(|(k, _)| KEPT_TRAILER_KEYS.contains(&k.as_str()))
                .collect(),
        };
        doc.drop_container_streams();
        doc.catalog_ref()?;
        log::debug!("Loaded PDF {}.{} with {} objects", version.0, version.1, doc.objects.len());
        Ok(doc)
    }

    /// Create a document with one empty page of the given size.
    pub fn new_empty(width: f64, height: f64) -> Self {
        let mut doc = Self {
            version: (1, 7),
            objects: BTreeMap::new(),
            trailer: HashMap::new(),
            next_id: 1,
        };
        let catalog = doc.reserve();
        let pages = doc.reserve();
        let page = doc.reserve();

        let mut page_dict = HashMap::new();
        page_dict.insert("Type".to_string(), Object::Name("Page".to_string()));
        page_dict.insert("Parent".to_string(), Object::Reference(pages));
        page_dict.insert(
            "MediaBox".to_string(),
            crate::geometry::Rect::new(0.0, 0.0, width, height).to_object(),
        );
        page_dict.insert("Resources".to_string(), Object::Dictionary(HashMap::new()));
        doc.insert(page, Object::Dictionary(page_dict));

        let mut pages_dict = HashMap::new();
        pages_dict.insert("Type".to_string(), Object::Name("Pages".to_string()));
        pages_dict.insert("Kids".to_string(), Object::Array(vec![Object::Reference(page)]));
        pages_dict.insert("Count".to_string(), Object::Integer(1));
        doc.insert(pages, Object::Dictionary(pages_dict));

        let mut catalog_dict = HashMap::new();
        catalog_dict.insert("Type".to_string(), Object::Name("Catalog".to_string()));
        catalog_dict.insert("Pages".to_string(), Object::Reference(pages));
        doc.insert(catalog, Object::Dictionary(catalog_dict));

        doc.trailer.insert("Root".to_string(), Object::Reference(catalog));
        doc
    }

    /// PDF version from the header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Trailer entries kept for output.
    pub fn trailer(&self) -> &HashMap<String, Object> {
        &self.trailer
    }

    /// Number of indirect objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Look up an indirect object.
    pub fn get(&self, r: ObjectRef) -> Option<&Object> {
        self.objects.get(&r.id).map(|s| &s.object)
    }

    /// Mutable access to an indirect object.
    pub fn get_mut(&mut self, r: ObjectRef) -> Option<&mut Object> {
        self.objects.get_mut(&r.id).map(|s| &mut s.object)
    }

    /// Follow references until a direct object is reached.
    ///
    /// A reference to a missing object resolves to `Null`, matching how
    /// readers treat dangling references.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> Result<&'a Object> {
        let mut current = obj;
        for _ in 0..MAX_RECURSION_DEPTH {
            match current {
                Object::Reference(r) => match self.get(*r) {
                    Some(next) => current = next,
                    None => return Ok(&Object::Null),
                },
                other => return Ok(other),
            }
        }
        Err(Error::InvalidPdf("reference chain too deep".to_string()))
    }

    /// Resolve and require a dictionary (or stream dictionary).
    pub fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Result<&'a HashMap<String, Object>> {
        let resolved = self.resolve(obj)?;
        resolved.as_dict().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: resolved.type_name().to_string(),
        })
    }

    /// Reference to the document catalog.
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        let r = root_ref(&self.trailer).ok_or_else(|| Error::InvalidPdf("trailer has no /Root".to_string()))?;
        match self.get(r).and_then(|o| o.as_dict()) {
            Some(_) => Ok(r),
            None => Err(Error::ObjectNotFound(r.id, r.gen)),
        }
    }

    /// The catalog dictionary.
    pub fn catalog(&self) -> Result<&HashMap<String, Object>> {
        let r = self.catalog_ref()?;
        self.get(r)
            .and_then(|o| o.as_dict())
            .ok_or(Error::ObjectNotFound(r.id, r.gen))
    }

    /// Set (or replace) a catalog entry.
    pub fn set_catalog_entry(&mut self, key: &str, value: Object) -> Result<()> {
        let r = self.catalog_ref()?;
        match self.get_mut(r).and_then(|o| o.as_dict_mut()) {
            Some(dict) => {
                dict.insert(key.to_string(), value);
                Ok(())
            },
            None => Err(Error::ObjectNotFound(r.id, r.gen)),
        }
    }

    /// References of every page, in document order.
    pub fn page_refs(&self) -> Result<Vec<ObjectRef>> {
        let root = self
            .catalog()?
            .get("Pages")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::InvalidPdf("catalog has no /Pages reference".to_string()))?;

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        self.collect_pages(root, 0, &mut visited, &mut pages);
        Ok(pages)
    }

    fn collect_pages(&self, node: ObjectRef, depth: usize, visited: &mut HashSet<ObjectRef>, out: &mut Vec<ObjectRef>) {
        if depth > MAX_RECURSION_DEPTH || !visited.insert(node) {
            log::warn!("Page tree loop or excessive depth at {}", node);
            return;
        }
        let Some(dict) = self.get(node).and_then(|o| o.as_dict()) else {
            log::warn!("Page tree node {} is missing", node);
            return;
        };
        match dict.get("Type").and_then(|o| o.as_name()) {
            Some("Page") => out.push(node),
            _ => {
                if let Some(kids) = dict.get("Kids").and_then(|o| o.as_array()) {
                    for kid in kids.iter().filter_map(|k| k.as_reference()) {
                        self.collect_pages(kid, depth + 1, visited, out);
                    }
                } else if !dict.contains_key("Kids") {
                    // Untyped leaf: treat as a page.
                    out.push(node);
                }
            },
        }
    }

    /// Number of pages found by walking the page tree.
    pub fn page_count(&self) -> Result<usize> {
        Ok(self.page_refs()?.len())
    }

    fn page_ref(&self, index: usize) -> Result<ObjectRef> {
        let pages = self.page_refs()?;
        pages
            .get(index)
            .copied()
            .ok_or_else(|| Error::InvalidPdf(format!("page index {} out of range ({} pages)", index, pages.len())))
    }

    /// Dictionary of the page at `index`.
    pub fn page_dict(&self, index: usize) -> Result<&HashMap<String, Object>> {
        let r = self.page_ref(index)?;
        self.get(r)
            .and_then(|o| o.as_dict())
            .ok_or(Error::ObjectNotFound(r.id, r.gen))
    }

    /// Entries of the page's `/Annots` array, exactly as stored.
    ///
    /// Entries are usually references; direct dictionaries are returned as-is.
    pub fn page_annotation_refs(&self, index: usize) -> Result<Vec<Object>> {
        match self.page_dict(index)?.get("Annots") {
            None => Ok(Vec::new()),
            Some(annots) => match self.resolve(annots)? {
                Object::Array(items) => Ok(items.clone()),
                Object::Null => Ok(Vec::new()),
                other => Err(Error::InvalidObjectType {
                    expected: "Array".to_string(),
                    found: other.type_name().to_string(),
                }),
            },
        }
    }

    /// Replace the page's annotation collection in one assignment.
    pub fn set_page_annotations(&mut self, index: usize, annotations: Vec<Object>) -> Result<()> {
        let r = self.page_ref(index)?;
        let page = self
            .get_mut(r)
            .and_then(|o| o.as_dict_mut())
            .ok_or(Error::ObjectNotFound(r.id, r.gen))?;
        page.insert("Annots".to_string(), Object::Array(annotations));
        Ok(())
    }

    /// Register `annotation` and append it to the page's `/Annots`.
    pub fn add_page_annotation(&mut self, index: usize, annotation: Object) -> Result<ObjectRef> {
        let mut annots = self.page_annotation_refs(index)?;
        let r = self.register(annotation);
        annots.push(Object::Reference(r));
        self.set_page_annotations(index, annots)?;
        Ok(r)
    }

    /// Add a new indirect object and return its reference.
    pub fn register(&mut self, object: Object) -> ObjectRef {
        let r = self.reserve();
        self.insert(r, object);
        r
    }

    fn reserve(&mut self) -> ObjectRef {
        let r = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        r
    }

    fn insert(&mut self, r: ObjectRef, object: Object) {
        self.objects.insert(r.id, Stored { gen: r.gen, object });
    }

    fn drop_container_streams(&mut self) {
        self.objects.retain(|id, stored| {
            let kind = stored.object.as_dict().and_then(|d| d.get("Type")).and_then(|o| o.as_name());
            let container = matches!(stored.object, Object::Stream { .. }) && matches!(kind, Some("ObjStm") | Some("XRef"));
            if container {
                log::debug!("Dropping container stream {}", id);
            }
            !container
        });
    }

    /// Serialize the whole document.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        // Appearance features used by new annotations need at least 1.7.
        let (major, minor) = self.version.max((1, 7));
        let version = format!("{}.{}", major, minor);
        let writer = PdfWriter::with_config(crate::writer::PdfWriterConfig::default().with_version(version));
        writer.write(
            self.objects
                .iter()
                .map(|(id, stored)| (ObjectRef::new(*id, stored.gen), &stored.object)),
            &self.trailer,
        )
    }

    /// Write the document to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), bytes)?;
        log::info!("Saved {}", path.as_ref().display());
        Ok(())
    }
}

/// Validate the `%PDF-x.y` header and return the version.
pub fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(1024)];
    let pos = crate::parser::find_subslice(window, b"%PDF-")
        .ok_or_else(|| Error::InvalidFileType("missing %PDF- header".to_string()))?;
    let rest = &window[pos + 5..];
    let major = rest.first().filter(|c| c.is_ascii_digit()).map(|c| c - b'0');
    let minor = rest.get(2).filter(|c| c.is_ascii_digit()).map(|c| c - b'0');
    match (major, rest.get(1), minor) {
        (Some(major), Some(b'.'), Some(minor)) => Ok((major, minor)),
        _ => Err(Error::InvalidFileType("malformed %PDF- version".to_string())),
    }
}

type Loaded = (BTreeMap<u32, Stored>, HashMap<String, Object>);

fn load_via_xref(data: &[u8]) -> Result<Loaded> {
    let xref = parse_xref(data, find_xref_offset(data)?)?;
    if xref.is_empty() {
        return Err(Error::InvalidXref);
    }
    let objects = load_from_table(data, &xref)?;
    let trailer = xref.trailer().clone();
    match root_ref(&trailer) {
        Some(root) if objects.get(&root.id).is_some_and(|s| s.object.as_dict().is_some()) => Ok((objects, trailer)),
        _ => Err(Error::InvalidPdf("catalog not reachable through xref".to_string())),
    }
}

fn load_from_table(data: &[u8], xref: &CrossRefTable) -> Result<BTreeMap<u32, Stored>> {
    let mut objects = BTreeMap::new();
    let mut packed: BTreeMap<u32, Vec<u32>> = BTreeMap::new();

    for (id, entry) in xref.entries() {
        match entry {
            XRefEntry::Free => {},
            XRefEntry::Offset { offset, gen } => {
                let body = data.get(offset..).ok_or(Error::InvalidXref)?;
                let (_, (r, object)) = parse_indirect_object(body)
                    .map_err(|e| parse_error(offset, format!("object {}: {}", id, e)))?;
                if r.id != id {
                    return Err(parse_error(offset, format!("expected object {}, found {}", id, r.id)));
                }
                objects.insert(id, Stored { gen: r.gen.max(gen), object });
            },
            XRefEntry::Compressed { stream, .. } => packed.entry(stream).or_default().push(id),
        }
    }

    for (stream_id, ids) in packed {
        let container = objects
            .get(&stream_id)
            .map(|s| s.object.clone())
            .ok_or(Error::ObjectNotFound(stream_id, 0))?;
        let mut unpacked = parse_object_stream(&container)?;
        for id in ids {
            match unpacked.remove(&id) {
                Some(object) => {
                    objects.insert(id, Stored { gen: 0, object });
                },
                None => log::warn!("Object {} missing from object stream {}", id, stream_id),
            }
        }
    }
    Ok(objects)
}

/// Rebuild the object table by scanning for `N G obj` headers.
fn reconstruct(data: &[u8]) -> Result<Loaded> {
    let mut objects = BTreeMap::new();
    for caps in RE_OBJ_HEADER.captures_iter(data) {
        let Some(m) = caps.get(0) else { continue };
        match parse_indirect_object(&data[m.start()..]) {
            // Later definitions win, as with incremental updates.
            Ok((_, (r, object))) => {
                objects.insert(r.id, Stored { gen: r.gen, object });
            },
            Err(_) => log::debug!("Ignoring unparsable object header at {}", m.start()),
        }
    }
    if objects.is_empty() {
        return Err(Error::InvalidPdf("no objects found while scanning".to_string()));
    }

    let streams: Vec<Object> = objects
        .values()
        .filter(|s| s.object.as_dict().and_then(|d| d.get("Type")).and_then(|o| o.as_name()) == Some("ObjStm"))
        .map(|s| s.object.clone())
        .collect();
    for stream in streams {
        match parse_object_stream(&stream) {
            Ok(unpacked) => {
                for (id, object) in unpacked {
                    objects.entry(id).or_insert(Stored { gen: 0, object });
                }
            },
            Err(e) => log::warn!("Skipping unreadable object stream: {}", e),
        }
    }

    let mut trailer = HashMap::new();
    if let Some(m) = RE_TRAILER.find_iter(data).last() {
        let dict_start = m.end() - 2;
        if let Ok((_, Object::Dictionary(d))) = parse_object(&data[dict_start..]) {
            trailer = d;
        }
    }
    let root_ok = root_ref(&trailer).is_some_and(|r| objects.contains_key(&r.id));
    if !root_ok {
        let catalog = objects.iter().find(|(_, s)| {
            s.object.as_dict().and_then(|d| d.get("Type")).and_then(|o| o.as_name()) == Some("Catalog")
        });
        match catalog {
            Some((id, stored)) => {
                trailer.insert("Root".to_string(), Object::Reference(ObjectRef::new(*id, stored.gen)));
            },
            None => return Err(Error::InvalidPdf("no document catalog found".to_string())),
        }
    }
    log::info!("Reconstructed {} objects by scanning", objects.len());
    Ok((objects, trailer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(subtype: &str) -> Object {
        let mut d = HashMap::new();
        d.insert("Type".to_string(), Object::Name("Annot".to_string()));
        d.insert("Subtype".to_string(), Object::Name(subtype.to_string()));
        d.insert("Rect".to_string(), crate::geometry::Rect::new(1.0, 2.0, 3.0, 4.0).to_object());
        Object::Dictionary(d)
    }

    #[test]
    fn test_new_empty_has_one_page() {
        let doc = PdfDocument::new_empty(612.0, 792.0);
        assert_eq!(doc.page_count().unwrap(), 1);
        assert!(doc.page_annotation_refs(0).unwrap().is_empty());
        assert_eq!(doc.catalog().unwrap().get("Type").and_then(|o| o.as_name()), Some("Catalog"));
    }

    #[test]
    fn test_register_allocates_fresh_numbers() {
        let mut doc = PdfDocument::new_empty(100.0, 100.0);
        let a = doc.register(Object::Integer(1));
        let b = doc.register(Object::Integer(2));
        assert_eq!(b.id, a.id + 1);
        assert_eq!(doc.get(a), Some(&Object::Integer(1)));
    }

    #[test]
    fn test_save_and_reload() {
        let mut doc = PdfDocument::new_empty(612.0, 792.0);
        let r = doc.add_page_annotation(0, annotation("Circle")).unwrap();
        let bytes = doc.to_bytes().unwrap();

        let reloaded = PdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(reloaded.page_count().unwrap(), 1);
        assert_eq!(reloaded.page_annotation_refs(0).unwrap(), vec![Object::Reference(r)]);
        assert_eq!(reloaded.get(r), doc.get(r));
    }

    #[test]
    fn test_set_page_annotations_replaces_array() {
        let mut doc = PdfDocument::new_empty(612.0, 792.0);
        doc.add_page_annotation(0, annotation("Square")).unwrap();
        doc.add_page_annotation(0, annotation("Line")).unwrap();
        assert_eq!(doc.page_annotation_refs(0).unwrap().len(), 2);
        doc.set_page_annotations(0, Vec::new()).unwrap();
        assert!(doc.page_annotation_refs(0).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_dangling_reference_is_null() {
        let doc = PdfDocument::new_empty(10.0, 10.0);
        let dangling = Object::Reference(ObjectRef::new(999, 0));
        assert_eq!(doc.resolve(&dangling).unwrap(), &Object::Null);
        assert!(doc.resolve_dict(&dangling).is_err());
    }

    #[test]
    fn test_set_catalog_entry() {
        let mut doc = PdfDocument::new_empty(10.0, 10.0);
        doc.set_catalog_entry("PageMode", Object::Name("UseOC".to_string())).unwrap();
        assert_eq!(doc.catalog().unwrap().get("PageMode").and_then(|o| o.as_name()), Some("UseOC"));
    }

    #[test]
    fn test_rejects_non_pdf() {
        assert!(matches!(PdfDocument::from_bytes(b"GIF89a"), Err(Error::InvalidFileType(_))));
    }

    #[test]
    fn test_header_version() {
        assert_eq!(parse_header(b"%PDF-1.4\n").unwrap(), (1, 4));
        assert!(parse_header(b"%PDF-x").is_err());
    }

    #[test]
    fn test_recovers_from_broken_xref() {
        let doc = PdfDocument::new_empty(200.0, 200.0);
        let mut bytes = doc.to_bytes().unwrap();
        // Point startxref somewhere useless.
        let pos = bytes.windows(9).rposition(|w| w == b"startxref").unwrap();
        bytes.truncate(pos);
        bytes.extend_from_slice(b"startxref\n5\n%%EOF\n");

        let recovered = PdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(recovered.page_count().unwrap(), 1);
    }

    #[test]
    fn test_rejects_encrypted() {
        let mut doc = PdfDocument::new_empty(10.0, 10.0);
        doc.trailer.insert("Encrypt".to_string(), Object::Reference(ObjectRef::new(50, 0)));
        let bytes = doc.to_bytes().unwrap();
        assert!(PdfDocument::from_bytes(&bytes).is_err());
    }
}
