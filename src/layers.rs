//! Visibility layers (optional content groups) for converted icons.
//!
//! The full `/OCProperties` tree of a reference document is deep-copied into
//! the output, then each new annotation is linked to the layer named after
//! its deployment subject. Any failure leaves the manager unloaded and the
//! conversion carries on without `/OC` entries.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::subject::decode_text_string;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum LayerSource {
    Path(PathBuf),
    Document(Arc<PdfDocument>),
    None,
}

/// Clones reference layers and maps subjects to them.
#[derive(Debug, Clone)]
pub struct LayerManager {
    source: LayerSource,
    name_to_ref: HashMap<String, ObjectRef>,
    layer_count: usize,
    loaded: bool,
}

impl LayerManager {
    /// Manager reading its layers from `reference_path` on [`apply`](Self::apply).
    pub fn new(reference_path: impl Into<PathBuf>) -> Self {
        Self::with_source(LayerSource::Path(reference_path.into()))
    }

    /// Manager over an already loaded reference document.
    pub fn from_document(reference: Arc<PdfDocument>) -> Self {
        Self::with_source(LayerSource::Document(reference))
    }

    /// Manager that never links layers.
    pub fn disabled() -> Self {
        Self::with_source(LayerSource::None)
    }

    fn with_source(source: LayerSource) -> Self {
        Self {
            source,
            name_to_ref: HashMap::new(),
            layer_count: 0,
            loaded: false,
        }
    }

    /// Whether layers were applied to a document.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Number of layers cloned.
    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    /// Clone the reference layers into `target`.
    ///
    /// Returns `false` (after logging why) when no layers could be applied.
    pub fn apply(&mut self, target: &mut PdfDocument) -> bool {
        self.loaded = false;
        self.layer_count = 0;
        self.name_to_ref.clear();

        let reference = match &self.source {
            LayerSource::None => return false,
            LayerSource::Document(doc) => Arc::clone(doc),
            LayerSource::Path(path) => {
                if !path.exists() {
                    log::warn!("Layer reference PDF not found: {}", path.display());
                    return false;
                }
                match PdfDocument::open(path) {
                    Ok(doc) => Arc::new(doc),
                    Err(e) => {
                        log::warn!("Failed to read layer reference {}: {}", path.display(), e);
                        return false;
                    },
                }
            },
        };

        match self.clone_layers(&reference, target) {
            Ok(()) => {
                self.loaded = true;
                log::info!(
                    "Applied {} layers from reference PDF ({} unique names)",
                    self.layer_count,
                    self.name_to_ref.len()
                );
                true
            },
            Err(e) => {
                log::warn!("Layers not applied: {}", e);
                self.name_to_ref.clear();
                self.layer_count = 0;
                false
            },
        }
    }

    fn clone_layers(&mut self, reference: &PdfDocument, target: &mut PdfDocument) -> Result<()> {
        let properties = reference
            .catalog()?
            .get("OCProperties")
            .ok_or_else(|| Error::InvalidPdf("reference PDF has no /OCProperties".to_string()))?;
        let has_layers = reference
            .resolve_dict(properties)?
            .get("OCGs")
            .map(|o| reference.resolve(o))
            .transpose()?
            .and_then(|o| o.as_array())
            .is_some_and(|a| a.iter().any(|o| o.as_reference().is_some()));
        if !has_layers {
            return Err(Error::InvalidPdf("reference /OCProperties has no /OCGs".to_string()));
        }

        let mut cloner = DeepCloner::new(reference);
        let cloned = cloner.clone_object(target, properties);

        let ocgs: Vec<ObjectRef> = target
            .resolve_dict(&cloned)?
            .get("OCGs")
            .map(|o| target.resolve(o))
            .transpose()?
            .and_then(|o| o.as_array())
            .map(|a| a.iter().filter_map(|o| o.as_reference()).collect())
            .unwrap_or_default();

        for ocg in &ocgs {
            let name = target
                .get(*ocg)
                .and_then(|o| o.as_dict())
                .and_then(|d| d.get("Name"))
                .and_then(|n| n.as_string())
                .map(decode_text_string)
                .unwrap_or_default();
            if !name.is_empty() {
                self.name_to_ref.entry(name).or_insert(*ocg);
            }
        }
        self.layer_count = ocgs.len();

        target.set_catalog_entry("OCProperties", cloned)?;
        Ok(())
    }

    /// Layer for `subject`: the exact name first, then its device-type prefix.
    pub fn layer_ref(&self, subject: &str) -> Option<ObjectRef> {
        if !self.loaded {
            return None;
        }
        if let Some(r) = self.name_to_ref.get(subject) {
            return Some(*r);
        }
        let prefix = subject.split(" - ").next().map(str::trim).filter(|p| !p.is_empty() && *p != subject)?;
        self.name_to_ref.get(prefix).copied()
    }

    /// Layer names, unordered.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.name_to_ref.keys().map(String::as_str)
    }
}

/// Copies objects between documents, giving every reachable indirect object
/// a fresh number in the target while keeping shared references shared.
struct DeepCloner<'a> {
    source: &'a PdfDocument,
    mapped: HashMap<ObjectRef, ObjectRef>,
}

impl<'a> DeepCloner<'a> {
    fn new(source: &'a PdfDocument) -> Self {
        Self {
            source,
            mapped: HashMap::new(),
        }
    }

    fn clone_object(&mut self, target: &mut PdfDocument, obj: &Object) -> Object {
        match obj {
            Object::Reference(r) => self.clone_ref(target, *r),
            Object::Array(items) => Object::Array(items.iter().map(|o| self.clone_object(target, o)).collect()),
            Object::Dictionary(dict) => Object::Dictionary(self.clone_dict(target, dict)),
            Object::Stream { dict, data } => Object::Stream {
                dict: self.clone_dict(target, dict),
                data: data.clone(),
            },
            other => other.clone(),
        }
    }

    fn clone_dict(&mut self, target: &mut PdfDocument, dict: &HashMap<String, Object>) -> HashMap<String, Object> {
        dict.iter()
            .map(|(k, v)| (k.clone(), self.clone_object(target, v)))
            .collect()
    }

    fn clone_ref(&mut self, target: &mut PdfDocument, r: ObjectRef) -> Object {
        if let Some(mapped) = self.mapped.get(&r) {
            return Object::Reference(*mapped);
        }
        let Some(source_obj) = self.source.get(r) else {
            return Object::Null;
        };
        // Page tree nodes belong to the reference document only.
        let kind = source_obj.as_dict().and_then(|d| d.get("Type")).and_then(|t| t.as_name());
        if matches!(kind, Some("Page") | Some("Pages") | Some("Catalog")) {
            return Object::Null;
        }

        let new_ref = target.register(Object::Null);
        self.mapped.insert(r, new_ref);
        let cloned = self.clone_object(target, source_obj);
        if let Some(slot) = target.get_mut(new_ref) {
            *slot = cloned;
        }
        Object::Reference(new_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ocg(name: &str) -> Object {
        let mut d = HashMap::new();
        d.insert("Type".to_string(), Object::Name("OCG".to_string()));
        d.insert("Name".to_string(), Object::String(name.as_bytes().to_vec()));
        Object::Dictionary(d)
    }

    fn reference_doc(names: &[&str]) -> PdfDocument {
        let mut doc = PdfDocument::new_empty(612.0, 792.0);
        let refs: Vec<Object> = names.iter().map(|n| Object::Reference(doc.register(ocg(n)))).collect();
        let mut default_config = HashMap::new();
        default_config.insert("Order".to_string(), Object::Array(refs.clone()));
        default_config.insert("ON".to_string(), Object::Array(refs.clone()));
        let d_ref = doc.register(Object::Dictionary(default_config));
        let mut props = HashMap::new();
        props.insert("OCGs".to_string(), Object::Array(refs));
        props.insert("D".to_string(), Object::Reference(d_ref));
        doc.set_catalog_entry("OCProperties", Object::Dictionary(props)).unwrap();
        doc
    }

    #[test]
    fn test_apply_clones_layers() {
        let reference = Arc::new(reference_doc(&["AP - Cisco MR36H", "SW", "Legend"]));
        let mut target = PdfDocument::new_empty(612.0, 792.0);
        let before = target.object_count();

        let mut layers = LayerManager::from_document(reference);
        assert!(layers.apply(&mut target));
        assert!(layers.is_loaded());
        assert_eq!(layers.layer_count(), 3);
        assert_eq!(target.object_count(), before + 4);

        let props = target.catalog().unwrap().get("OCProperties").unwrap().clone();
        let props = props.as_dict().unwrap();
        let ocgs = props.get("OCGs").and_then(|o| o.as_array()).unwrap().clone();
        let d = target.resolve_dict(props.get("D").unwrap()).unwrap();
        assert_eq!(d.get("Order").and_then(|o| o.as_array()), Some(&ocgs));

        let ap = layers.layer_ref("AP - Cisco MR36H").unwrap();
        assert!(ocgs.contains(&Object::Reference(ap)));
        let name = target.get(ap).and_then(|o| o.as_dict()).and_then(|d| d.get("Name")).cloned();
        assert_eq!(name, Some(Object::String(b"AP - Cisco MR36H".to_vec())));
    }

    #[test]
    fn test_layer_ref_prefix_fallback() {
        let reference = Arc::new(reference_doc(&["SW"]));
        let mut target = PdfDocument::new_empty(612.0, 792.0);
        let mut layers = LayerManager::from_document(reference);
        layers.apply(&mut target);
        assert!(layers.layer_ref("SW - Cisco 9300X 24X").is_some());
        assert_eq!(layers.layer_ref("SW - Cisco 9300X 24X"), layers.layer_ref("SW"));
        assert!(layers.layer_ref("AP - Cisco MR78").is_none());
    }

    #[test]
    fn test_missing_reference_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let mut layers = LayerManager::new(dir.path().join("missing.pdf"));
        let mut target = PdfDocument::new_empty(612.0, 792.0);
        assert!(!layers.apply(&mut target));
        assert!(!layers.is_loaded());
        assert!(layers.layer_ref("SW").is_none());
        assert!(target.catalog().unwrap().get("OCProperties").is_none());
    }

    #[test]
    fn test_reference_without_layers() {
        let reference = Arc::new(PdfDocument::new_empty(612.0, 792.0));
        let mut layers = LayerManager::from_document(reference);
        let mut target = PdfDocument::new_empty(612.0, 792.0);
        assert!(!layers.apply(&mut target));
        assert_eq!(layers.layer_count(), 0);
    }

    #[test]
    fn test_reference_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layers.pdf");
        reference_doc(&["CCTV"]).save(&path).unwrap();
        let mut layers = LayerManager::new(&path);
        let mut target = PdfDocument::new_empty(612.0, 792.0);
        assert!(layers.apply(&mut target));
        assert!(layers.layer_ref("CCTV - Cisco MV93X").is_some());
    }

    #[test]
    fn test_reference_without_ocgs_adds_nothing() {
        let mut reference = PdfDocument::new_empty(612.0, 792.0);
        let mut d = HashMap::new();
        d.insert("Order".to_string(), Object::Array(Vec::new()));
        let d_ref = reference.register(Object::Dictionary(d));
        let mut props = HashMap::new();
        props.insert("OCGs".to_string(), Object::Array(Vec::new()));
        props.insert("D".to_string(), Object::Reference(d_ref));
        reference.set_catalog_entry("OCProperties", Object::Dictionary(props)).unwrap();

        let mut target = PdfDocument::new_empty(612.0, 792.0);
        let before = target.object_count();
        let mut layers = LayerManager::from_document(Arc::new(reference));
        assert!(!layers.apply(&mut target));
        assert_eq!(target.object_count(), before);
        assert!(target.catalog().unwrap().get("OCProperties").is_none());
    }

    #[test]
    fn test_disabled() {
        let mut layers = LayerManager::disabled();
        let mut target = PdfDocument::new_empty(612.0, 792.0);
        assert!(!layers.apply(&mut target));
    }
}
