//! Bid → deployment conversion of a markup page.
//!
//! ```text
//! /Annots snapshot
//!     ↓
//! [classify] one decision per entry (reply-to children follow their root)
//!     ↓
//! [rebuild]  preserved entries copied, converted ones replaced by
//!            registered icon groups, deleted ones dropped
//!     ↓
//! /Annots replaced in one assignment
//! ```
//!
//! A [`Converter`] holds everything that is read-only for the lifetime of
//! the process: the mapping, the icon catalog and the layer template with
//! its reference colours. Counters, image registrations and layer links
//! live in a per-run state created by every [`Converter::convert_document`]
//! call.

use crate::annotation::SourceAnnotation;
use crate::appearance::ReferenceAppearances;
use crate::compound::{build_fallback, build_group, Bookkeeping, GroupRequest};
use crate::config::ConverterConfig;
use crate::document::{parse_header, PdfDocument};
use crate::error::{Error, Result};
use crate::icon_config::{IconCatalog, OverrideStore};
use crate::ids::IdAssigner;
use crate::layers::LayerManager;
use crate::mapping::{Resolution, SubjectMapping, SubjectResolver};
use crate::object::{Object, ObjectRef};
use crate::render::{IconLayout, ImageLoader};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Page converted by the pipeline.
const PAGE_INDEX: usize = 0;

/// What happens to one source annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionDecision {
    /// Replace with an icon for the deployment subject
    Convert(String),
    /// Copy unchanged
    Preserve,
    /// Drop (legends, headers, children of replaced icons)
    Delete,
    /// Subject not in the mapping; copied unchanged
    Unmapped,
    /// Unreadable or without a usable /Rect; copied unchanged and reported
    Skip,
}

/// Result of one conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionSummary {
    /// converted + skipped + preserved
    pub processed: usize,
    /// Icons written (groups and fallbacks)
    pub converted: usize,
    /// Icons written as a single fallback object
    pub fallback_converted: usize,
    /// Legends, headers and unreadable annotations
    pub skipped: usize,
    /// Annotations copied because of their subtype
    pub preserved: usize,
    /// Reply-to children dropped with their root
    pub removed_children: usize,
    /// Subjects of skipped annotations
    pub skipped_subjects: Vec<String>,
    /// Subjects missing from the mapping
    pub unmapped_subjects: Vec<String>,
    /// Whether visibility layers were linked
    pub layers_applied: bool,
    /// Wall time of the conversion
    pub processing_time_ms: u64,
}

fn decide_root(annot: &SourceAnnotation, resolver: &SubjectResolver) -> ConversionDecision {
    match resolver.resolve(&annot.subject) {
        Resolution::Delete => ConversionDecision::Delete,
        _ if annot.rect.is_none() => ConversionDecision::Skip,
        Resolution::Convert(target) if annot.subtype.is_convertible() => ConversionDecision::Convert(target),
        Resolution::Convert(_) => ConversionDecision::Preserve,
        Resolution::Unmapped => ConversionDecision::Unmapped,
    }
}

fn child_decision(root: &ConversionDecision) -> ConversionDecision {
    match root {
        ConversionDecision::Delete | ConversionDecision::Convert(_) => ConversionDecision::Delete,
        _ => ConversionDecision::Preserve,
    }
}

/// Decide every entry of a page snapshot.
///
/// Roots are decided first; children then take their decision from the
/// root of their reply chain through a reference index.
pub fn classify(annotations: &[Result<SourceAnnotation>], resolver: &SubjectResolver) -> Vec<ConversionDecision> {
    let by_ref: HashMap<ObjectRef, usize> = annotations
        .iter()
        .enumerate()
        .filter_map(|(i, a)| a.as_ref().ok().and_then(|a| a.reference).map(|r| (r, i)))
        .collect();

    let mut decisions: Vec<Option<ConversionDecision>> = annotations
        .iter()
        .map(|a| match a {
            Err(_) => Some(ConversionDecision::Skip),
            Ok(a) if !a.is_root() => None,
            Ok(a) if a.subtype.is_linework() => Some(ConversionDecision::Preserve),
            Ok(a) => Some(decide_root(a, resolver)),
        })
        .collect();

    for i in 0..annotations.len() {
        if decisions[i].is_some() {
            continue;
        }
        let mut current = i;
        let mut resolved = ConversionDecision::Preserve;
        // Bounded walk up the reply chain; cycles end as Preserve.
        for _ in 0..annotations.len() {
            let parent = annotations[current]
                .as_ref()
                .ok()
                .and_then(|a| a.parent())
                .and_then(|p| by_ref.get(&p).copied());
            match parent {
                None => break,
                Some(p) => match &decisions[p] {
                    Some(root) => {
                        resolved = child_decision(root);
                        break;
                    },
                    None => current = p,
                },
            }
        }
        decisions[i] = Some(resolved);
    }

    decisions
        .into_iter()
        .map(|d| d.unwrap_or(ConversionDecision::Preserve))
        .collect()
}

/// Check an input file before parsing it.
pub fn validate_input(data: &[u8], config: &ConverterConfig) -> Result<()> {
    let size = data.len() as u64;
    if size > config.max_file_size {
        return Err(Error::FileTooLarge {
            size,
            limit: config.max_file_size,
        });
    }
    parse_header(data)?;
    Ok(())
}

/// Mutable state of one conversion run.
struct Run<'a> {
    ids: IdAssigner<'a>,
    sequence: u32,
    layers: LayerManager,
    images: ImageLoader,
    registered_images: HashMap<String, Option<(ObjectRef, (u32, u32))>>,
    meta: Bookkeeping,
}

/// Converts bid markups into deployment icons.
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConverterConfig,
    resolver: SubjectResolver,
    catalog: IconCatalog,
    layer_template: Option<Arc<PdfDocument>>,
    appearances: ReferenceAppearances,
}

impl Converter {
    /// Load the mapping, icon catalog, overrides and layer template named
    /// by `config`.
    pub fn new(config: ConverterConfig) -> Result<Self> {
        let mapping = SubjectMapping::load(&config.mapping_file)?;
        log::info!("Loaded {} subject mappings from {}", mapping.len(), config.mapping_file.display());

        let mut catalog = IconCatalog::builtin()?;
        if let Some(path) = &config.icon_overrides_file {
            catalog = catalog.with_override_store(&OverrideStore::new(path));
        }

        let layer_template = match &config.layer_reference_pdf {
            None => None,
            Some(path) if !path.exists() => {
                log::warn!("Layer reference PDF not found: {}", path.display());
                None
            },
            Some(path) => match PdfDocument::open(path) {
                Ok(doc) => Some(Arc::new(doc)),
                Err(e) => {
                    log::warn!("Failed to read layer reference {}: {}", path.display(), e);
                    None
                },
            },
        };

        let resolver = SubjectResolver::new(mapping).with_legend_markers(config.legend_markers.iter().cloned());
        Ok(Self::from_parts(config, resolver, catalog).with_layer_template(layer_template))
    }

    /// Assemble a converter from already loaded parts.
    pub fn from_parts(config: ConverterConfig, resolver: SubjectResolver, catalog: IconCatalog) -> Self {
        Self {
            config,
            resolver,
            catalog,
            layer_template: None,
            appearances: ReferenceAppearances::empty(),
        }
    }

    /// Use `template` as the layer reference and the source of fallback
    /// colours.
    pub fn with_layer_template(mut self, template: Option<Arc<PdfDocument>>) -> Self {
        self.appearances = template
            .as_deref()
            .map(ReferenceAppearances::from_document)
            .unwrap_or_default();
        self.layer_template = template;
        self
    }

    /// Replace the fallback colour lookup.
    pub fn with_appearances(mut self, appearances: ReferenceAppearances) -> Self {
        self.appearances = appearances;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Subject resolver in use.
    pub fn resolver(&self) -> &SubjectResolver {
        &self.resolver
    }

    /// Icon catalog in use.
    pub fn catalog(&self) -> &IconCatalog {
        &self.catalog
    }

    /// Fallback colour lookup in use.
    pub fn appearances(&self) -> &ReferenceAppearances {
        &self.appearances
    }

    /// Read, convert and write a document.
    pub fn convert_file(&self, source: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<ConversionSummary> {
        let data = std::fs::read(source.as_ref())?;
        let (doc, summary) = self.convert_bytes(&data)?;
        doc.save(target.as_ref())?;
        Ok(summary)
    }

    /// Validate, parse and convert an in-memory document.
    pub fn convert_bytes(&self, data: &[u8]) -> Result<(PdfDocument, ConversionSummary)> {
        validate_input(data, &self.config)?;
        let mut doc = PdfDocument::from_bytes(data)?;
        let summary = self.convert_document(&mut doc)?;
        Ok((doc, summary))
    }

    /// Convert the annotations of a loaded document in place.
    pub fn convert_document(&self, doc: &mut PdfDocument) -> Result<ConversionSummary> {
        let started = Instant::now();

        let pages = doc.page_count()?;
        if pages == 0 {
            return Err(Error::InvalidPdf("document has no pages".to_string()));
        }
        if pages > 1 {
            if self.config.require_single_page {
                return Err(Error::MultiPagePdf(pages));
            }
            log::warn!("Document has {} pages; only the first is converted", pages);
        }

        let entries = doc.page_annotation_refs(PAGE_INDEX)?;
        let annotations: Vec<Result<SourceAnnotation>> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| SourceAnnotation::read(doc, i, entry))
            .collect();
        let markups = annotations
            .iter()
            .filter(|a| a.as_ref().map_or(true, |a| a.subtype.is_markup()))
            .count();
        if markups == 0 {
            return Err(Error::NoAnnotationsFound);
        }

        let mut run = Run {
            ids: IdAssigner::new(self.catalog.id_prefixes()),
            sequence: 0,
            layers: match &self.layer_template {
                Some(template) => LayerManager::from_document(Arc::clone(template)),
                None => LayerManager::disabled(),
            },
            images: ImageLoader::new(&self.config.gear_icons_dir),
            registered_images: HashMap::new(),
            meta: Bookkeeping::new(self.config.author.clone()),
        };
        let mut summary = ConversionSummary {
            layers_applied: run.layers.apply(doc),
            ..Default::default()
        };

        let decisions = classify(&annotations, &self.resolver);
        let mut output: Vec<Object> = Vec::with_capacity(entries.len());

        for (i, ((entry, annot), decision)) in entries.iter().zip(&annotations).zip(decisions).enumerate() {
            let subject = match annot {
                Ok(a) => a.subject.clone(),
                Err(_) => format!("(unreadable annotation {})", i),
            };
            log::debug!("Annotation {:?}: {:?}", subject, decision);

            match decision {
                ConversionDecision::Preserve => {
                    output.push(entry.clone());
                    summary.preserved += 1;
                },
                ConversionDecision::Unmapped => {
                    output.push(entry.clone());
                    summary.unmapped_subjects.push(subject);
                },
                ConversionDecision::Skip => {
                    if let Err(e) = annot {
                        log::warn!("{}", e);
                    } else {
                        log::warn!("Skipping {:?}: malformed /Rect", subject);
                    }
                    output.push(entry.clone());
                    summary.skipped += 1;
                    summary.skipped_subjects.push(subject);
                },
                ConversionDecision::Delete => {
                    let is_root = annot.as_ref().map_or(true, |a| a.is_root());
                    if is_root {
                        summary.skipped += 1;
                        summary.skipped_subjects.push(subject);
                    } else {
                        summary.removed_children += 1;
                    }
                },
                ConversionDecision::Convert(target) => {
                    let Some(rect) = annot.as_ref().ok().and_then(|a| a.rect) else {
                        output.push(entry.clone());
                        summary.skipped += 1;
                        summary.skipped_subjects.push(subject);
                        continue;
                    };
                    let (refs, fallback) = self.convert_one(doc, &mut run, &rect, &target)?;
                    output.extend(refs.into_iter().map(Object::Reference));
                    summary.converted += 1;
                    if fallback {
                        summary.fallback_converted += 1;
                    }
                },
            }
        }

        doc.set_page_annotations(PAGE_INDEX, output)?;

        summary.processed = summary.converted + summary.skipped + summary.preserved;
        summary.processing_time_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "Converted {} icons ({} fallback), skipped {}, preserved {}, removed {} children, {} unmapped in {} ms",
            summary.converted,
            summary.fallback_converted,
            summary.skipped,
            summary.preserved,
            summary.removed_children,
            summary.unmapped_subjects.len(),
            summary.processing_time_ms
        );
        if !run.ids.current_counts().is_empty() {
            log::debug!("ID counters: {:?}", run.ids.current_counts());
        }
        Ok(summary)
    }

    /// Build one replacement icon; returns its annotation references and
    /// whether the fallback was used.
    fn convert_one(
        &self,
        doc: &mut PdfDocument,
        run: &mut Run<'_>,
        rect: &crate::geometry::Rect,
        target: &str,
    ) -> Result<(Vec<ObjectRef>, bool)> {
        let layer = run.layers.layer_ref(target);

        let Some(config) = self.catalog.config_for(target) else {
            log::debug!("No icon layout for {:?}; using fallback", target);
            let colors = self.appearances.colors_for(target);
            let r = build_fallback(doc, rect, target, &colors, layer, &run.meta)?;
            return Ok((vec![r], true));
        };

        let image = config
            .gear_image()
            .and_then(|path| self.register_image(doc, run, path, config.circle_color));
        let id_label = run.ids.next_id(target);
        let layout = IconLayout::compute(&config, target, id_label.as_deref(), image.map(|(_, dims)| dims));

        run.sequence += 1;
        let request = GroupRequest {
            source_rect: *rect,
            subject: target,
            layout: &layout,
            layer,
            image: image.map(|(r, _)| r),
            sequence_no: run.sequence,
        };
        let group = build_group(doc, &request, &run.meta)?;
        log::debug!(
            "Built group {} for {:?} with label {:?}",
            run.sequence,
            target,
            id_label.as_deref().unwrap_or("")
        );
        Ok((group.references(), false))
    }

    /// Register a gear image once per run and colour.
    fn register_image(
        &self,
        doc: &mut PdfDocument,
        run: &mut Run<'_>,
        path: &str,
        background: crate::icon_config::Rgb,
    ) -> Option<(ObjectRef, (u32, u32))> {
        let key = format!("{}|{:?}", path, background);
        if let Some(cached) = run.registered_images.get(&key) {
            return *cached;
        }
        let registered = run.images.load(path, background).and_then(|img| match img.to_xobject() {
            Ok(xobject) => Some((doc.register(xobject), img.dimensions())),
            Err(e) => {
                log::warn!("Failed to embed gear image {}: {}", path, e);
                None
            },
        });
        run.registered_images.insert(key, registered);
        registered
    }
}

/// Convert `source` into `target` with the default configuration.
pub fn convert(source: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<ConversionSummary> {
    Converter::new(ConverterConfig::default())?.convert_file(source, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::subject::encode_text_string;

    fn resolver() -> SubjectResolver {
        SubjectResolver::new(SubjectMapping::from_entries([
            ("AP_Bid", "AP - Cisco MR36H", "Wireless"),
            ("Box_Bid", "AP - Cisco MR36H", "Wireless"),
        ]))
    }

    fn annot(doc: &mut PdfDocument, subtype: &str, subject: &str, irt: Option<ObjectRef>) -> Object {
        let mut d = HashMap::new();
        d.insert("Type".to_string(), Object::Name("Annot".to_string()));
        d.insert("Subtype".to_string(), Object::Name(subtype.to_string()));
        d.insert("Rect".to_string(), Rect::new(0.0, 0.0, 25.0, 30.0).to_object());
        d.insert("Subj".to_string(), encode_text_string(subject));
        if let Some(parent) = irt {
            d.insert("IRT".to_string(), Object::Reference(parent));
        }
        Object::Reference(doc.register(Object::Dictionary(d)))
    }

    fn read_all(doc: &PdfDocument, entries: &[Object]) -> Vec<Result<SourceAnnotation>> {
        entries
            .iter()
            .enumerate()
            .map(|(i, e)| SourceAnnotation::read(doc, i, e))
            .collect()
    }

    #[test]
    fn test_classify_roots() {
        let mut doc = PdfDocument::new_empty(612.0, 792.0);
        let entries = vec![
            annot(&mut doc, "Circle", "AP_Bid", None),
            annot(&mut doc, "Ink", "AP_Bid", None),
            annot(&mut doc, "PolyLine", "Legend", None),
            annot(&mut doc, "FreeText", "Legend Box", None),
            annot(&mut doc, "Square", "Mystery", None),
            Object::Integer(5),
        ];
        let decisions = classify(&read_all(&doc, &entries), &resolver());
        assert_eq!(
            decisions,
            vec![
                ConversionDecision::Convert("AP - Cisco MR36H".to_string()),
                ConversionDecision::Preserve,
                ConversionDecision::Preserve,
                ConversionDecision::Delete,
                ConversionDecision::Unmapped,
                ConversionDecision::Skip,
            ]
        );
    }

    #[test]
    fn test_children_follow_root() {
        let mut doc = PdfDocument::new_empty(612.0, 792.0);
        let converted = annot(&mut doc, "Circle", "AP_Bid", None);
        let kept = annot(&mut doc, "Square", "Mystery", None);
        let legend = annot(&mut doc, "Square", "HEADER", None);
        let child_of_converted = annot(&mut doc, "FreeText", "AP_Bid", converted.as_reference());
        let grandchild = annot(&mut doc, "FreeText", "x", child_of_converted.as_reference());
        let child_of_kept = annot(&mut doc, "FreeText", "AP_Bid", kept.as_reference());
        let child_of_legend = annot(&mut doc, "Circle", "y", legend.as_reference());
        let orphan = annot(&mut doc, "Circle", "AP_Bid", Some(ObjectRef::new(999, 0)));

        let entries = vec![
            grandchild,
            converted,
            kept,
            legend,
            child_of_converted,
            child_of_kept,
            child_of_legend,
            orphan,
        ];
        let decisions = classify(&read_all(&doc, &entries), &resolver());
        assert_eq!(decisions[0], ConversionDecision::Delete);
        assert_eq!(decisions[4], ConversionDecision::Delete);
        assert_eq!(decisions[5], ConversionDecision::Preserve);
        assert_eq!(decisions[6], ConversionDecision::Delete);
        assert_eq!(decisions[7], ConversionDecision::Preserve);
    }

    #[test]
    fn test_linework_replies_follow_root() {
        let mut doc = PdfDocument::new_empty(612.0, 792.0);
        let legend = annot(&mut doc, "FreeText", "Legend", None);
        let converted = annot(&mut doc, "Circle", "AP_Bid", None);
        let cable = annot(&mut doc, "PolyLine", "Cable", None);
        let legend_line = annot(&mut doc, "PolyLine", "Cable", legend.as_reference());
        let ap_line = annot(&mut doc, "Line", "Cable", converted.as_reference());
        let cable_reply = annot(&mut doc, "Line", "Cable", cable.as_reference());

        let entries = vec![legend, converted, cable, legend_line, ap_line, cable_reply];
        let decisions = classify(&read_all(&doc, &entries), &resolver());
        assert_eq!(decisions[2], ConversionDecision::Preserve);
        assert_eq!(decisions[3], ConversionDecision::Delete);
        assert_eq!(decisions[4], ConversionDecision::Delete);
        assert_eq!(decisions[5], ConversionDecision::Preserve);
    }

    #[test]
    fn test_reply_cycle_terminates() {
        let mut doc = PdfDocument::new_empty(612.0, 792.0);
        let a = doc.register(Object::Null);
        let b_entry = annot(&mut doc, "Circle", "AP_Bid", Some(a));
        let mut d = HashMap::new();
        d.insert("Subtype".to_string(), Object::Name("Circle".to_string()));
        d.insert("IRT".to_string(), b_entry.clone());
        if let Some(slot) = doc.get_mut(a) {
            *slot = Object::Dictionary(d);
        }
        let entries = vec![Object::Reference(a), b_entry];
        let decisions = classify(&read_all(&doc, &entries), &resolver());
        assert_eq!(decisions, vec![ConversionDecision::Preserve, ConversionDecision::Preserve]);
    }

    #[test]
    fn test_convertible_with_bad_rect_is_skipped() {
        let mut doc = PdfDocument::new_empty(612.0, 792.0);
        let mut d = HashMap::new();
        d.insert("Subtype".to_string(), Object::Name("Circle".to_string()));
        d.insert("Subj".to_string(), encode_text_string("AP_Bid"));
        d.insert("Rect".to_string(), Object::Array(vec![Object::Integer(1)]));
        let bad = Object::Reference(doc.register(Object::Dictionary(d)));
        let child = annot(&mut doc, "FreeText", "z", bad.as_reference());
        let decisions = classify(&read_all(&doc, &[bad, child]), &resolver());
        assert_eq!(decisions, vec![ConversionDecision::Skip, ConversionDecision::Preserve]);
    }

    #[test]
    fn test_validate_input() {
        let config = ConverterConfig::default().with_max_file_size(16);
        assert!(matches!(
            validate_input(&[b'%'; 17], &config),
            Err(Error::FileTooLarge { size: 17, limit: 16 })
        ));
        assert!(matches!(validate_input(b"hello", &config), Err(Error::InvalidFileType(_))));
        assert!(validate_input(b"%PDF-1.7\n", &config).is_ok());
    }

    #[test]
    fn test_summary_serializes() {
        let summary = ConversionSummary {
            converted: 2,
            processed: 4,
            ..Default::default()
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["converted"], 2);
        assert_eq!(json["layers_applied"], false);
        assert!(json["skipped_subjects"].as_array().unwrap().is_empty());
    }
}
