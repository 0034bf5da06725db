//! Fallback icon colours taken from a reference document.
//!
//! The reference PDF that supplies the visibility layers usually also holds
//! one finished icon per deployment subject. Their `/IC` and `/C` entries
//! colour the single-circle fallback; subjects with no reference annotation
//! get the default orange with a black border.

use crate::document::PdfDocument;
use crate::icon_config::Rgb;
use crate::object::Object;
use crate::subject::decode_text_string;
use std::collections::HashMap;

/// Default fallback fill.
pub const DEFAULT_FILL: Rgb = [1.0, 0.5, 0.0];
/// Default fallback border.
pub const DEFAULT_BORDER: Rgb = [0.0, 0.0, 0.0];

/// Fill and border of one fallback icon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackColors {
    /// `/IC`
    pub fill: Rgb,
    /// `/C`
    pub border: Rgb,
}

impl Default for FallbackColors {
    fn default() -> Self {
        Self {
            fill: DEFAULT_FILL,
            border: DEFAULT_BORDER,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ReferenceColors {
    fill: Option<Rgb>,
    border: Option<Rgb>,
}

/// Per-subject colours read from reference annotations.
#[derive(Debug, Clone, Default)]
pub struct ReferenceAppearances {
    colors: HashMap<String, ReferenceColors>,
}

impl ReferenceAppearances {
    /// Lookup with no entries; every subject gets the defaults.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Collect colours from every page of `reference`.
    ///
    /// Only annotations carrying an `/AP` are used, and the first annotation
    /// seen for a subject wins.
    pub fn from_document(reference: &PdfDocument) -> Self {
        let mut colors = HashMap::new();
        let pages = match reference.page_count() {
            Ok(n) => n,
            Err(e) => {
                log::warn!("Failed to read reference pages: {}", e);
                return Self::empty();
            },
        };

        for page in 0..pages {
            let Ok(entries) = reference.page_annotation_refs(page) else {
                continue;
            };
            for entry in &entries {
                let Ok(dict) = reference.resolve_dict(entry) else {
                    continue;
                };
                if !dict.contains_key("AP") {
                    continue;
                }
                let Some(subject) = reference_subject(dict) else {
                    continue;
                };
                colors.entry(subject).or_insert_with(|| ReferenceColors {
                    fill: parse_color(dict.get("IC")),
                    border: parse_color(dict.get("C")),
                });
            }
        }

        log::debug!("Read reference colours for {} subjects", colors.len());
        Self { colors }
    }

    /// Number of subjects with reference colours.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Whether no subject has reference colours.
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Fallback colours for `subject`, filling gaps with the defaults.
    pub fn colors_for(&self, subject: &str) -> FallbackColors {
        let defaults = FallbackColors::default();
        match self.colors.get(subject.trim()) {
            Some(found) => FallbackColors {
                fill: found.fill.unwrap_or(defaults.fill),
                border: found.border.unwrap_or(defaults.border),
            },
            None => defaults,
        }
    }
}

fn reference_subject(dict: &HashMap<String, Object>) -> Option<String> {
    ["Subj", "Subject"]
        .iter()
        .filter_map(|key| dict.get(*key).and_then(|o| o.as_string()))
        .map(|bytes| decode_text_string(bytes).trim().to_string())
        .find(|s| !s.is_empty())
}

/// Read a colour array: three components as RGB, one as gray.
fn parse_color(obj: Option<&Object>) -> Option<Rgb> {
    let values: Vec<f64> = obj?.as_array()?.iter().filter_map(Object::as_number).collect();
    match values.as_slice() {
        [r, g, b] => Some([*r, *g, *b]),
        [gray] => Some([*gray, *gray, *gray]),
        _ => None,
    }
}
