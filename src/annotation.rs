//! Read-only view of the annotations already on a page.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::object::{Object, ObjectRef};
use crate::subject::{decode_text_string, extract_subject, normalize_subject};
use std::collections::HashMap;
use std::fmt;

/// Annotation subtypes the converter distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnnotationSubtype {
    /// Sticky note
    Text,
    /// Hyperlink
    Link,
    /// Free text box
    FreeText,
    /// Straight line
    Line,
    /// Rectangle
    Square,
    /// Ellipse
    Circle,
    /// Closed polygon
    Polygon,
    /// Open polyline
    PolyLine,
    /// Rubber stamp
    Stamp,
    /// Freehand ink
    Ink,
    /// Popup window of another annotation
    Popup,
    /// Form field widget
    Widget,
    /// Anything else, with its `/Subtype` name
    Other(String),
}

impl AnnotationSubtype {
    /// Parse a `/Subtype` name.
    pub fn from_pdf_name(name: &str) -> Self {
        match name {
            "Text" => Self::Text,
            "Link" => Self::Link,
            "FreeText" => Self::FreeText,
            "Line" => Self::Line,
            "Square" => Self::Square,
            "Circle" => Self::Circle,
            "Polygon" => Self::Polygon,
            "PolyLine" => Self::PolyLine,
            "Stamp" => Self::Stamp,
            "Ink" => Self::Ink,
            "Popup" => Self::Popup,
            "Widget" => Self::Widget,
            other => Self::Other(other.to_string()),
        }
    }

    /// The `/Subtype` name.
    pub fn pdf_name(&self) -> &str {
        match self {
            Self::Text => "Text",
            Self::Link => "Link",
            Self::FreeText => "FreeText",
            Self::Line => "Line",
            Self::Square => "Square",
            Self::Circle => "Circle",
            Self::Polygon => "Polygon",
            Self::PolyLine => "PolyLine",
            Self::Stamp => "Stamp",
            Self::Ink => "Ink",
            Self::Popup => "Popup",
            Self::Widget => "Widget",
            Self::Other(name) => name,
        }
    }

    /// Subtypes that can be replaced by a deployment icon.
    pub fn is_convertible(&self) -> bool {
        matches!(self, Self::Circle | Self::Square | Self::FreeText | Self::Polygon | Self::Stamp)
    }

    /// Cable runs and other linework, always kept as they are.
    pub fn is_linework(&self) -> bool {
        matches!(self, Self::Line | Self::PolyLine)
    }

    /// Markup annotations, as opposed to links, popups and widgets.
    pub fn is_markup(&self) -> bool {
        !matches!(self, Self::Link | Self::Popup | Self::Widget)
    }
}

impl fmt::Display for AnnotationSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pdf_name())
    }
}

/// One entry of a page's `/Annots` array.
#[derive(Debug, Clone)]
pub struct SourceAnnotation {
    /// Position in `/Annots`
    pub index: usize,
    /// The `/Annots` entry exactly as stored
    pub entry: Object,
    /// Indirect reference, when the entry is one
    pub reference: Option<ObjectRef>,
    /// Subtype
    pub subtype: AnnotationSubtype,
    /// `/Rect`, or `None` when missing or malformed
    pub rect: Option<Rect>,
    /// Normalised subject (may be empty)
    pub subject: String,
    /// `/NM`, if present
    pub name: Option<String>,
    /// `/IRT` parent
    pub in_reply_to: Option<ObjectRef>,
    /// Owner of a popup (`/Parent`)
    pub popup_of: Option<ObjectRef>,
}

impl SourceAnnotation {
    /// Read the `/Annots` entry at `index`.
    ///
    /// Fails with [`Error::MalformedAnnotation`] when the entry does not
    /// resolve to a dictionary.
    pub fn read(doc: &PdfDocument, index: usize, entry: &Object) -> Result<Self> {
        let dict = doc.resolve_dict(entry).map_err(|e| {
            Error::MalformedAnnotation(format!("annotation {} is not a dictionary: {}", index, e))
        })?;
        Ok(Self::from_dict(index, entry, dict))
    }

    fn from_dict(index: usize, entry: &Object, dict: &HashMap<String, Object>) -> Self {
        let subtype = dict
            .get("Subtype")
            .and_then(|o| o.as_name())
            .map(AnnotationSubtype::from_pdf_name)
            .unwrap_or_else(|| AnnotationSubtype::Other(String::new()));

        Self {
            index,
            entry: entry.clone(),
            reference: entry.as_reference(),
            rect: dict.get("Rect").and_then(Rect::from_object),
            subject: normalize_subject(&extract_subject(dict)),
            name: dict.get("NM").and_then(|o| o.as_string()).map(decode_text_string),
            in_reply_to: dict.get("IRT").and_then(|o| o.as_reference()),
            popup_of: match subtype {
                AnnotationSubtype::Popup => dict.get("Parent").and_then(|o| o.as_reference()),
                _ => None,
            },
            subtype,
        }
    }

    /// The annotation this one belongs to: its `/IRT` target, or the owner
    /// of a popup.
    pub fn parent(&self) -> Option<ObjectRef> {
        self.in_reply_to.or(self.popup_of)
    }

    /// True when the annotation does not belong to another one.
    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }
}
