//! Form XObjects used as annotation appearances (`/AP /N`).
//!
//! Every appearance built here is local: its BBox starts at the origin and
//! its matrix is the identity translation, so the drawing does not depend on
//! where the annotation sits on the page.

use crate::geometry::Rect;
use crate::object::{Object, ObjectRef};
use std::collections::HashMap;

/// Resource name under which the bold sans font is registered.
pub const BOLD_FONT_RESOURCE: &str = "HelvBld";

/// Builder for a single appearance stream.
#[derive(Debug, Clone)]
pub struct AppearanceStreamBuilder {
    bbox: Rect,
    content: Vec<u8>,
    fonts: HashMap<String, Object>,
    xobjects: HashMap<String, Object>,
    matrix: [f64; 6],
}

impl AppearanceStreamBuilder {
    /// Start an appearance whose BBox is `[0 0 width height]`.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            bbox: Rect::new(0.0, 0.0, width.max(0.0), height.max(0.0)),
            content: Vec::new(),
            fonts: HashMap::new(),
            xobjects: HashMap::new(),
            matrix: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        }
    }

    /// Set the content stream bytes.
    pub fn content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    /// Register the standard Helvetica-Bold font as `/HelvBld`.
    pub fn with_bold_font(mut self) -> Self {
        self.fonts.insert(BOLD_FONT_RESOURCE.to_string(), helvetica_bold());
        self
    }

    /// Register an image or form XObject under `name`.
    pub fn with_xobject(mut self, name: &str, xobject: ObjectRef) -> Self {
        self.xobjects.insert(name.to_string(), Object::Reference(xobject));
        self
    }

    /// Replace the form matrix.
    pub fn with_matrix(mut self, matrix: [f64; 6]) -> Self {
        self.matrix = matrix;
        self
    }

    /// BBox of the appearance.
    pub fn bbox(&self) -> Rect {
        self.bbox
    }

    /// Resources dictionary as it will be written.
    pub fn resources(&self) -> HashMap<String, Object> {
        let mut resources = HashMap::new();
        if !self.fonts.is_empty() {
            resources.insert("Font".to_string(), Object::Dictionary(self.fonts.clone()));
        }
        if !self.xobjects.is_empty() {
            resources.insert("XObject".to_string(), Object::Dictionary(self.xobjects.clone()));
        }
        resources
    }

    /// Produce the form XObject stream.
    pub fn build(&self) -> Object {
        let mut dict = HashMap::new();
        dict.insert("Type".to_string(), Object::Name("XObject".to_string()));
        dict.insert("Subtype".to_string(), Object::Name("Form".to_string()));
        dict.insert("FormType".to_string(), Object::Integer(1));
        dict.insert("BBox".to_string(), self.bbox.to_object());
        dict.insert(
            "Matrix".to_string(),
            Object::Array(self.matrix.iter().map(|&v| matrix_value(v)).collect()),
        );
        dict.insert("Resources".to_string(), Object::Dictionary(self.resources()));
        Object::Stream {
            dict,
            data: bytes::Bytes::from(self.content.clone()),
        }
    }
}

fn matrix_value(v: f64) -> Object {
    if v.fract() == 0.0 && v.abs() < 1e9 {
        Object::Integer(v as i64)
    } else {
        Object::Real(v)
    }
}

/// Standard 14 Helvetica-Bold font dictionary.
pub fn helvetica_bold() -> Object {
    let mut font = HashMap::new();
    font.insert("Type".to_string(), Object::Name("Font".to_string()));
    font.insert("Subtype".to_string(), Object::Name("Type1".to_string()));
    font.insert("BaseFont".to_string(), Object::Name("Helvetica-Bold".to_string()));
    font.insert("Encoding".to_string(), Object::Name("WinAnsiEncoding".to_string()));
    Object::Dictionary(font)
}
