//! Icon geometry in the canonical 25 × 30 layout space.
//!
//! ```text
//!  30 ┌───────────────────────┐
//!     │      ┌─────────┐      │  id box (top, centred)
//!     │    ╭─┴─────────┴─╮    │  circle top overlaps the box by 2
//!     │   │    BRAND      │   │
//!     │   │   [ image ]   │   │
//!     │   │    MODEL      │   │
//!     │    ╰─────────────╯    │
//!   0 └───────────────────────┘
//!     0                      25
//! ```

use super::metrics::measure_text_width;
use crate::geometry::{Point, Rect};
use crate::icon_config::{IconLayoutConfig, DEFAULT_LAYER_ORDER};

/// Canonical layout width.
pub const CANVAS_WIDTH: f64 = 25.0;
/// Canonical layout height.
pub const CANVAS_HEIGHT: f64 = 30.0;
/// Gap between the circle and the canvas edge.
pub const CIRCLE_INSET: f64 = 0.3;
/// How far the circle's top edge reaches into the id box.
pub const SEAM_OVERLAP: f64 = 2.0;
/// Page units per layout unit for an icon placed at its nominal size.
pub const COMPOUND_RENDER_SCALE: f64 = 1.12;
/// Model text never wraps past this many lines.
pub const MAX_MODEL_LINES: usize = 3;
/// Line height as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f64 = 1.2;
/// Baseline nudge applied to centred labels.
pub const LABEL_BASELINE_NUDGE: f64 = 0.3;

/// The full canonical canvas.
pub fn canvas() -> Rect {
    Rect::new(0.0, 0.0, CANVAS_WIDTH, CANVAS_HEIGHT)
}

/// Uniform scale and origin that fit the canvas centred inside `target`.
pub fn fit_canvas(target: &Rect) -> (f64, Point) {
    let scale = (target.width() / CANVAS_WIDTH).min(target.height() / CANVAS_HEIGHT);
    let scale = if scale.is_finite() { scale.max(0.0) } else { 0.0 };
    let origin = Point::new(
        target.x1 + (target.width() - CANVAS_WIDTH * scale) / 2.0,
        target.y1 + (target.height() - CANVAS_HEIGHT * scale) / 2.0,
    );
    (scale, origin)
}

/// Components that `layer_order` can stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerItem {
    /// Raster gear image
    GearImage,
    /// Brand line
    BrandText,
    /// Model block
    ModelText,
}

impl LayerItem {
    /// Parse a `layer_order` entry.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gear_image" => Some(Self::GearImage),
            "brand_text" => Some(Self::BrandText),
            "model_text" => Some(Self::ModelText),
            _ => None,
        }
    }

    /// Configuration name.
    pub fn name(self) -> &'static str {
        match self {
            Self::GearImage => "gear_image",
            Self::BrandText => "brand_text",
            Self::ModelText => "model_text",
        }
    }
}

/// Clean up a configured stacking order.
///
/// Unknown names and repeats are dropped; anything missing is appended in
/// the default order.
pub fn normalize_layer_order(names: &[String]) -> Vec<LayerItem> {
    let mut order = Vec::with_capacity(DEFAULT_LAYER_ORDER.len());
    let requested = names.iter().map(String::as_str).chain(DEFAULT_LAYER_ORDER);
    for item in requested.filter_map(LayerItem::from_name) {
        if !order.contains(&item) {
            order.push(item);
        }
    }
    order
}

/// One positioned line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    /// Text shown
    pub text: String,
    /// Left edge of the baseline
    pub x: f64,
    /// Baseline
    pub y: f64,
    /// Font size
    pub size: f64,
}

/// Split model text into at most [`MAX_MODEL_LINES`] lines.
pub fn model_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n').take(MAX_MODEL_LINES).collect()
}

/// Parts of the icon that become separate annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentRole {
    /// Root FreeText carrying the id label and group metadata
    RootIdText,
    /// White label box
    IdBox,
    /// FreeText spanning the whole icon
    Container,
    /// Coloured disc
    Circle,
    /// Square carrying the gear image
    Image,
    /// Model text block
    ModelText,
    /// Brand line
    BrandText,
}

impl ComponentRole {
    /// Every role, root first, in output order.
    pub const ALL: [ComponentRole; 7] = [
        Self::RootIdText,
        Self::IdBox,
        Self::Container,
        Self::Circle,
        Self::Image,
        Self::ModelText,
        Self::BrandText,
    ];

    /// Annotation subtype used for this role.
    pub fn subtype(self) -> &'static str {
        match self {
            Self::RootIdText | Self::Container | Self::ModelText | Self::BrandText => "FreeText",
            Self::IdBox | Self::Image => "Square",
            Self::Circle => "Circle",
        }
    }

    /// Short name, used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::RootIdText => "id_text",
            Self::IdBox => "id_box",
            Self::Container => "container",
            Self::Circle => "circle",
            Self::Image => "gear_image",
            Self::ModelText => "model_text",
            Self::BrandText => "brand_text",
        }
    }

    /// True for FreeText roles.
    pub fn is_text(self) -> bool {
        self.subtype() == "FreeText"
    }
}

/// Resolved geometry and text of one icon.
#[derive(Debug, Clone)]
pub struct IconLayout {
    /// Configuration the layout was computed from
    pub config: IconLayoutConfig,
    /// Label box
    pub id_box: Rect,
    /// Label text, centred in the box; `None` when hidden or empty
    pub id_label: Option<TextLine>,
    /// Circle centre
    pub circle_center: Point,
    /// Circle radius
    pub radius: f64,
    /// Image draw box
    pub image_box: Rect,
    /// Brand line; `None` when there is no brand text
    pub brand_line: Option<TextLine>,
    /// Model block, top line first
    pub model_lines: Vec<TextLine>,
    /// Normalised stacking order
    pub layer_order: Vec<LayerItem>,
}

impl IconLayout {
    /// Lay out the icon for `subject`.
    ///
    /// `image_dims` are the true pixel dimensions of the gear image when it
    /// could be loaded; a square image is assumed otherwise.
    pub fn compute(
        config: &IconLayoutConfig,
        subject: &str,
        id_label: Option<&str>,
        image_dims: Option<(u32, u32)>,
    ) -> Self {
        let cx = CANVAS_WIDTH / 2.0;

        let box_w = CANVAS_WIDTH * config.id_box_width_ratio;
        let box_h = config.id_box_height;
        let box_x1 = cx - box_w / 2.0;
        let box_y1 = CANVAS_HEIGHT - box_h + config.id_box_y_offset;
        let id_box = Rect::from_xywh(box_x1, box_y1, box_w, box_h);

        let circle_top = box_y1 + SEAM_OVERLAP;
        let radius = (CANVAS_WIDTH.min(circle_top) / 2.0 - CIRCLE_INSET).max(0.0);
        let cy = circle_top - radius;

        let (iw, ih) = match image_dims {
            Some((w, h)) if w > 0 && h > 0 => (f64::from(w), f64::from(h)),
            _ => (1.0, 1.0),
        };
        let img_scale = radius * config.img_scale_ratio / iw.max(ih);
        let (img_w, img_h) = (iw * img_scale, ih * img_scale);
        let image_box = Rect::from_xywh(
            cx - img_w / 2.0 + config.img_x_offset,
            cy - img_h / 2.0 + config.img_y_offset,
            img_w,
            img_h,
        );

        let id_label = id_label
            .filter(|label| !label.is_empty() && !config.no_id_box)
            .map(|label| TextLine {
                text: label.to_string(),
                x: cx - measure_text_width(label, config.id_font_size) / 2.0,
                y: box_y1 + (box_h - config.id_font_size) / 2.0 + LABEL_BASELINE_NUDGE,
                size: config.id_font_size,
            });

        let brand_line = Some(config.brand_text.as_str())
            .filter(|text| !text.is_empty())
            .map(|text| TextLine {
                text: text.to_string(),
                x: cx - measure_text_width(text, config.brand_font_size) / 2.0 + config.brand_x_offset,
                y: cy + radius + config.brand_y_offset,
                size: config.brand_font_size,
            });

        let model_text = config.model_text(subject);
        let lines = model_lines(&model_text);
        let size = config.model_font_size;
        let line_height = size * LINE_HEIGHT_FACTOR;
        let mut base_y = cy - radius + config.model_y_offset;
        if lines.len() > 1 {
            base_y += (lines.len() - 1) as f64 * line_height / 2.0;
        }
        let model_lines = lines
            .iter()
            .enumerate()
            .map(|(i, line)| TextLine {
                text: line.to_string(),
                x: cx - measure_text_width(line, size) / 2.0 + config.model_x_offset,
                y: base_y - i as f64 * line_height,
                size,
            })
            .collect();

        Self {
            config: config.clone(),
            id_box,
            id_label,
            circle_center: Point::new(cx, cy),
            radius,
            image_box,
            brand_line,
            model_lines,
            layer_order: normalize_layer_order(&config.layer_order),
        }
    }

    /// Canonical rectangle of a component, clamped to the canvas.
    pub fn component_rect(&self, role: ComponentRole) -> Rect {
        let cfg = &self.config;
        let Point { x: cx, y: cy } = self.circle_center;
        let r = self.radius;
        let rect = match role {
            ComponentRole::Container => canvas(),
            ComponentRole::IdBox => self.id_box,
            ComponentRole::RootIdText => Rect::from_xywh(
                0.0,
                self.id_box.y1 - SEAM_OVERLAP,
                CANVAS_WIDTH,
                self.id_box.height() + 2.0 * SEAM_OVERLAP,
            ),
            ComponentRole::Circle => Rect::new(cx - r, cy - r, cx + r, cy + r),
            ComponentRole::Image => self.image_box,
            ComponentRole::ModelText => {
                let size = cfg.model_font_size;
                let y = (cy - r + cfg.model_y_offset - 2.0 * size).max(0.0);
                Rect::from_xywh(0.0, y, CANVAS_WIDTH, 5.0 * size)
            },
            ComponentRole::BrandText => {
                let size = cfg.brand_font_size;
                Rect::from_xywh(0.0, cy + r + cfg.brand_y_offset - size, CANVAS_WIDTH, 4.0 * size)
            },
        };
        rect.clamp_into(&canvas())
    }

    /// True when the model block has at least one line.
    pub fn has_model_text(&self) -> bool {
        !self.model_lines.is_empty()
    }
}
