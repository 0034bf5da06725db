//! Appearance synthesis for deployment icons.
//!
//! [`IconLayout`] resolves the canonical geometry once per icon. From it,
//! [`render_component`] draws one part of the icon in the local frame of
//! that part's annotation rectangle, and [`render_combined`] draws the whole
//! icon in a single program (used for previews while tuning a layout).

pub mod image;
pub mod layout;
pub mod metrics;

pub use image::{GearImage, ImageLoader};
pub use layout::{
    canvas, fit_canvas, normalize_layer_order, ComponentRole, IconLayout, LayerItem, TextLine, CANVAS_HEIGHT,
    CANVAS_WIDTH, COMPOUND_RENDER_SCALE, LINE_HEIGHT_FACTOR, MAX_MODEL_LINES,
};
pub use metrics::measure_text_width;

use crate::error::Result;
use crate::geometry::Rect;
use crate::icon_config::Rgb;
use crate::object::{Object, ObjectRef};
use crate::writer::{AppearanceStreamBuilder, ContentStreamBuilder, BOLD_FONT_RESOURCE};
use layout::LABEL_BASELINE_NUDGE;

/// XObject resource name of the gear image.
pub const IMAGE_RESOURCE: &str = "Img";

const WHITE: Rgb = [1.0, 1.0, 1.0];
const BLACK: Rgb = [0.0, 0.0, 0.0];

/// A self-contained drawing program with its local frame `[0 0 width height]`.
#[derive(Debug, Clone)]
pub struct DrawingProgram {
    /// Operators
    pub content: ContentStreamBuilder,
    /// BBox width
    pub width: f64,
    /// BBox height
    pub height: f64,
    /// Whether `/HelvBld` must be in the resources
    pub bold_font: bool,
    /// Image XObject painted as `/Img`
    pub image: Option<ObjectRef>,
}

impl DrawingProgram {
    /// Empty program over `[0 0 width height]`.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            content: ContentStreamBuilder::new(),
            width: width.max(0.0),
            height: height.max(0.0),
            bold_font: false,
            image: None,
        }
    }

    /// Serialized operators.
    pub fn content_bytes(&self) -> Result<Vec<u8>> {
        self.content.build()
    }

    /// True when nothing is drawn.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Local bounding box.
    pub fn bbox(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// Build the form XObject stream for `/AP /N`.
    pub fn to_stream(&self) -> Result<Object> {
        let mut builder = AppearanceStreamBuilder::new(self.width, self.height).content(self.content_bytes()?);
        if self.bold_font {
            builder = builder.with_bold_font();
        }
        if let Some(image) = self.image {
            builder = builder.with_xobject(IMAGE_RESOURCE, image);
        }
        Ok(builder.build())
    }
}

/// Draw one component of `layout` for an annotation at `rect`.
///
/// `scale` converts layout units to page units; `image` is the registered
/// gear image, if any. Components with nothing to show (no brand text, no
/// image, hidden id box) produce an empty program over the same frame.
pub fn render_component(
    layout: &IconLayout,
    role: ComponentRole,
    rect: &Rect,
    scale: f64,
    image: Option<ObjectRef>,
) -> DrawingProgram {
    let cfg = &layout.config;
    let mut program = DrawingProgram::new(rect.width(), rect.height());
    let (w, h) = (program.width, program.height);

    match role {
        ComponentRole::Container => {
            program.bold_font = true;
        },
        ComponentRole::RootIdText => {
            program.bold_font = true;
            let lines: Vec<&str> = layout.id_label.iter().map(|l| l.text.as_str()).collect();
            centred_text(&mut program.content, &lines, w, h, cfg.id_font_size * scale, cfg.id_text_color(), 0.0, scale);
        },
        ComponentRole::ModelText => {
            program.bold_font = true;
            let lines: Vec<&str> = layout.model_lines.iter().map(|l| l.text.as_str()).collect();
            centred_text(
                &mut program.content,
                &lines,
                w,
                h,
                cfg.model_font_size * scale,
                cfg.text_color,
                cfg.model_x_offset * scale,
                scale,
            );
        },
        ComponentRole::BrandText => {
            program.bold_font = true;
            let lines: Vec<&str> = layout.brand_line.iter().map(|l| l.text.as_str()).collect();
            centred_text(
                &mut program.content,
                &lines,
                w,
                h,
                cfg.brand_font_size * scale,
                cfg.text_color,
                cfg.brand_x_offset * scale,
                scale,
            );
        },
        ComponentRole::Circle => {
            let border = cfg.circle_border_width * scale;
            let radius = (w.min(h) / 2.0 - border / 2.0).max(0.0);
            program
                .content
                .stroke_color(cfg.circle_border_color)
                .set_line_width(border)
                .fill_color(cfg.circle_color)
                .circle(w / 2.0, h / 2.0, radius)
                .fill_stroke();
        },
        ComponentRole::IdBox => {
            if !cfg.no_id_box {
                program
                    .content
                    .fill_color(WHITE)
                    .stroke_color(BLACK)
                    .set_line_width(cfg.id_box_border_width * scale)
                    .rect(0.0, 0.0, w, h)
                    .fill_stroke();
            }
        },
        ComponentRole::Image => {
            if let Some(image) = image.filter(|_| cfg.gear_image().is_some()) {
                program.content.draw_image(IMAGE_RESOURCE, 0.0, 0.0, w, h);
                program.image = Some(image);
            }
        },
    }

    program
}

/// Lines centred as a block in a `width` × `height` frame.
#[allow(clippy::too_many_arguments)]
fn centred_text(
    content: &mut ContentStreamBuilder,
    lines: &[&str],
    width: f64,
    height: f64,
    size: f64,
    color: Rgb,
    x_offset: f64,
    scale: f64,
) {
    if lines.is_empty() || size <= 0.0 {
        return;
    }
    let line_height = size * LINE_HEIGHT_FACTOR;
    let mut base_y = height / 2.0 - size / 2.0 + LABEL_BASELINE_NUDGE * scale;
    if lines.len() > 1 {
        base_y += (lines.len() - 1) as f64 * line_height / 2.0;
    }

    content.begin_text().fill_color(color).set_font(BOLD_FONT_RESOURCE, size);
    for (i, line) in lines.iter().enumerate() {
        let x = (width - measure_text_width(line, size)) / 2.0 + x_offset;
        content.text_at(line, x, base_y - i as f64 * line_height);
    }
    content.end_text();
}

fn text_line(content: &mut ContentStreamBuilder, line: &TextLine, color: Rgb) {
    content
        .begin_text()
        .fill_color(color)
        .set_font(BOLD_FONT_RESOURCE, line.size)
        .move_text(line.x, line.y)
        .show_text(&line.text)
        .end_text();
}

/// Draw the whole icon into one `width` × `height` program.
///
/// The circle comes first, then the id box and its label so the box covers
/// the seam, then the stacked components in `layer_order`.
pub fn render_combined(layout: &IconLayout, width: f64, height: f64, image: Option<ObjectRef>) -> DrawingProgram {
    let cfg = &layout.config;
    let mut program = DrawingProgram::new(width, height);
    program.bold_font = true;
    let (scale, origin) = fit_canvas(&program.bbox());

    let content = &mut program.content;
    content.save_state().transform(scale, 0.0, 0.0, scale, origin.x, origin.y);

    content
        .stroke_color(cfg.circle_border_color)
        .set_line_width(cfg.circle_border_width)
        .fill_color(cfg.circle_color)
        .circle(layout.circle_center.x, layout.circle_center.y, layout.radius)
        .fill_stroke();

    if !cfg.no_id_box {
        let b = layout.id_box;
        content
            .save_state()
            .fill_color(WHITE)
            .stroke_color(BLACK)
            .set_line_width(cfg.id_box_border_width)
            .rect(b.x1, b.y1, b.width(), b.height())
            .fill_stroke()
            .restore_state();
        if let Some(label) = &layout.id_label {
            text_line(content, label, cfg.id_text_color());
        }
    }

    for item in &layout.layer_order {
        match item {
            LayerItem::GearImage => {
                if let Some(image) = image.filter(|_| cfg.gear_image().is_some()) {
                    let b = layout.image_box;
                    content.draw_image(IMAGE_RESOURCE, b.x1, b.y1, b.width(), b.height());
                    program.image = Some(image);
                }
            },
            LayerItem::BrandText => {
                if let Some(brand) = &layout.brand_line {
                    text_line(content, brand, cfg.text_color);
                }
            },
            LayerItem::ModelText => {
                for line in &layout.model_lines {
                    text_line(content, line, cfg.text_color);
                }
            },
        }
    }

    content.restore_state();
    program
}
