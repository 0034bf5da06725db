//! Content stream builder for annotation appearances.
//!
//! Only the operators icon drawing needs are modelled: paths, RGB colour,
//! simple text and XObject painting. Numbers go through
//! [`format_real`](super::format_real) so output is stable across runs.

use super::object_serializer::format_real;
use crate::error::Result;
use std::io::Write;

/// Bézier constant for approximating a quarter circle.
pub const BEZIER_K: f64 = 0.5522847498;

/// Operations that can be added to a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentStreamOp {
    /// Save graphics state (q)
    SaveState,
    /// Restore graphics state (Q)
    RestoreState,
    /// Concatenate matrix (cm)
    Transform(f64, f64, f64, f64, f64, f64),
    /// Begin text object (BT)
    BeginText,
    /// End text object (ET)
    EndText,
    /// Set font resource and size (Tf)
    SetFont(String, f64),
    /// Move text position (Td)
    MoveText(f64, f64),
    /// Set text matrix (Tm)
    SetTextMatrix(f64, f64, f64, f64, f64, f64),
    /// Show a literal string (Tj)
    ShowText(String),
    /// Set fill colour (rg)
    SetFillColorRGB(f64, f64, f64),
    /// Set stroke colour (RG)
    SetStrokeColorRGB(f64, f64, f64),
    /// Set line width (w)
    SetLineWidth(f64),
    /// Begin subpath (m)
    MoveTo(f64, f64),
    /// Cubic Bézier (c)
    CurveTo(f64, f64, f64, f64, f64, f64),
    /// Rectangle (re)
    Rectangle(f64, f64, f64, f64),
    /// Close subpath (h)
    ClosePath,
    /// Fill and stroke (B)
    FillStroke,
    /// Paint XObject (Do)
    PaintXObject(String),
}

/// Builder for content streams.
#[derive(Debug, Default, Clone)]
pub struct ContentStreamBuilder {
    operations: Vec<ContentStreamOp>,
}

impl ContentStreamBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one operation.
    pub fn op(&mut self, op: ContentStreamOp) -> &mut Self {
        self.operations.push(op);
        self
    }

    /// Append the operations of another builder.
    pub fn append(&mut self, other: &ContentStreamBuilder) -> &mut Self {
        self.operations.extend(other.operations.iter().cloned());
        self
    }

    /// Operations recorded so far.
    pub fn operations(&self) -> &[ContentStreamOp] {
        &self.operations
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Save graphics state.
    pub fn save_state(&mut self) -> &mut Self {
        self.op(ContentStreamOp::SaveState)
    }

    /// Restore graphics state.
    pub fn restore_state(&mut self) -> &mut Self {
        self.op(ContentStreamOp::RestoreState)
    }

    /// Concatenate a matrix.
    pub fn transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> &mut Self {
        self.op(ContentStreamOp::Transform(a, b, c, d, e, f))
    }

    /// Begin a text object.
    pub fn begin_text(&mut self) -> &mut Self {
        self.op(ContentStreamOp::BeginText)
    }

    /// End a text object.
    pub fn end_text(&mut self) -> &mut Self {
        self.op(ContentStreamOp::EndText)
    }

    /// Select a font resource.
    pub fn set_font(&mut self, resource: &str, size: f64) -> &mut Self {
        self.op(ContentStreamOp::SetFont(resource.to_string(), size))
    }

    /// Position the next line with `Td`.
    pub fn move_text(&mut self, x: f64, y: f64) -> &mut Self {
        self.op(ContentStreamOp::MoveText(x, y))
    }

    /// Place text at `(x, y)` with `Tm` and show it.
    pub fn text_at(&mut self, text: &str, x: f64, y: f64) -> &mut Self {
        self.op(ContentStreamOp::SetTextMatrix(1.0, 0.0, 0.0, 1.0, x, y))
            .op(ContentStreamOp::ShowText(text.to_string()))
    }

    /// Show text at the current position.
    pub fn show_text(&mut self, text: &str) -> &mut Self {
        self.op(ContentStreamOp::ShowText(text.to_string()))
    }

    /// Set the fill colour.
    pub fn fill_color(&mut self, rgb: [f64; 3]) -> &mut Self {
        self.op(ContentStreamOp::SetFillColorRGB(rgb[0], rgb[1], rgb[2]))
    }

    /// Set the stroke colour.
    pub fn stroke_color(&mut self, rgb: [f64; 3]) -> &mut Self {
        self.op(ContentStreamOp::SetStrokeColorRGB(rgb[0], rgb[1], rgb[2]))
    }

    /// Set the line width.
    pub fn set_line_width(&mut self, width: f64) -> &mut Self {
        self.op(ContentStreamOp::SetLineWidth(width))
    }

    /// Begin a subpath.
    pub fn move_to(&mut self, x: f64, y: f64) -> &mut Self {
        self.op(ContentStreamOp::MoveTo(x, y))
    }

    /// Append a Bézier segment.
    pub fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) -> &mut Self {
        self.op(ContentStreamOp::CurveTo(x1, y1, x2, y2, x3, y3))
    }

    /// Append a rectangle.
    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) -> &mut Self {
        self.op(ContentStreamOp::Rectangle(x, y, width, height))
    }

    /// Close the subpath.
    pub fn close_path(&mut self) -> &mut Self {
        self.op(ContentStreamOp::ClosePath)
    }

    /// Fill and stroke.
    pub fn fill_stroke(&mut self) -> &mut Self {
        self.op(ContentStreamOp::FillStroke)
    }

    /// Paint an XObject resource.
    pub fn paint_xobject(&mut self, name: &str) -> &mut Self {
        self.op(ContentStreamOp::PaintXObject(name.to_string()))
    }

    /// Draw `name` stretched over the box `(x, y, width, height)`.
    pub fn draw_image(&mut self, name: &str, x: f64, y: f64, width: f64, height: f64) -> &mut Self {
        self.save_state()
            .transform(width, 0.0, 0.0, height, x, y)
            .paint_xobject(name)
            .restore_state()
    }

    /// Closed circle path from four Bézier arcs, starting at the rightmost point.
    pub fn circle(&mut self, cx: f64, cy: f64, radius: f64) -> &mut Self {
        let c = radius * BEZIER_K;
        self.move_to(cx + radius, cy)
            .curve_to(cx + radius, cy + c, cx + c, cy + radius, cx, cy + radius)
            .curve_to(cx - c, cy + radius, cx - radius, cy + c, cx - radius, cy)
            .curve_to(cx - radius, cy - c, cx - c, cy - radius, cx, cy - radius)
            .curve_to(cx + c, cy - radius, cx + radius, cy - c, cx + radius, cy)
            .close_path()
    }

    /// Serialize, one operator per line.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        for (i, op) in self.operations.iter().enumerate() {
            if i > 0 {
                buf.push(b'\n');
            }
            write_op(&mut buf, op)?;
        }
        Ok(buf)
    }
}

fn nums(values: &[f64]) -> String {
    values.iter().map(|v| format_real(*v)).collect::<Vec<_>>().join(" ")
}

fn write_op<W: Write>(w: &mut W, op: &ContentStreamOp) -> std::io::Result<()> {
    match op {
        ContentStreamOp::SaveState => write!(w, "q"),
        ContentStreamOp::RestoreState => write!(w, "Q"),
        ContentStreamOp::Transform(a, b, c, d, e, f) => write!(w, "{} cm", nums(&[*a, *b, *c, *d, *e, *f])),
        ContentStreamOp::BeginText => write!(w, "BT"),
        ContentStreamOp::EndText => write!(w, "ET"),
        ContentStreamOp::SetFont(name, size) => write!(w, "/{} {} Tf", name, format_real(*size)),
        ContentStreamOp::MoveText(x, y) => write!(w, "{} Td", nums(&[*x, *y])),
        ContentStreamOp::SetTextMatrix(a, b, c, d, e, f) => write!(w, "{} Tm", nums(&[*a, *b, *c, *d, *e, *f])),
        ContentStreamOp::ShowText(text) => {
            write!(w, "(")?;
            write_escaped_text(w, text)?;
            write!(w, ") Tj")
        },
        ContentStreamOp::SetFillColorRGB(r, g, b) => write!(w, "{} rg", nums(&[*r, *g, *b])),
        ContentStreamOp::SetStrokeColorRGB(r, g, b) => write!(w, "{} RG", nums(&[*r, *g, *b])),
        ContentStreamOp::SetLineWidth(width) => write!(w, "{} w", format_real(*width)),
        ContentStreamOp::MoveTo(x, y) => write!(w, "{} m", nums(&[*x, *y])),
        ContentStreamOp::CurveTo(x1, y1, x2, y2, x3, y3) => write!(w, "{} c", nums(&[*x1, *y1, *x2, *y2, *x3, *y3])),
        ContentStreamOp::Rectangle(x, y, width, height) => write!(w, "{} re", nums(&[*x, *y, *width, *height])),
        ContentStreamOp::ClosePath => write!(w, "h"),
        ContentStreamOp::FillStroke => write!(w, "B"),
        ContentStreamOp::PaintXObject(name) => write!(w, "/{} Do", name),
    }
}

/// Text is shown with a single-byte font, so characters outside Latin-1
/// become `?`.
fn write_escaped_text<W: Write>(w: &mut W, text: &str) -> std::io::Result<()> {
    for ch in text.chars() {
        let byte = if (ch as u32) < 0x100 { ch as u32 as u8 } else { b'?' };
        match byte {
            b'(' | b')' | b'\\' => w.write_all(&[b'\\', byte])?,
            b'\n' => w.write_all(b"\\n")?,
            b'\r' => w.write_all(b"\\r")?,
            _ => w.write_all(&[byte])?,
        }
    }
    Ok(())
}
