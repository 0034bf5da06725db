//! Compound annotation groups.
//!
//! A deployment icon is written as seven linked annotations so markup
//! viewers can move and resize it as one unit while still regenerating each
//! part on their own:
//!
//! ```text
//! root   FreeText  id label, /GroupNesting [child NMs], /SeqNo
//!  ├─ Square    id box           /IRT root  /RT /Group
//!  ├─ FreeText  container        /IRT root  /RT /Group
//!  ├─ Circle    circle           /IRT root  /RT /Group
//!  ├─ Square    gear image (/IT /Image)
//!  ├─ FreeText  model text
//!  └─ FreeText  brand text
//! ```
//!
//! Every appearance stream and every annotation is registered in the
//! document before anything refers to it.

use crate::appearance::FallbackColors;
use crate::document::PdfDocument;
use crate::error::Result;
use crate::geometry::Rect;
use crate::icon_config::Rgb;
use crate::object::{Object, ObjectRef};
use crate::render::{fit_canvas, render_component, ComponentRole, IconLayout, COMPOUND_RENDER_SCALE};
use crate::render::{CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::subject::encode_text_string;
use crate::writer::{format_real, ContentStreamBuilder, BOLD_FONT_RESOURCE};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Print flag.
pub const ANNOT_FLAG_PRINT: i64 = 4;

/// Border width of the fallback icon.
pub const FALLBACK_BORDER_WIDTH: f64 = 0.5;

/// A fresh `/NM` value: 16 uppercase hex digits.
pub fn unique_name() -> String {
    let mut name = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    name.truncate(16);
    name
}

/// Format a timestamp as a PDF date string.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use markup_swap::compound::pdf_date;
///
/// let t = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 0).unwrap();
/// assert_eq!(pdf_date(&t), "D:20250307090500+00'00'");
/// ```
pub fn pdf_date(time: &DateTime<Utc>) -> String {
    time.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

/// Fields stamped on every new annotation of a run.
#[derive(Debug, Clone)]
pub struct Bookkeeping {
    /// `/T`
    pub author: String,
    /// `/CreationDate` and `/M`
    pub date: String,
}

impl Bookkeeping {
    /// Stamp with the current time.
    pub fn new(author: impl Into<String>) -> Self {
        Self::at(author, Utc::now())
    }

    /// Stamp with a fixed time.
    pub fn at(author: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            author: author.into(),
            date: pdf_date(&time),
        }
    }
}

/// Inputs for one compound icon.
#[derive(Debug, Clone, Copy)]
pub struct GroupRequest<'a> {
    /// Rectangle of the annotation being replaced
    pub source_rect: Rect,
    /// Deployment subject
    pub subject: &'a str,
    /// Resolved icon layout (includes the id label)
    pub layout: &'a IconLayout,
    /// Visibility layer for `/OC`
    pub layer: Option<ObjectRef>,
    /// Registered gear image XObject
    pub image: Option<ObjectRef>,
    /// Group sequence number within the run
    pub sequence_no: u32,
}

/// One registered component annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMember {
    /// Visual role
    pub role: ComponentRole,
    /// Annotation object
    pub reference: ObjectRef,
    /// `/NM`
    pub name: String,
    /// `/Rect` in page space
    pub rect: Rect,
}

/// The seven annotations of one converted icon, root first.
#[derive(Debug, Clone)]
pub struct CompoundAnnotationGroup {
    /// Components in output order
    pub members: Vec<GroupMember>,
    /// Sequence number written to the root
    pub sequence_no: u32,
}

impl CompoundAnnotationGroup {
    /// The root component.
    pub fn root(&self) -> Option<&GroupMember> {
        self.members.first()
    }

    /// Annotation references in output order.
    pub fn references(&self) -> Vec<ObjectRef> {
        self.members.iter().map(|m| m.reference).collect()
    }

    /// Union of all component rectangles.
    pub fn bounds(&self) -> Option<Rect> {
        let mut rects = self.members.iter().map(|m| m.rect);
        let first = rects.next()?;
        Some(rects.fold(first, |acc, r| acc.union(&r)))
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True for a group without components.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

fn name(s: &str) -> Object {
    Object::Name(s.to_string())
}

fn real(v: f64) -> Object {
    Object::Real(v)
}

fn color(rgb: Rgb) -> Object {
    Object::Array(rgb.iter().map(|&c| real(c)).collect())
}

fn border_style(width: f64) -> Object {
    let mut bs = HashMap::new();
    bs.insert("W".to_string(), real(width));
    Object::Dictionary(bs)
}

fn rect_differences(inset: f64) -> Object {
    Object::Array(vec![real(inset); 4])
}

fn hex_color(rgb: Rgb) -> String {
    let c = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!("#{:02X}{:02X}{:02X}", c(rgb[0]), c(rgb[1]), c(rgb[2]))
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Default appearance string of a FreeText component.
fn default_appearance(rgb: Rgb, size: f64) -> String {
    format!(
        "{} {} {} rg /{} {} Tf",
        format_real(rgb[0]),
        format_real(rgb[1]),
        format_real(rgb[2]),
        BOLD_FONT_RESOURCE,
        format_real(size)
    )
}

/// Default style string of a FreeText component.
fn default_style(rgb: Rgb, size: f64) -> String {
    format!(
        "font: bold {}pt Helvetica,sans-serif; text-align:center; color:{}",
        format_real(size),
        hex_color(rgb)
    )
}

/// XHTML rich contents, one paragraph per line.
fn rich_contents(lines: &[&str], rgb: Rgb, size: f64) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\"?><body xmlns=\"http://www.w3.org/1999/xhtml\" \
         xmlns:xfa=\"http://www.xfa.org/schema/xfa-data/1.0/\" xfa:APIVersion=\"Acrobat:11.0.0\" xfa:spec=\"2.0.2\">",
    );
    for line in lines {
        out.push_str(&format!(
            "<p dir=\"ltr\" style=\"text-align:center\"><span style=\"font-family:Helvetica;font-weight:bold;font-size:{}pt;color:{}\">{}</span></p>",
            format_real(size),
            hex_color(rgb),
            escape_xml(line)
        ));
    }
    out.push_str("</body>");
    out
}

fn base_annotation(
    subtype: &str,
    rect: &Rect,
    nm: &str,
    subject: &str,
    appearance: ObjectRef,
    layer: Option<ObjectRef>,
    meta: &Bookkeeping,
) -> HashMap<String, Object> {
    let mut dict = HashMap::new();
    dict.insert("Type".to_string(), name("Annot"));
    dict.insert("Subtype".to_string(), name(subtype));
    dict.insert("Rect".to_string(), rect.to_object());
    dict.insert("NM".to_string(), Object::String(nm.as_bytes().to_vec()));
    dict.insert("Subj".to_string(), encode_text_string(subject));
    dict.insert("T".to_string(), encode_text_string(&meta.author));
    dict.insert("CreationDate".to_string(), Object::String(meta.date.as_bytes().to_vec()));
    dict.insert("M".to_string(), Object::String(meta.date.as_bytes().to_vec()));
    dict.insert("F".to_string(), Object::Integer(ANNOT_FLAG_PRINT));
    if let Some(layer) = layer {
        dict.insert("OC".to_string(), Object::Reference(layer));
    }
    let mut ap = HashMap::new();
    ap.insert("N".to_string(), Object::Reference(appearance));
    dict.insert("AP".to_string(), Object::Dictionary(ap));
    dict
}

/// Text, colour and size (layout units) shown by a FreeText role.
fn text_of(layout: &IconLayout, role: ComponentRole) -> (Vec<&str>, Rgb, f64) {
    let cfg = &layout.config;
    match role {
        ComponentRole::RootIdText => (
            layout.id_label.iter().map(|l| l.text.as_str()).collect(),
            cfg.id_text_color(),
            cfg.id_font_size,
        ),
        ComponentRole::ModelText => (
            layout.model_lines.iter().map(|l| l.text.as_str()).collect(),
            cfg.text_color,
            cfg.model_font_size,
        ),
        ComponentRole::BrandText => (
            layout.brand_line.iter().map(|l| l.text.as_str()).collect(),
            cfg.text_color,
            cfg.brand_font_size,
        ),
        _ => (Vec::new(), [0.0, 0.0, 0.0], 1.0),
    }
}

fn add_role_fields(dict: &mut HashMap<String, Object>, layout: &IconLayout, role: ComponentRole, scale: f64) {
    let cfg = &layout.config;
    match role {
        ComponentRole::RootIdText | ComponentRole::Container | ComponentRole::ModelText | ComponentRole::BrandText => {
            let (lines, rgb, size) = text_of(layout, role);
            let size = if role == ComponentRole::Container { size } else { size * scale };
            dict.insert("DA".to_string(), Object::String(default_appearance(rgb, size).into_bytes()));
            dict.insert("DS".to_string(), Object::String(default_style(rgb, size).into_bytes()));
            dict.insert("Contents".to_string(), encode_text_string(&lines.join("\r")));
            if !lines.is_empty() {
                dict.insert("RC".to_string(), encode_text_string(&rich_contents(&lines, rgb, size)));
            }
            dict.insert("C".to_string(), Object::Array(Vec::new()));
            dict.insert("BS".to_string(), border_style(0.0));
        },
        ComponentRole::IdBox => {
            let width = cfg.id_box_border_width * scale;
            dict.insert("IC".to_string(), color([1.0, 1.0, 1.0]));
            dict.insert("C".to_string(), color([0.0, 0.0, 0.0]));
            dict.insert("BS".to_string(), border_style(width));
            dict.insert("RD".to_string(), rect_differences(width / 2.0));
        },
        ComponentRole::Circle => {
            let width = cfg.circle_border_width * scale;
            dict.insert("IC".to_string(), color(cfg.circle_color));
            dict.insert("C".to_string(), color(cfg.circle_border_color));
            dict.insert("BS".to_string(), border_style(width));
            dict.insert("RD".to_string(), rect_differences(width / 2.0));
        },
        ComponentRole::Image => {
            dict.insert("IT".to_string(), name("Image"));
            dict.insert("C".to_string(), color([1.0, 0.0, 0.0]));
            dict.insert("BS".to_string(), border_style(0.0));
        },
    }
}

/// Page rectangle of `role` when the icon fills `source`.
///
/// The container takes `source` verbatim; every other component is clamped
/// into it, so the union of all seven is exactly `source`.
pub fn component_page_rect(layout: &IconLayout, role: ComponentRole, source: &Rect) -> Rect {
    if role == ComponentRole::Container {
        return *source;
    }
    let (scale, origin) = fit_canvas(source);
    layout
        .component_rect(role)
        .map_from_layout(origin, scale)
        .clamp_into(source)
}

/// Build and register the seven-part icon for `request`.
pub fn build_group(
    doc: &mut PdfDocument,
    request: &GroupRequest<'_>,
    meta: &Bookkeeping,
) -> Result<CompoundAnnotationGroup> {
    let layout = request.layout;
    let (scale, _) = fit_canvas(&request.source_rect);
    let names: Vec<String> = ComponentRole::ALL.iter().map(|_| unique_name()).collect();

    let mut members: Vec<GroupMember> = Vec::with_capacity(ComponentRole::ALL.len());
    for (role, nm) in ComponentRole::ALL.into_iter().zip(&names) {
        let rect = component_page_rect(layout, role, &request.source_rect);
        let program = render_component(layout, role, &rect, scale, request.image);
        let appearance = doc.register(program.to_stream()?);

        let mut dict = base_annotation(
            role.subtype(),
            &rect,
            nm,
            request.subject,
            appearance,
            request.layer,
            meta,
        );
        add_role_fields(&mut dict, layout, role, scale);

        match members.first() {
            None => {
                let nesting = names[1..].iter().map(|n| Object::String(n.as_bytes().to_vec())).collect();
                dict.insert("GroupNesting".to_string(), Object::Array(nesting));
                dict.insert("SeqNo".to_string(), Object::Integer(i64::from(request.sequence_no)));
            },
            Some(root) => {
                dict.insert("IRT".to_string(), Object::Reference(root.reference));
                dict.insert("RT".to_string(), name("Group"));
            },
        }

        let reference = doc.register(Object::Dictionary(dict));
        log::debug!("  {} {} -> {}", role.name(), nm, reference);
        members.push(GroupMember {
            role,
            reference,
            name: nm.clone(),
            rect,
        });
    }

    Ok(CompoundAnnotationGroup {
        members,
        sequence_no: request.sequence_no,
    })
}

/// Appearance BBox of the fallback icon: the canvas at the nominal scale.
pub fn fallback_bbox() -> Rect {
    Rect::new(0.0, 0.0, CANVAS_WIDTH * COMPOUND_RENDER_SCALE, CANVAS_HEIGHT * COMPOUND_RENDER_SCALE)
}

/// Build and register a plain circle for subjects without a layout.
pub fn build_fallback(
    doc: &mut PdfDocument,
    source_rect: &Rect,
    subject: &str,
    colors: &FallbackColors,
    layer: Option<ObjectRef>,
    meta: &Bookkeeping,
) -> Result<ObjectRef> {
    let bbox = fallback_bbox();
    let mut content = ContentStreamBuilder::new();
    let radius = bbox.width().min(bbox.height()) / 2.0 - FALLBACK_BORDER_WIDTH / 2.0;
    content
        .stroke_color(colors.border)
        .set_line_width(FALLBACK_BORDER_WIDTH)
        .fill_color(colors.fill)
        .circle(bbox.center().x, bbox.center().y, radius)
        .fill_stroke();
    let stream = crate::writer::AppearanceStreamBuilder::new(bbox.width(), bbox.height())
        .content(content.build()?)
        .build();
    let appearance = doc.register(stream);

    let mut dict = base_annotation("Circle", source_rect, &unique_name(), subject, appearance, layer, meta);
    dict.insert("IC".to_string(), color(colors.fill));
    dict.insert("C".to_string(), color(colors.border));
    dict.insert("BS".to_string(), border_style(FALLBACK_BORDER_WIDTH));
    Ok(doc.register(Object::Dictionary(dict)))
}
