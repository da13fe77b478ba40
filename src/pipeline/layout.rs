//! Layout resolution: decide once per run where each field goes on a page.
//!
//! ## Two layouts
//!
//! * [`TemplateLayout`]: the user supplied a PDF form. Its AcroForm is read
//!   once, and the four enrollment fields are located by fully-qualified name.
//!   The form page is kept so the assembler can draw it beneath every output
//!   page.
//! * [`SyntheticLayout`]: no template. A plain single-column A4 form is
//!   generated with one label/value row per field.
//!
//! A template that was asked for but cannot be used is an error. Silently
//! switching to the synthetic layout would drop the user's own form.

use crate::error::ConvertError;
use crate::model::Field;
use crate::output::LayoutKind;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A4 portrait in PDF points.
pub const A4: [f32; 2] = [595.28, 841.89];

/// Maximum nesting followed when walking the AcroForm field tree.
const MAX_FIELD_DEPTH: usize = 32;

/// The layout every page of a run is rendered with.
#[derive(Debug, Clone)]
pub enum FormLayout {
    Template(TemplateLayout),
    Synthetic(SyntheticLayout),
}

impl FormLayout {
    pub fn kind(&self) -> LayoutKind {
        match self {
            FormLayout::Template(_) => LayoutKind::Template,
            FormLayout::Synthetic(_) => LayoutKind::Synthetic,
        }
    }

    /// `[x0, y0, x1, y1]` of every page drawn with this layout.
    pub fn media_box(&self) -> [f32; 4] {
        match self {
            FormLayout::Template(t) => t.media_box.to_array(),
            FormLayout::Synthetic(s) => [0.0, 0.0, s.page_width, s.page_height],
        }
    }
}

/// Resolve the layout for a run.
///
/// # Errors
/// [`ConvertError::InvalidTemplate`] when `template` is given but the file is
/// not a readable PDF, is encrypted, has no AcroForm, or lacks one of the
/// four fields.
pub fn resolve_layout(
    template: Option<&Path>,
    synthetic: &SyntheticLayout,
) -> Result<FormLayout, ConvertError> {
    match template {
        None => {
            info!("No template given, using synthetic layout");
            Ok(FormLayout::Synthetic(synthetic.clone()))
        }
        Some(path) => {
            let document =
                Document::load(path).map_err(|e| ConvertError::invalid_template(path, e))?;
            let layout = TemplateLayout::from_document(path, document)?;
            info!(path = %path.display(), "Using form template");
            Ok(FormLayout::Template(layout))
        }
    }
}

// ── Geometry ─────────────────────────────────────────────────────────────

/// Axis-aligned rectangle in PDF user space, normalised so `x0 <= x1`
/// and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self {
            x0: a.min(c),
            y0: b.min(d),
            x1: a.max(c),
            y1: b.max(d),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }
}

// ── Template layout ──────────────────────────────────────────────────────

/// Where one enrollment field sits on the template page.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPlacement {
    /// Fully-qualified AcroForm name, e.g. `Nachname` or `student.Nachname`.
    pub identifier: String,
    pub rect: Rect,
    /// Font size from the field's `/DA`; `None` means auto-size.
    pub font_size: Option<f32>,
}

/// A supplied PDF form, resolved once and shared read-only by every render.
#[derive(Debug, Clone)]
pub struct TemplateLayout {
    pub path: PathBuf,
    pub placements: BTreeMap<Field, FieldPlacement>,
    pub media_box: Rect,
    document: Document,
    page_id: ObjectId,
}

impl TemplateLayout {
    /// Build a layout from an already-parsed template document.
    pub fn from_document(path: &Path, document: Document) -> Result<Self, ConvertError> {
        let invalid = |reason: String| ConvertError::invalid_template(path, reason);

        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(invalid("encrypted templates are not supported".into()));
        }

        let pages = document.get_pages();
        let first_page = *pages
            .values()
            .next()
            .ok_or_else(|| invalid("document has no pages".into()))?;

        let acroform = acroform_dict(&document).ok_or_else(|| invalid("document has no form fields (AcroForm)".into()))?;
        let default_da = acroform
            .get(b"DA")
            .ok()
            .and_then(|o| string_of(&document, o));

        let mut discovered = Vec::new();
        if let Ok(fields) = acroform.get(b"Fields").and_then(|o| resolve(&document, o).as_array()) {
            collect_fields(&document, fields, None, default_da, 0, &mut discovered);
        }
        debug!(fields = discovered.len(), "Discovered AcroForm fields");

        let missing: Vec<&str> = Field::ALL
            .iter()
            .map(|f| f.template_field())
            .filter(|name| !discovered.iter().any(|d| d.name == *name))
            .collect();
        if !missing.is_empty() {
            return Err(invalid(format!("missing form field(s): {}", missing.join(", "))));
        }

        let mut placements = BTreeMap::new();
        let mut form_page = None;
        for field in Field::ALL {
            let name = field.template_field();
            let Some(found) = discovered.iter().find(|d| d.name == name) else {
                continue;
            };
            let Some(rect) = found.rect else {
                return Err(invalid(format!("form field '{name}' has no widget rectangle")));
            };
            if form_page.is_none() {
                form_page = found.page;
            }
            placements.insert(
                field,
                FieldPlacement {
                    identifier: name.to_string(),
                    rect,
                    font_size: found.da.as_deref().and_then(font_size_from_da),
                },
            );
        }

        let page_id = form_page
            .filter(|id| pages.values().any(|p| p == id))
            .unwrap_or(first_page);
        let media_box = inherited(&document, page_id, b"MediaBox")
            .and_then(|o| rect_of(&document, o))
            .unwrap_or(Rect::new(0.0, 0.0, A4[0], A4[1]));

        Ok(Self {
            path: path.to_path_buf(),
            placements,
            media_box,
            document,
            page_id,
        })
    }

    pub fn placement(&self, field: Field) -> Option<&FieldPlacement> {
        self.placements.get(&field)
    }

    /// The parsed template document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Decoded content stream of the form page.
    pub fn form_page_content(&self) -> Result<Vec<u8>, ConvertError> {
        self.document
            .get_page_content(self.page_id)
            .map_err(|e| ConvertError::invalid_template(&self.path, e))
    }

    /// `/Resources` of the form page, following `/Parent` inheritance.
    pub fn form_page_resources(&self) -> Option<Object> {
        inherited(&self.document, self.page_id, b"Resources").cloned()
    }
}

/// One terminal field found while walking the AcroForm tree.
struct DiscoveredField {
    name: String,
    rect: Option<Rect>,
    page: Option<ObjectId>,
    da: Option<String>,
}

fn acroform_dict(doc: &Document) -> Option<&Dictionary> {
    let root = doc.trailer.get(b"Root").ok()?;
    let catalog = resolve(doc, root).as_dict().ok()?;
    let acroform = catalog.get(b"AcroForm").ok()?;
    resolve(doc, acroform).as_dict().ok()
}

fn collect_fields(
    doc: &Document,
    fields: &[Object],
    parent: Option<&str>,
    inherited_da: Option<String>,
    depth: usize,
    out: &mut Vec<DiscoveredField>,
) {
    if depth > MAX_FIELD_DEPTH {
        return;
    }
    for field in fields {
        let Ok(dict) = resolve(doc, field).as_dict() else {
            continue;
        };
        let partial = dict.get(b"T").ok().and_then(|o| string_of(doc, o));
        let name = match (parent, partial.as_deref()) {
            (Some(p), Some(t)) => format!("{p}.{t}"),
            (None, Some(t)) => t.to_string(),
            (Some(p), None) => p.to_string(),
            (None, None) => continue,
        };
        let da = dict
            .get(b"DA")
            .ok()
            .and_then(|o| string_of(doc, o))
            .or_else(|| inherited_da.clone());

        let kids: Vec<&Dictionary> = dict
            .get(b"Kids")
            .ok()
            .and_then(|o| resolve(doc, o).as_array().ok())
            .map(|arr| arr.iter().filter_map(|k| resolve(doc, k).as_dict().ok()).collect())
            .unwrap_or_default();

        // Kids with their own /T are child fields; kids without are widgets.
        let child_fields: Vec<Object> = dict
            .get(b"Kids")
            .ok()
            .and_then(|o| resolve(doc, o).as_array().ok())
            .map(|arr| {
                arr.iter()
                    .filter(|k| resolve(doc, k).as_dict().map(|d| d.has(b"T")).unwrap_or(false))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !child_fields.is_empty() {
            collect_fields(doc, &child_fields, Some(&name), da.clone(), depth + 1, out);
        }

        let widget = if dict.has(b"Rect") {
            Some(dict)
        } else {
            kids.into_iter().find(|k| !k.has(b"T") && k.has(b"Rect"))
        };
        if child_fields.is_empty() || widget.is_some() {
            out.push(DiscoveredField {
                name,
                rect: widget.and_then(|w| w.get(b"Rect").ok()).and_then(|r| rect_of(doc, r)),
                page: widget
                    .and_then(|w| w.get(b"P").ok())
                    .and_then(|p| p.as_reference().ok()),
                da,
            });
        }
    }
}

/// Font size operand of the `Tf` operator in a default-appearance string.
fn font_size_from_da(da: &str) -> Option<f32> {
    let tokens: Vec<&str> = da.split_whitespace().collect();
    let pos = tokens.iter().position(|t| *t == "Tf")?;
    let size: f32 = tokens.get(pos.checked_sub(1)?)?.parse().ok()?;
    (size > 0.0).then_some(size)
}

/// Follow references until a direct object is reached.
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..MAX_FIELD_DEPTH {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

/// Look up a page attribute, walking `/Parent` for inheritable keys.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_FIELD_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?;
        node = resolve(doc, parent).as_dict().ok()?;
    }
    None
}

fn number_of(doc: &Document, obj: &Object) -> Option<f32> {
    match resolve(doc, obj) {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn rect_of(doc: &Document, obj: &Object) -> Option<Rect> {
    let arr = resolve(doc, obj).as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let n: Vec<f32> = arr.iter().filter_map(|o| number_of(doc, o)).collect();
    (n.len() == 4).then(|| Rect::new(n[0], n[1], n[2], n[3]))
}

/// Decode a PDF text string (PDFDocEncoding or UTF-16BE with BOM).
fn string_of(doc: &Document, obj: &Object) -> Option<String> {
    let Object::String(bytes, _) = resolve(doc, obj) else {
        return None;
    };
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }
    // PDFDocEncoding matches Latin-1 for every printable character used in
    // field names.
    Some(bytes.iter().map(|&b| b as char).collect())
}

// ── Synthetic layout ─────────────────────────────────────────────────────

/// Labels printed in front of each value on synthesised pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldLabels {
    pub last_name: String,
    pub first_name: String,
    pub birth_date: String,
    pub course: String,
}

impl Default for FieldLabels {
    fn default() -> Self {
        Self {
            last_name: "Nachname".into(),
            first_name: "Vorname".into(),
            birth_date: "Geburtsdatum".into(),
            course: "Kurs".into(),
        }
    }
}

impl FieldLabels {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::LastName => &self.last_name,
            Field::FirstName => &self.first_name,
            Field::BirthDate => &self.birth_date,
            Field::Course => &self.course,
        }
    }
}

/// Page geometry and type sizes for generated pages.
///
/// Defaults reproduce a plain A4 enrollment form: centred title, one
/// `label: value` row per field, and a signature block at the bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticLayout {
    pub page_width: f32,
    pub page_height: f32,
    /// Left/right margin; also the bottom margin of the printable area.
    pub margin: f32,
    /// Title drawn centred at the top. `None` draws no title.
    pub title: Option<String>,
    pub title_size: f32,
    /// Distance from the top edge to the title baseline.
    pub title_offset: f32,
    /// Distance from the top edge to the first field baseline.
    pub first_row_offset: f32,
    /// Horizontal space reserved for labels; values start after it.
    pub label_width: f32,
    pub label_size: f32,
    pub value_size: f32,
    /// Baseline-to-baseline distance of wrapped value lines.
    pub line_height: f32,
    /// Extra gap between two fields.
    pub field_gap: f32,
    /// Draw the "Unterschrift / Datum" block.
    pub signature_block: bool,
    /// Baseline of the signature block above the bottom edge.
    pub signature_offset: f32,
    pub labels: FieldLabels,
}

impl Default for SyntheticLayout {
    fn default() -> Self {
        Self {
            page_width: A4[0],
            page_height: A4[1],
            margin: 50.0,
            title: Some("Anmeldeformular".into()),
            title_size: 24.0,
            title_offset: 80.0,
            first_row_offset: 150.0,
            label_width: 150.0,
            label_size: 12.0,
            value_size: 11.0,
            line_height: 15.0,
            field_gap: 30.0,
            signature_block: true,
            signature_offset: 140.0,
            labels: FieldLabels::default(),
        }
    }
}

impl SyntheticLayout {
    /// Lowest baseline a value line may use before it is clipped.
    pub fn value_floor(&self) -> f32 {
        if self.signature_block {
            self.signature_offset + self.label_size * 2.0
        } else {
            self.margin
        }
    }

    /// Left edge of the value column.
    pub fn value_x(&self) -> f32 {
        self.margin + self.label_width
    }

    /// Width available to values before the right margin.
    pub fn value_width(&self) -> f32 {
        self.page_width - self.margin - self.value_x()
    }

    /// Reject geometry that leaves no room for values.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.page_width > 0.0 && self.page_height > 0.0) {
            return Err("page size must be positive".into());
        }
        if self.margin < 0.0 || self.margin * 2.0 >= self.page_width {
            return Err(format!("margin {} does not fit the page width", self.margin));
        }
        if self.value_width() <= 0.0 {
            return Err("label column leaves no room for values".into());
        }
        if [self.title_size, self.label_size, self.value_size, self.line_height]
            .iter()
            .any(|v| *v <= 0.0)
        {
            return Err("font sizes and line height must be positive".into());
        }
        if self.first_row_offset >= self.page_height - self.value_floor() {
            return Err("first field row starts below the printable area".into());
        }
        Ok(())
    }
}
