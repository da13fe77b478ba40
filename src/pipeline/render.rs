//! Page rendering: one [`EnrollmentRecord`] → one PDF content stream.
//!
//! Rendering is a pure function of `(record, layout)`. Nothing here touches
//! the output document; the assembler wires the returned content stream to
//! shared resources (`/F1`, `/F2`, `/Tpl`) that every page references.
//!
//! Every page is wrapped in `q … Q` and every value is drawn inside its own
//! clipping rectangle, so a value can never spill onto a neighbouring field
//! or off the page, whatever its length.

use crate::error::ConvertError;
use crate::model::{EnrollmentRecord, Field};
use crate::pipeline::layout::{FieldPlacement, FormLayout, Rect, SyntheticLayout, TemplateLayout};
use crate::pipeline::text::{encode_win_ansi, wrap, Font, CAP_HEIGHT};
use lopdf::content::{Content, Operation};
use lopdf::{Object, StringFormat};

/// Name of the template page XObject in the shared page resources.
pub const TEMPLATE_XOBJECT: &str = "Tpl";

/// Smallest size a template value is shrunk to before it gets clipped.
const MIN_TEMPLATE_FONT_SIZE: f32 = 6.0;

/// Largest size used for auto-sized (`/DA` size 0) template fields.
const MAX_AUTO_FONT_SIZE: f32 = 12.0;

/// Inner padding of a template field, matching common viewer appearance.
const FIELD_PADDING: f32 = 2.0;

/// One rendered page, ready for the assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// Position of the record among the valid records of the run (0-based).
    pub sequence: usize,
    /// Uncompressed content stream.
    pub content: Vec<u8>,
    pub media_box: [f32; 4],
}

/// Render one record.
///
/// # Errors
/// Only [`ConvertError::Internal`] if the content stream cannot be encoded.
pub fn render_page(
    sequence: usize,
    record: &EnrollmentRecord,
    layout: &FormLayout,
) -> Result<RenderedPage, ConvertError> {
    let mut ops = Ops::default();
    ops.push("q", vec![]);
    match layout {
        FormLayout::Template(template) => draw_template(&mut ops, record, template),
        FormLayout::Synthetic(synthetic) => draw_synthetic(&mut ops, record, synthetic),
    }
    ops.push("Q", vec![]);

    let content = Content {
        operations: ops.0,
    }
    .encode()
    .map_err(|e| ConvertError::Internal(format!("encoding page content: {e}")))?;

    Ok(RenderedPage {
        sequence,
        content,
        media_box: layout.media_box(),
    })
}

// ── Template pages ───────────────────────────────────────────────────────

fn draw_template(ops: &mut Ops, record: &EnrollmentRecord, template: &TemplateLayout) {
    ops.push("q", vec![]);
    ops.push("Do", vec![Object::Name(TEMPLATE_XOBJECT.as_bytes().to_vec())]);
    ops.push("Q", vec![]);

    for field in Field::ALL {
        let (Some(value), Some(placement)) = (record.display_value(field), template.placement(field))
        else {
            continue;
        };
        draw_field_value(ops, &value, placement);
    }
}

fn draw_field_value(ops: &mut Ops, value: &str, placement: &FieldPlacement) {
    let rect = placement.rect;
    let available = (rect.width() - 2.0 * FIELD_PADDING).max(0.0);
    let font = Font::Regular;
    let encoded = encode_win_ansi(value);

    let mut size = placement
        .font_size
        .unwrap_or_else(|| (rect.height() * 0.7).clamp(MIN_TEMPLATE_FONT_SIZE, MAX_AUTO_FONT_SIZE));
    let width = font.width(&encoded, size);
    if width > available && width > 0.0 {
        size = (size * available / width).max(MIN_TEMPLATE_FONT_SIZE);
    }

    let x = rect.x0 + FIELD_PADDING;
    let y = rect.y0 + ((rect.height() - size * CAP_HEIGHT) / 2.0).max(0.0);

    ops.push("q", vec![]);
    ops.clip(rect);
    ops.text(font, size, x, y, encoded);
    ops.push("Q", vec![]);
}

// ── Synthetic pages ──────────────────────────────────────────────────────

fn draw_synthetic(ops: &mut Ops, record: &EnrollmentRecord, layout: &SyntheticLayout) {
    let top = layout.page_height;
    let printable = Rect::new(
        layout.margin,
        layout.margin,
        layout.page_width - layout.margin,
        top - layout.margin,
    );

    if let Some(title) = layout.title.as_deref().filter(|t| !t.trim().is_empty()) {
        let encoded = encode_win_ansi(title.trim());
        let width = Font::Bold.width(&encoded, layout.title_size);
        let x = ((layout.page_width - width) / 2.0).max(layout.margin);
        ops.push("q", vec![]);
        ops.clip(printable);
        ops.text(Font::Bold, layout.title_size, x, top - layout.title_offset, encoded);
        ops.push("Q", vec![]);
    }

    let floor = layout.value_floor();
    let descent = layout.value_size * 0.25;
    let label_clip = Rect::new(
        layout.margin,
        floor - descent,
        layout.value_x() - 4.0,
        top - layout.margin,
    );
    let value_clip = Rect::new(
        layout.value_x(),
        floor - descent,
        layout.page_width - layout.margin,
        top - layout.margin,
    );

    let mut y = top - layout.first_row_offset;
    for field in Field::ALL {
        // Absent fields draw no line at all, not even the label.
        let Some(value) = record.display_value(field) else {
            continue;
        };
        if y < floor {
            break;
        }

        ops.push("q", vec![]);
        ops.clip(label_clip);
        let label = format!("{}:", layout.labels.get(field));
        ops.text(Font::Bold, layout.label_size, layout.margin, y, encode_win_ansi(&label));
        ops.push("Q", vec![]);

        let lines = wrap(&value, Font::Regular, layout.value_size, layout.value_width());
        ops.push("q", vec![]);
        ops.clip(value_clip);
        let mut line_y = y;
        let mut drawn = 0usize;
        for line in &lines {
            if line_y < floor {
                break;
            }
            ops.text(
                Font::Regular,
                layout.value_size,
                layout.value_x(),
                line_y,
                encode_win_ansi(line),
            );
            drawn += 1;
            line_y -= layout.line_height;
        }
        ops.push("Q", vec![]);

        y -= drawn.saturating_sub(1) as f32 * layout.line_height + layout.field_gap;
    }

    if layout.signature_block {
        draw_signature_block(ops, layout);
    }
}

fn draw_signature_block(ops: &mut Ops, layout: &SyntheticLayout) {
    let line_start = layout.margin + 90.0;
    let line_end = (layout.page_width - layout.margin).max(line_start);
    let rows = [
        ("Unterschrift:", layout.signature_offset),
        ("Datum:", layout.signature_offset - layout.label_size * 2.5),
    ];
    for (label, y) in rows {
        if y < layout.margin / 2.0 {
            continue;
        }
        ops.text(Font::Bold, layout.label_size, layout.margin, y, encode_win_ansi(label));
        ops.push("w", vec![real(0.5)]);
        ops.push("m", vec![real(line_start), real(y - 2.0)]);
        ops.push("l", vec![real(line_end), real(y - 2.0)]);
        ops.push("S", vec![]);
    }
}

// ── Content stream helpers ───────────────────────────────────────────────

#[derive(Default)]
struct Ops(Vec<Operation>);

impl Ops {
    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.0.push(Operation::new(operator, operands));
    }

    fn clip(&mut self, rect: Rect) {
        self.push(
            "re",
            vec![real(rect.x0), real(rect.y0), real(rect.width()), real(rect.height())],
        );
        self.push("W", vec![]);
        self.push("n", vec![]);
    }

    fn text(&mut self, font: Font, size: f32, x: f32, y: f32, encoded: Vec<u8>) {
        self.push("BT", vec![]);
        self.push(
            "Tf",
            vec![Object::Name(font.resource_name().as_bytes().to_vec()), real(size)],
        );
        self.push("Td", vec![real(x), real(y)]);
        self.push("Tj", vec![Object::String(encoded, StringFormat::Literal)]);
        self.push("ET", vec![]);
    }
}

/// Round to 1/100 pt so the stream stays compact and stable.
fn real(v: f32) -> Object {
    Object::Real((v * 100.0).round() / 100.0)
}
