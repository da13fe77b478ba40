//! Document assembly: rendered pages → one PDF, written atomically.
//!
//! ## Output structure
//!
//! ```text
//! Catalog ─▶ Pages ─▶ Page 1..n ─▶ Contents (one stream per record)
//!                          └──────▶ Resources (shared)
//!                                     ├── /Font  /F1 Helvetica, /F2 Helvetica-Bold
//!                                     └── /XObject /Tpl  (template page, template runs only)
//! ```
//!
//! For template runs the output starts as a copy of the template document so
//! that every object the form page's artwork needs keeps its id. A fresh
//! catalog and page tree replace the template's, and everything no longer
//! reachable (the AcroForm, widgets, other pages) is pruned before saving.

use crate::error::ConvertError;
use crate::pipeline::layout::{FormLayout, TemplateLayout};
use crate::pipeline::render::{RenderedPage, TEMPLATE_XOBJECT};
use crate::pipeline::text::Font;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

const PDF_VERSION: &str = "1.5";
const PRODUCER: &str = concat!("enroll2pdf ", env!("CARGO_PKG_VERSION"));

/// Build the output document in memory.
///
/// Pages are ordered by [`RenderedPage::sequence`], not by input order.
///
/// # Errors
/// * [`ConvertError::Internal`] when `pages` is empty; callers check for
///   that first (see [`write_document`]).
/// * [`ConvertError::InvalidTemplate`] when the template page content cannot
///   be read back.
pub fn assemble(mut pages: Vec<RenderedPage>, layout: &FormLayout) -> Result<Document, ConvertError> {
    if pages.is_empty() {
        return Err(ConvertError::Internal("no pages to assemble".into()));
    }
    pages.sort_by_key(|p| p.sequence);

    let (mut doc, template_xobject) = match layout {
        FormLayout::Template(template) => {
            let (doc, xobject) = start_from_template(template)?;
            (doc, Some(xobject))
        }
        FormLayout::Synthetic(_) => (Document::with_version(PDF_VERSION), None),
    };

    let resources_id = add_shared_resources(&mut doc, template_xobject);
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(pages.len());
    for page in pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), page.content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => page.media_box.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>(),
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::String(PRODUCER.as_bytes().to_vec(), StringFormat::Literal),
    });
    doc.trailer = dictionary! {
        "Root" => catalog_id,
        "Info" => info_id,
    };

    let pruned = doc.prune_objects();
    if !pruned.is_empty() {
        debug!(objects = pruned.len(), "Pruned unreferenced template objects");
    }
    doc.renumber_objects();
    doc.compress();

    Ok(doc)
}

/// Assemble `pages` and write the document to `dest`.
///
/// The document is written to a temporary file next to `dest` and renamed
/// into place, so `dest` is either untouched or complete. The parent
/// directory must already exist.
///
/// Returns the number of pages written.
///
/// # Errors
/// * [`ConvertError::NoValidRecords`] when `pages` is empty; no file is
///   created.
/// * [`ConvertError::WriteFailed`] when `dest` cannot be written.
pub fn write_document(
    pages: Vec<RenderedPage>,
    layout: &FormLayout,
    dest: &Path,
) -> Result<usize, ConvertError> {
    if pages.is_empty() {
        return Err(ConvertError::NoValidRecords {
            path: dest.to_path_buf(),
            rows_read: 0,
            rejected: 0,
        });
    }
    let page_count = pages.len();
    let mut doc = assemble(pages, layout)?;

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(ConvertError::write_failed(
            dest,
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("directory '{}' does not exist", parent.display()),
            ),
        ));
    }

    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| ConvertError::write_failed(dest, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        doc.save_to(&mut writer)
            .map_err(|e| ConvertError::write_failed(dest, std::io::Error::other(e.to_string())))?;
        writer.flush().map_err(|e| ConvertError::write_failed(dest, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| ConvertError::write_failed(dest, e))?;
    tmp.persist(dest)
        .map_err(|e| ConvertError::write_failed(dest, e.error))?;

    info!(path = %dest.display(), pages = page_count, "Wrote output document");
    Ok(page_count)
}

/// Copy the template document and turn its form page into a Form XObject.
fn start_from_template(template: &TemplateLayout) -> Result<(Document, ObjectId), ConvertError> {
    let mut doc = template.document().clone();
    if doc.version.as_str() < PDF_VERSION {
        doc.version = PDF_VERSION.to_string();
    }

    let content = template.form_page_content()?;
    let bbox = template.media_box.to_array();
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "BBox" => bbox.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>(),
    };
    if let Some(resources) = template.form_page_resources() {
        dict.set("Resources", resources);
    }
    let xobject_id = doc.add_object(Stream::new(dict, content));
    Ok((doc, xobject_id))
}

fn add_shared_resources(doc: &mut Document, template_xobject: Option<ObjectId>) -> ObjectId {
    let mut fonts = Dictionary::new();
    for font in [Font::Regular, Font::Bold] {
        let id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(font.resource_name(), id);
    }

    let mut resources = dictionary! {
        "Font" => fonts,
        "ProcSet" => vec!["PDF".into(), "Text".into()],
    };
    if let Some(id) = template_xobject {
        resources.set("XObject", dictionary! { TEMPLATE_XOBJECT => id });
    }
    doc.add_object(resources)
}
