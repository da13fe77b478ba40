//! Pipeline stages for spreadsheet-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step and can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ validate ──▶ render ──▶ assemble
//! (rows)    (records)    (pages)    (document)
//!                          ▲
//!                 layout ──┘ (resolved once per run)
//! ```
//!
//! 1. [`input`]   : open a workbook or CSV file and yield [`crate::model::RawRow`]s lazily
//! 2. [`validate`]: trim, type, and reject rows missing a name
//! 3. [`layout`]  : resolve the template form or the synthetic layout
//! 4. [`render`]  : draw one record as one page content stream; pure, so it
//!    can run on any worker in any order
//! 5. [`assemble`]: order pages by sequence, build the PDF, write it atomically
//!
//! [`text`] holds the font metrics and text encoding shared by render.

pub mod assemble;
pub mod input;
pub mod layout;
pub mod render;
pub mod text;
pub mod validate;
