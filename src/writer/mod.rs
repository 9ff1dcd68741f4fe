//! PDF writing for incremental updates.
//!
//! ## Architecture
//!
//! ```text
//! previous revision bytes
//!     ↓
//! [IncrementalWriter] (appends objects, records offsets)
//!     ↑
//! [SignatureAppearance] (widget forms) + [ObjectSerializer] (object syntax)
//!     ↓
//! new xref section + trailer + %%EOF
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use pdf_seal::writer::{IncrementalWriter, ObjectSerializer};
//!
//! let mut writer = IncrementalWriter::new(bytes, doc.xref(), doc.next_object_number());
//! let annot = writer.allocate();
//! writer.write_object(annot, &ObjectSerializer::dict(vec![("Type", Object::name("Annot"))]));
//! let updated = writer.finish()?;
//! ```

mod appearance;
mod incremental;
mod object_serializer;

pub use appearance::{display_date, fit_font_size, text_width, SignatureAppearance};
pub use incremental::IncrementalWriter;
pub use object_serializer::ObjectSerializer;
