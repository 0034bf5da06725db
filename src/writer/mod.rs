//! PDF output.
//!
//! ```text
//! Document arena
//!     ↓
//! [PdfWriter] (header, objects, xref, trailer)
//!     ↓
//! [ObjectSerializer] (one object at a time)
//!     ↓
//! PDF bytes
//! ```
//!
//! [`ContentStreamBuilder`] writes drawing operators and
//! [`AppearanceStreamBuilder`] produces the form XObjects that annotation
//! appearances point at.

mod appearance_stream;
mod content_stream;
mod object_serializer;
mod pdf_writer;

pub use appearance_stream::{helvetica_bold, AppearanceStreamBuilder, BOLD_FONT_RESOURCE};
pub use content_stream::{ContentStreamBuilder, ContentStreamOp, BEZIER_K};
pub use object_serializer::{format_real, ObjectSerializer};
pub use pdf_writer::{PdfWriter, PdfWriterConfig};
