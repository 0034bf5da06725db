//! Error types for markup conversion.
//!
//! Covers the document reader, the conversion entry point and the
//! collaborators it loads (mapping table, icon catalog, override store).

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while loading, converting or saving a document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input does not start with a PDF header
    #[error("File is not a valid PDF: {0}")]
    InvalidFileType(String),

    /// Input exceeds the configured size limit
    #[error("PDF file too large: {size} bytes (max {limit} bytes)")]
    FileTooLarge {
        /// Actual file size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// Document has more than one page
    #[error("Multi-page PDFs not supported: document has {0} pages")]
    MultiPagePdf(usize),

    /// Page carries no markup annotations at all
    #[error("No icon markup annotations found in PDF")]
    NoAnnotationsFound,

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in the document
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Mapping table could not be parsed
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Subject has no entry in the mapping table
    #[error("Unknown bid icon subject: {0}")]
    MappingNotFound(String),

    /// A single annotation could not be read (never aborts a run)
    #[error("Malformed annotation: {0}")]
    MalformedAnnotation(String),

    /// Image loading or embedding error
    #[error("Image error: {0}")]
    Image(String),

    /// Conversion failed
    #[error("Conversion failed: {0}")]
    Conversion(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_file_type_error() {
        let err = Error::InvalidFileType("missing %PDF- header".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("not a valid PDF"));
        assert!(msg.contains("%PDF-"));
    }

    #[test]
    fn test_file_too_large_error() {
        let err = Error::FileTooLarge {
            size: 60,
            limit: 50,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("60"));
        assert!(msg.contains("max 50"));
    }

    #[test]
    fn test_multi_page_error() {
        let msg = format!("{}", Error::MultiPagePdf(3));
        assert!(msg.contains("3 pages"));
    }

    #[test]
    fn test_parse_error() {
        let err = Error::ParseError {
            offset: 1234,
            reason: "invalid token".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("1234"));
        assert!(msg.contains("invalid token"));
    }

    #[test]
    fn test_object_not_found_error() {
        let msg = format!("{}", Error::ObjectNotFound(10, 0));
        assert!(msg.contains("10 0 R"));
    }

    #[test]
    fn test_mapping_not_found_error() {
        let msg = format!("{}", Error::MappingNotFound("AP_Bid".to_string()));
        assert_eq!(msg, "Unknown bid icon subject: AP_Bid");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
