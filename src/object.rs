//! PDF object types.
//!
//! Every value read from or written to a document is an [`Object`]. Annotation
//! dictionaries, appearance streams and optional-content groups are all built
//! from these same variants.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (without the leading /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(HashMap<String, Object>),
    /// Stream (dictionary + data)
    Stream {
        /// Stream dictionary
        dict: HashMap<String, Object>,
        /// Raw (still encoded) stream data
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl From<ObjectRef> for Object {
    fn from(r: ObjectRef) -> Self {
        Object::Reference(r)
    }
}

impl Object {
    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to read a numeric value, accepting both integers and reals.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&HashMap<String, Object>> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Mutable access to the dictionary of a Dictionary or Stream object.
    pub fn as_dict_mut(&mut self) -> Option<&mut HashMap<String, Object>> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to real number.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Decode stream data using the filters named in the stream dictionary.
    ///
    /// Only FlateDecode (with optional PNG/TIFF predictors) is supported; any
    /// other filter yields [`Error::Decode`].
    pub fn decode_stream_data(&self) -> Result<Vec<u8>> {
        match self {
            Object::Stream { dict, data } => {
                let filters = dict
                    .get("Filter")
                    .map(extract_filter_names)
                    .unwrap_or_default();

                let mut decoded = data.to_vec();
                for filter in &filters {
                    match filter.as_str() {
                        "FlateDecode" | "Fl" => {
                            decoded = crate::filters::flate_decode(&decoded)?;
                        },
                        other => {
                            return Err(Error::Decode(format!("unsupported filter /{}", other)));
                        },
                    }
                }

                if let Some(params) = crate::filters::DecodeParams::from_object(dict.get("DecodeParms")) {
                    decoded = crate::filters::decode_predictor(&decoded, &params)?;
                }

                Ok(decoded)
            },
            _ => Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: self.type_name().to_string(),
            }),
        }
    }
}

/// Extract filter names from a Filter object.
///
/// The Filter entry can be either a single Name or an Array of Names.
fn extract_filter_names(filter_obj: &Object) -> Vec<String> {
    match filter_obj {
        Object::Name(name) => vec![name.clone()],
        Object::Array(arr) => arr
            .iter()
            .filter_map(|obj| obj.as_name().map(|s| s.to_string()))
            .collect(),
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_display() {
        assert_eq!(ObjectRef::new(12, 0).to_string(), "12 0 R");
    }

    #[test]
    fn test_as_number_accepts_integer_and_real() {
        assert_eq!(Object::Integer(3).as_number(), Some(3.0));
        assert_eq!(Object::Real(2.5).as_number(), Some(2.5));
        assert_eq!(Object::Name("X".into()).as_number(), None);
    }

    #[test]
    fn test_as_dict_on_stream() {
        let mut dict = HashMap::new();
        dict.insert("Type".to_string(), Object::Name("XObject".to_string()));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"q Q"),
        };
        assert_eq!(
            stream.as_dict().and_then(|d| d.get("Type")).and_then(|o| o.as_name()),
            Some("XObject")
        );
    }

    #[test]
    fn test_as_dict_mut_allows_insert() {
        let mut obj = Object::Dictionary(HashMap::new());
        if let Some(d) = obj.as_dict_mut() {
            d.insert("F".to_string(), Object::Integer(4));
        }
        assert_eq!(obj.as_dict().and_then(|d| d.get("F")), Some(&Object::Integer(4)));
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Object::Null.type_name(), "Null");
        assert_eq!(Object::Reference(ObjectRef::new(1, 0)).type_name(), "Reference");
    }

    #[test]
    fn test_decode_unfiltered_stream() {
        let stream = Object::Stream {
            dict: HashMap::new(),
            data: bytes::Bytes::from_static(b"BT ET"),
        };
        assert_eq!(stream.decode_stream_data().unwrap(), b"BT ET");
    }

    #[test]
    fn test_decode_flate_stream() {
        let compressed = crate::filters::flate_encode(b"0 0 m 10 10 l S").unwrap();
        let mut dict = HashMap::new();
        dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from(compressed),
        };
        assert_eq!(stream.decode_stream_data().unwrap(), b"0 0 m 10 10 l S");
    }

    #[test]
    fn test_decode_unsupported_filter() {
        let mut dict = HashMap::new();
        dict.insert("Filter".to_string(), Object::Name("LZWDecode".to_string()));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"xx"),
        };
        assert!(matches!(stream.decode_stream_data(), Err(Error::Decode(_))));
    }

    #[test]
    fn test_decode_non_stream_is_type_error() {
        let err = Object::Integer(1).decode_stream_data().unwrap_err();
        assert!(matches!(err, Error::InvalidObjectType { .. }));
    }
}
