//! Stream filters.
//!
//! FlateDecode is the only compression the converter reads or writes. Cross
//! reference streams in the wild usually add a PNG "Up" predictor on top, so
//! predictor reversal lives here as well.

use crate::error::{Error, Result};
use crate::object::Object;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Inflate zlib data.
///
/// Falls back to raw deflate when the zlib header is damaged, and returns
/// whatever was recovered before a mid-stream error.
pub fn flate_decode(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut decoder = ZlibDecoder::new(input);
    match decoder.read_to_end(&mut output) {
        Ok(_) => return Ok(output),
        Err(e) => {
            if !output.is_empty() {
                log::warn!(
                    "FlateDecode partial recovery: extracted {} bytes before corruption: {}",
                    output.len(),
                    e
                );
                return Ok(output);
            }
        },
    }

    log::debug!("Zlib decode failed, trying raw deflate");
    output.clear();
    let mut deflate = DeflateDecoder::new(input);
    match deflate.read_to_end(&mut output) {
        Ok(_) if !output.is_empty() => Ok(output),
        Err(_) if !output.is_empty() => {
            log::warn!("Raw deflate partial recovery: {} bytes", output.len());
            Ok(output)
        },
        _ => Err(Error::Decode("FlateDecode: no recoverable data".to_string())),
    }
}

/// Deflate data with zlib framing at the default compression level.
pub fn flate_encode(input: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input)?;
    Ok(encoder.finish()?)
}

/// Predictor parameters taken from a /DecodeParms dictionary.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (samples per row)
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Read predictor parameters, returning `None` when no predictor applies.
    pub fn from_object(obj: Option<&Object>) -> Option<Self> {
        let dict = match obj? {
            Object::Array(items) => items.first()?.as_dict()?,
            other => other.as_dict()?,
        };
        let mut params = Self::default();
        if let Some(p) = dict.get("Predictor").and_then(|o| o.as_integer()) {
            params.predictor = p;
        }
        if let Some(c) = dict.get("Columns").and_then(|o| o.as_integer()) {
            params.columns = c.max(1) as usize;
        }
        if let Some(c) = dict.get("Colors").and_then(|o| o.as_integer()) {
            params.colors = c.max(1) as usize;
        }
        if let Some(b) = dict.get("BitsPerComponent").and_then(|o| o.as_integer()) {
            params.bits_per_component = b.max(1) as usize;
        }
        if params.predictor > 1 {
            Some(params)
        } else {
            None
        }
    }

    fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Reverse a TIFF or PNG predictor.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff_predictor(data, params),
        10..=15 => decode_png_predictor(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_pixel();
    let mut output = Vec::with_capacity(data.len());

    for row in data.chunks(row_len) {
        let start = output.len();
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= bpp { output[start + i - bpp] } else { 0 };
            output.push(byte.wrapping_add(left));
        }
    }
    Ok(output)
}

fn decode_png_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let pixel_bytes = params.pixel_bytes_per_row();
    let row_len = pixel_bytes + 1;
    let bpp = params.bytes_per_pixel();

    if data.len() % row_len != 0 {
        return Err(Error::Decode(format!(
            "Data length {} is not a multiple of row size {}",
            data.len(),
            row_len
        )));
    }

    let mut output: Vec<u8> = Vec::with_capacity(data.len() / row_len * pixel_bytes);
    let mut prev = vec![0u8; pixel_bytes];

    for row in data.chunks(row_len) {
        let tag = row[0];
        let encoded = &row[1..];
        let mut current = vec![0u8; pixel_bytes];

        for i in 0..pixel_bytes {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", other)));
                },
            };
            current[i] = encoded[i].wrapping_add(predicted);
        }

        output.extend_from_slice(&current);
        prev = current;
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_flate_encode_then_decode() {
        let data = b"q 1 0 0 1 0 0 cm /Img Do Q";
        let packed = flate_encode(data).unwrap();
        assert_ne!(packed.as_slice(), data.as_slice());
        assert_eq!(flate_decode(&packed).unwrap(), data);
    }

    #[test]
    fn test_flate_decode_raw_deflate() {
        let mut enc = flate2::write::DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"raw deflate payload").unwrap();
        let raw = enc.finish().unwrap();
        assert_eq!(flate_decode(&raw).unwrap(), b"raw deflate payload");
    }

    #[test]
    fn test_flate_decode_garbage_fails() {
        assert!(flate_decode(&[0xff, 0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn test_png_up_predictor() {
        let params = DecodeParams {
            predictor: 12,
            columns: 3,
            ..Default::default()
        };
        // Two rows tagged Up; second row adds 1 to each byte of the first.
        let data = [2, 1, 2, 3, 2, 1, 1, 1];
        let out = decode_predictor(&data, &params).unwrap();
        assert_eq!(out, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_png_sub_predictor() {
        let params = DecodeParams {
            predictor: 15,
            columns: 3,
            ..Default::default()
        };
        let data = [1, 5, 1, 1];
        assert_eq!(decode_predictor(&data, &params).unwrap(), vec![5, 6, 7]);
    }

    #[test]
    fn test_png_predictor_rejects_ragged_rows() {
        let params = DecodeParams {
            predictor: 12,
            columns: 4,
            ..Default::default()
        };
        assert!(decode_predictor(&[2, 0, 0], &params).is_err());
    }

    #[test]
    fn test_params_without_predictor_is_none() {
        let dict = Object::Dictionary(HashMap::new());
        assert!(DecodeParams::from_object(Some(&dict)).is_none());
        assert!(DecodeParams::from_object(None).is_none());
    }

    #[test]
    fn test_params_from_dictionary() {
        let mut dict = HashMap::new();
        dict.insert("Predictor".to_string(), Object::Integer(12));
        dict.insert("Columns".to_string(), Object::Integer(5));
        let params = DecodeParams::from_object(Some(&Object::Dictionary(dict))).unwrap();
        assert_eq!(params.predictor, 12);
        assert_eq!(params.columns, 5);
    }
}
