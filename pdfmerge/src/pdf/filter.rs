//! Stream decoding.
//!
//! Only what the reader itself needs is supported: object streams and
//! cross-reference streams are practically always `FlateDecode`, optionally
//! with a PNG predictor. Page content is never decoded; it is copied as-is.

use std::io::Read;

use flate2::read::ZlibDecoder;

use super::object::{Dictionary, Object, Stream};
use super::{PdfError, PdfResult};

/// Undo all filters of a stream.
pub fn decode(stream: &Stream) -> PdfResult<Vec<u8>> {
    let filters = filter_names(&stream.dict)?;
    let params = decode_params(&stream.dict, filters.len());

    let mut data = stream.content.clone();
    for (filter, params) in filters.iter().zip(params) {
        data = match filter.as_slice() {
            b"FlateDecode" | b"Fl" => inflate(&data)?,
            b"ASCIIHexDecode" | b"AHx" => ascii_hex(&data)?,
            other => {
                return Err(PdfError::filter(format!(
                    "unsupported filter /{}",
                    String::from_utf8_lossy(other)
                )));
            }
        };
        if let Some(params) = params {
            data = unpredict(data, params)?;
        }
    }
    Ok(data)
}

fn filter_names(dict: &Dictionary) -> PdfResult<Vec<Vec<u8>>> {
    match dict.get(b"Filter") {
        None | Some(Object::Null) => Ok(Vec::new()),
        Some(Object::Name(name)) => Ok(vec![name.clone()]),
        Some(Object::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_name()
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| PdfError::filter("Filter array holds a non-name"))
            })
            .collect(),
        Some(_) => Err(PdfError::filter("Filter is neither a name nor an array")),
    }
}

fn decode_params(dict: &Dictionary, count: usize) -> Vec<Option<&Dictionary>> {
    let params = dict.get(b"DecodeParms").or_else(|| dict.get(b"DP"));
    match params {
        Some(Object::Dictionary(params)) => {
            let mut list = vec![None; count];
            if let Some(first) = list.first_mut() {
                *first = Some(params);
            }
            list
        }
        Some(Object::Array(items)) => (0..count)
            .map(|i| items.get(i).and_then(Object::as_dict))
            .collect(),
        _ => vec![None; count],
    }
}

fn inflate(data: &[u8]) -> PdfResult<Vec<u8>> {
    let mut out = Vec::new();
    match ZlibDecoder::new(data).read_to_end(&mut out) {
        Ok(_) => Ok(out),
        // Truncated streams still decode their complete blocks.
        Err(err) if !out.is_empty() => {
            log::warn!("FlateDecode stopped early ({err}); using {} decoded bytes", out.len());
            Ok(out)
        }
        Err(err) => Err(PdfError::filter(format!("FlateDecode failed: {err}"))),
    }
}

fn ascii_hex(data: &[u8]) -> PdfResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;
    for &byte in data {
        if byte == b'>' {
            break;
        }
        if byte.is_ascii_whitespace() {
            continue;
        }
        let nibble = hex_value(byte)
            .ok_or_else(|| PdfError::filter(format!("ASCIIHexDecode: invalid byte 0x{byte:02x}")))?;
        match high.take() {
            Some(h) => out.push(h << 4 | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    Ok(out)
}

pub(crate) fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn param(params: &Dictionary, key: &[u8], default: usize) -> usize {
    params
        .get(key)
        .and_then(Object::as_i64)
        .and_then(|value| usize::try_from(value).ok())
        .unwrap_or(default)
}

fn unpredict(data: Vec<u8>, params: &Dictionary) -> PdfResult<Vec<u8>> {
    let predictor = param(params, b"Predictor", 1);
    match predictor {
        1 => Ok(data),
        10..=15 => {
            let colors = param(params, b"Colors", 1);
            let bits = param(params, b"BitsPerComponent", 8);
            let columns = param(params, b"Columns", 1);
            png_unpredict(&data, colors, bits, columns)
        }
        other => Err(PdfError::filter(format!("unsupported predictor {other}"))),
    }
}

/// Reverse PNG row filters (each row is prefixed with its filter type byte).
fn png_unpredict(data: &[u8], colors: usize, bits: usize, columns: usize) -> PdfResult<Vec<u8>> {
    let pixel_bits = colors
        .checked_mul(bits)
        .ok_or_else(|| PdfError::filter("PNG predictor pixel size overflows"))?;
    let row_bits = pixel_bits
        .checked_mul(columns)
        .ok_or_else(|| PdfError::filter("PNG predictor row length overflows"))?;
    let bytes_per_pixel = pixel_bits.div_ceil(8).max(1);
    let row_len = row_bits.div_ceil(8);
    if row_len == 0 {
        return Err(PdfError::filter("PNG predictor with zero-length rows"));
    }
    // At least one complete row, with its filter byte, must be present.
    if row_len >= data.len() {
        return Err(PdfError::filter(format!(
            "PNG predictor rows of {row_len} bytes do not fit in {} bytes of data",
            data.len()
        )));
    }

    let mut out = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_len];
    for chunk in data.chunks(row_len + 1) {
        let (&filter_type, raw) = match chunk.split_first() {
            Some(split) => split,
            None => break,
        };
        let mut row = raw.to_vec();
        row.resize(row_len, 0);

        for i in 0..row_len {
            let left = if i >= bytes_per_pixel { row[i - bytes_per_pixel] } else { 0 };
            let up = previous[i];
            let upper_left = if i >= bytes_per_pixel {
                previous[i - bytes_per_pixel]
            } else {
                0
            };
            let predicted = match filter_type {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, upper_left),
                other => {
                    return Err(PdfError::filter(format!("invalid PNG filter type {other}")));
                }
            };
            row[i] = row[i].wrapping_add(predicted);
        }

        out.extend_from_slice(&row);
        previous = row;
    }
    Ok(out)
}

fn paeth(left: u8, up: u8, upper_left: u8) -> u8 {
    let p = i16::from(left) + i16::from(up) - i16::from(upper_left);
    let pa = (p - i16::from(left)).abs();
    let pb = (p - i16::from(up)).abs();
    let pc = (p - i16::from(upper_left)).abs();
    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        up
    } else {
        upper_left
    }
}
