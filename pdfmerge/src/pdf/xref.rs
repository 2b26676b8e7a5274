//! Cross-reference sections: classic tables, xref streams and the `Prev` chain.

use std::collections::{BTreeMap, HashSet};

use nom::{branch, bytes, character, combinator};

use super::object::{Dictionary, Object};
use super::parser::{self, ParseResult};
use super::{PdfError, PdfResult};

const STARTXREF: &[u8] = b"startxref";

/// How far from the end of the file `startxref` is searched for.
const TAIL_SEARCH: usize = 2048;

/// Location of one object number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Deleted or never used.
    Free,
    /// Stored at a byte offset of the file.
    InUse {
        /// Offset of the `n g obj` line.
        offset: usize,
        /// Generation number.
        generation: u16,
    },
    /// Stored inside an object stream (generation is always 0).
    Compressed {
        /// Object number of the `/Type /ObjStm` stream.
        container: u32,
        /// Index within the stream.
        index: u32,
    },
}

/// Merged view of all cross-reference sections of a file.
#[derive(Debug, Clone, Default)]
pub struct CrossReference {
    /// Newest entry per object number.
    pub entries: BTreeMap<u32, XrefEntry>,
    /// Newest trailer, with keys only older trailers define filled in.
    pub trailer: Dictionary,
}

struct Section {
    entries: BTreeMap<u32, XrefEntry>,
    trailer: Dictionary,
}

/// Byte offset named by the last `startxref` of the file.
pub fn find_startxref(file: &[u8]) -> PdfResult<usize> {
    let tail_start = file.len().saturating_sub(TAIL_SEARCH);
    let tail = &file[tail_start..];
    let position = parser::rfind(tail, STARTXREF)
        .ok_or_else(|| PdfError::parse(file.len(), "no startxref found at end of file"))?;

    let after = &tail[position + STARTXREF.len()..];
    let base = tail_start + position + STARTXREF.len();
    let (_, offset) = startxref_value(after).map_err(|e| parser::to_pdf_error(after, base, e, "startxref"))?;
    usize::try_from(offset).map_err(|_| PdfError::parse(base, "startxref offset does not fit in memory"))
}

fn startxref_value(input: &[u8]) -> ParseResult<'_, u64> {
    let (remainder, _) = parser::space(input)?;
    character::complete::u64(remainder)
}

/// Read every section reachable from `startxref`, newest first, and merge them.
pub fn read(file: &[u8]) -> PdfResult<CrossReference> {
    let mut offset = find_startxref(file)?;
    let mut visited = HashSet::new();
    let mut sections = Vec::new();

    loop {
        if !visited.insert(offset) {
            log::warn!("cross-reference chain loops back to offset {offset}; stopping");
            break;
        }
        let section = read_section(file, offset)?;
        let prev = section
            .trailer
            .get(b"Prev")
            .and_then(Object::as_i64)
            .and_then(|prev| usize::try_from(prev).ok());
        sections.push(section);
        match prev {
            Some(prev) => offset = prev,
            None => break,
        }
    }
    log::trace!("read {} cross-reference section(s)", sections.len());

    // Oldest first, so newer entries and trailer keys replace older ones.
    let mut xref = CrossReference::default();
    for section in sections.into_iter().rev() {
        xref.entries.extend(section.entries);
        for (key, value) in section.trailer.iter() {
            xref.trailer.set(key, value.clone());
        }
    }
    xref.trailer.remove(b"Prev");
    xref.trailer.remove(b"XRefStm");
    Ok(xref)
}

fn read_section(file: &[u8], offset: usize) -> PdfResult<Section> {
    let input = file.get(offset..).ok_or_else(|| {
        PdfError::parse(offset, "cross-reference offset is beyond the end of the file")
    })?;
    let (body, _) = parser::space(input).map_err(|e| parser::to_pdf_error(input, offset, e, "xref"))?;

    if body.starts_with(b"xref") {
        classic_section(file, offset, input)
    } else if body.first().is_some_and(u8::is_ascii_digit) {
        stream_section(file, offset)
    } else {
        Err(PdfError::parse(offset, "expected 'xref' or a cross-reference stream"))
    }
}

fn classic_section(file: &[u8], offset: usize, input: &[u8]) -> PdfResult<Section> {
    let (_, (rows, trailer)) =
        table(input).map_err(|e| parser::to_pdf_error(input, offset, e, "xref table"))?;
    let mut entries: BTreeMap<u32, XrefEntry> = rows.into_iter().collect();

    // Hybrid file: the stream describes objects the table hides from old readers.
    if let Some(stream_offset) = trailer
        .get(b"XRefStm")
        .and_then(Object::as_i64)
        .and_then(|o| usize::try_from(o).ok())
    {
        let hidden = stream_section(file, stream_offset)?;
        for (number, entry) in hidden.entries {
            if !matches!(entries.get(&number), Some(XrefEntry::InUse { .. })) {
                entries.insert(number, entry);
            }
        }
    }

    Ok(Section { entries, trailer })
}

type TableRows = Vec<(u32, XrefEntry)>;

fn table(input: &[u8]) -> ParseResult<'_, (TableRows, Dictionary)> {
    let (remainder, _) = parser::space(input)?;
    let (mut remainder, _) = bytes::complete::tag(b"xref")(remainder)?;
    let mut rows = Vec::new();

    loop {
        let (r, _) = parser::space(remainder)?;
        if let Some(r) = r.strip_prefix(b"trailer") {
            remainder = r;
            break;
        }
        let (r, first) = character::complete::u32(r)?;
        let (r, _) = parser::space(r)?;
        let (mut r, count) = character::complete::u32(r)?;
        for i in 0..count {
            let (rr, _) = parser::space(r)?;
            let (rr, offset) = character::complete::u64(rr)?;
            let (rr, _) = parser::space(rr)?;
            let (rr, generation) = character::complete::u16(rr)?;
            let (rr, _) = parser::space(rr)?;
            let (rr, in_use) = branch::alt((
                combinator::value(true, character::complete::char('n')),
                combinator::value(false, character::complete::char('f')),
            ))(rr)?;
            let Some(number) = first.checked_add(i) else {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    r,
                    nom::error::ErrorKind::TooLarge,
                )));
            };
            let entry = match (in_use, usize::try_from(offset)) {
                (true, Ok(offset)) => XrefEntry::InUse { offset, generation },
                _ => XrefEntry::Free,
            };
            rows.push((number, entry));
            r = rr;
        }
        remainder = r;
    }

    let (remainder, trailer) = parser::object(remainder)?;
    match trailer {
        Object::Dictionary(trailer) => Ok((remainder, (rows, trailer))),
        _ => Err(nom::Err::Error(nom::error::Error::new(
            remainder,
            nom::error::ErrorKind::Verify,
        ))),
    }
}

fn stream_section(file: &[u8], offset: usize) -> PdfResult<Section> {
    // Length of an xref stream must be direct.
    let (id, object) = parser::parse_indirect_object(file, offset, &|_| None)?;
    let stream = match object {
        Object::Stream(stream) if stream.dict.has_type(b"XRef") => stream,
        _ => {
            return Err(PdfError::parse(
                offset,
                format!("object {} {} is not a cross-reference stream", id.0, id.1),
            ));
        }
    };

    let widths: Vec<usize> = stream
        .dict
        .get(b"W")
        .and_then(Object::as_array)
        .map(|w| {
            w.iter()
                .filter_map(Object::as_i64)
                .filter_map(|v| usize::try_from(v).ok())
                .collect()
        })
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(PdfError::structure(format!(
            "cross-reference stream {} has an invalid /W array",
            id.0
        )));
    }

    let size = stream.dict.get(b"Size").and_then(Object::as_i64).unwrap_or(0);
    let subsections: Vec<(i64, i64)> = match stream.dict.get(b"Index").and_then(Object::as_array) {
        Some(index) => index
            .chunks(2)
            .filter_map(|pair| Some((pair.first()?.as_i64()?, pair.get(1)?.as_i64()?)))
            .collect(),
        None => vec![(0, size)],
    };

    let data = stream.decoded_content()?;
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(PdfError::structure("cross-reference stream rows are empty"));
    }
    let mut rows = data.chunks_exact(row_len);

    let mut entries = BTreeMap::new();
    'subsections: for (first, count) in subsections {
        for i in 0..count.max(0) {
            let Some(row) = rows.next() else {
                log::warn!("cross-reference stream {} has fewer rows than /Index declares", id.0);
                break 'subsections;
            };
            let number = first
                .checked_add(i)
                .and_then(|number| u32::try_from(number).ok())
                .ok_or_else(|| {
                    PdfError::parse(
                        offset,
                        format!("cross-reference stream {} /Index is out of range", id.0),
                    )
                })?;
            let field_error = |what: &str| {
                PdfError::parse(
                    offset,
                    format!(
                        "cross-reference stream {} has an oversized {what} for object {number}",
                        id.0
                    ),
                )
            };
            let (kind, rest) = row.split_at(widths[0]);
            let (field2, field3) = rest.split_at(widths[1]);
            // A zero-width type field defaults to type 1.
            let kind = if widths[0] == 0 { 1 } else { be_number(kind) };
            let entry = match kind {
                0 => XrefEntry::Free,
                1 => XrefEntry::InUse {
                    offset: usize::try_from(be_number(field2)).map_err(|_| field_error("offset"))?,
                    generation: u16::try_from(be_number(field3))
                        .map_err(|_| field_error("generation"))?,
                },
                2 => XrefEntry::Compressed {
                    container: u32::try_from(be_number(field2))
                        .map_err(|_| field_error("object stream number"))?,
                    index: u32::try_from(be_number(field3))
                        .map_err(|_| field_error("object stream index"))?,
                },
                // Unknown types are treated as references to the null object.
                _ => XrefEntry::Free,
            };
            entries.insert(number, entry);
        }
    }

    Ok(Section {
        entries,
        trailer: stream.dict,
    })
}

fn be_number(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| acc << 8 | u64::from(b))
}
