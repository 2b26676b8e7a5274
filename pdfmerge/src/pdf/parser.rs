//! Tokenizer and object parser.
//!
//! Parsers work on byte slices of the whole file so that the remaining input
//! always tells how far into the file a failure happened.

use nom::{branch, bytes, character, combinator, IResult};

use super::object::{Dictionary, Object, ObjectId, Stream, StringFormat};
use super::{PdfError, PdfResult};

pub(crate) type ParseResult<'a, T> = IResult<&'a [u8], T>;

/// Maximum nesting of arrays and dictionaries.
const MAX_NESTING: usize = 256;

pub(crate) fn is_whitespace(chr: u8) -> bool {
    matches!(chr, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'\0')
}

fn is_delimiter(chr: u8) -> bool {
    matches!(
        chr,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(chr: u8) -> bool {
    !is_delimiter(chr) && !is_whitespace(chr)
}

fn error<T>(input: &[u8], kind: nom::error::ErrorKind) -> ParseResult<'_, T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

fn failure<T>(input: &[u8], kind: nom::error::ErrorKind) -> ParseResult<'_, T> {
    Err(nom::Err::Failure(nom::error::Error::new(input, kind)))
}

/// Skip whitespace and comments.
pub(crate) fn space(input: &[u8]) -> ParseResult<'_, ()> {
    let mut remainder = input;
    loop {
        let (r, _) = bytes::complete::take_while(is_whitespace)(remainder)?;
        if r.first() != Some(&b'%') {
            return Ok((r, ()));
        }
        let (r, _) = bytes::complete::take_till(|c| c == b'\n' || c == b'\r')(r)?;
        remainder = r;
    }
}

/// Like [`space`] but requires at least one whitespace byte or comment.
fn space1(input: &[u8]) -> ParseResult<'_, ()> {
    let (remainder, _) = space(input)?;
    if remainder.len() == input.len() {
        return error(input, nom::error::ErrorKind::Space);
    }
    Ok((remainder, ()))
}

/// Tokens made of regular characters must end at whitespace, a delimiter or EOF.
fn require_termination(input: &[u8]) -> ParseResult<'_, ()> {
    match input.first() {
        Some(&chr) if is_regular(chr) => error(input, nom::error::ErrorKind::Verify),
        _ => Ok((input, ())),
    }
}

fn ascii<T: std::str::FromStr>(digits: &[u8]) -> Result<T, ()> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(())
}

fn unsigned<T: std::str::FromStr>(input: &[u8]) -> ParseResult<'_, T> {
    combinator::map_res(character::complete::digit1, ascii::<T>)(input)
}

fn number(input: &[u8]) -> ParseResult<'_, Object> {
    let (remainder, text) = combinator::recognize(nom::sequence::tuple((
        combinator::opt(branch::alt((
            character::complete::char('+'),
            character::complete::char('-'),
        ))),
        branch::alt((
            combinator::recognize(nom::sequence::pair(
                character::complete::digit1,
                combinator::opt(nom::sequence::pair(
                    character::complete::char('.'),
                    character::complete::digit0,
                )),
            )),
            combinator::recognize(nom::sequence::pair(
                character::complete::char('.'),
                character::complete::digit1,
            )),
        )),
    )))(input)?;
    let (remainder, _) = require_termination(remainder)?;

    let object = if text.contains(&b'.') {
        ascii::<f64>(text).map(Object::Real)
    } else {
        // Integers too large for i64 degrade to reals.
        ascii::<i64>(text)
            .map(Object::Integer)
            .or_else(|_| ascii::<f64>(text).map(Object::Real))
    };
    match object {
        Ok(object) => Ok((remainder, object)),
        Err(()) => error(input, nom::error::ErrorKind::Float),
    }
}

fn reference(input: &[u8]) -> ParseResult<'_, Object> {
    let (remainder, number) = unsigned::<u32>(input)?;
    let (remainder, _) = space1(remainder)?;
    let (remainder, generation) = unsigned::<u16>(remainder)?;
    let (remainder, _) = space1(remainder)?;
    let (remainder, _) = character::complete::char('R')(remainder)?;
    let (remainder, _) = require_termination(remainder)?;
    Ok((remainder, Object::Reference((number, generation))))
}

fn keyword(input: &[u8]) -> ParseResult<'_, Object> {
    let (remainder, object) = branch::alt((
        combinator::value(Object::Boolean(true), bytes::complete::tag(b"true")),
        combinator::value(Object::Boolean(false), bytes::complete::tag(b"false")),
        combinator::value(Object::Null, bytes::complete::tag(b"null")),
    ))(input)?;
    let (remainder, _) = require_termination(remainder)?;
    Ok((remainder, object))
}

/// `/Name`, with `#xx` escapes decoded.
pub(crate) fn name(input: &[u8]) -> ParseResult<'_, Vec<u8>> {
    let (remainder, _) = character::complete::char('/')(input)?;
    let (remainder, raw) = bytes::complete::take_while(is_regular)(remainder)?;

    let mut decoded = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' {
            let high = raw.get(i + 1).copied().and_then(super::filter::hex_value);
            let low = raw.get(i + 2).copied().and_then(super::filter::hex_value);
            if let (Some(high), Some(low)) = (high, low) {
                decoded.push(high << 4 | low);
                i += 3;
                continue;
            }
        }
        decoded.push(raw[i]);
        i += 1;
    }
    Ok((remainder, decoded))
}

fn literal_string(input: &[u8]) -> ParseResult<'_, Object> {
    let (mut remainder, _) = character::complete::char('(')(input)?;
    let mut content = Vec::new();
    let mut depth = 0usize;

    loop {
        let Some((&chr, rest)) = remainder.split_first() else {
            return failure(remainder, nom::error::ErrorKind::Eof);
        };
        remainder = rest;
        match chr {
            b'(' => {
                depth += 1;
                content.push(chr);
            }
            b')' if depth == 0 => break,
            b')' => {
                depth -= 1;
                content.push(chr);
            }
            b'\\' => {
                let Some((&escaped, rest)) = remainder.split_first() else {
                    return failure(remainder, nom::error::ErrorKind::Eof);
                };
                remainder = rest;
                match escaped {
                    b'n' => content.push(b'\n'),
                    b'r' => content.push(b'\r'),
                    b't' => content.push(b'\t'),
                    b'b' => content.push(0x08),
                    b'f' => content.push(0x0c),
                    b'0'..=b'7' => {
                        let mut value = u32::from(escaped - b'0');
                        for _ in 0..2 {
                            match remainder.first() {
                                Some(&digit @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(digit - b'0');
                                    remainder = &remainder[1..];
                                }
                                _ => break,
                            }
                        }
                        content.push((value & 0xff) as u8);
                    }
                    // Backslash at end of line continues the string.
                    b'\r' => {
                        if remainder.first() == Some(&b'\n') {
                            remainder = &remainder[1..];
                        }
                    }
                    b'\n' => {}
                    // `\(`, `\)`, `\\` and unknown escapes drop the backslash.
                    other => content.push(other),
                }
            }
            b'\r' => {
                if remainder.first() == Some(&b'\n') {
                    remainder = &remainder[1..];
                }
                content.push(b'\n');
            }
            _ => content.push(chr),
        }
    }

    Ok((remainder, Object::String(content, StringFormat::Literal)))
}

fn hex_string(input: &[u8]) -> ParseResult<'_, Object> {
    let (remainder, body) = nom::sequence::delimited(
        character::complete::char('<'),
        bytes::complete::take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
        character::complete::char('>'),
    )(input)?;

    let digits: Vec<u8> = body
        .iter()
        .filter_map(|&c| super::filter::hex_value(c))
        .collect();
    let content = digits
        .chunks(2)
        .map(|pair| pair[0] << 4 | pair.get(1).copied().unwrap_or(0))
        .collect();
    Ok((remainder, Object::String(content, StringFormat::Hexadecimal)))
}

fn array(input: &[u8], depth: usize) -> ParseResult<'_, Object> {
    let (mut remainder, _) = character::complete::char('[')(input)?;
    let mut items = Vec::new();
    loop {
        let (r, _) = space(remainder)?;
        if let Some(r) = r.strip_prefix(b"]") {
            return Ok((r, Object::Array(items)));
        }
        let (r, item) = nested_object(r, depth + 1)?;
        items.push(item);
        remainder = r;
    }
}

fn dictionary(input: &[u8], depth: usize) -> ParseResult<'_, Dictionary> {
    let (mut remainder, _) = bytes::complete::tag(b"<<")(input)?;
    let mut dict = Dictionary::new();
    loop {
        let (r, _) = space(remainder)?;
        if let Some(r) = r.strip_prefix(b">>") {
            return Ok((r, dict));
        }
        let (r, key) = name(r)?;
        let (r, value) = nested_object(r, depth + 1)?;
        // A null value is equivalent to an absent key.
        if value != Object::Null {
            dict.set(key, value);
        }
        remainder = r;
    }
}

fn nested_object(input: &[u8], depth: usize) -> ParseResult<'_, Object> {
    let (input, _) = space(input)?;
    if depth > MAX_NESTING {
        return failure(input, nom::error::ErrorKind::TooLarge);
    }
    match input.first() {
        Some(b'<') if input.get(1) == Some(&b'<') => dictionary(input, depth)
            .map(|(remainder, dict)| (remainder, Object::Dictionary(dict))),
        Some(b'<') => hex_string(input),
        Some(b'(') => literal_string(input),
        Some(b'[') => array(input, depth),
        Some(b'/') => combinator::map(name, Object::Name)(input),
        Some(chr) if chr.is_ascii_digit() => branch::alt((reference, number))(input),
        Some(b'+' | b'-' | b'.') => number(input),
        _ => keyword(input),
    }
}

/// Parse one direct object, skipping leading whitespace and comments.
pub(crate) fn object(input: &[u8]) -> ParseResult<'_, Object> {
    nested_object(input, 0)
}

fn stream_content<'a>(
    input: &'a [u8],
    dict: &Dictionary,
    resolve_length: &dyn Fn(ObjectId) -> Option<usize>,
) -> ParseResult<'a, Vec<u8>> {
    let (remainder, _) = bytes::complete::tag(b"stream")(input)?;
    // The keyword is followed by CRLF or LF; a lone CR is tolerated.
    let remainder = remainder
        .strip_prefix(b"\r\n")
        .or_else(|| remainder.strip_prefix(b"\n"))
        .or_else(|| remainder.strip_prefix(b"\r"))
        .unwrap_or(remainder);

    let length = match dict.get(b"Length") {
        Some(Object::Integer(length)) => usize::try_from(*length).ok(),
        Some(Object::Reference(id)) => resolve_length(*id),
        _ => None,
    };

    if let Some(content) = length.and_then(|length| remainder.get(..length)) {
        let (after, _) = space(&remainder[content.len()..])?;
        if after.starts_with(b"endstream") {
            return Ok((&after[b"endstream".len()..], content.to_vec()));
        }
    }

    // Length missing or wrong: fall back to the endstream keyword.
    let Some(end) = find(remainder, b"endstream") else {
        return failure(remainder, nom::error::ErrorKind::TakeUntil);
    };
    log::debug!("stream Length {length:?} unusable, found endstream after {end} bytes");
    let mut content = &remainder[..end];
    if let Some(c) = content.strip_suffix(b"\r\n") {
        content = c;
    } else if let Some(c) = content
        .strip_suffix(b"\n")
        .or_else(|| content.strip_suffix(b"\r"))
    {
        content = c;
    }
    Ok((&remainder[end + b"endstream".len()..], content.to_vec()))
}

/// `n g obj <object> endobj`, where the object may be a stream.
pub(crate) fn indirect_object<'a>(
    input: &'a [u8],
    resolve_length: &dyn Fn(ObjectId) -> Option<usize>,
) -> ParseResult<'a, (ObjectId, Object)> {
    let (remainder, _) = space(input)?;
    let (remainder, number) = unsigned::<u32>(remainder)?;
    let (remainder, _) = space1(remainder)?;
    let (remainder, generation) = unsigned::<u16>(remainder)?;
    let (remainder, _) = space1(remainder)?;
    let (remainder, _) = bytes::complete::tag(b"obj")(remainder)?;
    let (remainder, object) = object(remainder)?;
    let (remainder, _) = space(remainder)?;

    let (remainder, object) = match object {
        Object::Dictionary(dict) if remainder.starts_with(b"stream") => {
            let (remainder, content) = stream_content(remainder, &dict, resolve_length)?;
            (remainder, Object::Stream(Stream::new(dict, content)))
        }
        object => (remainder, object),
    };

    let (remainder, _) = space(remainder)?;
    let remainder = match remainder.strip_prefix(b"endobj") {
        Some(r) => r,
        None => {
            log::debug!("object {number} {generation} is missing endobj");
            remainder
        }
    };
    Ok((remainder, ((number, generation), object)))
}

/// Position of the first occurrence of `needle`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Position of the last occurrence of `needle`.
pub(crate) fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

/// Turn a nom failure into a [`PdfError::Parse`] with an absolute offset.
///
/// `input` is the slice the failing parser started on and `base` its offset
/// in the file.
pub(crate) fn to_pdf_error(
    input: &[u8],
    base: usize,
    err: nom::Err<nom::error::Error<&[u8]>>,
    what: &str,
) -> PdfError {
    match err {
        nom::Err::Incomplete(_) => {
            PdfError::parse(base + input.len(), format!("unexpected end of data in {what}"))
        }
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = base + input.len().saturating_sub(e.input.len());
            let found: String = e
                .input
                .iter()
                .take(16)
                .map(|&c| if c.is_ascii_graphic() || c == b' ' { c as char } else { '.' })
                .collect();
            PdfError::parse(offset, format!("malformed {what} near '{found}'"))
        }
    }
}

/// Parse a single direct object from `input`.
pub fn parse_object(input: &[u8]) -> PdfResult<Object> {
    object(input)
        .map(|(_, object)| object)
        .map_err(|err| to_pdf_error(input, 0, err, "object"))
}

/// Parse the indirect object starting at `offset` in `file`.
///
/// `resolve_length` is asked for the value of an indirect stream `Length`.
pub fn parse_indirect_object(
    file: &[u8],
    offset: usize,
    resolve_length: &dyn Fn(ObjectId) -> Option<usize>,
) -> PdfResult<(ObjectId, Object)> {
    let input = file.get(offset..).ok_or_else(|| {
        PdfError::parse(offset, format!("offset is beyond the end of the file ({} bytes)", file.len()))
    })?;
    indirect_object(input, resolve_length)
        .map(|(_, parsed)| parsed)
        .map_err(|err| to_pdf_error(input, offset, err, "indirect object"))
}
