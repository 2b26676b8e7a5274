//! Parsed document: object arena, trailer and page list.

use std::collections::{BTreeMap, HashSet};

use super::object::{Dictionary, Object, ObjectId};
use super::parser;
use super::xref::{self, XrefEntry};
use super::{PdfError, PdfResult};

/// Page attributes that a leaf inherits from its ancestors.
pub const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page trees deeper than this are rejected.
const MAX_TREE_DEPTH: usize = 128;

/// Reference chains longer than this resolve to null.
const MAX_REFERENCE_HOPS: usize = 32;

/// How far into the file the `%PDF-` header may start.
const HEADER_SEARCH: usize = 1024;

static NULL: Object = Object::Null;

/// One leaf of the page tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry {
    /// The `Page` dictionary.
    pub id: ObjectId,
    /// Inheritable attributes the page lacks but an ancestor defines,
    /// nearest ancestor first.
    pub inherited: Dictionary,
}

/// A PDF document held entirely in memory.
#[derive(Debug, Clone)]
pub struct Document {
    version: String,
    objects: BTreeMap<ObjectId, Object>,
    trailer: Dictionary,
    pages: Vec<PageEntry>,
}

impl Document {
    /// Parse a complete PDF file.
    ///
    /// # Errors
    ///
    /// [`PdfError::Parse`] for malformed syntax, [`PdfError::Encrypted`] if
    /// the trailer carries `/Encrypt`, [`PdfError::Structure`] if the
    /// catalog or page tree is unusable.
    pub fn parse(bytes: &[u8]) -> PdfResult<Self> {
        let header_version = read_header(bytes)?;
        let xref = xref::read(bytes)?;
        if xref.trailer.has(b"Encrypt") {
            return Err(PdfError::Encrypted);
        }

        let objects = load_objects(bytes, &xref.entries)?;
        let mut doc = Self::from_parts(header_version, objects, xref.trailer)?;

        // The catalog may raise the version above the header's.
        let catalog_version = doc
            .catalog()?
            .get(b"Version")
            .and_then(Object::as_name)
            .and_then(|v| std::str::from_utf8(v).ok())
            .map(str::to_string);
        if let Some(version) = catalog_version.filter(|v| version_key(v) > version_key(&doc.version)) {
            doc.version = version;
        }

        log::debug!(
            "parsed PDF {} with {} objects and {} pages",
            doc.version,
            doc.objects.len(),
            doc.pages.len()
        );
        Ok(doc)
    }

    /// Assemble a document from its parts and derive the page list.
    ///
    /// # Errors
    ///
    /// [`PdfError::Structure`] if `trailer.Root` or the page tree is unusable.
    pub fn from_parts(
        version: impl Into<String>,
        objects: BTreeMap<ObjectId, Object>,
        trailer: Dictionary,
    ) -> PdfResult<Self> {
        let mut doc = Self {
            version: version.into(),
            objects,
            trailer,
            pages: Vec::new(),
        };
        doc.pages = doc.collect_pages()?;
        Ok(doc)
    }

    /// Header version, e.g. `"1.7"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// All objects by id.
    pub fn objects(&self) -> &BTreeMap<ObjectId, Object> {
        &self.objects
    }

    /// Trailer dictionary (merged across incremental updates).
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Object by id.
    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    /// Dictionary (or stream dictionary) by id.
    pub fn get_dict(&self, id: ObjectId) -> Option<&Dictionary> {
        self.get(id).and_then(Object::as_dict)
    }

    /// Follow references until a direct object is reached.
    ///
    /// Missing targets and over-long chains resolve to null.
    pub fn resolve<'a>(&'a self, mut object: &'a Object) -> &'a Object {
        for _ in 0..MAX_REFERENCE_HOPS {
            match object {
                Object::Reference(id) => match self.get(*id) {
                    Some(target) => object = target,
                    None => return &NULL,
                },
                direct => return direct,
            }
        }
        &NULL
    }

    /// The document catalog.
    pub fn catalog(&self) -> PdfResult<&Dictionary> {
        let root = self
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| PdfError::structure("trailer has no /Root reference"))?;
        self.get_dict(root).ok_or_else(|| {
            PdfError::structure(format!("catalog object {} {} is missing", root.0, root.1))
        })
    }

    /// Pages in document order.
    pub fn pages(&self) -> &[PageEntry] {
        &self.pages
    }

    /// Page by 1-based index.
    pub fn page(&self, number: u32) -> Option<&PageEntry> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.pages.get(index)
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        u32::try_from(self.pages.len()).unwrap_or(u32::MAX)
    }

    /// Highest object number in use (0 for an empty arena).
    pub fn max_object_number(&self) -> u32 {
        self.objects.keys().next_back().map_or(0, |id| id.0)
    }

    fn collect_pages(&self) -> PdfResult<Vec<PageEntry>> {
        let catalog = self.catalog()?;
        let root = catalog
            .get(b"Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| PdfError::structure("catalog has no /Pages reference"))?;

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        self.walk_page_tree(root, &Dictionary::new(), 0, &mut visited, &mut pages)?;

        let declared = self
            .get_dict(root)
            .and_then(|node| node.get(b"Count"))
            .and_then(Object::as_i64);
        if let Some(count) = declared.filter(|&count| usize::try_from(count).ok() != Some(pages.len())) {
            log::warn!(
                "page tree declares /Count {count} but has {} pages",
                pages.len()
            );
        }
        Ok(pages)
    }

    fn walk_page_tree(
        &self,
        node_id: ObjectId,
        inherited: &Dictionary,
        depth: usize,
        visited: &mut HashSet<ObjectId>,
        pages: &mut Vec<PageEntry>,
    ) -> PdfResult<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(PdfError::structure(format!(
                "page tree is deeper than {MAX_TREE_DEPTH} levels"
            )));
        }
        if !visited.insert(node_id) {
            return Err(PdfError::structure(format!(
                "page tree cycle through object {} {}",
                node_id.0, node_id.1
            )));
        }
        let node = self.get_dict(node_id).ok_or_else(|| {
            PdfError::structure(format!(
                "page tree node {} {} is missing or not a dictionary",
                node_id.0, node_id.1
            ))
        })?;

        let is_leaf = match node.type_name() {
            Some(b"Page") => true,
            Some(b"Pages") => false,
            None => !node.has(b"Kids"),
            Some(other) => {
                return Err(PdfError::structure(format!(
                    "page tree node {} {} has /Type /{}",
                    node_id.0,
                    node_id.1,
                    String::from_utf8_lossy(other)
                )));
            }
        };

        if is_leaf {
            let mut attributes = Dictionary::new();
            for key in INHERITABLE {
                if node.has(key) {
                    continue;
                }
                if let Some(value) = inherited.get(key) {
                    attributes.set(key, value.clone());
                }
            }
            pages.push(PageEntry {
                id: node_id,
                inherited: attributes,
            });
            return Ok(());
        }

        let mut next = inherited.clone();
        for key in INHERITABLE {
            if let Some(value) = node.get(key) {
                next.set(key, value.clone());
            }
        }

        let kids = node
            .get(b"Kids")
            .map(|kids| self.resolve(kids))
            .and_then(Object::as_array)
            .ok_or_else(|| {
                PdfError::structure(format!(
                    "pages node {} {} has no /Kids array",
                    node_id.0, node_id.1
                ))
            })?;
        for kid in kids {
            let kid_id = kid.as_reference().ok_or_else(|| {
                PdfError::structure(format!(
                    "/Kids of {} {} holds a {} instead of a reference",
                    node_id.0,
                    node_id.1,
                    kind_of(kid)
                ))
            })?;
            self.walk_page_tree(kid_id, &next, depth + 1, visited, pages)?;
        }
        Ok(())
    }
}

fn kind_of(object: &Object) -> &'static str {
    match object {
        Object::Null => "null",
        Object::Boolean(_) => "boolean",
        Object::Integer(_) | Object::Real(_) => "number",
        Object::String(..) => "string",
        Object::Name(_) => "name",
        Object::Array(_) => "array",
        Object::Dictionary(_) => "dictionary",
        Object::Stream(_) => "stream",
        Object::Reference(_) => "reference",
    }
}

/// Sort key for `"major.minor"` version strings.
pub(crate) fn version_key(version: &str) -> (u32, u32) {
    let mut parts = version.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
    (parts.next().unwrap_or(0), parts.next().unwrap_or(0))
}

fn read_header(bytes: &[u8]) -> PdfResult<String> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH)];
    let start = parser::find(window, b"%PDF-")
        .ok_or_else(|| PdfError::parse(0, "missing %PDF- header"))?;
    let version: String = bytes[start + 5..]
        .iter()
        .take_while(|c| c.is_ascii_digit() || **c == b'.')
        .map(|&c| c as char)
        .collect();
    if version.is_empty() {
        return Err(PdfError::parse(start + 5, "header has no version number"));
    }
    Ok(version)
}

fn load_objects(
    bytes: &[u8],
    entries: &BTreeMap<u32, XrefEntry>,
) -> PdfResult<BTreeMap<ObjectId, Object>> {
    let resolve_length = |id: ObjectId| match entries.get(&id.0) {
        Some(&XrefEntry::InUse { offset, generation }) if generation == id.1 => {
            parser::parse_indirect_object(bytes, offset, &|_| None)
                .ok()
                .and_then(|(_, length)| length.as_i64())
                .and_then(|length| usize::try_from(length).ok())
        }
        _ => None,
    };

    let mut objects = BTreeMap::new();
    let mut compressed: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();
    for (&number, &entry) in entries {
        match entry {
            XrefEntry::Free => {}
            XrefEntry::InUse { .. } if number == 0 => {}
            XrefEntry::InUse { offset, generation } => {
                let (id, object) = parser::parse_indirect_object(bytes, offset, &resolve_length)?;
                if id.0 != number {
                    return Err(PdfError::parse(
                        offset,
                        format!(
                            "cross-reference entry for object {number} points at object {} {}",
                            id.0, id.1
                        ),
                    ));
                }
                if id.1 != generation {
                    log::warn!(
                        "object {number} has generation {} but the cross-reference says {generation}",
                        id.1
                    );
                }
                log::trace!("object {} {} at offset {offset}", id.0, id.1);
                objects.insert(id, object);
            }
            XrefEntry::Compressed { container, index } => {
                compressed.entry(container).or_default().push((number, index));
            }
        }
    }

    for (container, wanted) in compressed {
        for (id, object) in load_object_stream(&objects, container, &wanted)? {
            objects.entry(id).or_insert(object);
        }
    }
    Ok(objects)
}

fn load_object_stream(
    objects: &BTreeMap<ObjectId, Object>,
    container: u32,
    wanted: &[(u32, u32)],
) -> PdfResult<Vec<(ObjectId, Object)>> {
    let stream = objects
        .get(&(container, 0))
        .and_then(Object::as_stream)
        .filter(|stream| stream.dict.has_type(b"ObjStm"))
        .ok_or_else(|| {
            PdfError::structure(format!("object stream {container} is missing or malformed"))
        })?;
    let count = stream.dict.get(b"N").and_then(Object::as_i64).unwrap_or(0);
    let first = stream
        .dict
        .get(b"First")
        .and_then(Object::as_i64)
        .and_then(|first| usize::try_from(first).ok())
        .ok_or_else(|| PdfError::structure(format!("object stream {container} has no /First")))?;

    let data = stream.decoded_content()?;
    let header = data.get(..first).unwrap_or(&data);
    let what = format!("object stream {container} header");
    let (_, numbers) = object_stream_header(header, count)
        .map_err(|e| parser::to_pdf_error(header, 0, e, &what))?;

    let mut loaded = Vec::with_capacity(wanted.len());
    for &(number, index) in wanted {
        let slot = numbers
            .get(index as usize)
            .filter(|(n, _)| *n == number)
            .or_else(|| numbers.iter().find(|(n, _)| *n == number));
        let Some(&(_, offset)) = slot else {
            log::warn!("object {number} is not in object stream {container}");
            continue;
        };
        let start = usize::try_from(offset)
            .ok()
            .and_then(|offset| first.checked_add(offset))
            .filter(|&start| start <= data.len())
            .ok_or_else(|| {
                PdfError::parse(
                    first,
                    format!("object {number} in object stream {container} has offset {offset} past the stream end"),
                )
            })?;
        let body = data.get(start..).unwrap_or_default();
        let what = format!("object {number} in object stream {container}");
        let (_, object) =
            parser::object(body).map_err(|e| parser::to_pdf_error(body, start, e, &what))?;
        loaded.push(((number, 0), object));
    }
    Ok(loaded)
}

fn object_stream_header(input: &[u8], count: i64) -> parser::ParseResult<'_, Vec<(u32, u64)>> {
    let mut remainder = input;
    let mut numbers = Vec::new();
    for _ in 0..count.max(0) {
        let (r, _) = parser::space(remainder)?;
        let (r, number) = nom::character::complete::u32(r)?;
        let (r, _) = parser::space(r)?;
        let (r, offset) = nom::character::complete::u64(r)?;
        numbers.push((number, offset));
        remainder = r;
    }
    Ok((remainder, numbers))
}
