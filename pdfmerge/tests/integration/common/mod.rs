//! Shared fixtures for the integration tests.
//!
//! Fixtures are produced with `lopdf`, an independent PDF writer, and merged
//! output is checked with its reader, so both sides of every test exercise
//! a second implementation.

#![allow(dead_code)]

use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// A generated test PDF.
///
/// Page `n` draws the text `{label}{n}`. `MediaBox` and `Resources` live on
/// the `Pages` node so every page inherits them.
pub struct Fixture {
    label: String,
    pages: u32,
    version: String,
    compressed: bool,
    encrypted: bool,
}

impl Fixture {
    pub fn new(label: &str, pages: u32) -> Self {
        Self {
            label: label.to_string(),
            pages,
            version: "1.5".to_string(),
            compressed: false,
            encrypted: false,
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Flate-compress every stream.
    pub fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }

    /// Add an `/Encrypt` entry to the trailer.
    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut doc = Document::with_version(self.version.as_str());

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
        });
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for n in 1..=self.pages {
            let text = format!("BT /F1 12 Tf 72 720 Td ({}{n}) Tj ET", self.label);
            let content_id = doc.add_object(Stream::new(dictionary! {}, text.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(i64::from(self.pages)),
                "Resources" => Object::Reference(resources_id),
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        if self.encrypted {
            let encrypt_id = doc.add_object(dictionary! {
                "Filter" => "Standard",
                "V" => Object::Integer(1),
            });
            doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
        }
        if self.compressed {
            doc.compress();
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("Failed to serialize fixture");
        bytes
    }

    /// Write the fixture as `dir/name` and return its path.
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.to_bytes()).expect("Failed to write fixture");
        path
    }
}

/// Write a plain fixture with `pages` pages labelled `label`.
pub fn create_pdf(dir: &Path, name: &str, label: &str, pages: u32) -> PathBuf {
    Fixture::new(label, pages).write(dir, name)
}

/// Load merged output with lopdf.
pub fn load(bytes: &[u8]) -> Document {
    Document::load_mem(bytes).expect("lopdf failed to read merged output")
}

/// Text drawn on each page, in page order.
pub fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = load(bytes);
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let content = doc
                .get_page_content(page_id)
                .expect("page content should decode");
            shown_text(&content)
        })
        .collect()
}

fn shown_text(content: &[u8]) -> String {
    let start = content.iter().position(|&b| b == b'(');
    let end = content.iter().rposition(|&b| b == b')');
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            String::from_utf8_lossy(&content[start + 1..end]).into_owned()
        }
        _ => String::new(),
    }
}

/// Panic unless every reference in the document resolves.
pub fn assert_references_resolve(bytes: &[u8]) {
    let doc = load(bytes);
    let mut targets = BTreeSet::new();
    for object in doc.objects.values() {
        collect_references(object, &mut targets);
    }
    for (_, value) in doc.trailer.iter() {
        collect_references(value, &mut targets);
    }

    for target in targets {
        assert!(
            doc.objects.contains_key(&target),
            "dangling reference to {} {} R",
            target.0,
            target.1
        );
    }
}

fn collect_references(object: &Object, targets: &mut BTreeSet<ObjectId>) {
    match object {
        Object::Reference(id) => {
            targets.insert(*id);
        }
        Object::Array(items) => items.iter().for_each(|item| collect_references(item, targets)),
        Object::Dictionary(dict) => dict.iter().for_each(|(_, v)| collect_references(v, targets)),
        Object::Stream(stream) => stream
            .dict
            .iter()
            .for_each(|(_, v)| collect_references(v, targets)),
        _ => {}
    }
}

/// Panic unless every page carries `MediaBox` and `Resources` itself.
pub fn assert_pages_self_contained(bytes: &[u8]) {
    let doc = load(bytes);
    for (number, page_id) in doc.get_pages() {
        let page = doc
            .get_dictionary(page_id)
            .expect("page should be a dictionary");
        assert!(page.has(b"MediaBox"), "page {number} lost its MediaBox");
        assert!(page.has(b"Resources"), "page {number} lost its Resources");
    }
}
