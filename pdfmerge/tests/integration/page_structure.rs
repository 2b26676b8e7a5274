//! Integration tests for page-tree shapes lopdf does not produce itself:
//! nested `Pages` nodes, inherited attributes, link annotations between
//! pages, multi-stream contents, and object/xref streams.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::{Document, Object, ObjectId};
use pdfmerge::merge::{MergeInput, merge_to_bytes};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::common::{assert_pages_self_contained, assert_references_resolve, create_pdf, load, page_texts};

/// Hand-assembled PDF with explicit object numbers.
struct RawPdf {
    version: &'static str,
    objects: BTreeMap<u32, Vec<u8>>,
}

impl RawPdf {
    fn new(version: &'static str) -> Self {
        Self {
            version,
            objects: BTreeMap::new(),
        }
    }

    fn object(mut self, number: u32, body: &str) -> Self {
        self.objects.insert(number, body.as_bytes().to_vec());
        self
    }

    fn stream(mut self, number: u32, data: &str) -> Self {
        let body = format!("<< /Length {} >>\nstream\n{data}\nendstream", data.len());
        self.objects.insert(number, body.into_bytes());
        self
    }

    fn is_stream(body: &[u8]) -> bool {
        body.windows(6).any(|w| w == b"stream")
    }

    fn header(&self) -> Vec<u8> {
        format!("%PDF-{}\n", self.version).into_bytes()
    }

    fn write_object(out: &mut Vec<u8>, number: u32, body: &[u8]) {
        out.extend_from_slice(format!("{number} 0 obj\n").as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    /// Classic cross-reference table.
    fn classic(&self, root: u32) -> Vec<u8> {
        let mut out = self.header();
        let mut offsets = BTreeMap::new();
        for (&number, body) in &self.objects {
            offsets.insert(number, out.len());
            Self::write_object(&mut out, number, body);
        }

        let size = self.objects.keys().max().copied().unwrap_or(0) + 1;
        let xref_at = out.len();
        out.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
        for number in 1..size {
            let line = match offsets.get(&number) {
                Some(offset) => format!("{offset:010} 00000 n \n"),
                None => "0000000000 00000 f \n".to_string(),
            };
            out.extend_from_slice(line.as_bytes());
        }
        out.extend_from_slice(
            format!("trailer\n<< /Size {size} /Root {root} 0 R >>\nstartxref\n{xref_at}\n%%EOF\n")
                .as_bytes(),
        );
        out
    }

    /// Every non-stream object packed into one object stream, indexed by a
    /// compressed cross-reference stream.
    fn compressed(&self, root: u32) -> Vec<u8> {
        let max = self.objects.keys().max().copied().unwrap_or(0);
        let objstm = max + 1;
        let xref = max + 2;

        let packed: Vec<(u32, &Vec<u8>)> = self
            .objects
            .iter()
            .filter(|(_, body)| !Self::is_stream(body))
            .map(|(&n, body)| (n, body))
            .collect();
        let mut index = String::new();
        let mut bodies = Vec::new();
        for (number, body) in &packed {
            index.push_str(&format!("{number} {} ", bodies.len()));
            bodies.extend_from_slice(body);
            bodies.push(b'\n');
        }
        let mut objstm_data = index.clone().into_bytes();
        objstm_data.extend_from_slice(&bodies);

        let mut out = self.header();
        let mut entries: BTreeMap<u32, (u8, u32, u16)> = BTreeMap::new();
        for (&number, body) in self.objects.iter().filter(|(_, b)| Self::is_stream(b)) {
            entries.insert(number, (1, out.len() as u32, 0));
            Self::write_object(&mut out, number, body);
        }

        let compressed = deflate(&objstm_data);
        entries.insert(objstm, (1, out.len() as u32, 0));
        let mut body = format!(
            "<< /Type /ObjStm /N {} /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
            packed.len(),
            index.len(),
            compressed.len()
        )
        .into_bytes();
        body.extend_from_slice(&compressed);
        body.extend_from_slice(b"\nendstream");
        Self::write_object(&mut out, objstm, &body);

        for (slot, (number, _)) in packed.iter().enumerate() {
            entries.insert(*number, (2, objstm, slot as u16));
        }

        let xref_at = out.len();
        entries.insert(xref, (1, xref_at as u32, 0));
        let mut rows = Vec::new();
        for number in 0..=xref {
            let (kind, field2, field3) = entries.get(&number).copied().unwrap_or((0, 0, 0));
            rows.push(kind);
            rows.extend_from_slice(&field2.to_be_bytes());
            rows.extend_from_slice(&field3.to_be_bytes());
        }
        let rows = deflate(&rows);
        let mut body = format!(
            "<< /Type /XRef /Size {} /W [1 4 2] /Root {root} 0 R /Filter /FlateDecode /Length {} >>\nstream\n",
            xref + 1,
            rows.len()
        )
        .into_bytes();
        body.extend_from_slice(&rows);
        body.extend_from_slice(b"\nendstream");
        Self::write_object(&mut out, xref, &body);

        out.extend_from_slice(format!("startxref\n{xref_at}\n%%EOF\n").as_bytes());
        out
    }
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Three pages under a two-level tree.
///
/// ```text
/// 2 Pages (MediaBox, Resources 10)
/// ├── 3 Pages (Rotate 90)
/// │   ├── 4 Page  "N1"
/// │   └── 5 Page  "N2", link annotation 8 -> page 4
/// └── 9 Page  "N3", two content streams
/// ```
fn nested_pdf() -> RawPdf {
    RawPdf::new("1.5")
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            "<< /Type /Pages /Kids [3 0 R 9 0 R] /Count 3 /MediaBox [0 0 612 792] /Resources 10 0 R >>",
        )
        .object(3, "<< /Type /Pages /Parent 2 0 R /Kids [4 0 R 5 0 R] /Count 2 /Rotate 90 >>")
        .object(4, "<< /Type /Page /Parent 3 0 R /Contents 6 0 R >>")
        .object(5, "<< /Type /Page /Parent 3 0 R /Contents 7 0 R /Annots [8 0 R] >>")
        .stream(6, "BT /F1 12 Tf (N1) Tj ET")
        .stream(7, "BT /F1 12 Tf (N2) Tj ET")
        .object(8, "<< /Type /Annot /Subtype /Link /Rect [0 0 10 10] /Dest [4 0 R /Fit] >>")
        .object(9, "<< /Type /Page /Parent 2 0 R /Contents [11 0 R 13 0 R] >>")
        .object(10, "<< /Font << /F1 12 0 R >> >>")
        .stream(11, "BT /F1 12 Tf")
        .object(12, "<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>")
        .stream(13, "(N3) Tj ET")
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap(),
        other => other,
    }
}

/// Target of the first link annotation on `page`, `None` if it is null.
fn link_target(doc: &Document, page: ObjectId) -> Option<ObjectId> {
    let page = doc.get_dictionary(page).unwrap();
    let annots = resolve(doc, page.get(b"Annots").unwrap());
    let Object::Array(annots) = annots else {
        panic!("Annots should be an array");
    };
    let Object::Dictionary(annot) = resolve(doc, &annots[0]) else {
        panic!("annotation should be a dictionary");
    };
    let Object::Array(dest) = resolve(doc, annot.get(b"Dest").unwrap()) else {
        panic!("Dest should be an array");
    };
    match &dest[0] {
        Object::Reference(id) => Some(*id),
        Object::Null => None,
        _ => panic!("Dest should start with a page reference or null"),
    }
}

#[tokio::test]
async fn test_nested_tree_flattened_with_inherited_attributes() {
    let temp_dir = TempDir::new().unwrap();
    let nested = write(temp_dir.path(), "nested.pdf", &nested_pdf().classic(1));

    let (bytes, stats) = merge_to_bytes(vec![MergeInput::all(&nested), MergeInput::all(&nested)])
        .await
        .unwrap();

    assert_eq!(stats.total_pages, 6);
    assert_eq!(page_texts(&bytes), vec!["N1", "N2", "N3", "N1", "N2", "N3"]);
    assert_references_resolve(&bytes);
    assert_pages_self_contained(&bytes);

    let doc = load(&bytes);
    let pages = doc.get_pages();
    for (number, rotate) in [(1, Some(90)), (2, Some(90)), (3, None)] {
        let page = doc.get_dictionary(pages[&number]).unwrap();
        match rotate {
            Some(degrees) => assert!(
                matches!(page.get(b"Rotate"), Ok(Object::Integer(d)) if *d == degrees),
                "page {number} should be rotated by {degrees}"
            ),
            None => assert!(!page.has(b"Rotate"), "page {number} should not be rotated"),
        }
    }
}

#[tokio::test]
async fn test_link_to_selected_page_is_relinked() {
    let temp_dir = TempDir::new().unwrap();
    let nested = write(temp_dir.path(), "nested.pdf", &nested_pdf().classic(1));

    let (bytes, _) = merge_to_bytes(vec![MergeInput::new(&nested, "2,1").unwrap()])
        .await
        .unwrap();

    let doc = load(&bytes);
    let pages = doc.get_pages();
    assert_eq!(page_texts(&bytes), vec!["N2", "N1"]);
    assert_eq!(link_target(&doc, pages[&1]), Some(pages[&2]));
}

#[tokio::test]
async fn test_link_to_unselected_page_becomes_null() {
    let temp_dir = TempDir::new().unwrap();
    let nested = write(temp_dir.path(), "nested.pdf", &nested_pdf().classic(1));

    let (bytes, _) = merge_to_bytes(vec![MergeInput::new(&nested, "2").unwrap()])
        .await
        .unwrap();

    let doc = load(&bytes);
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 1);
    assert_eq!(link_target(&doc, pages[&1]), None);
    assert_references_resolve(&bytes);
}

#[tokio::test]
async fn test_object_stream_input() {
    let temp_dir = TempDir::new().unwrap();
    let packed = write(temp_dir.path(), "packed.pdf", &nested_pdf().compressed(1));
    let plain = create_pdf(temp_dir.path(), "plain.pdf", "P", 1);

    let (bytes, _) = merge_to_bytes(vec![
        MergeInput::new(&packed, "3-1").unwrap(),
        MergeInput::all(&plain),
    ])
    .await
    .unwrap();

    assert_eq!(page_texts(&bytes), vec!["N3", "N2", "N1", "P1"]);
    assert_references_resolve(&bytes);
    assert_pages_self_contained(&bytes);
}

#[tokio::test]
async fn test_missing_object_reference_is_nulled() {
    let temp_dir = TempDir::new().unwrap();
    let broken = RawPdf::new("1.4")
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 100 100] /Resources << >> >>",
        )
        .object(3, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Thumb 40 0 R >>")
        .stream(4, "(B1) Tj");
    let path = write(temp_dir.path(), "broken.pdf", &broken.classic(1));

    let (bytes, _) = merge_to_bytes(vec![MergeInput::all(&path), MergeInput::all(&path)])
        .await
        .unwrap();

    assert_eq!(page_texts(&bytes), vec!["B1", "B1"]);
    assert_references_resolve(&bytes);
    let doc = load(&bytes);
    let page = doc.get_dictionary(doc.get_pages()[&1]).unwrap();
    assert!(matches!(page.get(b"Thumb"), Ok(Object::Null) | Err(_)));
}
