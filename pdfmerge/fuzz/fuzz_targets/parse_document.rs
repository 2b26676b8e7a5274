#![no_main]

use libfuzzer_sys::fuzz_target;
use pdfmerge::pdf::{Document, writer};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must be rejected with an error, never a panic or hang.
    let Ok(doc) = Document::parse(data) else {
        return;
    };

    // Anything we accept must survive a write and read back with the same pages.
    let bytes = writer::to_bytes(&doc);
    let reparsed = Document::parse(&bytes).expect("own output must parse");
    assert_eq!(reparsed.page_count(), doc.page_count());
});
