#![no_main]

use libfuzzer_sys::fuzz_target;
use pdfmerge::range::PageRange;

fuzz_target!(|data: (&str, u16)| {
    let (expression, page_count) = data;
    let Ok(range) = PageRange::parse(expression) else {
        return;
    };

    // The canonical form parses back to the same selector.
    let canonical = range.to_string();
    assert_eq!(PageRange::parse(&canonical).as_ref(), Ok(&range));

    if let Ok(pages) = range.resolve(u32::from(page_count)) {
        assert!(pages.iter().all(|&p| p >= 1 && p <= u32::from(page_count)));
    }
});
