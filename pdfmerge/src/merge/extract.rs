//! Page extraction: one page dictionary plus everything it transitively needs.

use std::collections::{HashSet, VecDeque};
use std::path::Path;

use crate::error::{MergeError, Result};
use crate::merge::cancel::CancellationToken;
use crate::pdf::{Dictionary, Document, Object, ObjectId};
use crate::range::RangeError;

/// A page ready to be copied into a merged document.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    /// Id of the page in its source document.
    pub source_id: ObjectId,
    /// Page dictionary with inherited attributes materialized and without
    /// `Parent`.
    pub dict: Dictionary,
    /// Objects reachable from the page, breadth-first, each listed once.
    /// Never contains page-tree nodes.
    pub closure: Vec<ObjectId>,
    /// Page-tree nodes the page refers to (annotation targets, `/P` back
    /// links, ...). They are not copied.
    pub page_links: Vec<ObjectId>,
    /// References to objects the source does not contain.
    pub dangling: Vec<ObjectId>,
}

/// Extract one page (1-based).
pub fn extract_page(doc: &Document, number: u32) -> std::result::Result<ExtractedPage, RangeError> {
    let page_tree: HashSet<ObjectId> = page_tree_nodes(doc);
    extract_with(doc, number, &page_tree)
}

/// Extract `indices` (1-based, in order, duplicates allowed) from `doc`.
///
/// `path` only labels errors. Cancellation is checked before every page.
pub fn extract_pages(
    doc: &Document,
    path: &Path,
    indices: &[u32],
    cancel: &CancellationToken,
) -> Result<Vec<ExtractedPage>> {
    let page_tree = page_tree_nodes(doc);
    let mut pages = Vec::with_capacity(indices.len());
    for &number in indices {
        cancel.check()?;
        let page = extract_with(doc, number, &page_tree)
            .map_err(|e| MergeError::invalid_page_range(path.to_path_buf(), e))?;
        log::trace!(
            "page {number} of {}: {} objects, {} page links, {} dangling",
            path.display(),
            page.closure.len(),
            page.page_links.len(),
            page.dangling.len()
        );
        pages.push(page);
    }
    Ok(pages)
}

/// Leaves plus every dictionary typed `/Pages`.
fn page_tree_nodes(doc: &Document) -> HashSet<ObjectId> {
    let mut nodes: HashSet<ObjectId> = doc.pages().iter().map(|page| page.id).collect();
    nodes.extend(
        doc.objects()
            .iter()
            .filter(|(_, object)| matches!(object.type_name(), Some(b"Pages" | b"Page")))
            .map(|(&id, _)| id),
    );
    nodes
}

fn extract_with(
    doc: &Document,
    number: u32,
    page_tree: &HashSet<ObjectId>,
) -> std::result::Result<ExtractedPage, RangeError> {
    let entry = doc.page(number).ok_or_else(|| RangeError::Bounds {
        expression: number.to_string(),
        page: number,
        page_count: doc.page_count(),
    })?;

    let mut dict = doc.get_dict(entry.id).cloned().unwrap_or_default();
    for (key, value) in entry.inherited.iter() {
        if !dict.has(key) {
            dict.set(key, value.clone());
        }
    }
    dict.remove(b"Parent");

    let mut page = ExtractedPage {
        source_id: entry.id,
        dict,
        closure: Vec::new(),
        page_links: Vec::new(),
        dangling: Vec::new(),
    };

    let mut seen: HashSet<ObjectId> = HashSet::new();
    let mut queue: VecDeque<ObjectId> = VecDeque::new();
    page.dict.for_each_reference(&mut |id| queue.push_back(id));

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        if page_tree.contains(&id) {
            page.page_links.push(id);
            continue;
        }
        match doc.get(id) {
            Some(object) => {
                page.closure.push(id);
                enqueue_references(object, &mut queue);
            }
            None => page.dangling.push(id),
        }
    }
    Ok(page)
}

fn enqueue_references(object: &Object, queue: &mut VecDeque<ObjectId>) {
    object.for_each_reference(&mut |id| queue.push_back(id));
}
