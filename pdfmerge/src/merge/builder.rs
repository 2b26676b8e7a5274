//! Assembles extracted pages from several sources into one fresh document.
//!
//! Object numbers are assigned from a single counter. Number 1 is reserved
//! for the flat `Pages` node and the catalog takes the last number, so a
//! finished document is numbered `1..=n` without gaps.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::error::{MergeError, Result};
use crate::merge::cancel::CancellationToken;
use crate::merge::extract::ExtractedPage;
use crate::pdf::document::version_key;
use crate::pdf::{Dictionary, Document, Object, ObjectId, PdfError};

/// Object number of the merged `Pages` node.
const PAGES_NUMBER: u32 = 1;

/// Version used when no source contributed one.
const DEFAULT_VERSION: &str = "1.4";

/// Label for errors raised while assembling the output.
const MERGED_OUTPUT: &str = "<merged output>";

/// Incrementally built merged document.
#[derive(Debug)]
pub struct MergeBuilder {
    objects: BTreeMap<ObjectId, Object>,
    kids: Vec<ObjectId>,
    next: u32,
    version: Option<String>,
}

impl Default for MergeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeBuilder {
    /// Start an empty merge.
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            kids: Vec::new(),
            next: PAGES_NUMBER + 1,
            version: None,
        }
    }

    /// Append the extracted pages of one source, in order.
    ///
    /// Objects shared between pages of the same call are copied once. Every
    /// page occurrence becomes its own page object. References to page-tree
    /// nodes resolve to the first occurrence of that page in `pages`, or to
    /// null when the page was not selected. Dangling references become null.
    ///
    /// Each call is an independent source: nothing is shared with objects
    /// added by earlier calls, even when both come from the same file.
    ///
    /// # Errors
    ///
    /// [`MergeError::Cancelled`] if `cancel` fires between pages.
    pub fn add_source(
        &mut self,
        doc: &Document,
        pages: &[ExtractedPage],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut renumber: HashMap<ObjectId, u32> = HashMap::new();
        let mut first_occurrence: HashMap<ObjectId, u32> = HashMap::new();
        let mut plan: Vec<(u32, Vec<(ObjectId, u32)>)> = Vec::with_capacity(pages.len());

        for page in pages {
            let page_number = self.allocate();
            first_occurrence.entry(page.source_id).or_insert(page_number);

            let mut fresh = Vec::new();
            for &id in &page.closure {
                if !renumber.contains_key(&id) {
                    let number = self.allocate();
                    renumber.insert(id, number);
                    fresh.push((id, number));
                }
            }
            plan.push((page_number, fresh));
        }

        let target = |id: ObjectId| {
            renumber
                .get(&id)
                .or_else(|| first_occurrence.get(&id))
                .copied()
        };

        for (page, (page_number, fresh)) in pages.iter().zip(plan) {
            cancel.check()?;

            let mut dict = page.dict.clone();
            rewrite_dictionary(&mut dict, &target);
            dict.set("Type", Object::name("Page"));
            dict.set("Parent", Object::Reference((PAGES_NUMBER, 0)));
            self.objects.insert((page_number, 0), Object::Dictionary(dict));
            self.kids.push((page_number, 0));

            for (source_id, number) in fresh {
                // Closure ids always exist in the source.
                if let Some(object) = doc.get(source_id) {
                    let mut copy = object.clone();
                    rewrite(&mut copy, &target);
                    self.objects.insert((number, 0), copy);
                }
            }
        }

        let version = doc.version();
        let newer = self
            .version
            .as_deref()
            .is_none_or(|current| version_key(version) > version_key(current));
        if newer {
            self.version = Some(version.to_string());
        }

        log::debug!(
            "added {} pages and {} shared objects from a PDF {} source",
            pages.len(),
            renumber.len(),
            version
        );
        Ok(())
    }

    /// Create the `Pages` node and catalog, check reference integrity and
    /// return the finished document.
    ///
    /// # Errors
    ///
    /// [`MergeError::ReferenceIntegrity`] if any reference has no target.
    pub fn finish(mut self) -> Result<Document> {
        let count = i64::try_from(self.kids.len()).unwrap_or(i64::MAX);
        let kids: Vec<Object> = self.kids.iter().copied().map(Object::Reference).collect();

        let mut pages = Dictionary::new();
        pages.set("Type", Object::name("Pages"));
        pages.set("Kids", kids);
        pages.set("Count", count);
        self.objects.insert((PAGES_NUMBER, 0), Object::Dictionary(pages));

        let catalog_id = (self.allocate(), 0);
        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::name("Catalog"));
        catalog.set("Pages", Object::Reference((PAGES_NUMBER, 0)));
        self.objects.insert(catalog_id, Object::Dictionary(catalog));

        let mut trailer = Dictionary::new();
        trailer.set("Root", Object::Reference(catalog_id));

        verify_references(&self.objects, &trailer)?;

        let version = self.version.unwrap_or_else(|| DEFAULT_VERSION.to_string());
        log::debug!(
            "built merged PDF {version} with {} pages and {} objects",
            self.kids.len(),
            self.objects.len()
        );
        Document::from_parts(version, self.objects, trailer).map_err(merged_output_error)
    }

    fn allocate(&mut self) -> u32 {
        let number = self.next;
        self.next += 1;
        number
    }
}

fn merged_output_error(source: PdfError) -> MergeError {
    MergeError::invalid_pdf(PathBuf::from(MERGED_OUTPUT), source)
}

/// Check that every reference held by `objects` or `trailer` has a target.
///
/// Trailer references are reported as held by object `0 0`.
///
/// # Errors
///
/// [`MergeError::ReferenceIntegrity`] naming the first violation found.
pub fn verify_references(objects: &BTreeMap<ObjectId, Object>, trailer: &Dictionary) -> Result<()> {
    let mut violation: Option<(ObjectId, ObjectId)> = None;
    let mut check = |holder: ObjectId, object: &Object| {
        object.for_each_reference(&mut |target| {
            if violation.is_none() && !objects.contains_key(&target) {
                violation = Some((holder, target));
            }
        });
    };

    for (&id, object) in objects {
        check(id, object);
    }
    for (_, value) in trailer.iter() {
        check((0, 0), value);
    }

    match violation {
        Some((object, target)) => Err(MergeError::ReferenceIntegrity { object, target }),
        None => Ok(()),
    }
}

fn rewrite(object: &mut Object, target: &impl Fn(ObjectId) -> Option<u32>) {
    match object {
        Object::Reference(id) => {
            *object = match target(*id) {
                Some(number) => Object::Reference((number, 0)),
                None => Object::Null,
            };
        }
        Object::Array(items) => items.iter_mut().for_each(|item| rewrite(item, target)),
        Object::Dictionary(dict) => rewrite_dictionary(dict, target),
        Object::Stream(stream) => rewrite_dictionary(&mut stream.dict, target),
        Object::Null
        | Object::Boolean(_)
        | Object::Integer(_)
        | Object::Real(_)
        | Object::String(..)
        | Object::Name(_) => {}
    }
}

fn rewrite_dictionary(dict: &mut Dictionary, target: &impl Fn(ObjectId) -> Option<u32>) {
    for (_, value) in dict.iter_mut() {
        rewrite(value, target);
    }
}
