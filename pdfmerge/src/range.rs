//! Page-range selection language.
//!
//! A selector picks pages from one document, in emission order:
//!
//! - `""` or `"all"` (any case) - every page
//! - `"3"` - a single page
//! - `"2-5"` - an inclusive span
//! - `"5-2"` - a descending span (`5, 4, 3, 2`)
//! - `"1-3, 7, 3"` - terms separated by commas; order and duplicates are kept
//!
//! Parsing only checks syntax. Bounds are checked by [`PageRange::resolve`]
//! once the page count of the bound document is known.
//!
//! # Examples
//!
//! ```
//! use pdfmerge::range::PageRange;
//!
//! let range = PageRange::parse("3, 1-2").unwrap();
//! assert_eq!(range.resolve(3).unwrap(), vec![3, 1, 2]);
//!
//! let reversed = PageRange::parse("3-1").unwrap();
//! assert_eq!(reversed.resolve(3).unwrap(), vec![3, 2, 1]);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Reserved alias selecting every page.
const ALL: &str = "all";

/// Page-range failure, reported together with the offending expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// The expression does not follow the selector grammar.
    #[error("invalid page range '{expression}': {reason}")]
    Syntax {
        /// The full expression as given.
        expression: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A page index exceeds the page count of the document.
    #[error(
        "page {page} in range '{expression}' is out of bounds: document has {page_count} page(s)"
    )]
    Bounds {
        /// The full expression as given.
        expression: String,
        /// First offending page number.
        page: u32,
        /// Number of pages in the document.
        page_count: u32,
    },
}

impl RangeError {
    /// True for grammar failures.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }

    /// True for out-of-range failures.
    pub fn is_bounds(&self) -> bool {
        matches!(self, Self::Bounds { .. })
    }
}

/// One comma-separated term of a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTerm {
    /// A single page.
    Single(u32),
    /// An inclusive span; descending when `start > end`.
    Span(u32, u32),
}

impl PageTerm {
    fn pages(self) -> Box<dyn Iterator<Item = u32>> {
        match self {
            Self::Single(page) => Box::new(std::iter::once(page)),
            Self::Span(start, end) if start <= end => Box::new(start..=end),
            Self::Span(start, end) => Box::new((end..=start).rev()),
        }
    }

    fn max_page(self) -> u32 {
        match self {
            Self::Single(page) => page,
            Self::Span(start, end) => start.max(end),
        }
    }
}

impl fmt::Display for PageTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(page) => write!(f, "{page}"),
            Self::Span(start, end) => write!(f, "{start}-{end}"),
        }
    }
}

/// Parsed page selector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageRange {
    /// Every page of the document, in document order.
    #[default]
    All,
    /// Explicit terms, emitted in order.
    Terms(Vec<PageTerm>),
}

impl PageRange {
    /// Parse a selector expression.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Syntax`] for empty terms, non-numeric tokens,
    /// page zero, negative numbers and malformed separators.
    pub fn parse(expression: &str) -> Result<Self, RangeError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL) {
            return Ok(Self::All);
        }

        let syntax = |reason: String| RangeError::Syntax {
            expression: expression.to_string(),
            reason,
        };

        let mut terms = Vec::new();
        for (index, raw) in trimmed.split(',').enumerate() {
            let term = raw.trim();
            if term.is_empty() {
                return Err(syntax(format!("term {} is empty", index + 1)));
            }

            match term.split_once('-') {
                None => terms.push(PageTerm::Single(parse_page(term).map_err(syntax)?)),
                Some((start, end)) => {
                    let (start, end) = (start.trim(), end.trim());
                    if start.is_empty() {
                        return Err(syntax(format!(
                            "'{term}' has no start page (page numbers are 1-based)"
                        )));
                    }
                    if end.is_empty() {
                        return Err(syntax(format!("'{term}' has no end page")));
                    }
                    if end.contains('-') {
                        return Err(syntax(format!(
                            "'{term}' has more than one '-' separator"
                        )));
                    }
                    let start = parse_page(start).map_err(syntax)?;
                    let end = parse_page(end).map_err(syntax)?;
                    terms.push(PageTerm::Span(start, end));
                }
            }
        }

        Ok(Self::Terms(terms))
    }

    /// True if this selector picks every page in document order.
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Resolve against a document with `page_count` pages.
    ///
    /// Returns the 1-based page indices in emission order.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Bounds`] if any index exceeds `page_count`.
    pub fn resolve(&self, page_count: u32) -> Result<Vec<u32>, RangeError> {
        match self {
            Self::All => Ok((1..=page_count).collect()),
            Self::Terms(terms) => {
                if let Some(page) = terms
                    .iter()
                    .map(|term| term.max_page())
                    .find(|&page| page > page_count)
                {
                    return Err(RangeError::Bounds {
                        expression: self.to_string(),
                        page,
                        page_count,
                    });
                }
                Ok(terms.iter().flat_map(|term| term.pages()).collect())
            }
        }
    }
}

fn parse_page(token: &str) -> Result<u32, String> {
    if token.starts_with('-') || token.starts_with('+') {
        return Err(format!("'{token}' is not a positive page number"));
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{token}' is not a page number"));
    }
    let page: u32 = token
        .parse()
        .map_err(|_| format!("'{token}' is too large"))?;
    if page == 0 {
        return Err("page numbers start at 1".to_string());
    }
    Ok(page)
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL),
            Self::Terms(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{term}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for PageRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PageRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PageRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(Self::All),
            Some(expr) => Self::parse(&expr).map_err(serde::de::Error::custom),
        }
    }
}
