//! Page selection.
//!
//! Maps a symbolic selector (`F`, `L`, `A` or a 1-based number) and the
//! document page count to the concrete pages to sign.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Symbolic page selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSelector {
    /// First page
    First,
    /// Last page
    Last,
    /// Every page, in order
    All,
    /// Explicit 1-based page number
    Page(u32),
}

impl FromStr for PageSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "F" | "f" => Ok(PageSelector::First),
            "L" | "l" => Ok(PageSelector::Last),
            "A" | "a" => Ok(PageSelector::All),
            other => match other.parse::<u32>() {
                Ok(n) if n >= 1 && other.bytes().all(|b| b.is_ascii_digit()) => {
                    Ok(PageSelector::Page(n))
                },
                _ => Err(Error::InvalidRequest(format!(
                    "page must be F, L, A or a positive page number, got '{}'",
                    other
                ))),
            },
        }
    }
}

impl fmt::Display for PageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSelector::First => f.write_str("F"),
            PageSelector::Last => f.write_str("L"),
            PageSelector::All => f.write_str("A"),
            PageSelector::Page(n) => write!(f, "{}", n),
        }
    }
}

/// Concrete pages to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageTarget {
    /// One signature on one page
    Single(u32),
    /// One signature per page, `1..=total` in ascending order
    All(Vec<u32>),
}

impl PageTarget {
    /// Pages in signing order.
    pub fn pages(&self) -> &[u32] {
        match self {
            PageTarget::Single(page) => std::slice::from_ref(page),
            PageTarget::All(pages) => pages,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, PageTarget::All(_))
    }
}

impl PageSelector {
    /// Resolve against a document with `total_pages` pages.
    pub fn resolve(&self, total_pages: u32) -> Result<PageTarget> {
        let invalid = || Error::InvalidPage {
            selector: self.to_string(),
            total_pages,
        };
        if total_pages == 0 {
            return Err(invalid());
        }
        match *self {
            PageSelector::First => Ok(PageTarget::Single(1)),
            PageSelector::Last => Ok(PageTarget::Single(total_pages)),
            PageSelector::All => Ok(PageTarget::All((1..=total_pages).collect())),
            PageSelector::Page(n) if (1..=total_pages).contains(&n) => Ok(PageTarget::Single(n)),
            PageSelector::Page(_) => Err(invalid()),
        }
    }
}

/// Resolves textual page selectors.
pub struct PageResolver;

impl PageResolver {
    /// Resolve a textual selector against a page count.
    ///
    /// Unparseable selectors and pages beyond the document are both
    /// [`Error::InvalidPage`].
    pub fn resolve(selector: &str, total_pages: u32) -> Result<PageTarget> {
        let parsed = selector.parse::<PageSelector>().map_err(|_| Error::InvalidPage {
            selector: selector.to_string(),
            total_pages,
        })?;
        parsed.resolve(total_pages)
    }
}
