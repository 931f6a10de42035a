//! Ordered page collection with per-page provenance
//!
//! A [`PageCollection`] is the working document: an ordered list of
//! [`PageRef`] entries, each remembering which source file it came from and
//! which page of that file it was. The collection order is the order that is
//! written out on save.
//!
//! Every mutating operation either succeeds completely or fails with a
//! [`CollectionError`] and leaves the collection untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Source names longer than this many characters are shortened in labels.
pub const DISPLAY_NAME_LIMIT: usize = 15;

/// Errors raised by [`PageCollection`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error("page index {index} out of range (collection has {len} pages)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("invalid permutation: {0}")]
    InvalidPermutation(String),
}

pub type CollectionResult<T> = std::result::Result<T, CollectionError>;

/// Identifier of a loaded source document inside a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub usize);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Page rotation in clockwise quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    /// Normalize an arbitrary angle into `[0, 360)`.
    ///
    /// Returns `None` when the angle is not a multiple of 90 degrees.
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::R0),
            90 => Some(Rotation::R90),
            180 => Some(Rotation::R180),
            270 => Some(Rotation::R270),
            _ => None,
        }
    }

    /// The rotation after one quarter turn in the given direction.
    pub fn rotated(self, clockwise: bool) -> Self {
        let step: i64 = if clockwise { 90 } else { -90 };
        // Always a multiple of 90, so normalization cannot fail.
        Rotation::from_degrees(self.degrees() as i64 + step).unwrap_or_default()
    }
}

impl TryFrom<i64> for Rotation {
    type Error = String;

    fn try_from(degrees: i64) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
            .ok_or_else(|| format!("rotation must be a multiple of 90 degrees, got {}", degrees))
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> u32 {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// One page of the working document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    source: Option<SourceId>,
    source_name: String,
    source_page_number: u32,
    rotation: Rotation,
}

impl PageRef {
    /// Loaded source this page belongs to, if it was added through a workspace.
    pub fn source(&self) -> Option<SourceId> {
        self.source
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// 1-based page number inside the originating source.
    pub fn source_page_number(&self) -> u32 {
        self.source_page_number
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Source name shortened for display; the stored name is left as is.
    pub fn display_name(&self) -> String {
        truncate_name(&self.source_name)
    }

    pub fn label(&self) -> String {
        format!("{}\n{}", self.display_name(), self.source_page_number)
    }
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() > DISPLAY_NAME_LIMIT {
        let head: String = name.chars().take(DISPLAY_NAME_LIMIT).collect();
        format!("{}...", head)
    } else {
        name.to_string()
    }
}

/// The ordered list of pages that make up the working document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCollection {
    pages: Vec<PageRef>,
}

impl PageCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PageRef> {
        self.pages.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PageRef> {
        self.pages.iter()
    }

    /// Drop every page, returning the collection to its initial empty state.
    pub fn clear(&mut self) {
        self.pages.clear();
    }

    /// Append `page_count` pages of `source_name`, numbered `1..=page_count`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pdfarrange::collection::PageCollection;
    ///
    /// let mut pages = PageCollection::new();
    /// pages.append("a.pdf", 2);
    /// assert_eq!(pages.label(1).unwrap(), "a.pdf\n2");
    /// ```
    pub fn append(&mut self, source_name: &str, page_count: u32) {
        self.push_pages(None, source_name, page_count);
    }

    /// Like [`append`](Self::append), but records the loaded source the pages
    /// belong to so they can be exported later.
    pub fn append_source(&mut self, source: SourceId, source_name: &str, page_count: u32) {
        self.push_pages(Some(source), source_name, page_count);
    }

    fn push_pages(&mut self, source: Option<SourceId>, source_name: &str, page_count: u32) {
        self.pages.extend((1..=page_count).map(|number| PageRef {
            source,
            source_name: source_name.to_string(),
            source_page_number: number,
            rotation: Rotation::R0,
        }));
    }

    /// Remove the page at `index`; later pages shift down by one.
    pub fn remove_at(&mut self, index: usize) -> CollectionResult<PageRef> {
        self.check_index(index)?;
        Ok(self.pages.remove(index))
    }

    /// Remove every page in `indices`. Duplicates are ignored.
    ///
    /// All indices are validated before anything is removed.
    pub fn remove_many(&mut self, indices: &[usize]) -> CollectionResult<Vec<PageRef>> {
        for &index in indices {
            self.check_index(index)?;
        }
        let mut sorted = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();

        let mut removed: Vec<PageRef> = sorted.into_iter().map(|i| self.pages.remove(i)).collect();
        removed.reverse();
        Ok(removed)
    }

    /// Turn the page at `index` a quarter turn. Order is unchanged.
    pub fn rotate(&mut self, index: usize, clockwise: bool) -> CollectionResult<Rotation> {
        self.check_index(index)?;
        let page = &mut self.pages[index];
        page.rotation = page.rotation.rotated(clockwise);
        Ok(page.rotation)
    }

    /// Rotate every page in `indices` once, ignoring duplicates.
    pub fn rotate_many(&mut self, indices: &[usize], clockwise: bool) -> CollectionResult<()> {
        for &index in indices {
            self.check_index(index)?;
        }
        let mut unique = indices.to_vec();
        unique.sort_unstable();
        unique.dedup();
        for index in unique {
            let page = &mut self.pages[index];
            page.rotation = page.rotation.rotated(clockwise);
        }
        Ok(())
    }

    /// Display label `"{name}\n{page number}"` for the page at `index`.
    pub fn label(&self, index: usize) -> CollectionResult<String> {
        self.check_index(index)?;
        Ok(self.pages[index].label())
    }

    /// Label for `index`, or a positional placeholder when no page is tracked
    /// there.
    pub fn label_or_placeholder(&self, index: usize) -> String {
        self.pages
            .get(index)
            .map(PageRef::label)
            .unwrap_or_else(|| format!("Page {}", index + 1))
    }

    pub fn labels(&self) -> Vec<String> {
        self.pages.iter().map(PageRef::label).collect()
    }

    /// Replace the current order with `new_order`, a permutation of the
    /// current indices. Position `i` of the result holds the page that was at
    /// `new_order[i]`.
    pub fn reorder_to(&mut self, new_order: &[usize]) -> CollectionResult<()> {
        let len = self.pages.len();
        if new_order.len() != len {
            return Err(CollectionError::InvalidPermutation(format!(
                "expected {} indices, got {}",
                len,
                new_order.len()
            )));
        }

        let mut seen = vec![false; len];
        for &index in new_order {
            if index >= len {
                return Err(CollectionError::InvalidPermutation(format!(
                    "index {} out of range for {} pages",
                    index, len
                )));
            }
            if seen[index] {
                return Err(CollectionError::InvalidPermutation(format!(
                    "index {} appears more than once",
                    index
                )));
            }
            seen[index] = true;
        }

        let mut slots: Vec<Option<PageRef>> = self.pages.drain(..).map(Some).collect();
        self.pages = new_order
            .iter()
            .filter_map(|&index| slots[index].take())
            .collect();
        Ok(())
    }

    fn check_index(&self, index: usize) -> CollectionResult<()> {
        if index < self.pages.len() {
            Ok(())
        } else {
            Err(CollectionError::IndexOutOfRange {
                index,
                len: self.pages.len(),
            })
        }
    }
}

impl<'a> IntoIterator for &'a PageCollection {
    type Item = &'a PageRef;
    type IntoIter = std::slice::Iter<'a, PageRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter()
    }
}
