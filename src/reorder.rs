//! Drag-and-drop reorder planning
//!
//! Turns a drop gesture (the selected page indices plus the pointer position
//! over the thumbnail grid) into a permutation that can be handed to
//! [`PageCollection::reorder_to`](crate::collection::PageCollection::reorder_to).
//! Everything here is pure: the functions work on snapshots and never touch
//! the collection itself.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned cell rectangle; containment is half-open on the right and
/// bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropStrategy {
    Before,
    After,
}

/// Where a drop lands relative to an existing cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTarget {
    pub position_index: usize,
    pub strategy: DropStrategy,
}

impl DropTarget {
    /// Index in the current order at which the dropped pages are inserted.
    pub fn insertion_index(&self) -> usize {
        match self.strategy {
            DropStrategy::Before => self.position_index,
            DropStrategy::After => self.position_index + 1,
        }
    }
}

/// Resolve the pointer position against the cell rectangles.
///
/// `cell_rects` must follow the current collection order. A pointer over the
/// right half of a cell (strictly past its midpoint) drops after that cell;
/// anywhere else on the cell drops before it. A pointer below the top of the
/// last cell that hits no cell appends; any other empty space inserts at the
/// front.
pub fn drop_target(cell_rects: &[Rect], pointer: Point) -> DropTarget {
    if let Some((index, rect)) = cell_rects
        .iter()
        .enumerate()
        .find(|(_, rect)| rect.contains(pointer))
    {
        let strategy = if pointer.x > rect.center_x() {
            DropStrategy::After
        } else {
            DropStrategy::Before
        };
        return DropTarget {
            position_index: index,
            strategy,
        };
    }

    match cell_rects.last() {
        Some(last) if pointer.y > last.y => DropTarget {
            position_index: cell_rects.len() - 1,
            strategy: DropStrategy::After,
        },
        _ => DropTarget {
            position_index: 0,
            strategy: DropStrategy::Before,
        },
    }
}

/// Insertion index for a drop at `pointer`, in `0..=cell_rects.len()`.
pub fn compute_target_index(cell_rects: &[Rect], pointer: Point) -> usize {
    drop_target(cell_rects, pointer).insertion_index()
}

/// Build the permutation that moves `moving_indices` to `target_index`.
///
/// The moving pages keep their relative order and are inserted as one block.
/// `target_index` refers to positions before the move, so it is shifted down
/// by the number of moving pages that sit in front of it. Indices outside
/// `0..current_len` are ignored and duplicates count once; with nothing to
/// move the identity is returned.
///
/// # Example
///
/// ```rust
/// use pdfarrange::reorder::compute_permutation;
///
/// // Move the first page in front of the third one.
/// assert_eq!(compute_permutation(3, &[0], 2), vec![1, 0, 2]);
/// ```
pub fn compute_permutation(
    current_len: usize,
    moving_indices: &[usize],
    target_index: usize,
) -> Vec<usize> {
    let moving_set: BTreeSet<usize> = moving_indices
        .iter()
        .copied()
        .filter(|&i| i < current_len)
        .collect();

    let moving: Vec<usize> = moving_set.iter().copied().collect();
    let mut order: Vec<usize> = (0..current_len)
        .filter(|i| !moving_set.contains(i))
        .collect();

    let ahead = moving.iter().filter(|&&i| i < target_index).count();
    let insert_pos = target_index.saturating_sub(ahead).min(order.len());

    order.splice(insert_pos..insert_pos, moving);
    order
}

/// Thumbnail grid geometry used to lay out page cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub cell_width: f64,
    pub cell_height: f64,
    pub spacing: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            cell_width: 160.0,
            cell_height: 220.0,
            spacing: 10.0,
        }
    }
}

impl GridLayout {
    /// Number of columns that fit into `viewport_width`, at least one.
    pub fn columns(&self, viewport_width: f64) -> usize {
        let stride = self.cell_width + self.spacing;
        if stride <= 0.0 {
            return 1;
        }
        let fit = ((viewport_width - self.spacing) / stride).floor();
        if fit.is_finite() && fit >= 1.0 {
            fit as usize
        } else {
            1
        }
    }

    /// Rectangles of `count` cells laid out row by row.
    pub fn cell_rects(&self, count: usize, viewport_width: f64) -> Vec<Rect> {
        let columns = self.columns(viewport_width);
        (0..count)
            .map(|i| {
                let column = (i % columns) as f64;
                let row = (i / columns) as f64;
                Rect::new(
                    self.spacing + column * (self.cell_width + self.spacing),
                    self.spacing + row * (self.cell_height + self.spacing),
                    self.cell_width,
                    self.cell_height,
                )
            })
            .collect()
    }
}

/// Plans drops against a fixed grid layout.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReorderPlanner {
    layout: GridLayout,
}

impl ReorderPlanner {
    pub fn new(layout: GridLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Permutation for dropping `selection` at `pointer` in a grid of
    /// `current_len` cells, `viewport_width` wide.
    pub fn plan_drop(
        &self,
        current_len: usize,
        selection: &[usize],
        pointer: Point,
        viewport_width: f64,
    ) -> Vec<usize> {
        let rects = self.layout.cell_rects(current_len, viewport_width);
        let target = compute_target_index(&rects, pointer);
        log::debug!(
            "drop of {} page(s) at ({}, {}) resolves to index {}",
            selection.len(),
            pointer.x,
            pointer.y,
            target
        );
        compute_permutation(current_len, selection, target)
    }
}
