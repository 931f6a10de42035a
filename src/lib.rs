//! # pdfarrange
//!
//! A library for combining pages from several PDF files into one document.
//! It provides:
//!
//! - **Page collection**: an ordered list of pages that remember their source
//!   file, page number and rotation
//! - **Drag-and-drop reordering**: turn a pointer position on a thumbnail grid
//!   into a block move of the selected pages
//! - **Export**: write the arranged pages to a new PDF, with optional JPEG
//!   re-encoding chosen by a quality tier
//! - **Background jobs**: load and save on worker threads, one of each at a time
//! - **Rendering**: page thumbnails behind a pluggable renderer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfarrange::optimization::QualityTier;
//! use pdfarrange::workspace::Workspace;
//!
//! let mut workspace = Workspace::new();
//! let summary = workspace.add_files(&["first.pdf", "second.pdf"]);
//! println!("added {} pages", summary.pages_added());
//!
//! // Move the last page to the front and turn it upright.
//! let last = workspace.pages().len() - 1;
//! workspace.move_selected(&[last], 0).expect("valid selection");
//! workspace.rotate_selected(&[0], true).expect("valid selection");
//!
//! workspace
//!     .save("arranged.pdf", QualityTier::Standard)
//!     .expect("Failed to save");
//! ```
//!
//! ## Modules
//!
//! - [`collection`]: the ordered page list and its edit operations
//! - [`reorder`]: drop-target detection and block-move permutations
//! - [`workspace`]: an editing session tying pages to loaded sources
//! - [`pdf_ops`]: loading source PDFs and exporting the arranged result
//! - [`optimization`]: quality tiers and their re-encoding settings
//! - [`imaging`]: JPEG re-encoding of embedded images
//! - [`parallel`]: parallel loading of many files
//! - [`render`]: page rasterization for thumbnails and previews
//! - [`workers`]: background load and save jobs
//!
//! ## Examples
//!
//! ### Reordering without a document
//!
//! ```rust
//! use pdfarrange::collection::PageCollection;
//! use pdfarrange::reorder::compute_permutation;
//!
//! let mut pages = PageCollection::new();
//! pages.append("report.pdf", 4);
//!
//! // Drag pages 1 and 2 to the end.
//! let order = compute_permutation(pages.len(), &[0, 1], 4);
//! assert_eq!(order, vec![2, 3, 0, 1]);
//! pages.reorder_to(&order).unwrap();
//! assert_eq!(pages.label(0).unwrap(), "report.pdf\n3");
//! ```
//!
//! ### Merging whole files
//!
//! ```rust,no_run
//! use pdfarrange::optimization::QualityTier;
//! use pdfarrange::pdf_ops;
//! use std::path::Path;
//!
//! pdf_ops::merge_pdfs(
//!     &["file1.pdf", "file2.pdf"],
//!     Path::new("merged.pdf"),
//!     QualityTier::High,
//! ).expect("Failed to merge");
//! ```

pub mod collection;
pub mod imaging;
pub mod optimization;
pub mod parallel;
pub mod pdf_ops;
pub mod render;
pub mod reorder;
pub mod workers;
pub mod workspace;

pub use collection::{PageCollection, PageRef, Rotation, SourceId};
pub use optimization::QualityTier;
pub use workspace::Workspace;
