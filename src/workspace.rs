//! Editing session
//!
//! A [`Workspace`] owns the working [`PageCollection`] together with the
//! source documents its pages come from. It turns user gestures (selections,
//! drops, rotate and delete requests) into collection operations and drives
//! saving. Create one per editing session; [`Workspace::clear`] resets it.

use crate::collection::{CollectionError, CollectionResult, PageCollection, Rotation, SourceId};
use crate::optimization::QualityTier;
use crate::pdf_ops::{self, PagePlacement, SaveReport, SourceDocument};
use crate::reorder::{GridLayout, Point, ReorderPlanner};
use crate::render::{self, PageRenderer, RenderSettings, RenderedPage};
use crate::workers::JobSlots;
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Viewport width assumed by scripted drops that do not give one.
pub const DEFAULT_VIEWPORT_WIDTH: f64 = 1000.0;

/// Result of adding a batch of files.
#[derive(Debug, Default)]
pub struct LoadSummary {
    /// Display name and page count of every file that was added
    pub added: Vec<(String, u32)>,
    /// Files that could not be loaded, with the reason
    pub failures: Vec<(PathBuf, String)>,
    /// Paths skipped because they are not PDFs
    pub skipped: Vec<PathBuf>,
}

impl LoadSummary {
    pub fn pages_added(&self) -> u32 {
        self.added.iter().map(|(_, count)| count).sum()
    }
}

/// One scripted editing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOp {
    Remove {
        indices: Vec<usize>,
    },
    Rotate {
        indices: Vec<usize>,
        #[serde(default = "default_clockwise")]
        clockwise: bool,
    },
    Move {
        indices: Vec<usize>,
        target: usize,
    },
    Drop {
        indices: Vec<usize>,
        x: f64,
        y: f64,
        #[serde(default = "default_viewport_width")]
        viewport_width: f64,
    },
    Reorder {
        order: Vec<usize>,
    },
}

fn default_clockwise() -> bool {
    true
}

fn default_viewport_width() -> f64 {
    DEFAULT_VIEWPORT_WIDTH
}

#[derive(Debug, Default)]
pub struct Workspace {
    pages: PageCollection,
    sources: BTreeMap<SourceId, SourceDocument>,
    next_source: usize,
    planner: ReorderPlanner,
    jobs: JobSlots,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(layout: GridLayout) -> Self {
        Self {
            planner: ReorderPlanner::new(layout),
            ..Self::default()
        }
    }

    pub fn pages(&self) -> &PageCollection {
        &self.pages
    }

    pub fn sources(&self) -> &BTreeMap<SourceId, SourceDocument> {
        &self.sources
    }

    pub fn planner(&self) -> &ReorderPlanner {
        &self.planner
    }

    /// Background job slots; at most one load and one save at a time.
    pub fn jobs(&self) -> &JobSlots {
        &self.jobs
    }

    pub fn labels(&self) -> Vec<String> {
        self.pages.labels()
    }

    /// Whether `path` looks like a PDF file, judged by its extension.
    pub fn is_pdf_path(path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
    }

    /// Register a loaded source and append all of its pages.
    pub fn add_source(&mut self, source: SourceDocument) -> SourceId {
        let id = SourceId(self.next_source);
        self.next_source += 1;
        self.pages
            .append_source(id, source.name(), source.page_count());
        log::info!("added {} ({} pages) as source {}", source.name(), source.page_count(), id);
        self.sources.insert(id, source);
        id
    }

    /// Load and append several files.
    ///
    /// Non-PDF paths are skipped. Files are parsed in parallel and appended in
    /// the order given; a file that fails to load is reported in the summary
    /// and does not stop the others.
    pub fn add_files<P: AsRef<Path> + Sync>(&mut self, paths: &[P]) -> LoadSummary {
        let mut summary = LoadSummary::default();
        let mut pdfs = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if Self::is_pdf_path(path) {
                pdfs.push(path.to_path_buf());
            } else {
                log::debug!("skipping non-PDF path {}", path.display());
                summary.skipped.push(path.to_path_buf());
            }
        }

        let loaded = crate::parallel::open_sources_parallel(&pdfs);
        for (path, result) in pdfs.into_iter().zip(loaded) {
            match result {
                Ok(source) => {
                    summary.added.push((source.name().to_string(), source.page_count()));
                    self.add_source(source);
                }
                Err(e) => {
                    log::warn!("could not load {}: {:#}", path.display(), e);
                    summary.failures.push((path, format!("{:#}", e)));
                }
            }
        }
        summary
    }

    /// Delete every selected page. Returns how many pages were removed.
    pub fn delete_selected(&mut self, selection: &[usize]) -> CollectionResult<usize> {
        let removed = self.pages.remove_many(selection)?;
        self.prune_sources();
        Ok(removed.len())
    }

    pub fn rotate_selected(&mut self, selection: &[usize], clockwise: bool) -> CollectionResult<()> {
        self.pages.rotate_many(selection, clockwise)
    }

    /// Move the selected pages as one block to `target_index`, an insertion
    /// index in the current order. Returns the applied permutation.
    pub fn move_selected(
        &mut self,
        selection: &[usize],
        target_index: usize,
    ) -> CollectionResult<Vec<usize>> {
        self.check_selection(selection)?;
        let order = crate::reorder::compute_permutation(self.pages.len(), selection, target_index);
        self.pages.reorder_to(&order)?;
        Ok(order)
    }

    /// Drop the selected pages at `pointer` on a grid `viewport_width` wide.
    /// Returns the applied permutation.
    pub fn drop_selected(
        &mut self,
        selection: &[usize],
        pointer: Point,
        viewport_width: f64,
    ) -> CollectionResult<Vec<usize>> {
        self.check_selection(selection)?;
        let order = self
            .planner
            .plan_drop(self.pages.len(), selection, pointer, viewport_width);
        self.pages.reorder_to(&order)?;
        Ok(order)
    }

    pub fn reorder(&mut self, order: &[usize]) -> CollectionResult<()> {
        self.pages.reorder_to(order)
    }

    /// Apply one scripted step.
    pub fn apply(&mut self, op: &EditOp) -> Result<()> {
        match op {
            EditOp::Remove { indices } => {
                self.delete_selected(indices)?;
            }
            EditOp::Rotate { indices, clockwise } => self.rotate_selected(indices, *clockwise)?,
            EditOp::Move { indices, target } => {
                self.move_selected(indices, *target)?;
            }
            EditOp::Drop {
                indices,
                x,
                y,
                viewport_width,
            } => {
                self.drop_selected(indices, Point::new(*x, *y), *viewport_width)?;
            }
            EditOp::Reorder { order } => self.reorder(order)?,
        }
        Ok(())
    }

    /// The current order as output placements.
    pub fn save_plan(&self) -> Result<Vec<PagePlacement>> {
        self.pages
            .iter()
            .enumerate()
            .map(|(index, page)| {
                let source = page
                    .source()
                    .filter(|id| self.sources.contains_key(id))
                    .ok_or_else(|| anyhow!("Page {} has no loaded source document", index + 1))?;
                Ok(PagePlacement {
                    source,
                    page_number: page.source_page_number(),
                    rotation: page.rotation(),
                })
            })
            .collect()
    }

    /// Write the current order to `output`.
    pub fn save<P: AsRef<Path>>(&self, output: P, quality: QualityTier) -> Result<SaveReport> {
        if self.pages.is_empty() {
            bail!("No pages to save");
        }
        let plan = self.save_plan()?;
        pdf_ops::save(&self.sources, &plan, output, quality)
    }

    /// Render every page in the current order.
    ///
    /// Pages are batched per source so each document is opened once.
    pub fn render_pages<R: PageRenderer + ?Sized>(
        &self,
        renderer: &R,
        settings: &RenderSettings,
    ) -> Vec<Result<RenderedPage>> {
        let mut slots: Vec<Option<Result<RenderedPage>>> = Vec::with_capacity(self.pages.len());
        let mut batches: BTreeMap<SourceId, (Vec<usize>, Vec<(usize, Rotation)>)> = BTreeMap::new();

        for (slot, page) in self.pages.iter().enumerate() {
            match page.source().filter(|id| self.sources.contains_key(id)) {
                Some(id) => {
                    let (targets, pages) = batches.entry(id).or_default();
                    targets.push(slot);
                    pages.push(((page.source_page_number() - 1) as usize, page.rotation()));
                    slots.push(None);
                }
                None => slots.push(Some(Err(anyhow!(
                    "{} has no loaded source document",
                    page.source_name()
                )))),
            }
        }

        for (id, (targets, pages)) in batches {
            let source = &self.sources[&id];
            let results = render::render_batch(renderer, source, &pages, settings);
            for (slot, result) in targets.into_iter().zip(results) {
                slots[slot] = Some(result);
            }
        }

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(anyhow!("page was not rendered"))))
            .collect()
    }

    /// Drop all pages and sources.
    pub fn clear(&mut self) {
        self.pages.clear();
        self.sources.clear();
        self.next_source = 0;
        log::debug!("workspace cleared");
    }

    fn check_selection(&self, selection: &[usize]) -> CollectionResult<()> {
        match selection.iter().find(|&&i| i >= self.pages.len()) {
            Some(&index) => Err(CollectionError::IndexOutOfRange {
                index,
                len: self.pages.len(),
            }),
            None => Ok(()),
        }
    }

    /// Forget sources no page refers to any more.
    fn prune_sources(&mut self) {
        let referenced: HashSet<SourceId> = self.pages.iter().filter_map(|p| p.source()).collect();
        self.sources.retain(|id, source| {
            let keep = referenced.contains(id);
            if !keep {
                log::debug!("releasing source {} ({})", id, source.name());
            }
            keep
        });
    }
}
