//! PDF document I/O
//!
//! This module loads source documents and writes an arranged list of pages
//! back out as a new PDF, including per-page rotation and optional image
//! re-encoding according to a [`QualityTier`].

use crate::collection::{Rotation, SourceId};
use crate::imaging;
use crate::optimization::QualityTier;
use anyhow::{anyhow, bail, Context, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed, cyclic page trees.
const MAX_TREE_DEPTH: usize = 64;

/// A loaded source PDF.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    path: Option<PathBuf>,
    name: String,
    document: Document,
    bytes: Arc<[u8]>,
    page_count: u32,
}

impl SourceDocument {
    /// Load a PDF from disk.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, is encrypted, or has no
    /// pages.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to load PDF: {}", path.display()))?;
        let document = Document::load_mem(&bytes)
            .with_context(|| format!("Failed to load PDF: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_document(Some(path.to_path_buf()), name, document, bytes.into())
    }

    /// Load a PDF from memory under the given display name.
    pub fn from_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        let document =
            Document::load_mem(bytes).with_context(|| format!("Failed to parse PDF: {}", name))?;
        Self::from_document(None, name.to_string(), document, bytes.into())
    }

    fn from_document(
        path: Option<PathBuf>,
        name: String,
        document: Document,
        bytes: Arc<[u8]>,
    ) -> Result<Self> {
        if document.is_encrypted() {
            bail!("{} is encrypted; encrypted PDFs are not supported", name);
        }
        let page_count = document.get_pages().len() as u32;
        if page_count == 0 {
            bail!("No pages found in {}", name);
        }
        Ok(Self {
            path,
            name,
            document,
            bytes,
            page_count,
        })
    }

    /// Display name, the file name component of the path.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Media box size in points and own `/Rotate` of a 1-based page, with
    /// inherited attributes taken into account.
    pub fn page_geometry(&self, page_number: u32) -> Option<((f64, f64), Rotation)> {
        let page_id = *self.document.get_pages().get(&page_number)?;
        let page = resolve_page(&self.document, page_id).ok()?;

        let rotation = page
            .get(b"Rotate")
            .and_then(Object::as_i64)
            .ok()
            .and_then(Rotation::from_degrees)
            .unwrap_or_default();
        let bounds: Vec<f64> = page
            .get(b"MediaBox")
            .and_then(Object::as_array)
            .ok()?
            .iter()
            .filter_map(number)
            .collect();
        if bounds.len() != 4 {
            return None;
        }
        let size = ((bounds[2] - bounds[0]).abs(), (bounds[3] - bounds[1]).abs());
        Some((size, rotation))
    }

    /// The file exactly as it was read. Shared between clones.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// One output page: which source page to take and how much to rotate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlacement {
    pub source: SourceId,
    /// 1-based page number inside the source
    pub page_number: u32,
    /// Rotation added on top of the page's own `/Rotate`
    pub rotation: Rotation,
}

/// Summary of a completed save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub pages: usize,
    pub images_recompressed: usize,
    /// Non-fatal problems, e.g. images that could not be re-encoded
    pub warning: Option<String>,
}

/// Build a new document from `plan`.
///
/// Pages are copied together with everything they reference. Inherited page
/// attributes are resolved onto each page, outlines are dropped, and every
/// page gets `/Rotate` set to its own rotation plus the placement rotation.
///
/// # Arguments
///
/// * `sources` - Loaded source documents by id
/// * `plan` - Output pages in order
/// * `quality` - Image re-encoding preset
///
/// # Errors
///
/// This function will return an error if:
/// - `plan` is empty
/// - A placement names an unknown source or a page number out of range
/// - A source page tree is malformed
pub fn export(
    sources: &BTreeMap<SourceId, SourceDocument>,
    plan: &[PagePlacement],
    quality: QualityTier,
) -> Result<(Document, SaveReport)> {
    if plan.is_empty() {
        bail!("No pages to export");
    }
    for (i, placement) in plan.iter().enumerate() {
        let source = sources.get(&placement.source).ok_or_else(|| {
            anyhow!("Placement {} refers to unknown source {}", i, placement.source)
        })?;
        if placement.page_number == 0 || placement.page_number > source.page_count() {
            bail!(
                "Placement {} has invalid page number {} ({} has {} pages)",
                i,
                placement.page_number,
                source.name(),
                source.page_count()
            );
        }
    }

    let used: BTreeSet<SourceId> = plan.iter().map(|p| p.source).collect();
    let version = used
        .iter()
        .map(|id| sources[id].document.version.clone())
        .max()
        .unwrap_or_else(|| "1.5".to_string());

    let mut document = Document::with_version(version);
    let mut max_id = 1;
    let mut page_tables: HashMap<SourceId, Vec<(ObjectId, Dictionary)>> = HashMap::new();

    for id in &used {
        let mut doc = sources[id].document.clone();
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let pages = doc
            .get_pages()
            .into_values()
            .map(|page_id| Ok((page_id, resolve_page(&doc, page_id)?)))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Malformed page tree in {}", sources[id].name()))?;
        page_tables.insert(*id, pages);

        for (object_id, object) in doc.objects.into_iter() {
            match object.type_name().unwrap_or(b"") {
                // Rebuilt below from the selected pages.
                b"Catalog" | b"Pages" | b"Page" => {}
                b"Outlines" | b"Outline" => {}
                _ => {
                    document.objects.insert(object_id, object);
                }
            }
        }
    }

    let pages_id = (max_id, 0);
    max_id += 1;

    let mut kids = Vec::with_capacity(plan.len());
    let mut placed: HashSet<ObjectId> = HashSet::new();
    for placement in plan {
        let (page_id, page) = &page_tables[&placement.source][(placement.page_number - 1) as usize];
        let mut page = page.clone();
        page.set("Parent", pages_id);

        let own = page
            .get(b"Rotate")
            .and_then(Object::as_i64)
            .ok()
            .and_then(Rotation::from_degrees)
            .unwrap_or_default();
        let total = Rotation::from_degrees(own.degrees() as i64 + placement.rotation.degrees() as i64)
            .unwrap_or_default();
        page.set("Rotate", total.degrees() as i64);

        // The same source page placed twice needs a second object.
        let target_id = if placed.insert(*page_id) {
            *page_id
        } else {
            let id = (max_id, 0);
            max_id += 1;
            id
        };
        document.objects.insert(target_id, Object::Dictionary(page));
        kids.push(Object::Reference(target_id));
    }

    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => plan.len() as i64,
        }),
    );
    let catalog_id = (max_id, 0);
    document.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }),
    );
    document.trailer.set("Root", catalog_id);
    document.max_id = max_id;

    document.renumber_objects();
    document.prune_objects();

    let settings = quality.settings();
    let stats = imaging::recompress_images(&mut document, &settings);
    if settings.compress_streams {
        document.compress();
    }

    let warning = if stats.failures.is_empty() {
        None
    } else {
        Some(format!(
            "{} image(s) could not be re-encoded and were kept as is",
            stats.failures.len()
        ))
    };
    let report = SaveReport {
        pages: plan.len(),
        images_recompressed: stats.recompressed,
        warning,
    };
    Ok((document, report))
}

/// Export `plan` and write it to `output`.
///
/// # Example
///
/// ```rust,no_run
/// use pdfarrange::collection::{Rotation, SourceId};
/// use pdfarrange::optimization::QualityTier;
/// use pdfarrange::pdf_ops::{self, PagePlacement, SourceDocument};
/// use std::collections::BTreeMap;
///
/// let mut sources = BTreeMap::new();
/// sources.insert(SourceId(0), SourceDocument::open("input.pdf").unwrap());
/// let plan = [
///     PagePlacement { source: SourceId(0), page_number: 2, rotation: Rotation::R0 },
///     PagePlacement { source: SourceId(0), page_number: 1, rotation: Rotation::R90 },
/// ];
/// pdf_ops::save(&sources, &plan, "output.pdf", QualityTier::Standard)
///     .expect("Failed to save PDF");
/// ```
pub fn save<P: AsRef<Path>>(
    sources: &BTreeMap<SourceId, SourceDocument>,
    plan: &[PagePlacement],
    output: P,
    quality: QualityTier,
) -> Result<SaveReport> {
    let output = output.as_ref();
    let (mut document, report) = export(sources, plan, quality)?;
    document
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!(
        "saved {} page(s) to {} (quality {}, {} image(s) re-encoded)",
        report.pages,
        output.display(),
        quality,
        report.images_recompressed
    );
    if let Some(warning) = &report.warning {
        log::warn!("{}", warning);
    }
    Ok(report)
}

/// Merge whole files, in order, into `output`.
///
/// # Errors
///
/// Fails if no input files are given or any input cannot be loaded.
pub fn merge_pdfs<P: AsRef<Path> + Sync>(
    input_files: &[P],
    output: &Path,
    quality: QualityTier,
) -> Result<SaveReport> {
    if input_files.is_empty() {
        bail!("No input files provided for merge");
    }
    let loaded = crate::parallel::open_sources_parallel(input_files);

    let mut sources = BTreeMap::new();
    let mut plan = Vec::new();
    for (i, result) in loaded.into_iter().enumerate() {
        let source = result?;
        let id = SourceId(i);
        plan.extend((1..=source.page_count()).map(|page_number| PagePlacement {
            source: id,
            page_number,
            rotation: Rotation::R0,
        }));
        sources.insert(id, source);
    }
    save(&sources, &plan, output, quality)
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Copy of the page dictionary with inherited attributes filled in.
fn resolve_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut page = doc
        .get_dictionary(page_id)
        .with_context(|| format!("Page object {} {} is missing", page_id.0, page_id.1))?
        .clone();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(parent_id) = parent {
        if depth >= MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_dictionary(parent_id) else {
            break;
        };
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
    Ok(page)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{Stream, StringFormat};

    /// A small PDF whose pages carry a `/Tag` string so tests can tell them
    /// apart after a round trip. Media box and resources are inherited.
    pub(crate) fn sample_pdf(tags: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for tag in tags {
            let content = format!("BT /F1 24 Tf 72 720 Td ({}) Tj ET", tag);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Tag" => Object::String(tag.as_bytes().to_vec(), StringFormat::Literal),
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    pub(crate) fn page_tags(doc: &Document) -> Vec<String> {
        doc.get_pages()
            .into_values()
            .map(|id| match doc.get_dictionary(id).unwrap().get(b"Tag") {
                Ok(Object::String(bytes, _)) => String::from_utf8_lossy(bytes).into_owned(),
                _ => String::new(),
            })
            .collect()
    }

    fn page_rotations(doc: &Document) -> Vec<i64> {
        doc.get_pages()
            .into_values()
            .map(|id| {
                doc.get_dictionary(id)
                    .unwrap()
                    .get(b"Rotate")
                    .and_then(Object::as_i64)
                    .unwrap_or(0)
            })
            .collect()
    }

    fn two_sources() -> BTreeMap<SourceId, SourceDocument> {
        let mut sources = BTreeMap::new();
        sources.insert(
            SourceId(0),
            SourceDocument::from_bytes("a.pdf", &sample_pdf(&["A1"])).unwrap(),
        );
        sources.insert(
            SourceId(1),
            SourceDocument::from_bytes("b.pdf", &sample_pdf(&["B1", "B2"])).unwrap(),
        );
        sources
    }

    fn place(source: usize, page_number: u32, rotation: Rotation) -> PagePlacement {
        PagePlacement {
            source: SourceId(source),
            page_number,
            rotation,
        }
    }

    #[test]
    fn test_source_document_counts_pages() {
        let source = SourceDocument::from_bytes("b.pdf", &sample_pdf(&["B1", "B2"])).unwrap();
        assert_eq!(source.page_count(), 2);
        assert_eq!(source.name(), "b.pdf");
        assert!(source.path().is_none());
    }

    #[test]
    fn test_page_geometry_uses_inherited_media_box() {
        let source = SourceDocument::from_bytes("a.pdf", &sample_pdf(&["1"])).unwrap();
        assert_eq!(source.page_geometry(1), Some(((595.0, 842.0), Rotation::R0)));
        assert_eq!(source.page_geometry(2), None);
    }

    #[test]
    fn test_source_bytes_are_kept_and_shared() {
        let raw = sample_pdf(&["1", "2"]);
        let source = SourceDocument::from_bytes("a.pdf", &raw).unwrap();
        assert_eq!(source.bytes(), raw.as_slice());
        let copy = source.clone();
        assert!(std::ptr::eq(source.bytes(), copy.bytes()));
    }

    #[test]
    fn test_source_document_rejects_garbage() {
        let result = SourceDocument::from_bytes("junk.pdf", b"definitely not a pdf");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("junk.pdf"));
    }

    #[test]
    fn test_source_document_open_missing_file() {
        let result = SourceDocument::open("does/not/exist.pdf");
        assert!(result.unwrap_err().to_string().contains("Failed to load PDF"));
    }

    #[test]
    fn test_export_interleaves_sources_in_plan_order() {
        let sources = two_sources();
        let plan = [
            place(1, 2, Rotation::R0),
            place(0, 1, Rotation::R90),
            place(1, 1, Rotation::R270),
        ];
        let (doc, report) = export(&sources, &plan, QualityTier::High).unwrap();
        assert_eq!(report.pages, 3);
        assert!(report.warning.is_none());
        assert_eq!(page_tags(&doc), vec!["B2", "A1", "B1"]);
        assert_eq!(page_rotations(&doc), vec![0, 90, 270]);
    }

    #[test]
    fn test_export_materializes_inherited_attributes() {
        let sources = two_sources();
        let (doc, _) = export(&sources, &[place(0, 1, Rotation::R0)], QualityTier::High).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Resources"));
    }

    #[test]
    fn test_export_adds_to_existing_rotation() {
        let mut doc = Document::load_mem(&sample_pdf(&["R"])).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        doc.get_dictionary_mut(page_id).unwrap().set("Rotate", 270);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let mut sources = BTreeMap::new();
        sources.insert(SourceId(0), SourceDocument::from_bytes("r.pdf", &bytes).unwrap());
        let (out, _) = export(&sources, &[place(0, 1, Rotation::R180)], QualityTier::High).unwrap();
        assert_eq!(page_rotations(&out), vec![90]);
    }

    #[test]
    fn test_export_duplicate_placement_gets_own_page() {
        let sources = two_sources();
        let plan = [place(0, 1, Rotation::R0), place(0, 1, Rotation::R90)];
        let (doc, _) = export(&sources, &plan, QualityTier::High).unwrap();
        assert_eq!(page_tags(&doc), vec!["A1", "A1"]);
        assert_eq!(page_rotations(&doc), vec![0, 90]);
    }

    #[test]
    fn test_export_rejects_bad_plans() {
        let sources = two_sources();
        assert!(export(&sources, &[], QualityTier::High).is_err());

        let err = export(&sources, &[place(7, 1, Rotation::R0)], QualityTier::High).unwrap_err();
        assert!(err.to_string().contains("unknown source"));

        let err = export(&sources, &[place(1, 3, Rotation::R0)], QualityTier::High).unwrap_err();
        assert!(err.to_string().contains("invalid page number"));

        let err = export(&sources, &[place(1, 0, Rotation::R0)], QualityTier::High).unwrap_err();
        assert!(err.to_string().contains("invalid page number"));
    }

    #[test]
    fn test_save_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        let sources = two_sources();
        let plan = [place(1, 1, Rotation::R0), place(0, 1, Rotation::R0)];
        let report = save(&sources, &plan, &output, QualityTier::Standard).unwrap();
        assert_eq!(report.pages, 2);

        let reloaded = SourceDocument::open(&output).unwrap();
        assert_eq!(reloaded.page_count(), 2);
        assert_eq!(reloaded.name(), "out.pdf");
        assert_eq!(page_tags(reloaded.document()), vec!["B1", "A1"]);
    }

    #[test]
    fn test_merge_pdfs_keeps_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        std::fs::write(&a, sample_pdf(&["A1", "A2"])).unwrap();
        std::fs::write(&b, sample_pdf(&["B1"])).unwrap();
        let output = dir.path().join("merged.pdf");

        let report = merge_pdfs(&[&a, &b], &output, QualityTier::High).unwrap();
        assert_eq!(report.pages, 3);
        let merged = Document::load(&output).unwrap();
        assert_eq!(page_tags(&merged), vec!["A1", "A2", "B1"]);
    }

    #[test]
    fn test_merge_empty_input() {
        let inputs: [&str; 0] = [];
        assert!(merge_pdfs(&inputs, Path::new("out.pdf"), QualityTier::High).is_err());
    }
}
