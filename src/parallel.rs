use crate::pdf_ops::SourceDocument;
use anyhow::Result;
use rayon::prelude::*;
use std::path::Path;

/// Parallel source loading using Rayon
///
/// Parsing a PDF is CPU-bound, so several sources are parsed concurrently.
/// Results always come back in input order.

/// Open several PDFs in parallel
///
/// Each entry of the returned vector is the result for the path at the same
/// position, so one broken file does not hide the others.
///
/// # Example
/// ```rust,no_run
/// use pdfarrange::parallel;
///
/// let results = parallel::open_sources_parallel(&["a.pdf", "b.pdf"]);
/// for result in results {
///     match result {
///         Ok(source) => println!("{}: {} pages", source.name(), source.page_count()),
///         Err(e) => eprintln!("{:#}", e),
///     }
/// }
/// ```
pub fn open_sources_parallel<P: AsRef<Path> + Sync>(input_paths: &[P]) -> Vec<Result<SourceDocument>> {
    input_paths
        .par_iter()
        .map(|path| SourceDocument::open(path.as_ref()))
        .collect()
}

/// Count pages in multiple PDFs in parallel
pub fn count_pages_parallel<P: AsRef<Path> + Sync>(input_paths: &[P]) -> Vec<(String, Result<u32>)> {
    input_paths
        .par_iter()
        .map(|path| {
            let path_ref = path.as_ref();
            let count = SourceDocument::open(path_ref).map(|source| source.page_count());
            (path_ref.display().to_string(), count)
        })
        .collect()
}
