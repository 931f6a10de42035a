//! Background load and save jobs
//!
//! Loading and saving can take a while for large files, so both run on
//! their own thread and report back over a channel. A workspace allows at
//! most one job of each kind at a time; [`JobSlots`] hands out a
//! [`JobGuard`] for the running job and frees the slot when the guard is
//! dropped, which happens when the job's thread finishes.

use crate::collection::SourceId;
use crate::optimization::QualityTier;
use crate::pdf_ops::{self, PagePlacement, SaveReport, SourceDocument};
use crate::workspace::Workspace;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Load,
    Save,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Load => write!(f, "load"),
            JobKind::Save => write!(f, "save"),
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("a {0} job is already running")]
    Busy(JobKind),
    #[error("failed to start {kind} thread: {source}")]
    Spawn {
        kind: JobKind,
        #[source]
        source: std::io::Error,
    },
    #[error("save failed: {0:#}")]
    Plan(anyhow::Error),
}

/// Per-workspace in-flight flags, one for each job kind.
#[derive(Debug, Clone, Default)]
pub struct JobSlots {
    load: Arc<AtomicBool>,
    save: Arc<AtomicBool>,
}

impl JobSlots {
    fn flag(&self, kind: JobKind) -> &Arc<AtomicBool> {
        match kind {
            JobKind::Load => &self.load,
            JobKind::Save => &self.save,
        }
    }

    /// Claim the slot for `kind`, or fail if a job of that kind is running.
    pub fn acquire(&self, kind: JobKind) -> Result<JobGuard, WorkerError> {
        let flag = self.flag(kind);
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WorkerError::Busy(kind))?;
        Ok(JobGuard {
            flag: Arc::clone(flag),
            kind,
        })
    }

    pub fn is_busy(&self, kind: JobKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }
}

/// Holds a job slot; the slot is released on drop.
#[derive(Debug)]
pub struct JobGuard {
    flag: Arc<AtomicBool>,
    kind: JobKind,
}

impl JobGuard {
    pub fn kind(&self) -> JobKind {
        self.kind
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub enum LoadEvent {
    FileLoaded { path: PathBuf, source: SourceDocument },
    FileFailed { path: PathBuf, error: String },
    /// Always the last event. `stopped` is set when the job was cancelled
    /// before every file was processed.
    Finished { stopped: bool },
}

/// Loads files on a background thread.
///
/// Files are parsed in parallel batches; events arrive in input order.
/// [`LoadWorker::stop`] takes effect between batches.
pub struct LoadWorker {
    stop: Arc<AtomicBool>,
    events: Receiver<LoadEvent>,
    handle: JoinHandle<()>,
}

impl LoadWorker {
    pub fn spawn(slots: &JobSlots, paths: Vec<PathBuf>) -> Result<Self, WorkerError> {
        let guard = slots.acquire(JobKind::Load)?;
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, events) = mpsc::channel();
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("pdfarrange-load".into())
            .spawn(move || {
                let _guard = guard;
                let batch = rayon::current_num_threads().max(1);
                let mut stopped = false;
                for chunk in paths.chunks(batch) {
                    if stop_flag.load(Ordering::Acquire) {
                        stopped = true;
                        break;
                    }
                    let results: Vec<_> = chunk
                        .par_iter()
                        .map(|path| (path.clone(), SourceDocument::open(path)))
                        .collect();
                    for (path, result) in results {
                        let event = match result {
                            Ok(source) => LoadEvent::FileLoaded { path, source },
                            Err(e) => {
                                log::warn!("load failed for {}: {:#}", path.display(), e);
                                LoadEvent::FileFailed {
                                    path,
                                    error: format!("{:#}", e),
                                }
                            }
                        };
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                }
                let _ = tx.send(LoadEvent::Finished { stopped });
            })
            .map_err(|source| WorkerError::Spawn {
                kind: JobKind::Load,
                source,
            })?;

        Ok(Self {
            stop,
            events,
            handle,
        })
    }

    /// Ask the job to stop after the files currently being parsed.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn events(&self) -> &Receiver<LoadEvent> {
        &self.events
    }

    /// Block until the job ends and return every event it sent.
    pub fn wait(self) -> Vec<LoadEvent> {
        let events: Vec<LoadEvent> = self.events.iter().collect();
        if self.handle.join().is_err() {
            log::error!("load thread panicked");
        }
        events
    }
}

/// Feed load events into a workspace. Returns the failures, if any.
pub fn apply_load_events<I>(workspace: &mut Workspace, events: I) -> Vec<(PathBuf, String)>
where
    I: IntoIterator<Item = LoadEvent>,
{
    let mut failures = Vec::new();
    for event in events {
        match event {
            LoadEvent::FileLoaded { source, .. } => {
                workspace.add_source(source);
            }
            LoadEvent::FileFailed { path, error } => failures.push((path, error)),
            LoadEvent::Finished { stopped } => {
                if stopped {
                    log::info!("load stopped before all files were read");
                }
            }
        }
    }
    failures
}

pub type SaveOutcome = Result<SaveReport, String>;

/// Exports a snapshot of a workspace on a background thread.
pub struct SaveWorker {
    outcome: Receiver<SaveOutcome>,
    handle: JoinHandle<()>,
}

impl SaveWorker {
    /// Start saving `plan` drawn from `sources` to `output`.
    pub fn spawn(
        slots: &JobSlots,
        sources: BTreeMap<SourceId, SourceDocument>,
        plan: Vec<PagePlacement>,
        output: PathBuf,
        quality: QualityTier,
    ) -> Result<Self, WorkerError> {
        let guard = slots.acquire(JobKind::Save)?;
        let (tx, outcome) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("pdfarrange-save".into())
            .spawn(move || {
                let _guard = guard;
                let result = pdf_ops::save(&sources, &plan, &output, quality)
                    .map_err(|e| format!("{:#}", e));
                let _ = tx.send(result);
            })
            .map_err(|source| WorkerError::Spawn {
                kind: JobKind::Save,
                source,
            })?;

        Ok(Self { outcome, handle })
    }

    /// Save the workspace's current order. The workspace stays usable while
    /// the job runs; later edits do not affect the file being written.
    pub fn for_workspace(
        workspace: &Workspace,
        output: PathBuf,
        quality: QualityTier,
    ) -> Result<Self, WorkerError> {
        let plan = workspace.save_plan().map_err(WorkerError::Plan)?;
        Self::spawn(
            workspace.jobs(),
            workspace.sources().clone(),
            plan,
            output,
            quality,
        )
    }

    /// Non-blocking check for the result.
    pub fn try_outcome(&self) -> Option<SaveOutcome> {
        self.outcome.try_recv().ok()
    }

    pub fn wait(self) -> SaveOutcome {
        let outcome = self
            .outcome
            .recv()
            .unwrap_or_else(|_| Err("save thread ended without a result".to_string()));
        if self.handle.join().is_err() {
            log::error!("save thread panicked");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf_ops::tests::{page_tags, sample_pdf};
    use lopdf::Document;

    fn write_fixtures(dir: &std::path::Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for (name, tags) in [("a.pdf", vec!["A1"]), ("b.pdf", vec!["B1", "B2"])] {
            let path = dir.join(name);
            std::fs::write(&path, sample_pdf(&tags)).unwrap();
            paths.push(path);
        }
        paths
    }

    #[test]
    fn test_job_slots_allow_one_job_per_kind() {
        let slots = JobSlots::default();
        let load = slots.acquire(JobKind::Load).unwrap();
        assert!(matches!(slots.acquire(JobKind::Load), Err(WorkerError::Busy(JobKind::Load))));

        let save = slots.acquire(JobKind::Save).unwrap();
        assert!(slots.is_busy(JobKind::Save));

        drop(load);
        assert!(!slots.is_busy(JobKind::Load));
        assert!(slots.acquire(JobKind::Load).is_ok());
        drop(save);
    }

    #[test]
    fn test_load_worker_reports_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_fixtures(dir.path());
        paths.insert(1, dir.path().join("missing.pdf"));

        let slots = JobSlots::default();
        let worker = LoadWorker::spawn(&slots, paths.clone()).unwrap();
        let events = worker.wait();

        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], LoadEvent::FileLoaded { path, .. } if *path == paths[0]));
        assert!(matches!(&events[1], LoadEvent::FileFailed { path, .. } if *path == paths[1]));
        assert!(matches!(&events[2], LoadEvent::FileLoaded { path, .. } if *path == paths[2]));
        assert!(matches!(events[3], LoadEvent::Finished { stopped: false }));
        assert!(!slots.is_busy(JobKind::Load));
    }

    #[test]
    fn test_second_load_is_rejected_while_running() {
        let slots = JobSlots::default();
        let _held = slots.acquire(JobKind::Load).unwrap();
        assert!(matches!(
            LoadWorker::spawn(&slots, Vec::new()),
            Err(WorkerError::Busy(JobKind::Load))
        ));
    }

    #[test]
    fn test_stopped_load_still_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_fixtures(dir.path());
        let slots = JobSlots::default();
        let worker = LoadWorker::spawn(&slots, paths).unwrap();
        worker.stop();
        let events = worker.wait();
        assert!(matches!(events.last(), Some(LoadEvent::Finished { .. })));
    }

    #[test]
    fn test_load_then_save_through_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_fixtures(dir.path());
        let mut workspace = Workspace::new();

        let events = LoadWorker::spawn(workspace.jobs(), paths).unwrap().wait();
        let failures = apply_load_events(&mut workspace, events);
        assert!(failures.is_empty());
        assert_eq!(workspace.pages().len(), 3);

        workspace.reorder(&[2, 1, 0]).unwrap();
        let output = dir.path().join("out.pdf");
        let worker = SaveWorker::for_workspace(&workspace, output.clone(), QualityTier::High).unwrap();
        let report = worker.wait().unwrap();
        assert_eq!(report.pages, 3);
        assert!(!workspace.jobs().is_busy(JobKind::Save));

        let saved = Document::load(&output).unwrap();
        assert_eq!(page_tags(&saved), vec!["B2", "B1", "A1"]);
    }

    #[test]
    fn test_save_failure_is_reported() {
        let workspace = Workspace::new();
        let worker = SaveWorker::spawn(
            workspace.jobs(),
            BTreeMap::new(),
            Vec::new(),
            PathBuf::from("unused.pdf"),
            QualityTier::Standard,
        )
        .unwrap();
        let err = worker.wait().unwrap_err();
        assert!(err.contains("No pages"));
    }
}
