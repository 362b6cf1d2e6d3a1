//! Background export thread.

use crate::export::{self, CancelToken, ExportError, ExportOptions};
use crossbeam::channel::{self, Receiver, Sender};
use linework_core::{AssetProvider, Document};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A snapshot of a document to export.
pub struct ExportJob {
    pub document: Document,
    pub assets: Arc<dyn AssetProvider>,
    pub options: ExportOptions,
    pub path: PathBuf,
}

/// Outcome of one job.
#[derive(Debug)]
pub enum ExportEvent {
    Finished { path: PathBuf, bytes: usize },
    Failed { path: PathBuf, error: ExportError },
    Cancelled { path: PathBuf },
}

impl ExportEvent {
    pub fn path(&self) -> &PathBuf {
        match self {
            ExportEvent::Finished { path, .. }
            | ExportEvent::Failed { path, .. }
            | ExportEvent::Cancelled { path } => path,
        }
    }
}

type Request = (ExportJob, CancelToken);

/// Runs exports one at a time off the editing thread.
///
/// Jobs carry their own document snapshot, so editing can continue while
/// they run. Dropping the worker finishes queued jobs, then joins.
pub struct ExportWorker {
    jobs: Option<Sender<Request>>,
    events: Receiver<ExportEvent>,
    handle: Option<JoinHandle<()>>,
}

impl ExportWorker {
    pub fn new() -> Result<Self, ExportError> {
        let (job_tx, job_rx) = channel::unbounded::<Request>();
        let (event_tx, event_rx) = channel::unbounded();
        let handle = thread::Builder::new()
            .name("linework-export".into())
            .spawn(move || run(job_rx, event_tx))?;
        Ok(Self {
            jobs: Some(job_tx),
            events: event_rx,
            handle: Some(handle),
        })
    }

    /// Queue a job, returning the token that cancels it.
    pub fn submit(&self, job: ExportJob) -> Result<CancelToken, ExportError> {
        let token = CancelToken::new();
        self.submit_with(job, token.clone())?;
        Ok(token)
    }

    pub fn submit_with(&self, job: ExportJob, token: CancelToken) -> Result<(), ExportError> {
        let sender = self
            .jobs
            .as_ref()
            .ok_or_else(|| ExportError::Render("export worker stopped".into()))?;
        sender
            .send((job, token))
            .map_err(|_| ExportError::Render("export worker stopped".into()))
    }

    /// Completion events, in job order.
    pub fn events(&self) -> &Receiver<ExportEvent> {
        &self.events
    }

    pub fn try_event(&self) -> Option<ExportEvent> {
        self.events.try_recv().ok()
    }
}

impl Drop for ExportWorker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Export thread panicked");
            }
        }
    }
}

fn run(jobs: Receiver<Request>, events: Sender<ExportEvent>) {
    for (job, token) in jobs {
        let ExportJob {
            document,
            assets,
            options,
            path,
        } = job;
        log::debug!("Exporting {}", path.display());
        let event = match export::export_to_path(&document, assets.as_ref(), &options, &path, &token) {
            Ok(bytes) => ExportEvent::Finished { path, bytes },
            Err(ExportError::Cancelled) => {
                log::info!("Export to {} cancelled", path.display());
                ExportEvent::Cancelled { path }
            }
            Err(error) => {
                log::error!("Export to {} failed: {error}", path.display());
                ExportEvent::Failed { path, error }
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }
}
