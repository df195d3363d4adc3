//! Presentation state machine: Idle → Loading → {Success, Error}.
//!
//! No state is terminal. Image edits keep the current phase; only an
//! estimate request moves to Loading.

use kaitai_core::{
    EstimateError, EstimationOutcome, ErrorState, ImageId, PendingImage, Phase, SessionState,
};
use kaitai_media::{AppendReport, PreviewStore};
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Appended(AppendReport),
    /// Submissions are disabled while an estimate is outstanding.
    Busy,
    /// The collection already holds the maximum number of images.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginEstimate {
    /// Moved to Loading; the pipeline should run on these images.
    Started(Vec<PendingImage>),
    /// No images: a validation error was recorded and nothing is sent.
    NoImages,
    /// A request is already outstanding; nothing changed.
    InFlight,
}

/// Owns the session record. All mutation goes through these transitions.
pub struct SessionMachine {
    store: PreviewStore,
    phase: Phase,
    result: Option<EstimationOutcome>,
    error: Option<ErrorState>,
    tx: watch::Sender<SessionState>,
}

impl SessionMachine {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::default());
        Self {
            store: PreviewStore::new(),
            phase: Phase::Idle,
            result: None,
            error: None,
            tx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn snapshot(&self) -> SessionState {
        SessionState {
            images: self.store.images().to_vec(),
            phase: self.phase,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }

    /// Observe every published snapshot, starting with the current one.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Append decoded images, capped at the collection limit.
    pub fn submit(&mut self, images: Vec<PendingImage>) -> SubmitOutcome {
        if self.phase == Phase::Loading {
            debug!(count = images.len(), "Ignoring submission while loading");
            return SubmitOutcome::Busy;
        }
        if self.store.is_full() {
            info!(count = images.len(), "Ignoring submission; image limit reached");
            return SubmitOutcome::Full;
        }
        let report = self.store.append(images);
        debug!(
            accepted = report.accepted.len(),
            dropped = report.dropped.len(),
            total = self.store.len(),
            "Images submitted"
        );
        self.publish();
        SubmitOutcome::Appended(report)
    }

    pub fn remove(&mut self, id: &ImageId) -> RemoveOutcome {
        if self.phase == Phase::Loading {
            return RemoveOutcome::Busy;
        }
        if !self.store.remove(id) {
            return RemoveOutcome::NotFound;
        }
        debug!(id = %id, remaining = self.store.len(), "Image removed");
        self.publish();
        RemoveOutcome::Removed
    }

    /// Handle an estimate request.
    pub fn begin_estimate(&mut self) -> BeginEstimate {
        if self.phase == Phase::Loading {
            return BeginEstimate::InFlight;
        }
        if self.store.is_empty() {
            self.result = None;
            self.error = Some(EstimateError::no_images().into());
            self.phase = Phase::Error;
            debug!("Estimate requested with no images");
            self.publish();
            return BeginEstimate::NoImages;
        }
        self.result = None;
        self.error = None;
        self.phase = Phase::Loading;
        debug!(images = self.store.len(), "Estimate started");
        self.publish();
        BeginEstimate::Started(self.store.images().to_vec())
    }

    /// Record the pipeline outcome. Ignored unless Loading.
    pub fn finish(&mut self, outcome: Result<String, EstimateError>) -> Phase {
        if self.phase != Phase::Loading {
            debug!(phase = %self.phase, "Ignoring pipeline outcome outside loading");
            return self.phase;
        }
        match outcome {
            Ok(result_text) => {
                self.result = Some(EstimationOutcome { result_text });
                self.error = None;
                self.phase = Phase::Success;
            }
            Err(err) => {
                self.result = None;
                self.error = Some(err.into());
                self.phase = Phase::Error;
            }
        }
        debug!(phase = %self.phase, "Estimate finished");
        self.publish();
        self.phase
    }

    fn publish(&self) {
        self.tx.send_replace(self.snapshot());
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}
