//! Estimate pipeline driver.
//!
//! Intake → submit, then begin → credential check → build request → remote
//! call → finish. The machine lock is only held for individual transitions,
//! never across the decode or the network call.

use kaitai_config::{API_KEY_ENV, CredentialPolicy, KaitaiConfig};
use kaitai_core::{
    EstimateError, EstimationClient, GenerationConfig, ImageId, PendingImage, SURVEY_INSTRUCTION,
    SessionState,
};
use kaitai_media::{SelectedFile, submit_files};
use kaitai_understanding::build_request_with;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use crate::machine::{BeginEstimate, RemoveOutcome, SessionMachine, SubmitOutcome};

/// Fixed inputs of every estimate request.
#[derive(Debug, Clone)]
pub struct EstimatorOptions {
    pub instruction: String,
    pub generation: Option<GenerationConfig>,
    pub credential_policy: CredentialPolicy,
}

impl EstimatorOptions {
    pub fn from_config(config: &KaitaiConfig) -> Self {
        Self {
            instruction: config.instruction().to_string(),
            generation: Some(config.generation_config()),
            credential_policy: config.credential_policy,
        }
    }
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        Self {
            instruction: SURVEY_INSTRUCTION.to_string(),
            generation: None,
            credential_policy: CredentialPolicy::default(),
        }
    }
}

/// Result of one file submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    pub selected: usize,
    pub decoded: usize,
    pub outcome: SubmitOutcome,
}

impl SubmitReport {
    /// Files that could not be read.
    pub fn skipped(&self) -> usize {
        self.selected - self.decoded
    }

    /// Decoded images that were not added to the collection.
    pub fn not_added(&self) -> usize {
        match &self.outcome {
            SubmitOutcome::Appended(report) => report.dropped.len(),
            SubmitOutcome::Busy | SubmitOutcome::Full => self.decoded,
        }
    }
}

pub struct Estimator<C> {
    machine: Mutex<SessionMachine>,
    state_rx: watch::Receiver<SessionState>,
    client: C,
    options: EstimatorOptions,
}

impl<C: EstimationClient> Estimator<C> {
    pub fn new(client: C, options: EstimatorOptions) -> Self {
        let machine = SessionMachine::new();
        let state_rx = machine.subscribe();
        Self {
            machine: Mutex::new(machine),
            state_rx,
            client,
            options,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn snapshot(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Decode the selected files and add them to the collection.
    pub async fn submit_files(&self, files: Vec<SelectedFile>) -> SubmitReport {
        let selected = files.len();
        let images = submit_files(files).await;
        let decoded = images.len();
        let outcome = self.machine.lock().await.submit(images);
        SubmitReport {
            selected,
            decoded,
            outcome,
        }
    }

    pub async fn remove(&self, id: &ImageId) -> RemoveOutcome {
        self.machine.lock().await.remove(id)
    }

    /// Run one estimate request and return the resulting state.
    ///
    /// With no images this records a validation error without calling the
    /// provider. While a request is outstanding it changes nothing. The
    /// returned state is the one this call's transition produced, even if
    /// another request has started since.
    pub async fn get_estimate(&self) -> SessionState {
        let images = {
            let mut machine = self.machine.lock().await;
            match machine.begin_estimate() {
                BeginEstimate::Started(images) => images,
                BeginEstimate::NoImages | BeginEstimate::InFlight => return machine.snapshot(),
            }
        };

        let outcome = self.run_pipeline(&images).await;
        match &outcome {
            Ok(text) => info!(chars = text.chars().count(), "Estimate succeeded"),
            Err(e) => warn!(kind = ?e.kind(), error = %e, "Estimate failed"),
        }

        let mut machine = self.machine.lock().await;
        machine.finish(outcome);
        machine.snapshot()
    }

    async fn run_pipeline(&self, images: &[PendingImage]) -> Result<String, EstimateError> {
        if !self.client.has_credential() {
            match self.options.credential_policy {
                CredentialPolicy::Block => return Err(EstimateError::missing_credential(API_KEY_ENV)),
                CredentialPolicy::Warn => {
                    warn!(provider = self.client.name(), "No API key configured; sending request anyway")
                }
            }
        }

        let payload =
            build_request_with(&self.options.instruction, images, self.options.generation.clone())?;
        info!(
            provider = self.client.name(),
            images = images.len(),
            "Sending estimate request"
        );
        self.client.request_estimate(&payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kaitai_core::{ErrorKind, NO_IMAGES_MESSAGE, Part, Phase, RequestPayload};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct MockClient {
        calls: AtomicUsize,
        response: Result<String, EstimateError>,
        credential: bool,
        gate: Option<Arc<Notify>>,
        payloads: std::sync::Mutex<Vec<RequestPayload>>,
    }

    impl MockClient {
        fn replying(response: Result<String, EstimateError>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response,
                credential: true,
                gate: None,
                payloads: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn without_credential(mut self) -> Self {
            self.credential = false;
            self
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EstimationClient for MockClient {
        fn name(&self) -> &str {
            "mock"
        }

        fn has_credential(&self) -> bool {
            self.credential
        }

        async fn request_estimate(&self, payload: &RequestPayload) -> Result<String, EstimateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payloads.lock().unwrap().push(payload.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.response.clone()
        }
    }

    fn uploads(names: &[&str]) -> Vec<SelectedFile> {
        names
            .iter()
            .map(|n| SelectedFile::upload(*n, Some("image/jpeg".into()), n.as_bytes().to_vec()))
            .collect()
    }

    fn image_names(state: &SessionState) -> Vec<String> {
        state.images.iter().map(|i| i.file().name.clone()).collect()
    }

    #[tokio::test]
    async fn three_images_then_successful_estimate() {
        let gate = Arc::new(Notify::new());
        let client = MockClient::replying(Ok("解体費用は約200万円です".into())).gated(gate.clone());
        let estimator = Arc::new(Estimator::new(client, EstimatorOptions::default()));

        let report = estimator.submit_files(uploads(&["front.jpg", "side.jpg", "back.jpg"])).await;
        assert_eq!(report.decoded, 3);
        assert_eq!(image_names(&estimator.snapshot()), ["front.jpg", "side.jpg", "back.jpg"]);

        let mut rx = estimator.subscribe();
        let task = {
            let estimator = Arc::clone(&estimator);
            tokio::spawn(async move { estimator.get_estimate().await })
        };

        rx.wait_for(|s| s.phase == Phase::Loading).await.unwrap();
        gate.notify_one();
        let state = task.await.unwrap();

        assert_eq!(state.phase, Phase::Success);
        assert_eq!(state.result.unwrap().result_text, "解体費用は約200万円です");
        assert!(state.error.is_none());
        assert_eq!(estimator.client().calls(), 1);

        let payloads = estimator.client().payloads.lock().unwrap();
        assert_eq!(payloads[0].image_count(), 3);
        assert!(matches!(
            payloads[0].parts().next(),
            Some(Part::Text { text }) if text == SURVEY_INSTRUCTION
        ));
    }

    #[tokio::test]
    async fn transport_failure_surfaces_detail() {
        let client = MockClient::replying(Err(EstimateError::Transport(
            "network request failed: connection reset".into(),
        )));
        let estimator = Estimator::new(client, EstimatorOptions::default());
        estimator.submit_files(uploads(&["only.jpg"])).await;

        let state = estimator.get_estimate().await;
        assert_eq!(state.phase, Phase::Error);
        let error = state.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Transport);
        assert!(error.message.contains("connection reset"));
        assert!(state.result.is_none());
    }

    #[tokio::test]
    async fn removing_last_image_then_estimate_never_calls_provider() {
        let estimator = Estimator::new(MockClient::replying(Ok("x".into())), EstimatorOptions::default());
        estimator.submit_files(uploads(&["only.jpg"])).await;
        let id = estimator.snapshot().images[0].id();

        assert_eq!(estimator.remove(&id).await, RemoveOutcome::Removed);
        let state = estimator.get_estimate().await;

        assert_eq!(state.phase, Phase::Error);
        assert_eq!(state.error.unwrap().message, NO_IMAGES_MESSAGE);
        assert_eq!(estimator.client().calls(), 0);
    }

    #[tokio::test]
    async fn missing_credential_blocks_by_default() {
        let client = MockClient::replying(Ok("x".into())).without_credential();
        let estimator = Estimator::new(client, EstimatorOptions::default());
        estimator.submit_files(uploads(&["a.jpg"])).await;

        let state = estimator.get_estimate().await;
        assert_eq!(state.phase, Phase::Error);
        let error = state.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Configuration);
        assert!(error.message.contains(API_KEY_ENV));
        assert_eq!(estimator.client().calls(), 0);
    }

    #[tokio::test]
    async fn warn_policy_still_sends() {
        let client = MockClient::replying(Ok("estimate".into())).without_credential();
        let options = EstimatorOptions {
            credential_policy: CredentialPolicy::Warn,
            ..EstimatorOptions::default()
        };
        let estimator = Estimator::new(client, options);
        estimator.submit_files(uploads(&["a.jpg"])).await;

        let state = estimator.get_estimate().await;
        assert_eq!(state.phase, Phase::Success);
        assert_eq!(estimator.client().calls(), 1);
    }

    #[tokio::test]
    async fn second_request_while_loading_is_ignored() {
        let gate = Arc::new(Notify::new());
        let client = MockClient::replying(Ok("done".into())).gated(gate.clone());
        let estimator = Arc::new(Estimator::new(client, EstimatorOptions::default()));
        estimator.submit_files(uploads(&["a.jpg"])).await;

        let mut rx = estimator.subscribe();
        let first = {
            let estimator = Arc::clone(&estimator);
            tokio::spawn(async move { estimator.get_estimate().await })
        };
        rx.wait_for(|s| s.is_loading()).await.unwrap();

        let during = estimator.get_estimate().await;
        assert_eq!(during.phase, Phase::Loading);
        let late = estimator.submit_files(uploads(&["late.jpg"])).await;
        assert_eq!(late.outcome, SubmitOutcome::Busy);
        assert_eq!(late.not_added(), 1);

        gate.notify_one();
        assert_eq!(first.await.unwrap().phase, Phase::Success);
        assert_eq!(estimator.client().calls(), 1);
    }

    #[tokio::test]
    async fn overflowing_batch_reports_dropped() {
        let estimator = Estimator::new(MockClient::replying(Ok("x".into())), EstimatorOptions::default());
        let names: Vec<String> = (0..12).map(|i| format!("p{i}.jpg")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let report = estimator.submit_files(uploads(&refs)).await;

        assert_eq!(report.decoded, 12);
        assert_eq!(report.not_added(), 2);
        assert_eq!(image_names(&estimator.snapshot()), names[..10]);
    }

    /// Answers the first call at once; later calls wait on the gate.
    struct FirstCallFast {
        calls: AtomicUsize,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl EstimationClient for FirstCallFast {
        fn name(&self) -> &str {
            "first-call-fast"
        }

        async fn request_estimate(&self, _payload: &RequestPayload) -> Result<String, EstimateError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call > 0 {
                self.gate.notified().await;
            }
            Ok(format!("estimate {call}"))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn finished_request_reports_its_own_outcome() {
        let gate = Arc::new(Notify::new());
        let client = FirstCallFast {
            calls: AtomicUsize::new(0),
            gate: gate.clone(),
        };
        let estimator = Arc::new(Estimator::new(client, EstimatorOptions::default()));
        estimator.submit_files(uploads(&["a.jpg"])).await;

        // Start a second request as soon as the first one succeeds.
        let mut rx = estimator.subscribe();
        let follow_up = {
            let estimator = Arc::clone(&estimator);
            tokio::spawn(async move {
                rx.wait_for(|s| s.phase == Phase::Success).await.unwrap();
                estimator.get_estimate().await
            })
        };

        let first = estimator.get_estimate().await;
        assert_eq!(first.phase, Phase::Success);
        assert_eq!(first.result.unwrap().result_text, "estimate 0");

        estimator
            .subscribe()
            .wait_for(|s| s.is_loading())
            .await
            .unwrap();
        gate.notify_one();
        let second = follow_up.await.unwrap();
        assert_eq!(second.result.unwrap().result_text, "estimate 1");
    }

    #[tokio::test]
    async fn retry_after_error_succeeds_without_reset() {
        let estimator = Estimator::new(MockClient::replying(Ok("second".into())), EstimatorOptions::default());
        let first = estimator.get_estimate().await;
        assert_eq!(first.phase, Phase::Error);

        estimator.submit_files(uploads(&["a.jpg"])).await;
        assert_eq!(estimator.snapshot().phase, Phase::Error);

        let second = estimator.get_estimate().await;
        assert_eq!(second.phase, Phase::Success);
        assert!(second.error.is_none());
    }
}
