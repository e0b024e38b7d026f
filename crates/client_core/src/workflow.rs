//! Upload-and-analyze workflow: draft editing, PDF validation, upload to
//! object storage, remote scoring and the result overlay.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::PDF_MEDIA_TYPE,
    protocol::{
        resume_object_path, AnalyzeResumeRequest, AnalyzeResumeResponse, StoredObject,
        ANALYZE_RESUME_FUNCTION,
    },
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    error::{AnalysisError, UploadError, ValidationError, WorkflowError},
    presentation::{AnalysisResult, ResultOverlay},
    session::SessionStore,
};

pub const SUBMIT_LABEL: &str = "Analyze Resume";
pub const SUBMIT_LABEL_IN_FLIGHT: &str = "Analyzing Resume...";
pub const EMPTY_FILE_LABEL: &str = "Click to upload or drag and drop";

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn store(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject>;
}

#[async_trait]
pub trait ScoringFunction: Send + Sync {
    async fn invoke(
        &self,
        function_name: &str,
        request: &AnalyzeResumeRequest,
    ) -> Result<AnalyzeResumeResponse>;
}

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub name: String,
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    Picker,
    DragAndDrop,
}

/// Single validation entry point for every way a file can be chosen.
pub fn validate_candidate(candidate: &FileCandidate) -> Result<(), ValidationError> {
    match candidate.media_type.as_deref() {
        Some(media_type) if media_type.eq_ignore_ascii_case(PDF_MEDIA_TYPE) => Ok(()),
        other => Err(ValidationError::NotPdf {
            media_type: other.map(str::to_string),
        }),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadDraft {
    file: Option<FileCandidate>,
    job_description: String,
}

impl UploadDraft {
    pub fn file(&self) -> Option<&FileCandidate> {
        self.file.as_ref()
    }

    pub fn job_description(&self) -> &str {
        &self.job_description
    }

    pub fn display_name(&self) -> Option<&str> {
        self.file.as_ref().map(|file| file.name.as_str())
    }

    pub fn file_label(&self) -> &str {
        self.display_name().unwrap_or(EMPTY_FILE_LABEL)
    }

    fn ready(&self) -> Result<(&FileCandidate, &str), ValidationError> {
        let file = self.file.as_ref().ok_or(ValidationError::MissingFile)?;
        if self.job_description.trim().is_empty() {
            return Err(ValidationError::MissingJobDescription);
        }
        Ok((file, &self.job_description))
    }

    fn clear(&mut self) {
        self.file = None;
        self.job_description.clear();
    }
}

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    UploadStarted { path: String },
    Uploaded(StoredObject),
    Analyzed(AnalysisResult),
    Failed {
        kind: &'static str,
        message: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Analyzed(AnalysisResult),
    /// Another submission holds the in-flight slot; nothing was sent.
    AlreadyInFlight,
    /// The workflow was torn down; any result was dropped.
    Discarded,
}

#[derive(Default)]
struct WorkflowState {
    draft: UploadDraft,
    overlay: ResultOverlay,
}

pub struct UploadAnalyzeWorkflow {
    session: Arc<SessionStore>,
    storage: Arc<dyn ObjectStorage>,
    scoring: Arc<dyn ScoringFunction>,
    clock: Arc<dyn Clock>,
    function_name: String,
    inner: Mutex<WorkflowState>,
    uploading: AtomicBool,
    torn_down: AtomicBool,
    events: broadcast::Sender<WorkflowEvent>,
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl UploadAnalyzeWorkflow {
    pub fn new(
        session: Arc<SessionStore>,
        storage: Arc<dyn ObjectStorage>,
        scoring: Arc<dyn ScoringFunction>,
    ) -> Arc<Self> {
        Self::new_with_dependencies(
            session,
            storage,
            scoring,
            Arc::new(SystemClock),
            ANALYZE_RESUME_FUNCTION,
        )
    }

    pub fn new_with_dependencies(
        session: Arc<SessionStore>,
        storage: Arc<dyn ObjectStorage>,
        scoring: Arc<dyn ScoringFunction>,
        clock: Arc<dyn Clock>,
        function_name: impl Into<String>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            session,
            storage,
            scoring,
            clock,
            function_name: function_name.into(),
            inner: Mutex::new(WorkflowState::default()),
            uploading: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::Acquire)
    }

    pub fn submit_label(&self) -> &'static str {
        if self.is_uploading() {
            SUBMIT_LABEL_IN_FLIGHT
        } else {
            SUBMIT_LABEL
        }
    }

    pub async fn draft(&self) -> UploadDraft {
        self.inner.lock().await.draft.clone()
    }

    pub async fn overlay(&self) -> ResultOverlay {
        self.inner.lock().await.overlay.clone()
    }

    /// Accepts the candidate only if it is a PDF; otherwise the draft keeps
    /// whatever file it had.
    pub async fn select_file(
        &self,
        candidate: FileCandidate,
        source: SelectionSource,
    ) -> Result<(), ValidationError> {
        if let Err(err) = validate_candidate(&candidate) {
            warn!(
                file = %candidate.name,
                media_type = ?candidate.media_type,
                ?source,
                "rejected resume candidate"
            );
            return Err(err);
        }
        debug!(file = %candidate.name, ?source, "resume selected");
        self.inner.lock().await.draft.file = Some(candidate);
        Ok(())
    }

    pub async fn set_job_description(&self, text: impl Into<String>) {
        self.inner.lock().await.draft.job_description = text.into();
    }

    pub async fn dismiss_result(&self) {
        self.inner.lock().await.overlay.dismiss();
    }

    /// Marks the workflow as unmounted. Results of calls still in flight are
    /// dropped when they arrive. The flag is raised before the state lock is
    /// taken, so a submission already queued on the lock sees it.
    pub async fn teardown(&self) {
        self.torn_down.store(true, Ordering::Release);
        let mut guard = self.inner.lock().await;
        guard.draft.clear();
        guard.overlay.dismiss();
    }

    fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    pub async fn submit(&self) -> Result<SubmitOutcome, WorkflowError> {
        if self.is_torn_down() {
            return Ok(SubmitOutcome::Discarded);
        }

        let (file, job_description) = {
            let guard = self.inner.lock().await;
            match guard.draft.ready() {
                Ok((file, text)) => (file.clone(), text.to_string()),
                Err(err) => {
                    warn!(error = %err, "submit rejected before upload");
                    return Err(err.into());
                }
            }
        };

        let Some(_in_flight) = InFlight::acquire(&self.uploading) else {
            debug!("submit ignored; an analysis is already in flight");
            return Ok(SubmitOutcome::AlreadyInFlight);
        };

        let identity = self
            .session
            .current_identity()
            .ok_or(WorkflowError::Unauthenticated)?;

        self.inner.lock().await.overlay.dismiss();

        let path = resume_object_path(&identity.uid, self.clock.now_millis(), &file.name);
        info!(
            uid = %identity.uid,
            path = %path,
            size_bytes = file.bytes.len(),
            "uploading resume"
        );
        let _ = self
            .events
            .send(WorkflowEvent::UploadStarted { path: path.clone() });

        let stored = match self.storage.store(&path, file.bytes, PDF_MEDIA_TYPE).await {
            Ok(stored) => stored,
            Err(source) => return self.fail(UploadError { path, source }.into()).await,
        };
        let _ = self.events.send(WorkflowEvent::Uploaded(stored.clone()));

        let request = AnalyzeResumeRequest {
            file_path: stored.full_path.clone(),
            job_description,
        };
        let response = match self.scoring.invoke(&self.function_name, &request).await {
            Ok(response) => response,
            Err(source) => {
                return self
                    .fail(
                        AnalysisError {
                            path: stored.full_path,
                            source,
                        }
                        .into(),
                    )
                    .await
            }
        };

        let result = AnalysisResult::from_score(response.score);
        {
            let mut guard = self.inner.lock().await;
            if self.is_torn_down() {
                info!(path = %stored.full_path, "dropping analysis result for torn-down workflow");
                return Ok(SubmitOutcome::Discarded);
            }
            guard.overlay.show(result);
            guard.draft.clear();
        }
        info!(
            path = %stored.full_path,
            score = result.score,
            tier = ?result.tier,
            "resume analyzed"
        );
        let _ = self.events.send(WorkflowEvent::Analyzed(result));
        Ok(SubmitOutcome::Analyzed(result))
    }

    /// Reports a failed upload or analysis, unless the workflow was torn down
    /// meanwhile.
    async fn fail(&self, err: WorkflowError) -> Result<SubmitOutcome, WorkflowError> {
        error!(kind = err.kind(), error = ?err, "resume analysis failed");
        let _guard = self.inner.lock().await;
        if self.is_torn_down() {
            info!(kind = err.kind(), "dropping failure for torn-down workflow");
            return Ok(SubmitOutcome::Discarded);
        }
        let _ = self.events.send(WorkflowEvent::Failed {
            kind: err.kind(),
            message: err.user_message(),
        });
        Err(err)
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
