use std::path::Path;
use std::sync::Arc;

use client_logging::{client_debug, client_info, client_warn};
use futures_util::{stream, StreamExt};
use kb_core::{reconcile_with_listing, BatchSummary, JobStatus, Notice, UploadBatch};
use tokio::time::Instant;

use crate::api::{publish_file_list, KbApi};
use crate::auth::AuthSession;
use crate::{ClientConfig, ClientError, ClientEvent, ClientSink, Diagnostic, FailureKind};

/// One file picked by the user, read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self { filename, bytes })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Nothing was selected.
    Empty,
    /// Every submission failed; polling never started.
    NothingAccepted { failed: usize },
    /// A 401 ended the batch early.
    AuthExpired,
    Finished(BatchSummary),
}

#[derive(Debug, Default)]
struct Submission {
    accepted: Vec<String>,
    failed: usize,
    auth_expired: bool,
}

enum PollEnd {
    Finished,
    AuthExpired,
}

/// Submits a batch of files, then polls their processing status to completion.
pub struct UploadOrchestrator {
    api: Arc<dyn KbApi>,
    auth: Arc<AuthSession>,
    config: ClientConfig,
    sink: Arc<dyn ClientSink>,
}

impl UploadOrchestrator {
    pub fn new(
        api: Arc<dyn KbApi>,
        auth: Arc<AuthSession>,
        config: ClientConfig,
        sink: Arc<dyn ClientSink>,
    ) -> Self {
        Self {
            api,
            auth,
            config,
            sink,
        }
    }

    fn status(&self, status: impl Into<String>) {
        self.sink.emit(ClientEvent::Status(status.into()));
    }

    fn notice(&self, notice: Notice) {
        self.sink.emit(ClientEvent::Notice(notice));
    }

    fn auth_expired(&self) -> UploadOutcome {
        self.notice(Notice::error("Credentials expired, please log in again"));
        UploadOutcome::AuthExpired
    }

    pub async fn run(&self, files: Vec<UploadFile>) -> Result<UploadOutcome, ClientError> {
        if files.is_empty() {
            return Ok(UploadOutcome::Empty);
        }
        if !self.auth.is_logged_in() {
            self.notice(Notice::error("Please log in first"));
            return Err(ClientError::new(FailureKind::NotLoggedIn, "upload needs a login"));
        }
        let max = self.config.max_batch_files;
        if files.len() > max {
            self.notice(Notice::error(format!(
                "At most {max} files can be uploaded at once"
            )));
            return Err(ClientError::new(
                FailureKind::TooManyFiles {
                    count: files.len(),
                    max,
                },
                "batch rejected before upload",
            ));
        }

        let requested = files.len();
        self.status(format!("Uploading {requested} file(s)..."));
        let submission = self.submit(files).await;
        if submission.auth_expired {
            return Ok(self.auth_expired());
        }
        if submission.accepted.is_empty() {
            self.status(kb_core::STATUS_IDLE);
            self.notice(Notice::error("All file uploads failed"));
            return Ok(UploadOutcome::NothingAccepted {
                failed: submission.failed,
            });
        }
        client_info!(
            "Upload batch submitted accepted={} failed={}",
            submission.accepted.len(),
            submission.failed
        );

        let mut batch = UploadBatch::new(submission.accepted, requested);
        if let PollEnd::AuthExpired = self.poll(&mut batch).await {
            return Ok(self.auth_expired());
        }

        let summary = batch.summary();
        let _ = publish_file_list(self.api.as_ref(), self.sink.as_ref()).await;
        self.status(summary.completion_status());
        self.notice(summary.completion_notice());
        Ok(UploadOutcome::Finished(summary))
    }

    /// Phase 1: uploads through a queue of `submit_concurrency` slots. Files behind
    /// a 401 are never sent.
    async fn submit(&self, files: Vec<UploadFile>) -> Submission {
        let total = files.len();
        let api = self.api.clone();
        let mut uploads = stream::iter(files)
            .map(move |file| {
                let api = api.clone();
                async move {
                    let result = api.upload_file(&file).await;
                    (file.filename, result)
                }
            })
            .buffered(self.config.submit_concurrency.max(1));

        let mut submission = Submission::default();
        while let Some((filename, result)) = uploads.next().await {
            match result {
                Ok(accepted) => {
                    submission.accepted.push(accepted);
                    self.status(format!(
                        "Uploaded {}/{} file(s), processing...",
                        submission.accepted.len(),
                        total
                    ));
                }
                Err(err) if err.is_auth_expired() => {
                    client_warn!("Upload of {} hit expired credentials; aborting batch", filename);
                    submission.auth_expired = true;
                    break;
                }
                Err(err) => {
                    client_warn!("Upload of {} failed: {}", filename, err);
                    submission.failed += 1;
                }
            }
        }
        submission
    }

    /// Phase 2: re-checks every processing job each tick until all are terminal.
    async fn poll(&self, batch: &mut UploadBatch) -> PollEnd {
        let started = Instant::now();
        loop {
            for filename in batch.pending() {
                match self.check(&filename).await {
                    Ok(Some(status)) => {
                        client_debug!("Job {} settled as {:?}", filename, status);
                        batch.resolve(&filename, status);
                    }
                    Ok(None) => {}
                    Err(err) if err.is_auth_expired() => return PollEnd::AuthExpired,
                    Err(err) => self.poll_failed(&filename, &err),
                }
            }

            self.status(batch.status_line());
            self.sink.emit(ClientEvent::UploadProgress(batch.summary()));
            if batch.is_finished() {
                return PollEnd::Finished;
            }
            if let Some(limit) = self.config.poll_timeout {
                if started.elapsed() >= limit {
                    client_warn!("Upload polling timed out after {:?}", limit);
                    batch.time_out_remaining();
                    return PollEnd::Finished;
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Transient poll failures leave the job processing.
    fn poll_failed(&self, filename: &str, err: &ClientError) {
        client_debug!("Status poll for {} failed: {}", filename, err);
        self.sink.emit(ClientEvent::Diagnostic(Diagnostic::PollFailed {
            filename: filename.to_string(),
            reason: err.to_string(),
        }));
    }

    /// Only the authenticated listing can end the batch with an error; the
    /// status endpoint is public, so anything it returns is tolerated.
    async fn check(&self, filename: &str) -> Result<Option<JobStatus>, ClientError> {
        let status = match self.api.upload_status(filename).await {
            Ok(status) => status,
            Err(err) => {
                self.poll_failed(filename, &err);
                return Ok(None);
            }
        };
        if let Some(settled) = status.settled() {
            return Ok(Some(settled));
        }
        if status.needs_listing() {
            let indexed = self.api.list_files().await?;
            return Ok(reconcile_with_listing(filename, &indexed));
        }
        Ok(None)
    }
}
