use crate::notice::Notice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Processing,
    Completed,
    Error,
    /// Still processing when the configured poll timeout ran out.
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

/// Status reported by the per-file status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Processing,
    Completed,
    Error,
    /// The backend no longer tracks the file; consult the indexed listing.
    Unknown,
    Other(String),
}

impl PollStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "processing" => PollStatus::Processing,
            "completed" => PollStatus::Completed,
            "error" => PollStatus::Error,
            "unknown" => PollStatus::Unknown,
            other => PollStatus::Other(other.to_string()),
        }
    }

    /// Terminal status this poll settles on, if any, without consulting the listing.
    pub fn settled(&self) -> Option<JobStatus> {
        match self {
            PollStatus::Completed => Some(JobStatus::Completed),
            PollStatus::Error => Some(JobStatus::Error),
            PollStatus::Processing | PollStatus::Unknown | PollStatus::Other(_) => None,
        }
    }

    pub fn needs_listing(&self) -> bool {
        matches!(self, PollStatus::Unknown)
    }
}

/// Reconciliation: a file the backend has indexed counts as completed.
pub fn reconcile_with_listing(filename: &str, indexed: &[String]) -> Option<JobStatus> {
    indexed
        .iter()
        .any(|name| name == filename)
        .then_some(JobStatus::Completed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub filename: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub completed: usize,
    pub errored: usize,
    pub processing: usize,
    pub total: usize,
}

impl BatchSummary {
    pub fn is_finished(&self) -> bool {
        self.completed + self.errored >= self.total
    }

    pub fn completion_status(&self) -> String {
        if self.errored == 0 {
            "All processing complete!".to_string()
        } else {
            format!("{} succeeded, {} failed", self.completed, self.errored)
        }
    }

    pub fn completion_notice(&self) -> Notice {
        if self.errored == 0 {
            Notice::success(format!(
                "Uploaded and processed {} file(s)!",
                self.completed
            ))
        } else {
            Notice::info(format!(
                "{} file(s) succeeded, {} failed",
                self.completed, self.errored
            ))
        }
    }
}

/// Jobs submitted together. Membership is fixed at construction; only statuses move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadBatch {
    jobs: Vec<UploadJob>,
    requested: usize,
}

impl UploadBatch {
    /// `requested` is how many files the user selected, accepted or not.
    pub fn new(accepted: Vec<String>, requested: usize) -> Self {
        let jobs = accepted
            .into_iter()
            .map(|filename| UploadJob {
                filename,
                status: JobStatus::Processing,
            })
            .collect();
        Self { jobs, requested }
    }

    pub fn jobs(&self) -> &[UploadJob] {
        &self.jobs
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Filenames still processing, deduplicated, in submission order.
    pub fn pending(&self) -> Vec<String> {
        let mut pending: Vec<String> = Vec::new();
        for job in &self.jobs {
            if job.status == JobStatus::Processing && !pending.contains(&job.filename) {
                pending.push(job.filename.clone());
            }
        }
        pending
    }

    /// Moves processing jobs for `filename` to `status`. Terminal jobs never move again.
    pub fn resolve(&mut self, filename: &str, status: JobStatus) -> bool {
        let mut changed = false;
        for job in &mut self.jobs {
            if job.filename == filename && job.status == JobStatus::Processing {
                job.status = status;
                changed = true;
            }
        }
        changed
    }

    pub fn time_out_remaining(&mut self) {
        for job in &mut self.jobs {
            if job.status == JobStatus::Processing {
                job.status = JobStatus::TimedOut;
            }
        }
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.jobs.len(),
            ..BatchSummary::default()
        };
        for job in &self.jobs {
            match job.status {
                JobStatus::Processing => summary.processing += 1,
                JobStatus::Completed => summary.completed += 1,
                JobStatus::Error | JobStatus::TimedOut => summary.errored += 1,
            }
        }
        summary
    }

    pub fn is_finished(&self) -> bool {
        self.jobs.iter().all(|job| job.status.is_terminal())
    }

    /// Combined progress line published after each poll tick.
    pub fn status_line(&self) -> String {
        let summary = self.summary();
        format!(
            "Processing: {}/{} done, {} in progress...",
            summary.completed, self.requested, summary.processing
        )
    }
}
