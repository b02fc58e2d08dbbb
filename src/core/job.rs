use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: u64,
    pub status: JobStatus,
    pub started_at: Option<Instant>,
    pub ended_at: Option<Instant>,
    pub exit_code: Option<i32>,
}

impl Job {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            started_at: None,
            ended_at: None,
            exit_code: None,
        }
    }

    pub fn start(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Instant::now());
    }

    pub fn finish(&mut self, code: i32) {
        self.ended_at = Some(Instant::now());
        self.exit_code = Some(code);
        self.status = if code == 0 {
            JobStatus::Finished
        } else {
            JobStatus::Failed
        };
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    /// Wall time so far, or total once finished.
    pub fn elapsed(&self) -> Option<Duration> {
        let started = self.started_at?;
        let end = self.ended_at.unwrap_or_else(Instant::now);
        Some(end.saturating_duration_since(started))
    }
}
