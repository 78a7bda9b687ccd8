//! Fixed-interval polling of asynchronous design-tool jobs.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::debug;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("{kind} job timed out after {waited_secs}s")]
    Timeout {
        kind: &'static str,
        waited_secs: u64,
    },

    #[error("job failed ({code})")]
    Failed { code: String, details: Value },

    #[error("{0}")]
    Upstream(String),
}

/// One observation of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus<T> {
    InProgress,
    Success(T),
    Failed(Value),
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub kind: &'static str,
    pub interval: Duration,
    pub timeout: Duration,
}

pub const AUTOFILL: PollSettings = PollSettings {
    kind: "autofill",
    interval: Duration::from_secs(2),
    timeout: Duration::from_secs(60),
};

pub const ASSET_UPLOAD: PollSettings = PollSettings {
    kind: "asset_upload",
    interval: Duration::from_secs(1),
    timeout: Duration::from_secs(60),
};

pub const EXPORT: PollSettings = PollSettings {
    kind: "export",
    interval: Duration::from_secs(3),
    timeout: Duration::from_secs(180),
};

/// Calls `fetch` until the job leaves `InProgress` or `settings.timeout` elapses.
///
/// A failed job becomes `JobError::Failed` with code `<kind>_failed`.
pub async fn poll_job<T, F, Fut>(settings: PollSettings, mut fetch: F) -> Result<T, JobError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<JobStatus<T>, JobError>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match fetch().await? {
            JobStatus::Success(output) => {
                debug!("{} job finished after {attempts} polls", settings.kind);
                return Ok(output);
            }
            JobStatus::Failed(details) => {
                return Err(JobError::Failed {
                    code: format!("{}_failed", settings.kind),
                    details,
                });
            }
            JobStatus::InProgress => {}
        }

        if started.elapsed() >= settings.timeout {
            return Err(JobError::Timeout {
                kind: settings.kind,
                waited_secs: settings.timeout.as_secs(),
            });
        }
        sleep(settings.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;

    use super::*;

    const FAST: PollSettings = PollSettings {
        kind: "export",
        interval: Duration::from_secs(3),
        timeout: Duration::from_secs(12),
    };

    #[tokio::test(start_paused = true)]
    async fn test_returns_output_once_job_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = poll_job(FAST, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok(if n < 2 {
                JobStatus::InProgress
            } else {
                JobStatus::Success("https://export.example/file.pdf")
            })
        })
        .await
        .unwrap();

        assert_eq!(result, "https://export.example/file.pdf");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_carries_kind_code_and_details() {
        let err = poll_job::<(), _, _>(AUTOFILL, || async {
            Ok(JobStatus::Failed(json!({"code": "invalid_field"})))
        })
        .await
        .unwrap_err();

        match err {
            JobError::Failed { code, details } => {
                assert_eq!(code, "autofill_failed");
                assert_eq!(details["code"], "invalid_field");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_job_never_finishes() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = poll_job::<(), _, _>(FAST, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(JobStatus::InProgress)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, JobError::Timeout { kind: "export", waited_secs: 12 }));
        // polls at t = 0, 3, 6, 9, 12
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_call_errors_stop_polling() {
        let err = poll_job::<(), _, _>(ASSET_UPLOAD, || async {
            Err(JobError::Upstream("status call failed".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, JobError::Upstream(_)));
    }
}
