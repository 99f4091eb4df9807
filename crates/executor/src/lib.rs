//! aegis_executor
//!
//! Safe envelope around any async tool operation: enforces a timeout, reacts
//! to external cancellation, and sanitizes whatever error comes back before
//! it leaves this crate. Used to wrap both model-provider calls and
//! model-triggered tool invocations.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("tool \"{name}\" timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },
    #[error("Aborted before execution")]
    AbortedBeforeExecution,
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ToolResult<T> {
    pub name: String,
    pub result: Option<T>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl<T> ToolResult<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}

/// Sink for `tool:failure` notifications. Listener errors are swallowed by
/// design: a broken observer must never affect the tool call it's observing.
pub trait FailureSink: Send + Sync {
    fn on_failure(&self, name: &str, error: &str);
}

pub struct NullFailureSink;
impl FailureSink for NullFailureSink {
    fn on_failure(&self, _name: &str, _error: &str) {}
}

pub struct ChannelFailureSink {
    sender: tokio::sync::mpsc::UnboundedSender<(String, String)>,
}

impl ChannelFailureSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<(String, String)>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl FailureSink for ChannelFailureSink {
    fn on_failure(&self, name: &str, error: &str) {
        let _ = self.sender.send((name.to_string(), error.to_string()));
    }
}

#[derive(Default)]
pub struct VecFailureSink {
    failures: Mutex<Vec<(String, String)>>,
}

impl VecFailureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<(String, String)> {
        self.failures.lock().unwrap().clone()
    }
}

impl FailureSink for VecFailureSink {
    fn on_failure(&self, name: &str, error: &str) {
        self.failures.lock().unwrap().push((name.to_string(), error.to_string()));
    }
}

pub struct ExecuteOpts<'a> {
    pub timeout: Duration,
    pub cancel: Option<CancellationToken>,
    pub on_complete: Option<Box<dyn FnOnce(&ToolOutcome) + Send + 'a>>,
    pub failure_sink: Option<&'a dyn FailureSink>,
}

/// Erased view of a completed call, handed to `on_complete`.
pub struct ToolOutcome {
    pub name: String,
    pub succeeded: bool,
    pub duration_ms: u64,
}

impl<'a> Default for ExecuteOpts<'a> {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), cancel: None, on_complete: None, failure_sink: None }
    }
}

/// Strip absolute filesystem paths and collapse multi-line stack text out of
/// an error message, keeping only the first line and a generic path marker.
pub fn sanitize_error(raw: &str) -> String {
    static UNIX_PATH: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    static WIN_PATH: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let unix_re = UNIX_PATH.get_or_init(|| regex::Regex::new(r"/[^\s:]+").unwrap());
    let win_re = WIN_PATH.get_or_init(|| regex::Regex::new(r"[A-Za-z]:\\[^\s:]+").unwrap());

    let first_line = raw.lines().next().unwrap_or(raw);
    let stripped = win_re.replace_all(first_line, "[path]");
    unix_re.replace_all(&stripped, "[path]").into_owned()
}

/// Run `op` under the safe envelope described in the module docs.
pub async fn execute<T, E, F, Fut>(name: &str, op: F, mut opts: ExecuteOpts<'_>) -> ToolResult<T>
where
    E: std::fmt::Display,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = Instant::now();

    if let Some(cancel) = &opts.cancel {
        if cancel.is_cancelled() {
            let result = ToolResult {
                name: name.to_string(),
                result: None,
                error: Some(ExecutorError::AbortedBeforeExecution.to_string()),
                duration_ms: 0,
            };
            finish(name, &result, &mut opts);
            return result;
        }
    }

    let timeout_ms = opts.timeout.as_millis() as u64;
    let cancel_fut = async {
        if let Some(cancel) = &opts.cancel {
            cancel.cancelled().await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    let outcome = tokio::select! {
        res = tokio::time::timeout(opts.timeout, op()) => {
            match res {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(sanitize_error(&e.to_string())),
                Err(_) => Err(ExecutorError::Timeout { name: name.to_string(), timeout_ms }.to_string()),
            }
        }
        _ = cancel_fut => Err(ExecutorError::Cancelled.to_string()),
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let result = match outcome {
        Ok(value) => ToolResult { name: name.to_string(), result: Some(value), error: None, duration_ms },
        Err(error) => {
            if let Some(sink) = opts.failure_sink {
                sink.on_failure(name, &error);
            }
            ToolResult { name: name.to_string(), result: None, error: Some(error), duration_ms }
        }
    };

    finish(name, &result, &mut opts);
    result
}

fn finish<T>(name: &str, result: &ToolResult<T>, opts: &mut ExecuteOpts<'_>) {
    if let Some(cb) = opts.on_complete.take() {
        let outcome = ToolOutcome {
            name: name.to_string(),
            succeeded: result.is_success(),
            duration_ms: result.duration_ms,
        };
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(&outcome)));
    }
    if !result.is_success() {
        tracing::warn!(tool = name, error = ?result.error, "tool execution failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_within_timeout() {
        let result = execute(
            "fast",
            || async { Ok::<_, std::convert::Infallible>(42) },
            ExecuteOpts { timeout: Duration::from_millis(100), ..Default::default() },
        )
        .await;
        assert_eq!(result.result, Some(42));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn times_out_and_reports_duration() {
        let result = execute(
            "slow",
            || async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, std::convert::Infallible>(())
            },
            ExecuteOpts { timeout: Duration::from_millis(50), ..Default::default() },
        )
        .await;
        assert!(result.error.as_deref().unwrap().contains("timed out after 50ms"));
        assert!(result.duration_ms >= 50);
    }

    #[tokio::test]
    async fn on_complete_called_exactly_once() {
        let called = Arc::new(AtomicBool::new(false));
        let called2 = called.clone();
        let opts = ExecuteOpts {
            timeout: Duration::from_millis(100),
            on_complete: Some(Box::new(move |_| {
                called2.store(true, Ordering::SeqCst);
            })),
            ..Default::default()
        };
        let _ = execute("op", || async { Ok::<_, std::convert::Infallible>(()) }, opts).await;
        assert!(called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failure_sink_receives_error() {
        let sink = VecFailureSink::new();
        let opts = ExecuteOpts { timeout: Duration::from_millis(50), failure_sink: Some(&sink), ..Default::default() };
        let _ = execute("op", || async { Err::<(), _>("boom") }, opts).await;
        assert_eq!(sink.failures().len(), 1);
    }

    #[tokio::test]
    async fn already_cancelled_returns_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let opts = ExecuteOpts { timeout: Duration::from_secs(5), cancel: Some(cancel), ..Default::default() };
        let result = execute("op", || async { Ok::<_, std::convert::Infallible>(()) }, opts).await;
        assert_eq!(result.duration_ms, 0);
        assert!(result.error.unwrap().contains("Aborted"));
    }

    #[test]
    fn sanitize_error_strips_paths() {
        let msg = sanitize_error("ENOENT: /home/user/secret/file.txt not found\nat foo.js:12");
        assert!(!msg.contains("/home/user"));
        assert!(msg.contains("[path]"));
    }
}
