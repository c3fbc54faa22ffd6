//! Per-artifact download orchestration.
//!
//! An `ArtifactDownload` owns the lifecycle of one logical download: it
//! drives one or two strictly sequential file transfers (primary, then the
//! optional companion), applies the retry policy, and aggregates progress,
//! speed and ETA across both phases. Exactly one terminal callback fires per
//! `start` invocation, zero or more progress updates before it.

use crate::artifact::{self, Artifact};
use crate::host::HostState;
use crate::progress::{ArtifactProgress, TransferProgress};
use crate::retry::{self, RetryPolicy};
use crate::storage;
use crate::transfer::{self, TransferError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Status of one artifact download.
///
/// `Failed` and `Cancelled` are terminal for the attempt only: partial bytes
/// stay on disk, and a later `start` resumes from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadStatus {
    #[default]
    NotStarted,
    Downloading,
    Completed,
    Failed,
    Cancelled,
}

impl DownloadStatus {
    /// True for any status from which the scheduler frees a concurrency slot.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed | DownloadStatus::Failed | DownloadStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Primary,
    Companion,
}

/// Terminal callback invoked exactly once per `start`.
pub type FinishFn = Box<dyn FnOnce() + Send + 'static>;

enum Outcome {
    Completed,
    Cancelled,
    Failed(String),
}

#[derive(Default)]
struct Inner {
    status: DownloadStatus,
    retry_count: u32,
    last_error: Option<String>,
    primary: TransferProgress,
    companion: TransferProgress,
    phase: Phase,
    /// Abort token of the running worker; None when idle.
    abort: Option<Arc<AtomicBool>>,
    /// Join handle of the running worker; None when idle.
    worker: Option<std::thread::JoinHandle<()>>,
}

/// One logical download: a primary weight file plus an optional companion,
/// with retry policy and aggregate telemetry. Shared behind an `Arc`; all
/// mutable state is serialized behind one mutex.
pub struct ArtifactDownload {
    artifact: Artifact,
    host: Arc<HostState>,
    policy: RetryPolicy,
    inner: Mutex<Inner>,
}

impl ArtifactDownload {
    pub fn new(artifact: Artifact, host: Arc<HostState>) -> Self {
        Self::with_policy(artifact, host, RetryPolicy::default())
    }

    pub fn with_policy(artifact: Artifact, host: Arc<HostState>, policy: RetryPolicy) -> Self {
        Self {
            artifact,
            host,
            policy,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.artifact.id
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn status(&self) -> DownloadStatus {
        self.inner.lock().unwrap().status
    }

    pub fn retry_count(&self) -> u32 {
        self.inner.lock().unwrap().retry_count
    }

    /// Classified description of the last failure, for display.
    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().unwrap().last_error.clone()
    }

    /// Aggregate progress across both files. The denominator is the declared
    /// artifact size when known, so the fraction is monotonic across the
    /// primary→companion boundary; during the companion phase the primary
    /// slot retains its final byte count.
    pub fn progress(&self) -> ArtifactProgress {
        let inner = self.inner.lock().unwrap();
        let bytes_written = inner.primary.bytes_written + inner.companion.bytes_written;
        let total_bytes = if self.artifact.total_bytes > 0 {
            self.artifact.total_bytes
        } else {
            inner.primary.total_expected + inner.companion.total_expected
        };
        let speed_bps = match inner.phase {
            Phase::Primary => inner.primary.speed_bps,
            // Until the companion produces its first sample, keep showing the
            // primary's last speed rather than dropping to zero.
            Phase::Companion => {
                if inner.companion.speed_bps > 0.0 {
                    inner.companion.speed_bps
                } else {
                    inner.primary.speed_bps
                }
            }
        };
        ArtifactProgress {
            bytes_written,
            total_bytes,
            speed_bps,
        }
    }

    /// Begin (or re-begin) downloading. No-op while already downloading.
    /// A fresh attempt resumes from whatever bytes are on disk. `on_finished`
    /// fires exactly once, from a worker thread, when a terminal status is
    /// reached.
    pub fn start(self: &Arc<Self>, on_finished: FinishFn) {
        let abort = Arc::new(AtomicBool::new(false));
        let mut inner = self.inner.lock().unwrap();
        if inner.status == DownloadStatus::Downloading {
            tracing::debug!(id = %self.artifact.id, "start ignored, already downloading");
            return;
        }
        inner.status = DownloadStatus::Downloading;
        inner.last_error = None;
        inner.phase = Phase::Primary;
        inner.primary = TransferProgress::default();
        inner.companion = TransferProgress::default();
        inner.abort = Some(Arc::clone(&abort));
        // Spawn while still holding the lock so the handle is installed
        // before `cancel_and_join` can observe this worker.
        let this = Arc::clone(self);
        inner.worker = Some(std::thread::spawn(move || this.run(abort, on_finished)));
    }

    /// Request cancellation of whichever transfer phase is active. The status
    /// flips to `Cancelled` when the worker observes the token and reaches
    /// its terminal callback. Idempotent.
    pub fn cancel(&self) {
        let inner = self.inner.lock().unwrap();
        if let Some(abort) = &inner.abort {
            abort.store(true, Ordering::Relaxed);
        }
    }

    /// Cancel any running worker and block until it has exited. After this
    /// returns, no worker of this download touches the artifact folder, so
    /// the caller may delete it. Must not be called from the worker itself.
    pub fn cancel_and_join(&self) {
        let worker = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(abort) = &inner.abort {
                abort.store(true, Ordering::Relaxed);
            }
            inner.worker.take()
        };
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }

    /// Cancel any running transfer and return to `NotStarted` with zeroed
    /// counters, so a future `start` begins a clean attempt. Items tracked
    /// by a scheduler must go through `DownloadScheduler::remove` instead.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(abort) = inner.abort.take() {
            abort.store(true, Ordering::Relaxed);
        }
        *inner = Inner::default();
    }

    fn run(self: Arc<Self>, abort: Arc<AtomicBool>, on_finished: FinishFn) {
        let outcome = self.run_phases(&abort);
        {
            let mut inner = self.inner.lock().unwrap();
            // Commit only if this worker's token is still the installed one;
            // `reset` swaps it out and disowns the old worker.
            let owns = inner
                .abort
                .as_ref()
                .map_or(false, |a| Arc::ptr_eq(a, &abort));
            if owns {
                if inner.status == DownloadStatus::Downloading {
                    match outcome {
                        Outcome::Completed => {
                            tracing::info!(id = %self.artifact.id, "download completed");
                            inner.status = DownloadStatus::Completed;
                        }
                        Outcome::Cancelled => {
                            tracing::info!(id = %self.artifact.id, "download cancelled");
                            inner.status = DownloadStatus::Cancelled;
                        }
                        Outcome::Failed(msg) => {
                            tracing::warn!(id = %self.artifact.id, error = %msg, "download failed");
                            inner.status = DownloadStatus::Failed;
                            inner.last_error = Some(msg);
                        }
                    }
                }
                inner.abort = None;
            }
        }
        on_finished();
    }

    fn run_phases(&self, abort: &Arc<AtomicBool>) -> Outcome {
        // Fail fast on malformed URLs before any network or disk activity.
        if Url::parse(&self.artifact.url).is_err() {
            return Outcome::Failed("Invalid URL format".to_string());
        }
        let companion = match &self.artifact.companion_url {
            Some(url) => {
                let name = self.artifact.companion_file_name();
                match (Url::parse(url), name) {
                    (Ok(_), Some(name)) if artifact::is_safe_file_name(&name) => {
                        Some((url.clone(), name))
                    }
                    _ => return Outcome::Failed("Invalid URL format".to_string()),
                }
            }
            None => None,
        };

        if let Err(outcome) =
            self.run_phase(Phase::Primary, &self.artifact.url, &self.artifact.name, abort)
        {
            return outcome;
        }
        if let Some((url, name)) = companion {
            if let Err(outcome) = self.run_phase(Phase::Companion, &url, &name, abort) {
                return outcome;
            }
        }
        Outcome::Completed
    }

    /// Download one file to its final name, retrying the same phase per the
    /// retry policy. `Ok` means the file was finalized.
    fn run_phase(
        &self,
        phase: Phase,
        url: &str,
        name: &str,
        abort: &Arc<AtomicBool>,
    ) -> Result<(), Outcome> {
        self.inner.lock().unwrap().phase = phase;
        let final_path = self.artifact.dir.join(name);
        let temp = storage::temp_path(&final_path);
        let mut background_attempts = 0u32;

        loop {
            if abort.load(Ordering::Relaxed) {
                return Err(Outcome::Cancelled);
            }
            if let Err(e) = storage::ensure_dir(&self.artifact.dir) {
                return Err(Outcome::Failed(e.to_string()));
            }

            let result = transfer::run(url, &temp, self.artifact.token.as_deref(), abort, |p| {
                self.record_progress(phase, p)
            });
            match result {
                Ok(bytes) => {
                    if let Err(e) = storage::finalize(&temp, &final_path) {
                        return Err(Outcome::Failed(e.to_string()));
                    }
                    tracing::info!(id = %self.artifact.id, file = %name, bytes, "file finalized");
                    return Ok(());
                }
                Err(TransferError::Cancelled) => return Err(Outcome::Cancelled),
                Err(e @ (TransferError::InvalidUrl(_) | TransferError::Filesystem(_))) => {
                    // Retrying cannot help a bad URL or a failing disk.
                    return Err(Outcome::Failed(retry::user_message(&e)));
                }
                Err(e) => {
                    let retry_count = self.inner.lock().unwrap().retry_count;
                    if self.policy.allows_foreground_retry(retry_count) {
                        self.inner.lock().unwrap().retry_count = retry_count + 1;
                        tracing::warn!(
                            id = %self.artifact.id,
                            error = %e,
                            retry = retry_count + 1,
                            "transfer failed, retrying phase"
                        );
                        continue;
                    }
                    if self.host.is_background() {
                        let delay = self.policy.background_delay(background_attempts);
                        background_attempts = background_attempts.saturating_add(1);
                        tracing::warn!(
                            id = %self.artifact.id,
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "transfer failed while backgrounded, retrying after backoff"
                        );
                        if !sleep_unless_aborted(abort, delay) {
                            return Err(Outcome::Cancelled);
                        }
                        continue;
                    }
                    return Err(Outcome::Failed(retry::user_message(&e)));
                }
            }
        }
    }

    fn record_progress(&self, phase: Phase, p: TransferProgress) {
        let mut inner = self.inner.lock().unwrap();
        match phase {
            Phase::Primary => inner.primary = p,
            Phase::Companion => inner.companion = p,
        }
    }
}

/// Sleep in short slices so a cancel request interrupts the backoff.
/// Returns false when aborted.
fn sleep_unless_aborted(abort: &Arc<AtomicBool>, delay: Duration) -> bool {
    let slice = Duration::from_millis(100);
    let mut remaining = delay;
    while remaining > Duration::ZERO {
        if abort.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(slice);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !abort.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::mpsc;

    fn artifact(url: &str) -> Artifact {
        Artifact {
            id: "m1".into(),
            name: "m1.gguf".into(),
            url: url.into(),
            companion_url: None,
            companion_name: None,
            total_bytes: 100,
            token: None,
            dir: PathBuf::from("/tmp/mdm-test-unused"),
        }
    }

    fn finished_channel() -> (FinishFn, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel();
        (Box::new(move || tx.send(()).unwrap()), rx)
    }

    #[test]
    fn invalid_url_fails_fast_without_retry() {
        let item = Arc::new(ArtifactDownload::new(
            artifact("definitely not a url"),
            Arc::new(HostState::new()),
        ));
        let (on_finished, rx) = finished_channel();
        item.start(on_finished);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(item.status(), DownloadStatus::Failed);
        assert_eq!(item.last_error().as_deref(), Some("Invalid URL format"));
        assert_eq!(item.retry_count(), 0);
    }

    #[test]
    fn companion_without_derivable_name_fails_fast() {
        let mut a = artifact("https://example.com/m1.gguf");
        a.companion_url = Some("https://example.com/".into());
        let item = Arc::new(ArtifactDownload::new(a, Arc::new(HostState::new())));
        let (on_finished, rx) = finished_channel();
        item.start(on_finished);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(item.status(), DownloadStatus::Failed);
        assert_eq!(item.last_error().as_deref(), Some("Invalid URL format"));
    }

    #[test]
    fn aggregate_progress_is_monotonic_across_phases() {
        let mut a = artifact("https://example.com/m1.gguf");
        a.companion_url = Some("https://example.com/mmproj.gguf".into());
        a.total_bytes = 200;
        let item = ArtifactDownload::new(a, Arc::new(HostState::new()));

        item.record_progress(
            Phase::Primary,
            TransferProgress { bytes_written: 120, total_expected: 120, speed_bps: 10.0 },
        );
        let before = item.progress();
        assert_eq!(before.bytes_written, 120);
        assert!((before.fraction() - 0.6).abs() < 1e-9);

        // Phase boundary: primary keeps its final figure, companion adds.
        item.inner.lock().unwrap().phase = Phase::Companion;
        let boundary = item.progress();
        assert!(boundary.fraction() >= before.fraction());
        assert!((boundary.speed_bps - 10.0).abs() < 1e-9);

        item.record_progress(
            Phase::Companion,
            TransferProgress { bytes_written: 50, total_expected: 80, speed_bps: 4.0 },
        );
        let after = item.progress();
        assert_eq!(after.bytes_written, 170);
        assert!(after.fraction() >= boundary.fraction());
        assert!((after.speed_bps - 4.0).abs() < 1e-9);
        // ETA is derived from the same speed that is reported.
        assert!((after.eta_secs().unwrap() - (30.0 / 4.0)).abs() < 1e-9);
    }

    #[test]
    fn unknown_declared_size_falls_back_to_learned_totals() {
        let mut a = artifact("https://example.com/m1.gguf");
        a.total_bytes = 0;
        let item = ArtifactDownload::new(a, Arc::new(HostState::new()));
        item.record_progress(
            Phase::Primary,
            TransferProgress { bytes_written: 10, total_expected: 40, speed_bps: 1.0 },
        );
        let p = item.progress();
        assert_eq!(p.total_bytes, 40);
        assert!((p.fraction() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn reset_returns_to_not_started() {
        let item = Arc::new(ArtifactDownload::new(
            artifact("bad url"),
            Arc::new(HostState::new()),
        ));
        let (on_finished, rx) = finished_channel();
        item.start(on_finished);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(item.status(), DownloadStatus::Failed);
        item.reset();
        assert_eq!(item.status(), DownloadStatus::NotStarted);
        assert_eq!(item.retry_count(), 0);
        assert!(item.last_error().is_none());
        assert_eq!(item.progress().bytes_written, 0);
    }

    #[test]
    fn cancel_while_idle_is_a_no_op() {
        let item = ArtifactDownload::new(
            artifact("https://example.com/m1.gguf"),
            Arc::new(HostState::new()),
        );
        item.cancel();
        assert_eq!(item.status(), DownloadStatus::NotStarted);
    }

    #[test]
    fn terminal_statuses() {
        assert!(DownloadStatus::Completed.is_terminal());
        assert!(DownloadStatus::Failed.is_terminal());
        assert!(DownloadStatus::Cancelled.is_terminal());
        assert!(!DownloadStatus::NotStarted.is_terminal());
        assert!(!DownloadStatus::Downloading.is_terminal());
    }
}
