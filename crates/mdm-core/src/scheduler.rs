//! Admission control and FIFO scheduling across many artifact downloads.
//!
//! Holds the global `active` set (bounded by `max_concurrent`) and the FIFO
//! `queued` list. All mutation of both, from caller threads and from download
//! worker callbacks alike, is serialized behind one mutex. Promotion is
//! strictly event-driven: a queued item starts only when a terminal callback
//! frees a slot, never by polling.

use crate::artifact::{self, Artifact};
use crate::download::{ArtifactDownload, DownloadStatus};
use crate::registry::ModelStore;
use crate::storage;
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use url::Url;

#[derive(Default)]
struct State {
    active: HashMap<String, Arc<ArtifactDownload>>,
    queued: VecDeque<Arc<ArtifactDownload>>,
}

impl State {
    fn is_known(&self, id: &str) -> bool {
        self.active.contains_key(id) || self.queued.iter().any(|q| q.id() == id)
    }

    /// Holds on every mutation: the active set never exceeds the cap, and no
    /// id is in both sets.
    fn check_invariants(&self, max_concurrent: usize) {
        debug_assert!(self.active.len() <= max_concurrent);
        debug_assert!(self.queued.iter().all(|q| !self.active.contains_key(q.id())));
    }
}

struct Shared {
    max_concurrent: usize,
    store: Box<dyn ModelStore>,
    state: Mutex<State>,
}

impl Shared {
    /// Insert into the active set and start the download. Caller holds the
    /// state lock and has checked capacity.
    fn admit(self: &Arc<Self>, state: &mut State, item: Arc<ArtifactDownload>) {
        state.active.insert(item.id().to_string(), Arc::clone(&item));
        tracing::info!(id = %item.id(), "download active");
        let shared = Arc::clone(self);
        let finished = Arc::clone(&item);
        item.start(Box::new(move || shared.finish(finished)));
    }

    /// Terminal callback for one download, invoked from its worker thread:
    /// free the slot, record completion, promote from the queue.
    fn finish(self: &Arc<Self>, item: Arc<ArtifactDownload>) {
        let status = item.status();
        if !status.is_terminal() {
            // A worker disowned by a `reset` of its item; `remove` frees
            // the slot itself, so there is nothing left to do here.
            tracing::debug!(id = %item.id(), "ignoring callback from disowned worker");
            return;
        }
        let mut state = self.state.lock().unwrap();
        state.active.remove(item.id());
        tracing::info!(id = %item.id(), ?status, "download slot freed");

        if status == DownloadStatus::Completed {
            if let Err(e) = self.store.insert(item.artifact()) {
                tracing::error!(id = %item.id(), error = %e, "failed to record completed model");
            }
        }
        self.promote(&mut state);
        state.check_invariants(self.max_concurrent);
    }

    /// Start queued downloads until the active set is full or the queue is
    /// empty. Re-checks capacity per promotion in case several slots freed
    /// at once.
    fn promote(self: &Arc<Self>, state: &mut State) {
        while state.active.len() < self.max_concurrent {
            let Some(next) = state.queued.pop_front() else {
                break;
            };
            tracing::info!(id = %next.id(), "promoting queued download");
            self.admit(state, next);
        }
    }
}

/// Global scheduler for artifact downloads: admits up to `max_concurrent`
/// at once, queues the rest FIFO, and records completions in the store.
pub struct DownloadScheduler {
    shared: Arc<Shared>,
}

impl DownloadScheduler {
    pub fn new(max_concurrent: usize, store: Box<dyn ModelStore>) -> Self {
        Self {
            shared: Arc::new(Shared {
                max_concurrent: max_concurrent.max(1),
                store,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Admit or queue a download. Malformed artifacts are rejected here,
    /// before anything is queued. Idempotent: a second `schedule` for an id
    /// that is already active or queued has no effect.
    pub fn schedule(&self, item: Arc<ArtifactDownload>) -> Result<()> {
        validate_artifact(item.artifact())?;
        let mut state = self.shared.state.lock().unwrap();
        if state.is_known(item.id()) {
            tracing::debug!(id = %item.id(), "schedule ignored, already tracked");
            return Ok(());
        }
        if state.active.len() < self.shared.max_concurrent {
            self.shared.admit(&mut state, item);
        } else {
            tracing::info!(id = %item.id(), position = state.queued.len(), "download queued");
            state.queued.push_back(item);
        }
        state.check_invariants(self.shared.max_concurrent);
        Ok(())
    }

    /// Cancel a download. An active item is cancelled in place and keeps its
    /// slot until its terminal callback fires, so a replacement is never
    /// started before the cancelled transfer has released its file handle.
    /// A queued item is simply dropped (nothing was ever started).
    pub fn cancel(&self, id: &str) {
        let mut state = self.shared.state.lock().unwrap();
        if let Some(item) = state.active.get(id) {
            item.cancel();
        } else if let Some(pos) = state.queued.iter().position(|q| q.id() == id) {
            tracing::info!(id, "dropping queued download");
            state.queued.remove(pos);
        }
        state.check_invariants(self.shared.max_concurrent);
    }

    /// Cancel semantics plus: delete the artifact's folder on disk, drop it
    /// from the store, and reset the item to `NotStarted` so a future
    /// `schedule` starts clean from zero bytes.
    pub fn remove(&self, item: &Arc<ArtifactDownload>) -> Result<()> {
        {
            let mut state = self.shared.state.lock().unwrap();
            if let Some(active) = state.active.remove(item.id()) {
                // Free the slot and promote now; the worker's own terminal
                // callback will find the id already gone.
                active.cancel();
                self.shared.promote(&mut state);
            }
            if let Some(pos) = state.queued.iter().position(|q| q.id() == item.id()) {
                state.queued.remove(pos);
            }
            state.check_invariants(self.shared.max_concurrent);
        }
        // Wait for the aborting worker to exit before touching the folder;
        // a worker mid-phase would otherwise recreate it. The state lock is
        // released so the worker's terminal callback can proceed.
        item.cancel_and_join();
        storage::remove_dir(&item.artifact().dir)?;
        self.shared.store.remove(item.artifact())?;
        item.reset();
        tracing::info!(id = %item.id(), "download removed");
        Ok(())
    }

    /// Cancel all active downloads and drop the queue. Active slots drain as
    /// their terminal callbacks fire.
    pub fn clear_all(&self) {
        let mut state = self.shared.state.lock().unwrap();
        for item in state.active.values() {
            item.cancel();
        }
        state.queued.clear();
    }

    /// The tracked download for an artifact id, active or queued.
    pub fn download(&self, id: &str) -> Option<Arc<ArtifactDownload>> {
        let state = self.shared.state.lock().unwrap();
        if let Some(item) = state.active.get(id) {
            return Some(Arc::clone(item));
        }
        state
            .queued
            .iter()
            .find(|q| q.id() == id)
            .map(Arc::clone)
    }

    /// All tracked downloads: active first, then queued in FIFO order.
    pub fn downloads(&self) -> Vec<Arc<ArtifactDownload>> {
        let state = self.shared.state.lock().unwrap();
        let mut items: Vec<_> = state.active.values().map(Arc::clone).collect();
        items.extend(state.queued.iter().map(Arc::clone));
        items
    }

    pub fn active_count(&self) -> usize {
        self.shared.state.lock().unwrap().active.len()
    }

    pub fn queued_count(&self) -> usize {
        self.shared.state.lock().unwrap().queued.len()
    }
}

/// Rejects artifacts the download worker could only fail on: unparseable
/// URLs, or a companion whose filename cannot be derived safely.
fn validate_artifact(a: &Artifact) -> Result<()> {
    if Url::parse(&a.url).is_err() {
        bail!("invalid URL: {}", a.url);
    }
    if let Some(companion_url) = &a.companion_url {
        if Url::parse(companion_url).is_err() {
            bail!("invalid URL: {}", companion_url);
        }
        match a.companion_file_name() {
            Some(name) if artifact::is_safe_file_name(&name) => {}
            _ => bail!("cannot derive a safe companion filename from {}", companion_url),
        }
    }
    Ok(())
}

/// Convenience for tests and embedders that don't persist completions.
pub struct NullStore;

impl ModelStore for NullStore {
    fn insert(&self, _artifact: &Artifact) -> Result<()> {
        Ok(())
    }
    fn remove(&self, _artifact: &Artifact) -> Result<()> {
        Ok(())
    }
    fn update_last_use_time(&self, _artifact: &Artifact) -> Result<()> {
        Ok(())
    }
    fn clear(&self) -> Result<()> {
        Ok(())
    }
}
