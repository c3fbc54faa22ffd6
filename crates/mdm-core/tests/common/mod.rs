pub mod range_server;

use anyhow::Result;
use mdm_core::artifact::Artifact;
use mdm_core::registry::ModelStore;
use std::sync::Mutex;

/// In-memory `ModelStore` that records every call, so scheduler tests can
/// assert exactly which completions were persisted.
#[derive(Default)]
pub struct RecordingStore {
    calls: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn inserted_ids(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.strip_prefix("insert:").map(str::to_string))
            .collect()
    }
}

impl ModelStore for &'static RecordingStore {
    fn insert(&self, artifact: &Artifact) -> Result<()> {
        self.calls.lock().unwrap().push(format!("insert:{}", artifact.id));
        Ok(())
    }

    fn remove(&self, artifact: &Artifact) -> Result<()> {
        self.calls.lock().unwrap().push(format!("remove:{}", artifact.id));
        Ok(())
    }

    fn update_last_use_time(&self, artifact: &Artifact) -> Result<()> {
        self.calls.lock().unwrap().push(format!("touch:{}", artifact.id));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.calls.lock().unwrap().push("clear".to_string());
        Ok(())
    }
}

/// Leaks a fresh store so the scheduler's boxed trait object and the test
/// both hold it. Fine in test processes.
pub fn recording_store() -> &'static RecordingStore {
    Box::leak(Box::new(RecordingStore::default()))
}
