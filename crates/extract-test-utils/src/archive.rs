//! In-memory scripted archive for tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use archive_client::{ArchiveAccess, FetchError, ResourceDescriptor};

/// Archive access backed by a path → bytes map.
///
/// Unknown paths fail structurally (`InvalidDescriptor`); a transient
/// failure budget can be scripted to exercise retry paths. Every fetch
/// call is counted, including failures.
pub struct FakeArchive {
    resources: Mutex<HashMap<String, Vec<u8>>>,
    transient_failures: AtomicU32,
    fetch_calls: AtomicU32,
}

impl FakeArchive {
    pub fn new() -> Self {
        Self {
            resources: Mutex::new(HashMap::new()),
            transient_failures: AtomicU32::new(0),
            fetch_calls: AtomicU32::new(0),
        }
    }

    /// Stage a resource at the given archive-relative path.
    pub fn stage(&self, path: &str, bytes: Vec<u8>) {
        self.resources
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes);
    }

    /// Make the next `n` fetch calls fail transiently before resolving
    /// normally.
    pub fn fail_transient(&self, n: u32) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    /// Total fetch calls observed, successes and failures alike.
    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArchiveAccess for FakeArchive {
    async fn fetch(
        &self,
        descriptor: &ResourceDescriptor,
        target: &Path,
    ) -> Result<(), FetchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(FetchError::Transient("scripted outage".to_string()));
        }

        let bytes = self
            .resources
            .lock()
            .unwrap()
            .get(&descriptor.path)
            .cloned()
            .ok_or_else(|| {
                FetchError::InvalidDescriptor(format!("no resource at '{}'", descriptor.path))
            })?;

        tokio::fs::write(target, bytes)
            .await
            .map_err(|e| FetchError::Transient(format!("write failed: {}", e)))?;
        Ok(())
    }

    async fn locate(&self, descriptor: &ResourceDescriptor) -> Result<String, FetchError> {
        if self.resources.lock().unwrap().contains_key(&descriptor.path) {
            Ok(descriptor.url())
        } else {
            Err(FetchError::InvalidDescriptor(format!(
                "no resource at '{}'",
                descriptor.path
            )))
        }
    }
}
