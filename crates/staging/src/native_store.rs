//! Raw native store: fetched archive artifacts, one file per logical key.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use archive_client::{
    fetch_with_retry, ArchiveAccess, FetchError, Notifier, ResourceLocator, RetryPolicy,
};
use nwp_common::{ExtractError, ExtractResult, LogicalKey};

/// On-disk staging area for raw fetched artifacts, addressed by the
/// deterministic key stem. `ensure` is idempotent: a file already
/// present is never re-fetched.
pub struct NativeStore {
    dir: PathBuf,
    locator: ResourceLocator,
    archive: Arc<dyn ArchiveAccess>,
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
}

impl NativeStore {
    /// Open (and create) the store directory, discarding any partial
    /// files a previous run left behind.
    pub async fn open(
        dir: PathBuf,
        locator: ResourceLocator,
        archive: Arc<dyn ArchiveAccess>,
        notifier: Arc<dyn Notifier>,
        policy: RetryPolicy,
    ) -> ExtractResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        sweep_partials(&dir);
        Ok(Self {
            dir,
            locator,
            archive,
            notifier,
            policy,
        })
    }

    /// Canonical path for a key's raw artifact.
    pub fn path_for(&self, key: &LogicalKey) -> PathBuf {
        self.dir.join(format!("{}.raw", key.file_stem()))
    }

    /// Return the raw artifact path for `key`, fetching it first when
    /// absent and `autofetch` allows it.
    ///
    /// With `autofetch` disabled a miss fails fast instead of silently
    /// triggering a slow network fetch — intended for test and batch
    /// runs over pre-staged data.
    pub async fn ensure(&self, key: &LogicalKey, autofetch: bool) -> ExtractResult<PathBuf> {
        let path = self.path_for(key);

        if tokio::fs::try_exists(&path).await? {
            debug!(key = %key, path = %path.display(), "Native file already staged");
            return Ok(path);
        }

        if !autofetch {
            return Err(ExtractError::NativeFileUnavailable(key.to_string()));
        }

        let descriptors =
            self.locator
                .locate(&key.model, key.run_time, key.term, key.member)?;

        info!(
            key = %key,
            candidates = descriptors.len(),
            "Fetching native file from archive"
        );

        fetch_with_retry(
            &self.policy,
            self.archive.as_ref(),
            self.notifier.as_ref(),
            &descriptors,
            &path,
        )
        .await
        .map_err(|e| self.to_extract_error(e))?;

        Ok(path)
    }

    fn to_extract_error(&self, err: FetchError) -> ExtractError {
        // A transient terminal failure means the whole budget was spent;
        // a structural one failed on the first and only attempt.
        let attempts = if err.is_transient() {
            self.policy.max_attempts()
        } else {
            1
        };
        ExtractError::FetchFailed {
            attempts,
            last: err.to_string(),
        }
    }
}

/// Remove stale `*.partial` files from a store directory.
fn sweep_partials(dir: &std::path::Path) {
    for entry in WalkDir::new(dir).max_depth(1).into_iter().flatten() {
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == "partial") {
            warn!(path = %path.display(), "Removing stale partial download");
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove partial file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_client::{ArchiveCatalog, LogNotifier, ModelArchiveConfig, NamingConvention};
    use chrono::TimeZone;
    use chrono::Utc;
    use extract_test_utils::{CollectingNotifier, FakeArchive};
    use std::time::Duration;

    fn locator() -> ResourceLocator {
        ResourceLocator::new(ArchiveCatalog::new(vec![ModelArchiveConfig {
            model: "arome".to_string(),
            archive_root: "https://archive.example.org/nwp".to_string(),
            conventions: vec![NamingConvention {
                name: "2020".to_string(),
                path_template: "{model}/{date}/r{run:02}/f{term:03}.fa".to_string(),
                timeout_secs: 600,
            }],
        }]))
    }

    fn key() -> LogicalKey {
        LogicalKey::new(
            "arome",
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap(),
            6,
            "alps",
            None,
        )
    }

    async fn store(dir: &std::path::Path, archive: Arc<FakeArchive>) -> NativeStore {
        NativeStore::open(
            dir.to_path_buf(),
            locator(),
            archive,
            Arc::new(LogNotifier),
            RetryPolicy::none(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_fetches_once() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Arc::new(FakeArchive::new());
        archive.stage("arome/20240315/r00/f006.fa", b"payload".to_vec());

        let store = store(dir.path(), archive.clone()).await;

        let first = store.ensure(&key(), true).await.unwrap();
        assert_eq!(std::fs::read(&first).unwrap(), b"payload");
        assert_eq!(archive.fetch_calls(), 1);

        // Idempotent: a second ensure observes the staged file
        let second = store.ensure(&key(), true).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(archive.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_ensure_without_autofetch_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Arc::new(FakeArchive::new());
        let store = store(dir.path(), archive.clone()).await;

        let err = store.ensure(&key(), false).await.unwrap_err();
        assert!(matches!(err, ExtractError::NativeFileUnavailable(_)));
        assert_eq!(archive.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_transient_outage_retried_and_notified() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Arc::new(FakeArchive::new());
        archive.stage("arome/20240315/r00/f006.fa", b"payload".to_vec());
        archive.fail_transient(1);

        let notifier = Arc::new(CollectingNotifier::new());
        let store = NativeStore::open(
            dir.path().to_path_buf(),
            locator(),
            archive.clone(),
            notifier.clone(),
            RetryPolicy::new(vec![Duration::ZERO]),
        )
        .await
        .unwrap();

        let path = store.ensure(&key(), true).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
        assert_eq!(archive.fetch_calls(), 2);
        assert_eq!(notifier.retry_count(), 1);
    }

    #[tokio::test]
    async fn test_open_sweeps_partials() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("arome_2024031500_f006_alps.raw.partial");
        std::fs::write(&stale, b"half").unwrap();

        let archive = Arc::new(FakeArchive::new());
        let _store = store(dir.path(), archive).await;

        assert!(!stale.exists());
    }
}
