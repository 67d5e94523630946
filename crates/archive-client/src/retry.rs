//! Bounded retry with increasing backoff around archive fetches.
//!
//! One *attempt* walks the candidate descriptors in priority order.
//! Structural failures (stale naming convention) only advance to the
//! next candidate; a transient failure marks the attempt retryable.
//! When an attempt ends without success, the policy decides whether to
//! sleep and go again or to give up.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::descriptor::ResourceDescriptor;
use crate::error::FetchError;
use crate::notify::{Notification, Notifier};
use crate::transport::{discard_partial, ArchiveAccess};

/// Retry schedule expressed as data: one delay per failed attempt.
///
/// `delays.len() + 1` is the total attempt budget; the attempt after the
/// last delay is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// The operational schedule: five 30-minute waits, then four
    /// 60-minute waits, ten attempts in total.
    pub fn operational() -> Self {
        let mut delays = vec![Duration::from_secs(30 * 60); 5];
        delays.extend(vec![Duration::from_secs(60 * 60); 4]);
        Self { delays }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.delays.len() as u32 + 1
    }

    /// Backoff after the given 1-based failed attempt, or None when the
    /// budget is exhausted.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        self.delays.get(attempt as usize - 1).copied()
    }
}

/// Fetch a resource, trying candidate descriptors in order within each
/// attempt and sleeping per the policy between attempts.
///
/// On success the artifact is materialized at `target` via a
/// write-to-partial-then-rename, so `target` is never observable in a
/// half-written state. The last underlying error is returned when the
/// budget is exhausted.
pub async fn fetch_with_retry(
    policy: &RetryPolicy,
    archive: &dyn ArchiveAccess,
    notifier: &dyn Notifier,
    descriptors: &[ResourceDescriptor],
    target: &Path,
) -> Result<PathBuf, FetchError> {
    if descriptors.is_empty() {
        return Err(FetchError::InvalidDescriptor(
            "empty descriptor list".to_string(),
        ));
    }

    let context = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| target.display().to_string());
    let partial = partial_path(target);

    let mut attempt: u32 = 1;

    loop {
        let mut last_error: Option<FetchError> = None;
        let mut saw_transient = false;

        for descriptor in descriptors {
            debug!(
                attempt = attempt,
                descriptor = %descriptor,
                "Trying candidate descriptor"
            );

            let outcome = match timeout(descriptor.timeout, archive.fetch(descriptor, &partial)).await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout {
                    secs: descriptor.timeout.as_secs(),
                }),
            };

            match outcome {
                Ok(()) => {
                    fs::rename(&partial, target).await.map_err(|e| {
                        FetchError::Transient(format!(
                            "Failed to move {} into place: {}",
                            partial.display(),
                            e
                        ))
                    })?;
                    info!(
                        target = %target.display(),
                        descriptor = %descriptor,
                        attempt = attempt,
                        "Fetch succeeded"
                    );
                    return Ok(target.to_path_buf());
                }
                Err(e) => {
                    discard_partial(&partial).await;
                    if e.is_transient() {
                        saw_transient = true;
                        warn!(descriptor = %descriptor, error = %e, "Transient fetch failure");
                    } else {
                        debug!(descriptor = %descriptor, error = %e, "Descriptor rejected, trying next");
                    }
                    last_error = Some(e);
                }
            }
        }

        let last_error = match last_error {
            Some(e) => e,
            // The descriptor loop ran at least once, so this only guards
            // against a future refactor breaking that invariant.
            None => {
                return Err(FetchError::InvalidDescriptor(
                    "no descriptor produced an outcome".to_string(),
                ))
            }
        };

        // Only structural failures: every candidate is simply wrong, and
        // waiting will not change that.
        if !saw_transient {
            return Err(last_error);
        }

        match policy.delay_after(attempt) {
            Some(delay) => {
                notifier
                    .notify(Notification::Retry {
                        attempt,
                        delay,
                        context: context.clone(),
                    })
                    .await;
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            None => {
                notifier
                    .notify(Notification::FinalFailure {
                        attempts: attempt,
                        error: last_error.to_string(),
                        context,
                    })
                    .await;
                return Err(last_error);
            }
        }
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    name.push_str(".partial");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// One scripted outcome per fetch call, in order; `Hang` never
    /// resolves and exercises the per-descriptor timeout.
    enum Outcome {
        Ok(&'static [u8]),
        Transient,
        Structural,
        Hang,
    }

    struct ScriptedArchive {
        script: Mutex<Vec<Outcome>>,
        calls: AtomicU32,
    }

    impl ScriptedArchive {
        fn new(script: Vec<Outcome>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArchiveAccess for ScriptedArchive {
        async fn fetch(
            &self,
            _descriptor: &ResourceDescriptor,
            target: &Path,
        ) -> Result<(), FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() {
                    Outcome::Transient
                } else {
                    script.remove(0)
                }
            };
            match outcome {
                Outcome::Ok(bytes) => {
                    fs::write(target, bytes).await.unwrap();
                    Ok(())
                }
                Outcome::Transient => Err(FetchError::Transient("archive unreachable".into())),
                Outcome::Structural => {
                    Err(FetchError::InvalidDescriptor("no such resource".into()))
                }
                Outcome::Hang => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }

        async fn locate(&self, descriptor: &ResourceDescriptor) -> Result<String, FetchError> {
            Ok(descriptor.url())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, event: Notification) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn descriptor(timeout_secs: u64) -> ResourceDescriptor {
        ResourceDescriptor {
            archive_root: "https://archive.example.org".to_string(),
            convention: "2020".to_string(),
            path: "arome/f006.fa".to_string(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient_failures() {
        let archive = ScriptedArchive::new(vec![
            Outcome::Transient,
            Outcome::Transient,
            Outcome::Transient,
            Outcome::Transient,
            Outcome::Ok(b"grib-data"),
        ]);
        let notifier = RecordingNotifier::default();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("arome_f006.fa");

        let result = fetch_with_retry(
            &RetryPolicy::operational(),
            &archive,
            &notifier,
            &[descriptor(600)],
            &target,
        )
        .await
        .unwrap();

        assert_eq!(result, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"grib-data");
        assert_eq!(archive.calls(), 5);

        // Exactly 4 retry notifications, all with the 30-minute backoff,
        // and nothing after the success.
        let events = notifier.events.lock().unwrap();
        assert_eq!(events.len(), 4);
        for (i, event) in events.iter().enumerate() {
            match event {
                Notification::Retry { attempt, delay, .. } => {
                    assert_eq!(*attempt, i as u32 + 1);
                    assert_eq!(*delay, Duration::from_secs(30 * 60));
                }
                other => panic!("unexpected notification: {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_after_budget() {
        let archive = ScriptedArchive::new(Vec::new()); // every call transient
        let notifier = RecordingNotifier::default();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("arome_f006.fa");

        let err = fetch_with_retry(
            &RetryPolicy::operational(),
            &archive,
            &notifier,
            &[descriptor(600)],
            &target,
        )
        .await
        .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(archive.calls(), 10);
        assert!(!target.exists());

        // 9 retries then exactly one final failure; no retry is emitted
        // for the 10th attempt.
        let events = notifier.events.lock().unwrap();
        assert_eq!(events.len(), 10);
        let retries = events
            .iter()
            .filter(|e| matches!(e, Notification::Retry { .. }))
            .count();
        assert_eq!(retries, 9);
        match events.last().unwrap() {
            Notification::FinalFailure { attempts, .. } => assert_eq!(*attempts, 10),
            other => panic!("unexpected final notification: {:?}", other),
        }
        // Schedule: 30 minutes for the first five waits, 60 after.
        match &events[4] {
            Notification::Retry { delay, .. } => {
                assert_eq!(*delay, Duration::from_secs(30 * 60))
            }
            other => panic!("unexpected notification: {:?}", other),
        }
        match &events[5] {
            Notification::Retry { delay, .. } => {
                assert_eq!(*delay, Duration::from_secs(60 * 60))
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_structural_failure_falls_through_to_next_descriptor() {
        let archive = ScriptedArchive::new(vec![Outcome::Structural, Outcome::Ok(b"data")]);
        let notifier = RecordingNotifier::default();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("arome_f006.fa");

        fetch_with_retry(
            &RetryPolicy::operational(),
            &archive,
            &notifier,
            &[descriptor(600), descriptor(600)],
            &target,
        )
        .await
        .unwrap();

        // Fallback within a single attempt: no retry budget consumed,
        // no notifications.
        assert_eq!(archive.calls(), 2);
        assert!(notifier.events.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_structural_fails_immediately() {
        let archive = ScriptedArchive::new(vec![Outcome::Structural, Outcome::Structural]);
        let notifier = RecordingNotifier::default();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("arome_f006.fa");

        let err = fetch_with_retry(
            &RetryPolicy::operational(),
            &archive,
            &notifier,
            &[descriptor(600), descriptor(600)],
            &target,
        )
        .await
        .unwrap_err();

        // Waiting cannot make a wrong descriptor right.
        assert!(!err.is_transient());
        assert_eq!(archive.calls(), 2);
        assert!(notifier.events.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_transfer_hits_descriptor_timeout() {
        let archive = ScriptedArchive::new(vec![Outcome::Hang, Outcome::Ok(b"data")]);
        let notifier = RecordingNotifier::default();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("arome_f006.fa");

        fetch_with_retry(
            &RetryPolicy::new(vec![Duration::from_secs(1)]),
            &archive,
            &notifier,
            &[descriptor(5)],
            &target,
        )
        .await
        .unwrap();

        // The hang is cut by the per-descriptor timeout, classified
        // transient, and the next attempt succeeds.
        assert_eq!(archive.calls(), 2);
        let events = notifier.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Notification::Retry { .. }));
    }

    #[test]
    fn test_operational_schedule_as_data() {
        let policy = RetryPolicy::operational();
        assert_eq!(policy.max_attempts(), 10);
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(1800)));
        assert_eq!(policy.delay_after(5), Some(Duration::from_secs(1800)));
        assert_eq!(policy.delay_after(6), Some(Duration::from_secs(3600)));
        assert_eq!(policy.delay_after(9), Some(Duration::from_secs(3600)));
        assert_eq!(policy.delay_after(10), None);
    }
}
