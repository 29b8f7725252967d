//! Single part transfer with retry and backoff.

use bytes::Bytes;
use clipdrop_transfer::{PartLedger, RetryPolicy, UploadSession, UploadTarget};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connection::{ByteProgress, ControlPlane, ObjectStore};
use crate::error::{TransportError, UploadError};
use crate::types::EventSink;

/// Transfers one part (or a whole single-shot file) to a presigned URL.
pub struct PartTransferor<'a> {
    control: &'a dyn ControlPlane,
    store: &'a dyn ObjectStore,
    policy: &'a RetryPolicy,
    events: EventSink,
}

impl<'a> PartTransferor<'a> {
    pub fn new(
        control: &'a dyn ControlPlane,
        store: &'a dyn ObjectStore,
        policy: &'a RetryPolicy,
        events: EventSink,
    ) -> Self {
        Self {
            control,
            store,
            policy,
            events,
        }
    }

    /// Uploads one part and returns its completion token.
    ///
    /// Every attempt mints a fresh URL, since URLs are single-use and
    /// short-lived. Each attempt is bounded by `attempt_timeout`; failures
    /// of any kind are retried after `delay_after(attempt)` until
    /// `max_attempts` is reached.
    #[allow(clippy::too_many_arguments)]
    pub async fn transfer_part(
        &self,
        target: &UploadTarget,
        session: &UploadSession,
        part_number: u32,
        data: Bytes,
        on_progress: ByteProgress,
        ledger: &PartLedger,
        cancel: &CancellationToken,
    ) -> Result<String, UploadError> {
        loop {
            let attempt = ledger.begin_attempt(part_number)?;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                r = tokio::time::timeout(
                    self.policy.attempt_timeout,
                    self.attempt(target, session, part_number, data.clone(), on_progress.clone()),
                ) => r.unwrap_or(Err(TransportError::Timeout(self.policy.attempt_timeout))),
            };

            let cause = match result {
                Ok(token) => {
                    ledger.complete(part_number, token.clone())?;
                    debug!(
                        file = %target.file_name,
                        part = part_number,
                        attempt,
                        "part uploaded"
                    );
                    return Ok(token);
                }
                Err(cause) => cause,
            };

            if !self.policy.allows_retry_after(attempt) {
                ledger.fail(part_number)?;
                warn!(
                    file = %target.file_name,
                    part = part_number,
                    attempts = attempt,
                    error = %cause,
                    "part failed permanently"
                );
                return Err(UploadError::PartTransfer {
                    part_number: Some(part_number),
                    attempts: attempt,
                    last_cause: cause,
                });
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                file = %target.file_name,
                part = part_number,
                attempt,
                retry_in = ?delay,
                error = %cause,
                "part attempt failed, retrying"
            );
            self.events
                .part_retrying(Some(part_number), attempt, delay, &cause);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Uploads a whole file to a single-shot URL.
    ///
    /// The URL cannot be re-minted, so there is exactly one attempt and
    /// no completion token is required. Only cancellation bounds it.
    pub async fn transfer_whole(
        &self,
        url: &str,
        data: Bytes,
        content_type: &str,
        on_progress: ByteProgress,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            r = self.store.put(url, data, content_type, on_progress) => r,
        };

        result.map(|_| ()).map_err(|cause| UploadError::PartTransfer {
            part_number: None,
            attempts: 1,
            last_cause: cause,
        })
    }

    async fn attempt(
        &self,
        target: &UploadTarget,
        session: &UploadSession,
        part_number: u32,
        data: Bytes,
        on_progress: ByteProgress,
    ) -> Result<String, TransportError> {
        let url = self
            .control
            .mint_part_url(target, session, part_number)
            .await
            .map_err(TransportError::UrlUnavailable)?;

        let response = self
            .store
            .put(&url, data, &target.content_type, on_progress)
            .await?;

        match response.etag {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(TransportError::MissingToken),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use clipdrop_transfer::PartStatus;
    use tokio::time::Instant;

    use crate::testing::{
        Call, MockControlPlane, MockStore, PutBehavior, multipart_session, noop_progress, target,
    };

    const PART: u64 = 1024;

    struct Fixture {
        control: MockControlPlane,
        store: MockStore,
        policy: RetryPolicy,
        target: UploadTarget,
        session: UploadSession,
        ledger: PartLedger,
    }

    impl Fixture {
        fn new(store: MockStore) -> Self {
            Self {
                control: MockControlPlane::new(multipart_session(PART, 4)),
                store,
                policy: RetryPolicy::default(),
                target: target(4 * PART),
                session: multipart_session(PART, 4),
                ledger: PartLedger::new(4),
            }
        }

        async fn run(&self, part: u32, cancel: &CancellationToken) -> Result<String, UploadError> {
            PartTransferor::new(&self.control, &self.store, &self.policy, EventSink::disabled())
                .transfer_part(
                    &self.target,
                    &self.session,
                    part,
                    Bytes::from(vec![7u8; PART as usize]),
                    noop_progress(),
                    &self.ledger,
                    cancel,
                )
                .await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success() {
        let f = Fixture::new(MockStore::new());
        let token = f.run(2, &CancellationToken::new()).await.unwrap();
        assert_eq!(token, "\"etag-2\"");
        assert_eq!(f.control.calls(), vec![Call::Mint(2)]);
        let part = f.ledger.get(2).unwrap();
        assert_eq!(part.status, PartStatus::Complete);
        assert_eq!(part.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exactly_three_attempts_with_backoff() {
        let f = Fixture::new(MockStore::new().with_part(3, PutBehavior::AlwaysFail(503)));
        let started = Instant::now();

        let err = f.run(3, &CancellationToken::new()).await.unwrap_err();
        let elapsed = started.elapsed();

        match err {
            UploadError::PartTransfer {
                part_number,
                attempts,
                last_cause,
            } => {
                assert_eq!(part_number, Some(3));
                assert_eq!(attempts, 3);
                assert!(matches!(last_cause, TransportError::Status(503)));
            }
            other => panic!("expected PartTransfer, got {other:?}"),
        }
        assert_eq!(f.store.put_count(3), 3);
        // 1s after attempt 1, 2s after attempt 2, no wait after the last.
        assert_eq!(elapsed, Duration::from_secs(3));
        assert_eq!(f.ledger.get(3).unwrap().status, PartStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn every_attempt_uses_a_fresh_url() {
        let f = Fixture::new(MockStore::new().with_part(1, PutBehavior::FailTimes(2, 500)));
        f.run(1, &CancellationToken::new()).await.unwrap();

        let urls = f.store.urls_for(1);
        assert_eq!(urls.len(), 3);
        let mut unique = urls.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3, "URLs reused: {urls:?}");
        assert_eq!(f.ledger.get(1).unwrap().attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_token_counts_as_failure() {
        let f = Fixture::new(MockStore::new().with_part(1, PutBehavior::NoEtagTimes(1)));
        let token = f.run(1, &CancellationToken::new()).await.unwrap();
        assert_eq!(token, "\"etag-1\"");
        assert_eq!(f.store.put_count(1), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_attempt_times_out_and_retries() {
        let f = Fixture::new(MockStore::new().with_part(4, PutBehavior::HangTimes(1)));
        let started = Instant::now();
        f.run(4, &CancellationToken::new()).await.unwrap();
        // 30s timeout + 1s backoff.
        assert_eq!(started.elapsed(), Duration::from_secs(31));
        assert_eq!(f.store.put_count(4), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn mint_failure_is_retried() {
        let mut f = Fixture::new(MockStore::new());
        f.control = MockControlPlane::new(multipart_session(PART, 4)).with_mint_failures(1, 1);
        f.run(1, &CancellationToken::new()).await.unwrap();
        assert_eq!(f.control.calls(), vec![Call::Mint(1), Call::Mint(1)]);
        assert_eq!(f.store.put_count(1), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff() {
        let f = Fixture::new(MockStore::new().with_part(1, PutBehavior::AlwaysFail(500)));
        let cancel = CancellationToken::new();
        let c = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            c.cancel();
        });
        let err = f.run(1, &cancel).await.unwrap_err();
        assert!(matches!(err, UploadError::Cancelled));
        assert_eq!(f.store.put_count(1), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_byte_progress() {
        let f = Fixture::new(MockStore::new());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let on_progress: ByteProgress = Arc::new(move |sent, total| {
            s.lock().unwrap().push((sent, total));
        });
        PartTransferor::new(&f.control, &f.store, &f.policy, EventSink::disabled())
            .transfer_part(
                &f.target,
                &f.session,
                1,
                Bytes::from(vec![0u8; PART as usize]),
                on_progress,
                &f.ledger,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&(PART, PART)));
    }

    #[tokio::test(start_paused = true)]
    async fn whole_file_single_attempt() {
        let f = Fixture::new(MockStore::new().with_single(PutBehavior::AlwaysFail(403)));
        let err = PartTransferor::new(&f.control, &f.store, &f.policy, EventSink::disabled())
            .transfer_whole(
                "mock://single",
                Bytes::from_static(b"tiny"),
                "video/mp4",
                noop_progress(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploadError::PartTransfer {
                part_number: None,
                attempts: 1,
                last_cause: TransportError::Status(403)
            }
        ));
        assert_eq!(f.store.single_put_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn whole_file_needs_no_token() {
        let f = Fixture::new(MockStore::new().with_single(PutBehavior::NoEtagTimes(u32::MAX)));
        PartTransferor::new(&f.control, &f.store, &f.policy, EventSink::disabled())
            .transfer_whole(
                "mock://single",
                Bytes::from_static(b"tiny"),
                "video/mp4",
                noop_progress(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
    }
}
