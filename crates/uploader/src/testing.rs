//! Mock collaborators shared by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use clipdrop_transfer::{AngleType, CompletedPart, UploadSession, UploadTarget};

use crate::connection::{BoxFuture, ByteProgress, ControlPlane, ObjectStore, PutResponse};
use crate::error::{ControlPlaneError, TransportError};

pub const SINGLE_URL: &str = "mock://single";

pub fn target(file_size: u64) -> UploadTarget {
    UploadTarget::new("event-1", "clip.mp4", file_size, "video/mp4", AngleType::Wide)
}

pub fn multipart_session(part_size: u64, total_parts: u32) -> UploadSession {
    UploadSession {
        object_id: "video-1".into(),
        object_key: "events/event-1/videos/video-1/clip.mp4".into(),
        session_id: Some("mpu-1".into()),
        part_size,
        total_parts,
        multipart: true,
        single_upload_url: None,
    }
}

pub fn single_session() -> UploadSession {
    UploadSession {
        object_id: "video-1".into(),
        object_key: "events/event-1/videos/video-1/clip.mp4".into(),
        session_id: None,
        part_size: 0,
        total_parts: 1,
        multipart: false,
        single_upload_url: Some(SINGLE_URL.into()),
    }
}

pub fn noop_progress() -> ByteProgress {
    Arc::new(|_, _| {})
}

/// A recorded control-plane call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open,
    Mint(u32),
    /// Part numbers in submission order.
    Complete(Vec<u32>),
    MarkUploaded,
    Abort,
}

pub struct MockControlPlane {
    session: UploadSession,
    calls: Mutex<Vec<Call>>,
    minted: AtomicUsize,
    open_error: Option<ControlPlaneError>,
    /// part number -> remaining mint failures
    mint_failures: Mutex<HashMap<u32, u32>>,
    finalize_error: Option<ControlPlaneError>,
    abort_error: Option<ControlPlaneError>,
}

impl MockControlPlane {
    pub fn new(session: UploadSession) -> Self {
        Self {
            session,
            calls: Mutex::new(Vec::new()),
            minted: AtomicUsize::new(0),
            open_error: None,
            mint_failures: Mutex::new(HashMap::new()),
            finalize_error: None,
            abort_error: None,
        }
    }

    pub fn with_open_error(mut self, err: ControlPlaneError) -> Self {
        self.open_error = Some(err);
        self
    }

    pub fn with_mint_failures(self, part_number: u32, times: u32) -> Self {
        self.mint_failures
            .lock()
            .unwrap()
            .insert(part_number, times);
        self
    }

    pub fn with_finalize_error(mut self, err: ControlPlaneError) -> Self {
        self.finalize_error = Some(err);
        self
    }

    pub fn with_abort_error(mut self, err: ControlPlaneError) -> Self {
        self.abort_error = Some(err);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ControlPlane for MockControlPlane {
    fn open_session<'a>(
        &'a self,
        _target: &'a UploadTarget,
    ) -> BoxFuture<'a, Result<UploadSession, ControlPlaneError>> {
        Box::pin(async move {
            self.record(Call::Open);
            match &self.open_error {
                Some(e) => Err(e.clone()),
                None => Ok(self.session.clone()),
            }
        })
    }

    fn mint_part_url<'a>(
        &'a self,
        _target: &'a UploadTarget,
        _session: &'a UploadSession,
        part_number: u32,
    ) -> BoxFuture<'a, Result<String, ControlPlaneError>> {
        Box::pin(async move {
            self.record(Call::Mint(part_number));
            {
                let mut failures = self.mint_failures.lock().unwrap();
                if let Some(remaining) = failures.get_mut(&part_number) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(ControlPlaneError::Status {
                            status: 503,
                            body: "signer unavailable".into(),
                        });
                    }
                }
            }
            let seq = self.minted.fetch_add(1, Ordering::SeqCst);
            Ok(format!("mock://part/{part_number}/{seq}"))
        })
    }

    fn complete_session<'a>(
        &'a self,
        _target: &'a UploadTarget,
        _session: &'a UploadSession,
        parts: &'a [CompletedPart],
    ) -> BoxFuture<'a, Result<(), ControlPlaneError>> {
        Box::pin(async move {
            self.record(Call::Complete(
                parts.iter().map(|p| p.part_number).collect(),
            ));
            match &self.finalize_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        })
    }

    fn mark_uploaded<'a>(
        &'a self,
        _target: &'a UploadTarget,
        _session: &'a UploadSession,
    ) -> BoxFuture<'a, Result<(), ControlPlaneError>> {
        Box::pin(async move {
            self.record(Call::MarkUploaded);
            match &self.finalize_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        })
    }

    fn abort_session<'a>(
        &'a self,
        _target: &'a UploadTarget,
        _session: &'a UploadSession,
    ) -> BoxFuture<'a, Result<(), ControlPlaneError>> {
        Box::pin(async move {
            self.record(Call::Abort);
            match &self.abort_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        })
    }
}

/// Scripted behavior of PUTs for one part (or the single-shot URL).
#[derive(Debug, Clone, Copy)]
pub enum PutBehavior {
    /// Every attempt returns this status.
    AlwaysFail(u16),
    /// The first `n` attempts return the status, then succeed.
    FailTimes(u32, u16),
    /// The first `n` attempts succeed without an ETag.
    NoEtagTimes(u32),
    /// The first `n` attempts never complete.
    HangTimes(u32),
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockStore {
    behaviors: HashMap<u32, PutBehavior>,
    single: Option<PutBehavior>,
    delay: Duration,
    /// key -> urls used, in order; key 0 is the single-shot URL
    urls: Mutex<HashMap<u32, Vec<String>>>,
    bodies: Mutex<HashMap<u32, Bytes>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_part(mut self, part_number: u32, behavior: PutBehavior) -> Self {
        self.behaviors.insert(part_number, behavior);
        self
    }

    pub fn with_single(mut self, behavior: PutBehavior) -> Self {
        self.single = Some(behavior);
        self
    }

    /// Simulated transfer time of every PUT.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn put_count(&self, part_number: u32) -> usize {
        self.urls_for(part_number).len()
    }

    pub fn single_put_count(&self) -> usize {
        self.urls_for(0).len()
    }

    pub fn urls_for(&self, part_number: u32) -> Vec<String> {
        self.urls
            .lock()
            .unwrap()
            .get(&part_number)
            .cloned()
            .unwrap_or_default()
    }

    /// Body of the last successful PUT of a part (0 for single-shot).
    pub fn body(&self, part_number: u32) -> Option<Bytes> {
        self.bodies.lock().unwrap().get(&part_number).cloned()
    }

    pub fn max_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn key(url: &str) -> u32 {
        url.strip_prefix("mock://part/")
            .and_then(|rest| rest.split('/').next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }
}

impl ObjectStore for MockStore {
    fn put<'a>(
        &'a self,
        url: &'a str,
        body: Bytes,
        _content_type: &'a str,
        progress: ByteProgress,
    ) -> BoxFuture<'a, Result<PutResponse, TransportError>> {
        Box::pin(async move {
            let _guard = InFlight::enter(&self.in_flight, &self.peak);
            let key = Self::key(url);
            let attempt = {
                let mut urls = self.urls.lock().unwrap();
                let used = urls.entry(key).or_default();
                used.push(url.to_string());
                used.len() as u32
            };
            let behavior = if key == 0 {
                self.single
            } else {
                self.behaviors.get(&key).copied()
            };

            let total = body.len() as u64;
            progress(total / 2, total);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let mut etag = Some(if key == 0 {
                "\"etag-single\"".to_string()
            } else {
                format!("\"etag-{key}\"")
            });
            match behavior {
                Some(PutBehavior::AlwaysFail(status)) => return Err(TransportError::Status(status)),
                Some(PutBehavior::FailTimes(n, status)) if attempt <= n => {
                    return Err(TransportError::Status(status));
                }
                Some(PutBehavior::NoEtagTimes(n)) if attempt <= n => etag = None,
                Some(PutBehavior::HangTimes(n)) if attempt <= n => {
                    std::future::pending::<()>().await;
                }
                _ => {}
            }

            progress(total, total);
            self.bodies.lock().unwrap().insert(key, body);
            Ok(PutResponse { status: 200, etag })
        })
    }
}
