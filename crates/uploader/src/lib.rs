//! Upload engine for presigned multi-part transfers.
//!
//! Turns a local file into a finished object in a remote store, driven by
//! a control-plane that decides single-shot vs multi-part and mints one
//! short-lived URL per part. The crate has no transport dependencies: the
//! caller provides [`ControlPlane`] and [`ObjectStore`] implementations.
//!
//! # Pipeline
//!
//! 1. **Open**: ask the control-plane for a session (0–5%)
//! 2. **Transfer**: at most `K` parts in flight, each retried with backoff (5–95%)
//! 3. **Finalize**: submit the sorted part list, or mark the object uploaded (95–100%)
//! 4. **Abort**: on an unrecoverable part failure, release the remote session

pub mod connection;
pub mod controller;
pub mod error;
pub mod orchestrator;
pub mod part;
pub mod planner;
pub mod scheduler;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{BoxFuture, ByteProgress, ControlPlane, ObjectStore, PutResponse};
pub use controller::{SessionController, SessionState};
pub use error::{ControlPlaneError, FailurePhase, TransportError, UploadError};
pub use orchestrator::UploadOrchestrator;
pub use part::PartTransferor;
pub use planner::SessionPlanner;
pub use scheduler::ConcurrencyScheduler;
pub use types::{EventSink, UploadEvent, UploadOutcome, UploadReport, UploadRequest, UploaderConfig};

/// Default number of parts transferred concurrently per file.
pub const DEFAULT_CONCURRENCY: usize = 4;
