//! HTTP implementations of the uploader's collaborator traits.
//!
//! [`HttpControlPlane`] talks to the clipdrop API under
//! `{base}/api/events/{event_id}/videos`; [`PresignedPutStore`] PUTs part
//! bodies straight to the object store through presigned URLs.

pub mod control;
pub mod store;

#[cfg(test)]
pub(crate) mod test_server;

pub use control::HttpControlPlane;
pub use store::PresignedPutStore;

/// Size of the slices a PUT body is streamed in.
pub const STREAM_SLICE: usize = 64 * 1024;
