use crate::TransferError;
use crate::chunked::total_parts;
use crate::types::{UploadSession, UploadTarget};

/// Validates a target before a session is requested.
///
/// Rejects:
/// - Empty owner id or content type
/// - Empty file names and names containing path separators
/// - Content types without a `/`
pub fn validate_target(target: &UploadTarget) -> Result<(), TransferError> {
    if target.owner_id.trim().is_empty() {
        return Err(TransferError::InvalidTarget("empty owner id".into()));
    }
    if target.file_name.trim().is_empty() {
        return Err(TransferError::InvalidTarget("empty file name".into()));
    }
    if target.file_name.contains(['/', '\\']) {
        return Err(TransferError::InvalidTarget(format!(
            "file name must not contain path separators: {}",
            target.file_name
        )));
    }
    if !target.content_type.contains('/') {
        return Err(TransferError::InvalidTarget(format!(
            "invalid content type: {:?}",
            target.content_type
        )));
    }
    Ok(())
}

/// Checks that a session returned by the control-plane is usable for `target`.
///
/// The multi-part decision itself is the control-plane's; this only
/// verifies the descriptor is self-consistent.
pub fn validate_session(target: &UploadTarget, session: &UploadSession) -> Result<(), TransferError> {
    if session.object_id.is_empty() {
        return Err(TransferError::InvalidSession("missing object id".into()));
    }

    if !session.multipart {
        return match session.single_upload_url.as_deref() {
            Some(url) if !url.is_empty() => Ok(()),
            _ => Err(TransferError::InvalidSession(
                "single-shot session without upload URL".into(),
            )),
        };
    }

    if session.session_id.as_deref().is_none_or(str::is_empty) {
        return Err(TransferError::InvalidSession(
            "multi-part session without session id".into(),
        ));
    }
    if session.part_size == 0 {
        return Err(TransferError::InvalidSession("part size is zero".into()));
    }
    let expected = total_parts(target.file_size, session.part_size);
    if session.total_parts != expected {
        return Err(TransferError::InvalidSession(format!(
            "part count {} does not match ceil({} / {}) = {expected}",
            session.total_parts, target.file_size, session.part_size
        )));
    }
    if session.total_parts == 0 {
        return Err(TransferError::InvalidSession(
            "multi-part session with no parts".into(),
        ));
    }
    Ok(())
}
