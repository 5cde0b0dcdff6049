//! Multipart upload orchestrator
//!
//! Uploads a file larger than the segment size as a sequence of parts:
//!
//! 1. plan segments and initiate the session
//! 2. upload every segment concurrently, bounded by a semaphore
//! 3. send failed segments once more, immediately and concurrently
//! 4. fetch the part list from the server and complete the session,
//!    up to [`COMPLETE_ATTEMPTS`] times
//! 5. on any unrecoverable failure, abort the session and return the
//!    original error
//!
//! # State machine
//!
//! ```text
//! Initiated ──► Completing ──► Complete
//!     │              │
//!     └──────┬───────┘
//!            ▼
//!        Aborting ──► Aborted
//! ```
//!
//! A session never outlives the orchestrator: if the upload future is
//! dropped mid-flight, [`AbortGuard`] spawns a best-effort abort.

use super::segment::{plan_segments, Segment, SegmentState};
use super::{ObjectStore, UploadError, UploadMethod, UploadResult};
use crate::metrics;
use crate::obs::{CompletedPart, ObjectBody, ObjectHeaders, ObsClientError};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Total CompleteMultipartUpload attempts
pub const COMPLETE_ATTEMPTS: u32 = 3;

/// Multipart session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Initiated,
    Completing,
    Complete,
    Aborting,
    Aborted,
}

impl UploadState {
    pub fn can_transition_to(self, next: UploadState) -> bool {
        use UploadState::*;
        matches!(
            (self, next),
            (Initiated, Completing)
                | (Completing, Complete)
                | (Initiated, Aborting)
                | (Completing, Aborting)
                | (Aborting, Aborted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UploadState::Complete | UploadState::Aborted)
    }
}

/// One multipart upload session
///
/// Only the orchestrator mutates the session; worker tasks report their
/// outcome by part number.
#[derive(Debug)]
pub struct UploadSession {
    key: String,
    upload_id: String,
    segments: Vec<Segment>,
    state: UploadState,
}

impl UploadSession {
    pub fn new(key: impl Into<String>, upload_id: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            key: key.into(),
            upload_id: upload_id.into(),
            segments,
            state: UploadState::Initiated,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Move to `next`, rejecting edges outside the state machine
    pub fn transition(&mut self, next: UploadState) -> Result<(), UploadError> {
        if !self.state.can_transition_to(next) {
            return Err(UploadError::Fatal {
                upload_id: self.upload_id.clone(),
                reason: format!("invalid state transition {:?} -> {:?}", self.state, next),
                source: None,
            });
        }
        tracing::debug!(upload_id = %self.upload_id, from = ?self.state, to = ?next, "Session state change");
        self.state = next;
        Ok(())
    }

    fn set_segment_state(&mut self, part_number: u32, state: SegmentState) {
        if let Some(segment) = self
            .segments
            .iter_mut()
            .find(|segment| segment.part_number == part_number)
        {
            segment.state = state;
        }
    }

    fn segments_in(&self, state: SegmentState) -> Vec<Segment> {
        self.segments
            .iter()
            .filter(|segment| segment.state == state)
            .cloned()
            .collect()
    }
}

/// Aborts the session on drop unless disarmed
pub struct AbortGuard {
    armed: Option<(Arc<dyn ObjectStore>, String, String)>,
}

impl AbortGuard {
    pub fn new(store: Arc<dyn ObjectStore>, key: &str, upload_id: &str) -> Self {
        Self {
            armed: Some((store, key.to_string(), upload_id.to_string())),
        }
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        let Some((store, key, upload_id)) = self.armed.take() else {
            return;
        };
        tracing::warn!(upload_id = %upload_id, "Multipart upload dropped before finishing, aborting");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let result = store.abort_multipart_upload(&key, &upload_id).await;
                    metrics::record_abort(result.is_ok());
                    if let Err(e) = result {
                        tracing::error!(upload_id = %upload_id, error = %e, "Abort after drop failed");
                    }
                });
            }
            Err(_) => {
                tracing::error!(upload_id = %upload_id, "No runtime to abort dropped multipart upload");
            }
        }
    }
}

/// Multipart upload handler
pub struct MultipartHandler {
    store: Arc<dyn ObjectStore>,
    segment_size: u64,
    concurrent_segments: usize,
}

impl MultipartHandler {
    /// Create a new multipart handler
    pub fn new(store: Arc<dyn ObjectStore>, segment_size: u64, concurrent_segments: usize) -> Self {
        Self {
            store,
            segment_size,
            concurrent_segments: concurrent_segments.max(1),
        }
    }

    pub fn segment_size(&self) -> u64 {
        self.segment_size
    }

    /// Upload `file_size` bytes of `path` as `key` through a multipart session
    #[tracing::instrument(
        name = "upload.multipart",
        skip(self, path, headers),
        fields(
            obs.bucket = %self.store.bucket(),
            obs.key = %key,
            upload.bytes = file_size,
            obs.upload_id = tracing::field::Empty,
            obs.etag = tracing::field::Empty
        ),
        err
    )]
    pub async fn upload(
        &self,
        path: &Path,
        file_size: u64,
        key: &str,
        headers: &ObjectHeaders,
    ) -> Result<UploadResult, UploadError> {
        let bucket = self.store.bucket().to_string();
        let start_time = Instant::now();
        let segments = plan_segments(file_size, self.segment_size)?;

        let upload_id = self.store.initiate_multipart_upload(key, headers).await.map_err(|e| {
            metrics::record_multipart_upload_failure(&bucket);
            UploadError::from(e)
        })?;
        tracing::Span::current().record("obs.upload_id", upload_id.as_str());

        let mut session = UploadSession::new(key, upload_id.as_str(), segments);
        let mut guard = AbortGuard::new(self.store.clone(), key, &upload_id);

        let outcome = self.drive(&mut session, path).await;

        let duration = start_time.elapsed();
        metrics::record_upload_duration(&bucket, "multipart", duration.as_secs_f64());

        match outcome {
            Ok(etag) => {
                let parts = session.segments().len();
                metrics::record_multipart_upload_success(&bucket, parts);
                metrics::record_upload_success(&bucket, file_size);

                guard.disarm();
                tracing::Span::current().record("obs.etag", etag.as_str());
                tracing::info!(
                    etag = %etag,
                    parts = parts,
                    duration_ms = duration.as_millis(),
                    "Multipart upload completed"
                );

                Ok(UploadResult {
                    etag,
                    bytes_written: file_size,
                    parts,
                    method: UploadMethod::Multipart,
                })
            }
            Err(e) => {
                metrics::record_multipart_upload_failure(&bucket);
                metrics::record_upload_failure(&bucket);
                metrics::record_error("multipart");
                tracing::error!(error = %e, duration_ms = duration.as_millis(), "Multipart upload failed");

                self.abort(&mut session).await;
                guard.disarm();
                Err(e)
            }
        }
    }

    async fn drive(&self, session: &mut UploadSession, path: &Path) -> Result<String, UploadError> {
        self.upload_segments(session, path).await?;
        self.complete(session).await
    }

    /// Upload all segments, then send failed ones once more
    async fn upload_segments(&self, session: &mut UploadSession, path: &Path) -> Result<(), UploadError> {
        let pending = session.segments_in(SegmentState::Pending);
        self.upload_batch(session, path, pending).await;

        let failed = session.segments_in(SegmentState::Failed);
        if failed.is_empty() {
            return Ok(());
        }

        tracing::warn!(
            upload_id = %session.upload_id(),
            segments = ?failed.iter().map(|segment| segment.part_number).collect::<Vec<_>>(),
            "Retrying failed segments"
        );
        metrics::record_segment_retries(failed.len());

        let mut errors = self.upload_batch(session, path, failed).await;
        let still_failed = session.segments_in(SegmentState::Failed);
        match still_failed.first() {
            None => Ok(()),
            Some(segment) => Err(UploadError::Fatal {
                upload_id: session.upload_id().to_string(),
                reason: format!(
                    "{} segment(s) failed after retry, first is segment {}",
                    still_failed.len(),
                    segment.part_number
                ),
                source: errors.remove(&segment.part_number),
            }),
        }
    }

    /// Upload `segments` concurrently and record each outcome in the session
    ///
    /// Returns the error of every failed segment keyed by part number. A
    /// task that panicked leaves its segment failed without an error.
    async fn upload_batch(
        &self,
        session: &mut UploadSession,
        path: &Path,
        segments: Vec<Segment>,
    ) -> HashMap<u32, ObsClientError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrent_segments));
        let mut tasks = JoinSet::new();
        let mut outstanding: BTreeSet<u32> = BTreeSet::new();

        for segment in segments {
            outstanding.insert(segment.part_number);
            let store = self.store.clone();
            let semaphore = semaphore.clone();
            let key = session.key().to_string();
            let upload_id = session.upload_id().to_string();
            let path: PathBuf = path.to_path_buf();

            tasks.spawn(async move {
                let part_number = segment.part_number;
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            part_number,
                            Err(ObsClientError::ResponseError("segment pool closed".into())),
                        )
                    }
                };
                let body = ObjectBody::file(path, segment.offset, segment.length);
                let result = store.upload_part(&key, &upload_id, part_number, body).await;
                (part_number, result)
            });
        }

        let mut errors = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((part_number, Ok(_etag))) => {
                    outstanding.remove(&part_number);
                    metrics::record_segment_upload(true);
                    session.set_segment_state(part_number, SegmentState::Uploaded);
                }
                Ok((part_number, Err(e))) => {
                    outstanding.remove(&part_number);
                    metrics::record_segment_upload(false);
                    tracing::warn!(part_number, retryable = e.is_retryable(), error = %e, "Segment upload failed");
                    session.set_segment_state(part_number, SegmentState::Failed);
                    errors.insert(part_number, e);
                }
                Err(e) => {
                    metrics::record_segment_upload(false);
                    tracing::error!(error = %e, "Segment upload task did not finish");
                }
            }
        }

        for part_number in outstanding {
            session.set_segment_state(part_number, SegmentState::Failed);
        }
        errors
    }

    /// Verify the server's part list and complete the session
    async fn complete(&self, session: &mut UploadSession) -> Result<String, UploadError> {
        session.transition(UploadState::Completing)?;

        let mut last_error: Option<ObsClientError> = None;
        for attempt in 1..=COMPLETE_ATTEMPTS {
            if attempt > 1 {
                metrics::record_complete_retry();
            }
            match self.try_complete(session).await {
                Ok(etag) => {
                    session.transition(UploadState::Complete)?;
                    return Ok(etag);
                }
                Err(CompleteError::Verification(reason)) => {
                    return Err(UploadError::Fatal {
                        upload_id: session.upload_id().to_string(),
                        reason,
                        source: None,
                    });
                }
                Err(CompleteError::Request(e)) => {
                    tracing::warn!(
                        upload_id = %session.upload_id(),
                        attempt,
                        error = %e,
                        "CompleteMultipartUpload attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(UploadError::Fatal {
            upload_id: session.upload_id().to_string(),
            reason: format!("completion failed after {} attempts", COMPLETE_ATTEMPTS),
            source: last_error,
        })
    }

    async fn try_complete(&self, session: &UploadSession) -> Result<String, CompleteError> {
        let listed = self
            .store
            .list_parts(session.key(), session.upload_id())
            .await
            .map_err(CompleteError::Request)?;
        let parts = verify_parts(session.segments(), listed).map_err(CompleteError::Verification)?;

        self.store
            .complete_multipart_upload(session.key(), session.upload_id(), &parts)
            .await
            .map_err(CompleteError::Request)
    }

    /// Best-effort abort; failures are logged, never returned
    async fn abort(&self, session: &mut UploadSession) {
        if session.transition(UploadState::Aborting).is_err() {
            return;
        }

        match self
            .store
            .abort_multipart_upload(session.key(), session.upload_id())
            .await
        {
            Ok(()) => {
                metrics::record_abort(true);
                // Aborting -> Aborted is always a valid edge
                let _ = session.transition(UploadState::Aborted);
                tracing::info!(upload_id = %session.upload_id(), "Multipart upload aborted");
            }
            Err(source) => {
                metrics::record_abort(false);
                let cleanup = UploadError::Cleanup {
                    upload_id: session.upload_id().to_string(),
                    source,
                };
                tracing::error!(error = %cleanup, "Best-effort abort failed");
            }
        }
    }
}

enum CompleteError {
    Request(ObsClientError),
    Verification(String),
}

/// Check the server holds every planned part exactly once and nothing else
fn verify_parts(segments: &[Segment], listed: Vec<CompletedPart>) -> Result<Vec<CompletedPart>, String> {
    let mut seen = BTreeSet::new();
    for part in &listed {
        if !seen.insert(part.part_number) {
            return Err(format!("server lists part {} more than once", part.part_number));
        }
    }

    let planned: BTreeSet<u32> = segments.iter().map(|segment| segment.part_number).collect();
    if let Some(missing) = planned.difference(&seen).next() {
        return Err(format!("server is missing part {}", missing));
    }
    if let Some(unexpected) = seen.difference(&planned).next() {
        return Err(format!("server lists unexpected part {}", unexpected));
    }

    Ok(listed)
}
