//! Upload pipeline.
//!
//! An upload is a spawned task that streams the selected file to object storage in fixed-size
//! chunks and then asks the processing endpoint to index it. The task reports on a bounded
//! channel: zero or more non-decreasing [`UploadEvent::Progress`] values followed by exactly
//! one terminal event, `Completed` or `Failed`.
//!
//! Cancellation is checked before every chunk. A cancelled upload aborts its staged data and
//! ends with `Failed(TransferError::Cancelled)`. Dropping the [`UploadHandle`] without
//! cancelling lets the transfer run to completion.
//!
//! Processing is best effort: a failed processing call never fails the upload, it is reported
//! in the receipt instead.

use crate::config::CoreConfig;
use crate::constants::{DEFAULT_UPLOAD_CHUNK_BYTES, MAX_UPLOAD_BYTES, PROGRESS_CHANNEL_CAPACITY};
use crate::error::{ProcessingError, TransferError, UploadError, ValidationError};
use crate::notify::{Notifier, Toast};
use crate::ports::{ObjectStorage, ProcessingClient};
use crate::routes::{Navigator, Route};
use crate::session::Identity;
use api_shared::ProcessReq;
use healthrec_files::ObjectKey;
use healthrec_uuid::{MonotonicClock, TimestampMillis};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Where a finished upload lands.
pub const POST_UPLOAD_ROUTE: Route = Route::Timeline;

const IMAGE_EXTENSIONS: [&str; 9] = [
    "png", "jpg", "jpeg", "gif", "webp", "bmp", "tif", "tiff", "heic",
];

/// A file the user picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    /// Name as picked, without directories
    pub name: String,
    pub size_bytes: u64,
    /// Sniffed content type, if recognised
    pub media_type: Option<String>,
}

impl SelectedFile {
    /// Reads name, size and sniffed type of a regular file.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let media_type = infer::get_from_path(path)?.map(|t| t.mime_type().to_owned());

        Ok(Self {
            path: path.to_path_buf(),
            name,
            size_bytes: metadata.len(),
            media_type,
        })
    }

    /// True for PDFs and images, judged by extension or sniffed type.
    pub fn accepts(&self) -> bool {
        let extension = Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        let by_extension = match extension.as_deref() {
            Some("pdf") => true,
            Some(ext) => IMAGE_EXTENSIONS.contains(&ext),
            None => false,
        };
        let by_type = match self.media_type.as_deref() {
            Some("application/pdf") => true,
            Some(mime) => mime.starts_with("image/"),
            None => false,
        };

        by_extension || by_type
    }
}

/// Opens `path` through the picker's accept filter (`.pdf`, `image/*`).
///
/// Files of other types are dropped silently, as a browser file input would.
pub fn pick_file(path: &Path) -> std::io::Result<Option<SelectedFile>> {
    let file = SelectedFile::from_path(path)?;
    if file.accepts() {
        Ok(Some(file))
    } else {
        tracing::debug!(file = %file.name, media_type = ?file.media_type, "picker rejected file type");
        Ok(None)
    }
}

/// Storage key `{owner}/{timestamp}-{original name}`.
///
/// Characters that cannot appear in a key segment are replaced with `_`.
pub fn storage_key(
    owner: &str,
    timestamp: TimestampMillis,
    original_name: &str,
) -> Result<ObjectKey, TransferError> {
    if owner.contains('/') {
        return Err(TransferError::InvalidKey(owner.to_owned()));
    }

    let name: String = original_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '?' | '#' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let name = if name.is_empty() { "upload".to_owned() } else { name };

    let key = format!("{}/{}-{}", owner, timestamp, name);
    ObjectKey::parse(&key).map_err(|_| TransferError::InvalidKey(key))
}

/// What the processing step made of an upload.
#[derive(Debug)]
pub enum ProcessingOutcome {
    Indexed { message: Option<String> },
    NotIndexed(ProcessingError),
}

/// Result of a completed upload.
#[derive(Debug)]
pub struct UploadReceipt {
    pub key: ObjectKey,
    pub original_name: String,
    pub size_bytes: u64,
    pub processing: ProcessingOutcome,
}

impl UploadReceipt {
    /// Stored file name, as sent to the processing endpoint.
    pub fn stored_name(&self) -> &str {
        self.key.file_name()
    }
}

#[derive(Debug)]
pub enum UploadEvent {
    /// Percentage of bytes stored so far.
    Progress(u8),
    Completed(UploadReceipt),
    Failed(TransferError),
}

/// Receiving side of a running upload.
#[derive(Debug)]
pub struct UploadHandle {
    events: mpsc::Receiver<UploadEvent>,
}

impl UploadHandle {
    /// The next event, or `None` after the terminal event has been received.
    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        self.events.recv().await
    }

    /// Runs the upload to its terminal event, passing every progress value to `on_progress`.
    pub async fn finish(
        mut self,
        mut on_progress: impl FnMut(u8),
    ) -> Result<UploadReceipt, TransferError> {
        while let Some(event) = self.events.recv().await {
            match event {
                UploadEvent::Progress(p) => on_progress(p),
                UploadEvent::Completed(receipt) => return Ok(receipt),
                UploadEvent::Failed(e) => return Err(e),
            }
        }
        Err(TransferError::Interrupted)
    }
}

/// Starts uploads. Cheap to clone.
#[derive(Clone)]
pub struct UploadPipeline {
    storage: Arc<dyn ObjectStorage>,
    processing: Arc<dyn ProcessingClient>,
    clock: Arc<MonotonicClock>,
    chunk_bytes: usize,
    max_bytes: u64,
}

impl UploadPipeline {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        processing: Arc<dyn ProcessingClient>,
        clock: Arc<MonotonicClock>,
    ) -> Self {
        Self {
            storage,
            processing,
            clock,
            chunk_bytes: DEFAULT_UPLOAD_CHUNK_BYTES,
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }

    pub fn from_config(
        cfg: &CoreConfig,
        storage: Arc<dyn ObjectStorage>,
        processing: Arc<dyn ProcessingClient>,
        clock: Arc<MonotonicClock>,
    ) -> Self {
        Self::new(storage, processing, clock)
            .with_chunk_bytes(cfg.chunk_bytes())
            .with_max_bytes(cfg.max_upload_bytes())
    }

    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn validate(&self, file: &SelectedFile) -> Result<(), ValidationError> {
        if file.size_bytes > self.max_bytes {
            return Err(ValidationError::FileTooLarge {
                size: file.size_bytes,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Validates `file` and spawns its upload for `owner`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::FileTooLarge` without touching storage.
    pub fn start(
        &self,
        owner: &Identity,
        file: SelectedFile,
        cancel: CancellationToken,
    ) -> Result<UploadHandle, ValidationError> {
        self.validate(&file)?;

        let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let job = Transfer {
            storage: self.storage.clone(),
            processing: self.processing.clone(),
            owner: owner.id.as_str().to_owned(),
            key_time: self.clock.next(),
            chunk_bytes: self.chunk_bytes,
            file,
            cancel,
            progress: Progress::new(tx.clone()),
        };

        tokio::spawn(async move {
            let event = match job.run().await {
                Ok(receipt) => UploadEvent::Completed(receipt),
                Err(e) => {
                    tracing::error!("Upload failed: {}", e);
                    UploadEvent::Failed(e)
                }
            };
            // A dropped handle means nobody is listening; the upload itself is done.
            let _ = tx.send(event).await;
        });

        Ok(UploadHandle { events: rx })
    }
}

/// Emits strictly increasing percentages.
struct Progress {
    tx: mpsc::Sender<UploadEvent>,
    last: Option<u8>,
}

impl Progress {
    fn new(tx: mpsc::Sender<UploadEvent>) -> Self {
        Self { tx, last: None }
    }

    async fn report(&mut self, done: u64, total: u64) {
        let pct = if total == 0 {
            100
        } else {
            ((done.min(total) * 100) / total) as u8
        };

        if self.last.is_some_and(|last| pct <= last) {
            return;
        }
        self.last = Some(pct);
        tracing::debug!(progress = pct, "upload progress");
        let _ = self.tx.send(UploadEvent::Progress(pct)).await;
    }
}

struct Transfer {
    storage: Arc<dyn ObjectStorage>,
    processing: Arc<dyn ProcessingClient>,
    owner: String,
    key_time: TimestampMillis,
    chunk_bytes: usize,
    file: SelectedFile,
    cancel: CancellationToken,
    progress: Progress,
}

impl Transfer {
    async fn run(mut self) -> Result<UploadReceipt, TransferError> {
        let key = storage_key(&self.owner, self.key_time, &self.file.name)?;
        let mut source = tokio::fs::File::open(&self.file.path)
            .await
            .map_err(TransferError::Read)?;
        let total = self.file.size_bytes;

        if total > 0 {
            self.progress.report(0, total).await;
        }

        let session = self.storage.begin_upload(&key, total).await?;
        tracing::info!(key = %key, bytes = total, "upload started");

        let sent = self.send_chunks(&session, &mut source, total).await;
        let committed = match sent {
            Ok(()) => self.storage.finish_upload(&session).await.map_err(TransferError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = committed {
            if let Err(abort) = self.storage.abort_upload(&session).await {
                tracing::warn!("failed to abort upload {}: {}", session, abort);
            }
            return Err(e);
        }

        self.progress.report(total, total).await;
        tracing::info!(key = %key, "upload complete");

        match self.storage.download_url(&key).await {
            Ok(url) => tracing::info!("File available at {}", url.url),
            Err(e) => tracing::warn!("could not resolve download URL for {}: {}", key, e),
        }

        let request = ProcessReq {
            user_id: self.owner.clone(),
            file_name: key.file_name().to_owned(),
        };
        let processing = match self.processing.process(&request).await {
            Ok(res) => ProcessingOutcome::Indexed {
                message: res.message,
            },
            Err(e) => {
                tracing::warn!("Error processing file: {}", e);
                ProcessingOutcome::NotIndexed(e)
            }
        };

        Ok(UploadReceipt {
            key,
            original_name: self.file.name.clone(),
            size_bytes: total,
            processing,
        })
    }

    async fn send_chunks(
        &mut self,
        session: &str,
        source: &mut tokio::fs::File,
        total: u64,
    ) -> Result<(), TransferError> {
        let mut offset = 0u64;
        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(session, "upload cancelled");
                return Err(TransferError::Cancelled);
            }
            if offset >= total {
                return Ok(());
            }

            let len = (total - offset).min(self.chunk_bytes as u64) as usize;
            let mut chunk = vec![0u8; len];
            source
                .read_exact(&mut chunk)
                .await
                .map_err(TransferError::Read)?;

            offset = self.storage.upload_chunk(session, offset, chunk).await?;
            self.progress.report(offset, total).await;
        }
    }
}

/// Outcome shown for the current job. A successful upload resets the job instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    None,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub file: SelectedFile,
    pub progress: u8,
    pub outcome: JobOutcome,
}

/// State of the upload page: one job at a time.
pub struct UploadController {
    pipeline: UploadPipeline,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    job: Option<UploadJob>,
}

impl UploadController {
    pub fn new(
        pipeline: UploadPipeline,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pipeline,
            navigator,
            notifier,
            job: None,
        }
    }

    pub fn job(&self) -> Option<&UploadJob> {
        self.job.as_ref()
    }

    fn in_progress(&self) -> bool {
        self.job
            .as_ref()
            .is_some_and(|job| job.outcome == JobOutcome::None && job.progress > 0 && job.progress < 100)
    }

    /// Makes `file` the current selection.
    ///
    /// A file over the size limit is refused with a toast and the previous selection is kept.
    pub fn select(&mut self, file: SelectedFile) -> Result<(), ValidationError> {
        if self.in_progress() {
            return Err(ValidationError::UploadInProgress);
        }

        if let Err(e) = self.pipeline.validate(&file) {
            self.notifier.notify(
                Toast::error("File too large")
                    .with_description("Please select a file smaller than 10MB"),
            );
            return Err(e);
        }

        self.job = Some(UploadJob {
            file,
            progress: 0,
            outcome: JobOutcome::None,
        });
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        self.job.is_some() && !self.in_progress()
    }

    /// Uploads the selected file for `owner`, reporting progress to `observer`.
    ///
    /// On success the job is reset and the user is taken to the timeline, even when the
    /// processing step failed (a warning toast says so). On transfer failure the job keeps the
    /// file, progress returns to 0 and the outcome is `Failure` until acknowledged.
    pub async fn submit(
        &mut self,
        owner: &Identity,
        cancel: CancellationToken,
        mut observer: impl FnMut(u8),
    ) -> Result<UploadReceipt, UploadError> {
        if self.in_progress() {
            return Err(ValidationError::UploadInProgress.into());
        }
        let file = match &self.job {
            Some(job) => job.file.clone(),
            None => return Err(ValidationError::NoFileSelected.into()),
        };

        let mut handle = self.pipeline.start(owner, file, cancel)?;
        if let Some(job) = self.job.as_mut() {
            job.outcome = JobOutcome::None;
        }

        let result = loop {
            match handle.next_event().await {
                Some(UploadEvent::Progress(p)) => {
                    if let Some(job) = self.job.as_mut() {
                        job.progress = p;
                    }
                    observer(p);
                }
                Some(UploadEvent::Completed(receipt)) => break Ok(receipt),
                Some(UploadEvent::Failed(e)) => break Err(e),
                None => break Err(TransferError::Interrupted),
            }
        };

        match result {
            Ok(receipt) => {
                match &receipt.processing {
                    ProcessingOutcome::Indexed { .. } => self.notifier.notify(
                        Toast::success("File uploaded successfully").with_description(format!(
                            "{} has been uploaded.",
                            receipt.original_name
                        )),
                    ),
                    ProcessingOutcome::NotIndexed(e) => self.notifier.notify(
                        Toast::warning("File uploaded, but processing failed")
                            .with_description(e.to_string()),
                    ),
                }
                self.job = None;
                self.navigator.navigate(POST_UPLOAD_ROUTE);
                Ok(receipt)
            }
            Err(e) => {
                self.notifier
                    .notify(Toast::error("Upload failed").with_description(e.to_string()));
                if let Some(job) = self.job.as_mut() {
                    job.progress = 0;
                    job.outcome = JobOutcome::Failure;
                }
                Err(e.into())
            }
        }
    }

    /// Clears a failed outcome so the user can try again.
    pub fn acknowledge(&mut self) {
        if let Some(job) = self.job.as_mut() {
            if job.outcome == JobOutcome::Failure {
                job.outcome = JobOutcome::None;
            }
        }
    }
}
