use std::cell::{Cell, RefCell};
use std::time::Duration;

use anyhow::{Context, Result};

use super::{CameraBackend, StreamRequest, VideoStream};

const METADATA_POLL: Duration = Duration::from_millis(25);

/// Outcome of a camera acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraStatus {
    Ready,
    Blocked(String),
}

impl CameraStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, CameraStatus::Ready)
    }
}

/// Owns the one live stream for the lifetime of the booth.
///
/// Only the acquirer writes the handle; everything else reads frames through
/// [`CameraAcquirer::with_stream`].
pub struct CameraAcquirer<B: CameraBackend> {
    backend: RefCell<B>,
    request: StreamRequest,
    metadata_timeout: Duration,
    stream: RefCell<Option<B::Stream>>,
    acquiring: Cell<bool>,
}

impl<B: CameraBackend> CameraAcquirer<B> {
    pub fn new(backend: B, request: StreamRequest, metadata_timeout: Duration) -> Self {
        Self {
            backend: RefCell::new(backend),
            request,
            metadata_timeout,
            stream: RefCell::new(None),
            acquiring: Cell::new(false),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.stream.borrow().is_some()
    }

    /// Acquire the stream, or return at once if it is already held.
    ///
    /// A call that arrives while another acquisition is pending waits for
    /// that one and reports its outcome; the device is never opened twice.
    pub async fn acquire(&self) -> CameraStatus {
        if self.is_ready() {
            return CameraStatus::Ready;
        }

        if self.acquiring.replace(true) {
            tracing::debug!("Camera acquisition already pending, waiting for it");
            while self.acquiring.get() {
                tokio::time::sleep(METADATA_POLL).await;
            }
            return if self.is_ready() {
                CameraStatus::Ready
            } else {
                CameraStatus::Blocked("camera acquisition failed".into())
            };
        }
        let _acquiring = AcquiringGuard(&self.acquiring);

        match self.open().await {
            Ok(stream) => {
                *self.stream.borrow_mut() = Some(stream);
                tracing::info!("Camera ready");
                CameraStatus::Ready
            }
            Err(e) => {
                tracing::error!("Camera blocked: {:#}", e);
                CameraStatus::Blocked(format!("{:#}", e))
            }
        }
    }

    async fn open(&self) -> Result<B::Stream> {
        let mut stream = self
            .backend
            .borrow_mut()
            .request_stream(&self.request)
            .context("Camera stream request failed")?;

        let wait = async {
            while stream.resolution().is_none() {
                tokio::time::sleep(METADATA_POLL).await;
            }
        };
        tokio::time::timeout(self.metadata_timeout, wait)
            .await
            .context("Camera never reported its frame size")?;

        stream.start_playback().context("Failed to start playback")?;
        Ok(stream)
    }

    /// Native frame size of the held stream.
    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.stream.borrow().as_ref().and_then(|s| s.resolution())
    }

    /// Run `f` against the held stream, if any.
    pub fn with_stream<R>(&self, f: impl FnOnce(&mut B::Stream) -> R) -> Option<R> {
        self.stream.borrow_mut().as_mut().map(f)
    }
}

struct AcquiringGuard<'a>(&'a Cell<bool>);

impl Drop for AcquiringGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
