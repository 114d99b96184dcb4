//! Deferred request body.
//!
//! The connection task feeds body chunks into a bounded channel while the
//! router runs. [`Body::text`] drains that channel once, on first use, and
//! caches the outcome, success or failure, for every later caller.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::sync::{OnceCell, mpsc};

/// Sending side of a body stream: `Ok` chunks, then either a drop (end of
/// body) or a single `Err` (stream failure).
pub type ChunkSender = mpsc::Sender<io::Result<Bytes>>;

/// Receiving side of a body stream, owned by [`Body`] until first read.
pub type ChunkReceiver = mpsc::Receiver<io::Result<Bytes>>;

/// Failure while materializing a request body.
///
/// `Clone` so the memoized outcome can be returned to every waiter.
#[derive(Debug, Clone, Error)]
pub enum BodyError {
    #[error("request body stream failed: {0}")]
    Stream(Arc<io::Error>),

    /// The first reader was cancelled after taking the stream.
    #[error("request body stream was detached before completion")]
    Detached,
}

/// A request body that is read from the transport at most once.
///
/// # Examples
///
/// ```
/// use verso::http::Body;
///
/// # tokio_test_block(async {
/// let body = Body::ready("{\"name\":\"x\"}");
/// assert_eq!(body.text().await.unwrap(), "{\"name\":\"x\"}");
/// # });
/// # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug)]
pub struct Body {
    text: OnceCell<Result<String, BodyError>>,
    source: Mutex<Option<ChunkReceiver>>,
}

impl Body {
    /// Creates a body backed by a chunk channel with room for `capacity`
    /// in-flight chunks. The returned sender belongs to the transport.
    pub fn channel(capacity: usize) -> (ChunkSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let body = Self {
            text: OnceCell::new(),
            source: Mutex::new(Some(rx)),
        };
        (tx, body)
    }

    /// Creates a body that is already materialized.
    pub fn ready(text: impl Into<String>) -> Self {
        Self {
            text: OnceCell::new_with(Some(Ok(text.into()))),
            source: Mutex::new(None),
        }
    }

    /// Creates an already materialized empty body.
    pub fn empty() -> Self {
        Self::ready(String::new())
    }

    /// Returns `true` once the body has been read (or failed).
    pub fn is_materialized(&self) -> bool {
        self.text.initialized()
    }

    /// Returns the full body decoded as UTF-8 text (lossily).
    ///
    /// The first call drains the stream; concurrent callers wait on the same
    /// read, later callers get the cached result.
    ///
    /// # Errors
    ///
    /// - [`BodyError::Stream`] — the transport reported an error before the
    ///   body was complete. Every caller receives the same error.
    /// - [`BodyError::Detached`] — an earlier read was cancelled mid-stream.
    pub async fn text(&self) -> Result<&str, BodyError> {
        match self.text.get_or_init(|| self.accumulate()).await {
            Ok(text) => Ok(text.as_str()),
            Err(e) => Err(e.clone()),
        }
    }

    async fn accumulate(&self) -> Result<String, BodyError> {
        let receiver = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut receiver) = receiver else {
            return Err(BodyError::Detached);
        };

        let mut buf = BytesMut::new();
        while let Some(chunk) = receiver.recv().await {
            let chunk = chunk.map_err(|e| BodyError::Stream(Arc::new(e)))?;
            buf.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}
