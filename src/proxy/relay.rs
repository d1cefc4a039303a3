//! Streaming response body relay.
//!
//! Frames are passed to the client as the backend produces them. The relay
//! owns the backend body, so when the client goes away and the server drops
//! the relay, the backend response (and its connection) is dropped with it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use thiserror::Error;
use tokio::time::{Instant, Sleep};

use crate::error::BoxError;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream body stalled for more than {0:?}")]
    Idle(Duration),
}

/// Response body that forwards an upstream body frame by frame.
pub struct RelayBody<B> {
    inner: Pin<Box<B>>,
    idle_timeout: Option<Duration>,
    idle_deadline: Option<Pin<Box<Sleep>>>,
    relayed_bytes: u64,
    finished: bool,
}

impl<B: Body> RelayBody<B> {
    /// `idle_timeout` bounds the silence between two frames; `None` disables it.
    pub fn new(inner: B, idle_timeout: Option<Duration>) -> Self {
        // Bodiless responses (HEAD, 204, 304) are complete from the start.
        let finished = inner.is_end_stream();
        Self {
            inner: Box::pin(inner),
            idle_timeout,
            idle_deadline: idle_timeout.map(|d| Box::pin(tokio::time::sleep(d))),
            relayed_bytes: 0,
            finished,
        }
    }
}

impl<B> Body for RelayBody<B>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.relayed_bytes += data.len() as u64;
                }
                if let (Some(deadline), Some(idle)) = (this.idle_deadline.as_mut(), this.idle_timeout) {
                    deadline.as_mut().reset(Instant::now() + idle);
                }
                // A sized body ends with its last data frame; the server may
                // drop us right after without polling for `None`.
                this.finished = this.inner.is_end_stream();
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                let err: BoxError = e.into();
                tracing::warn!(error = %err, relayed_bytes = this.relayed_bytes, "Upstream body failed mid-stream");
                metrics::record_relay_aborted("upstream_error");
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => {
                if let (Some(deadline), Some(idle)) = (this.idle_deadline.as_mut(), this.idle_timeout) {
                    if deadline.as_mut().poll(cx).is_ready() {
                        this.finished = true;
                        tracing::warn!(idle = ?idle, relayed_bytes = this.relayed_bytes, "Aborting stalled upstream body");
                        metrics::record_relay_aborted("idle_timeout");
                        return Poll::Ready(Some(Err(RelayError::Idle(idle).into())));
                    }
                }
                Poll::Pending
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.finished
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> RelayBody<B> {
    /// Whether dropping now would cut the transfer short.
    fn is_incomplete(&self) -> bool {
        !self.finished
    }
}

impl<B> Drop for RelayBody<B> {
    fn drop(&mut self) {
        if self.is_incomplete() {
            tracing::debug!(relayed_bytes = self.relayed_bytes, "Client went away; releasing upstream body");
            metrics::record_relay_aborted("client_disconnect");
        }
    }
}
