//! Stream transport — one HTTP exchange in, ordered events out.
//!
//! Issues a single request per [`StreamTransport::open`] call, reads the body
//! as it arrives and hands each decoded event to the caller's sink before
//! reading further. Holds no state between calls.

use std::future::Future;
use std::rc::Rc;

use futures::future::{self, Either};
use futures::StreamExt;

use chat_types::{event::StreamEvent, request::ChatRequest, ChatError, Result};

use crate::decoder::FrameDecoder;
use crate::ports::{HttpPort, HttpRequest};
use crate::CancellationToken;

pub const PREMATURE_CLOSE: &str = "stream closed before completion";

#[derive(Clone)]
pub struct StreamTransport {
    http: Rc<dyn HttpPort>,
}

impl StreamTransport {
    pub fn new(http: Rc<dyn HttpPort>) -> Self {
        Self { http }
    }

    /// Run one exchange to the end of its response stream.
    ///
    /// `on_event` is called synchronously, once per parsed frame, in stream
    /// order, and never after this returns. Returns `Ok` only when the stream
    /// ended after a terminal event; a body that closes without one is a
    /// transport error. When `cancel` fires, buffered bytes are discarded and
    /// the call returns [`ChatError::Cancelled`].
    pub async fn open(
        &self,
        request: &ChatRequest,
        on_event: &mut dyn FnMut(StreamEvent),
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }

        let path = request.path();
        let body = serde_json::to_string(&request.body())?;
        let http_request =
            HttpRequest::post_json(path.clone(), body).header("Accept", "text/event-stream");

        log::debug!(
            "Opening {} stream: POST {} ({} chars)",
            request.kind(),
            path,
            request.message().chars().count()
        );

        let response = race_cancel(self.http.send(http_request, cancel), cancel)
            .await?
            .map_err(|e| cancelled_or(e, cancel))?;

        if !response.ok() {
            return Err(ChatError::transport(
                Some(response.status),
                format!("{}: {}", request.failure_context(), response.status_text),
            ));
        }

        let mut body = response.body.ok_or_else(|| {
            ChatError::transport(Some(response.status), "Response body is not readable")
        })?;

        let mut decoder = FrameDecoder::new();
        let mut saw_terminal = false;

        loop {
            let next = race_cancel(body.next(), cancel).await?;
            match next {
                Some(Ok(bytes)) => {
                    for event in decoder.feed(&bytes) {
                        if cancel.is_cancelled() {
                            return Err(ChatError::Cancelled);
                        }
                        saw_terminal |= event.is_terminal();
                        on_event(event);
                    }
                }
                Some(Err(e)) => return Err(cancelled_or(e, cancel)),
                None => break,
            }
        }

        if let Some(rest) = decoder.finish() {
            log::warn!("Discarding {} bytes of unterminated frame at end of stream", rest.len());
        }

        if !saw_terminal {
            log::warn!("{} stream for {} ended without done/error", request.kind(), path);
            return Err(ChatError::transport(None, PREMATURE_CLOSE));
        }

        log::debug!("{} stream for {} closed", request.kind(), path);
        Ok(())
    }
}

/// Await `fut` unless `cancel` fires first. Cancellation wins a tie.
async fn race_cancel<F: Future>(fut: F, cancel: &CancellationToken) -> Result<F::Output> {
    let cancelled = std::pin::pin!(cancel.cancelled());
    let fut = std::pin::pin!(fut);
    match future::select(cancelled, fut).await {
        Either::Left(((), _)) => Err(ChatError::Cancelled),
        Either::Right((output, _)) => Ok(output),
    }
}

/// Errors raised by an aborted request surface as cancellation.
fn cancelled_or(error: ChatError, cancel: &CancellationToken) -> ChatError {
    if cancel.is_cancelled() {
        ChatError::Cancelled
    } else {
        error
    }
}
