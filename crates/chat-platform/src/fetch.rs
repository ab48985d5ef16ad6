//! Browser `fetch()` adapter for [`HttpPort`].
//!
//! Requests go out via gloo-net with cookies included and an
//! `AbortController` signal. The controller fires whenever the pending
//! request or its unfinished body is dropped, which is what happens when the
//! transport loses a race against the exchange's cancellation token. The
//! response body is read incrementally through its `ReadableStream` reader,
//! one `Uint8Array` per item.

use async_trait::async_trait;
use futures::stream;
use gloo_net::http::{Request, RequestBuilder};
use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, ReadableStream, ReadableStreamDefaultReader, RequestCredentials};

use chat_core::ports::*;
use chat_core::CancellationToken;
use chat_types::{config::ApiConfig, ChatError, Result};

/// [`HttpPort`] backed by the browser's fetch API.
pub struct FetchHttpClient {
    api: ApiConfig,
}

impl FetchHttpClient {
    pub fn new(api: ApiConfig) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    fn builder(&self, request: &HttpRequest, controller: &AbortController) -> RequestBuilder {
        let url = self.api.build_url(&request.path);
        let mut builder = Request::post(&url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if self.api.include_credentials {
            builder = builder.credentials(RequestCredentials::Include);
        }
        builder.abort_signal(Some(&controller.signal()))
    }
}

#[async_trait(?Send)]
impl HttpPort for FetchHttpClient {
    async fn send(&self, request: HttpRequest, cancel: &CancellationToken) -> Result<HttpResponse> {
        let controller = AbortController::new().map_err(js_error)?;
        let builder = self.builder(&request, &controller);
        let prepared = match &request.body {
            Some(body) => builder.body(body.as_str()),
            None => builder.build(),
        }
        .map_err(|e| ChatError::transport(None, e.to_string()))?;

        let mut abort = AbortOnDrop::new(controller);
        log::debug!("fetch POST {}", self.api.build_url(&request.path));

        let response = prepared.send().await.map_err(|e| {
            if cancel.is_cancelled() {
                ChatError::Cancelled
            } else {
                ChatError::transport(None, e.to_string())
            }
        })?;

        let status = response.status();
        let status_text = response.status_text();
        let body = if response.ok() {
            response
                .body()
                .map(|stream| reader_stream(stream, abort.take(), cancel.clone()))
        } else {
            None
        };

        Ok(HttpResponse {
            status,
            status_text,
            body,
        })
    }
}

/// Aborts the request unless disarmed. Held across `send().await`, then
/// handed to the body reader.
struct AbortOnDrop {
    controller: Option<AbortController>,
}

impl AbortOnDrop {
    fn new(controller: AbortController) -> Self {
        Self {
            controller: Some(controller),
        }
    }

    fn take(&mut self) -> Option<AbortController> {
        self.controller.take()
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(controller) = self.controller.take() {
            log::debug!("Aborting fetch");
            controller.abort();
        }
    }
}

/// Cancels the body and aborts its request when dropped before the end.
struct BodyReader {
    reader: ReadableStreamDefaultReader,
    abort: Option<AbortController>,
    finished: bool,
}

impl Drop for BodyReader {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.reader.cancel();
            if let Some(controller) = &self.abort {
                controller.abort();
            }
        }
    }
}

/// Adapt a fetch body into a [`ByteStream`]. Read errors after `cancel`
/// fired surface as [`ChatError::Cancelled`].
pub fn body_stream(body: ReadableStream, cancel: CancellationToken) -> ByteStream {
    reader_stream(body, None, cancel)
}

fn reader_stream(
    body: ReadableStream,
    abort: Option<AbortController>,
    cancel: CancellationToken,
) -> ByteStream {
    let reader: ReadableStreamDefaultReader = body.get_reader().unchecked_into();
    let state = BodyReader {
        reader,
        abort,
        finished: false,
    };

    Box::pin(stream::unfold(Some(state), move |state| {
        let cancel = cancel.clone();
        async move {
            let mut state = state?;
            match next_chunk(&state.reader).await {
                Ok(Some(bytes)) => Some((Ok(bytes), Some(state))),
                Ok(None) => {
                    state.finished = true;
                    None
                }
                Err(e) => {
                    let error = if cancel.is_cancelled() {
                        ChatError::Cancelled
                    } else {
                        e
                    };
                    Some((Err(error), None))
                }
            }
        }
    }))
}

/// One `reader.read()` round trip. `Ok(None)` once the body is exhausted.
async fn next_chunk(reader: &ReadableStreamDefaultReader) -> Result<Option<Vec<u8>>> {
    let result = JsFuture::from(reader.read())
        .await
        .map_err(|e| ChatError::transport(None, js_message(&e)))?;

    let done = Reflect::get(&result, &JsValue::from_str("done"))
        .map_err(js_error)?
        .as_bool()
        .unwrap_or(false);
    if done {
        return Ok(None);
    }

    let value = Reflect::get(&result, &JsValue::from_str("value")).map_err(js_error)?;
    if value.is_undefined() {
        return Ok(Some(Vec::new()));
    }
    Ok(Some(Uint8Array::new(&value).to_vec()))
}

fn js_message(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{:?}", value))
}

fn js_error(value: JsValue) -> ChatError {
    ChatError::JsInterop(js_message(&value))
}
