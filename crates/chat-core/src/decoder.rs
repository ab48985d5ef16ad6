//! Incremental decoding of the chat event stream.
//!
//! Bytes arrive in arbitrary pieces. [`Utf8Accumulator`] holds back split
//! multi-byte sequences, and [`FrameDecoder`] holds back the trailing partial
//! frame, so an event is only produced once its whole frame has arrived.

use chat_types::event::StreamEvent;

/// Marks a payload line inside a frame
pub const DATA_PREFIX: &str = "data:";

const FRAME_SEPARATOR: &str = "\n\n";

/// Streaming UTF-8 decoder that keeps incomplete trailing sequences.
#[derive(Debug, Default)]
pub struct Utf8Accumulator {
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + bytes` as possible.
    /// Invalid sequences become U+FFFD; an incomplete tail waits for more input.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[..valid]) {
                        out.push_str(text);
                    }
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Splits decoded text into blank-line-delimited frames and parses their
/// `data:` lines into [`StreamEvent`]s.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    utf8: Utf8Accumulator,
    buffer: String,
    skipped: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read's worth of bytes and drain every event whose frame is
    /// now complete, in stream order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        let text = self.utf8.push(bytes);
        self.buffer.push_str(&text);
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(split) = self.buffer.find(FRAME_SEPARATOR) {
            let frame: String = self.buffer.drain(..split + FRAME_SEPARATOR.len()).collect();
            self.parse_frame(&frame[..split], &mut events);
        }
        events
    }

    /// End of stream. Returns the unterminated remainder, if any; it is
    /// dropped rather than parsed.
    pub fn finish(&mut self) -> Option<String> {
        let mut rest = std::mem::take(&mut self.buffer);
        if self.utf8.has_pending() {
            rest.push(char::REPLACEMENT_CHARACTER);
            self.utf8.clear();
        }
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    /// Number of payloads dropped because they did not parse
    pub fn skipped_frames(&self) -> usize {
        self.skipped
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn parse_frame(&mut self, frame: &str, events: &mut Vec<StreamEvent>) {
        for line in frame.lines() {
            let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                // comments (":") and other SSE fields carry nothing for us
                continue;
            };
            let payload = payload.strip_prefix(' ').unwrap_or(payload);
            if payload.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StreamEvent>(payload) {
                Ok(event) => events.push(event),
                Err(e) => {
                    self.skipped += 1;
                    log::warn!("Skipping malformed stream frame ({}): {}", e, payload);
                }
            }
        }
    }
}
