//! Conversation reconciler — owns the transcript and the exchange state machine.
//!
//! ```text
//! Idle → Dispatched → SessionPending → Streaming → Settled
//!            └────────────┴──────────────┴──→ Failed
//!            (any non-terminal state) ───────→ Cancelled
//! ```
//!
//! `send_turn` mutates the transcript synchronously and hands back an
//! [`Exchange`] future that the host spawns (`wasm_bindgen_futures::spawn_local`
//! in the browser). Every exchange ends with its assistant turn in a terminal
//! status, whatever the stream does.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use chrono::Utc;

use chat_types::{
    config::ChatConfig,
    event::{CompletionMetadata, ConversationChange, ExchangeStatus, StreamEvent},
    request::ChatRequest,
    session::{ConversationSnapshot, Session},
    turn::{next_timestamp, Turn, TurnId, TurnStatus},
    ChatError, Result, SendRejected,
};

use crate::event_bus::{EventBus, SubscriptionId};
use crate::transport::{StreamTransport, PREMATURE_CLOSE};
use crate::CancellationToken;

pub const STOPPED_MARKER: &str = "[Stopped]";

/// How an exchange ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Settled,
    Failed(String),
    Cancelled,
}

/// Handle to one conversation. Clones share the same state.
#[derive(Clone)]
pub struct Conversation {
    state: Rc<RefCell<ConversationState>>,
    event_bus: EventBus,
    transport: StreamTransport,
    config: Rc<ChatConfig>,
}

struct ConversationState {
    transcript: Vec<Turn>,
    session: Session,
    status: ExchangeStatus,
    active: Option<ActiveExchange>,
    last_completion: Option<CompletionMetadata>,
    exchange_counter: u64,
}

struct ActiveExchange {
    id: u64,
    assistant_turn: TurnId,
    cancel: CancellationToken,
    received_chunk: bool,
}

impl Conversation {
    pub fn new(transport: StreamTransport, config: ChatConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(ConversationState {
                transcript: Vec::new(),
                session: Session::new(),
                status: ExchangeStatus::Idle,
                active: None,
                last_completion: None,
                exchange_counter: 0,
            })),
            event_bus: EventBus::new(),
            transport,
            config: Rc::new(config),
        }
    }

    /// Start an exchange for `raw_text`.
    ///
    /// On success the user turn and a pending assistant placeholder are
    /// already in the transcript when this returns. The returned future
    /// performs the request; dropping it before completion cancels the
    /// exchange.
    pub fn send_turn(&self, raw_text: &str) -> std::result::Result<Exchange, SendRejected> {
        let (exchange_id, assistant_turn, request, cancel, changes) = {
            let mut state = self.state.borrow_mut();
            if state.status.is_active() {
                log::warn!("send_turn rejected: exchange still {:?}", state.status);
                return Err(SendRejected::Busy);
            }

            let message = raw_text.trim();
            if message.is_empty() {
                log::warn!("send_turn rejected: empty message");
                return Err(SendRejected::EmptyMessage);
            }

            let user = Turn::user(message, next_timestamp(&state.transcript, Utc::now()));
            state.transcript.push(user.clone());
            let assistant =
                Turn::assistant_placeholder(next_timestamp(&state.transcript, Utc::now()));
            state.transcript.push(assistant.clone());

            let request = match &state.session.id {
                None => ChatRequest::Create {
                    subject_id: self.config.subject_id.clone(),
                    topic_id: self.config.topic_id.clone(),
                    feature: self.config.create_feature(),
                    message: message.to_string(),
                },
                Some(session_id) => ChatRequest::Continue {
                    session_id: session_id.clone(),
                    message: message.to_string(),
                },
            };

            state.exchange_counter += 1;
            let exchange_id = state.exchange_counter;
            let cancel = CancellationToken::new();
            state.status = ExchangeStatus::Dispatched;
            state.active = Some(ActiveExchange {
                id: exchange_id,
                assistant_turn: assistant.id,
                cancel: cancel.clone(),
                received_chunk: false,
            });

            let changes = vec![
                ConversationChange::TurnAppended { turn: user },
                ConversationChange::TurnAppended { turn: assistant.clone() },
                ConversationChange::StatusChanged {
                    status: ExchangeStatus::Dispatched,
                },
            ];
            (exchange_id, assistant.id, request, cancel, changes)
        };

        self.event_bus.emit_all(changes);
        log::info!("Exchange {} dispatched ({})", exchange_id, request.kind());

        let guard = ExchangeGuard {
            conversation: self.clone(),
            exchange_id,
            cancel: cancel.clone(),
            armed: true,
        };
        Ok(Exchange {
            assistant_turn,
            request_kind: request.kind(),
            inner: Box::pin(drive(guard, request, cancel)),
        })
    }

    /// Abort the in-flight exchange, if any. The exchange resolves as
    /// cancelled once its transport notices.
    pub fn cancel_active(&self) {
        let token = self
            .state
            .borrow()
            .active
            .as_ref()
            .map(|active| (active.id, active.cancel.clone()));
        if let Some((id, token)) = token {
            log::info!("Cancelling exchange {}", id);
            token.cancel();
        }
    }

    /// Discard transcript and session. Refused while an exchange is active.
    pub fn reset(&self) -> bool {
        {
            let mut state = self.state.borrow_mut();
            if state.status.is_active() {
                return false;
            }
            state.transcript.clear();
            state.session = Session::new();
            state.status = ExchangeStatus::Idle;
            state.last_completion = None;
        }
        self.event_bus.emit(&ConversationChange::Reset);
        true
    }

    pub fn subscribe(&self, listener: impl Fn(&ConversationChange) + 'static) -> SubscriptionId {
        self.event_bus.subscribe(listener)
    }

    /// Like [`subscribe`](Self::subscribe), with a snapshot taken after the change.
    pub fn subscribe_with_snapshot(
        &self,
        listener: impl Fn(&ConversationChange, &ConversationSnapshot) + 'static,
    ) -> SubscriptionId {
        let state = Rc::downgrade(&self.state);
        self.event_bus.subscribe(move |change| {
            if let Some(state) = state.upgrade() {
                let snapshot = state.borrow().snapshot();
                listener(change, &snapshot);
            }
        })
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.event_bus.unsubscribe(id)
    }

    pub fn transcript(&self) -> Vec<Turn> {
        self.state.borrow().transcript.clone()
    }

    pub fn active_status(&self) -> ExchangeStatus {
        self.state.borrow().status
    }

    pub fn is_busy(&self) -> bool {
        self.active_status().is_active()
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.borrow().session.id.clone()
    }

    pub fn last_completion(&self) -> Option<CompletionMetadata> {
        self.state.borrow().last_completion.clone()
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        self.state.borrow().snapshot()
    }

    /// Apply one stream event. Returns the outcome if the event ended the exchange.
    fn apply_event(&self, exchange_id: u64, event: StreamEvent) -> Option<ExchangeOutcome> {
        let (outcome, changes) = self.state.borrow_mut().apply(exchange_id, event);
        self.event_bus.emit_all(changes);
        outcome
    }

    /// Settle the exchange from the transport's result, unless an event already did.
    fn conclude(&self, exchange_id: u64, result: Result<()>) -> ExchangeOutcome {
        let outcome = match result {
            Ok(()) => ExchangeOutcome::Failed(PREMATURE_CLOSE.to_string()),
            Err(ChatError::Cancelled) => ExchangeOutcome::Cancelled,
            Err(e) => ExchangeOutcome::Failed(e.user_message()),
        };
        let changes = self.state.borrow_mut().finish(exchange_id, &outcome);
        self.event_bus.emit_all(changes);
        outcome
    }
}

impl ConversationState {
    fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            transcript: self.transcript.clone(),
            status: self.status,
            session_id: self.session.id.clone(),
            last_completion: self.last_completion.clone(),
        }
    }

    fn is_current(&self, exchange_id: u64) -> bool {
        self.active.as_ref().map(|a| a.id) == Some(exchange_id)
    }

    fn turn_mut(&mut self, id: TurnId) -> Option<&mut Turn> {
        self.transcript.iter_mut().rev().find(|t| t.id == id)
    }

    fn set_status(&mut self, status: ExchangeStatus, changes: &mut Vec<ConversationChange>) {
        if self.status != status {
            self.status = status;
            changes.push(ConversationChange::StatusChanged { status });
        }
    }

    fn apply(
        &mut self,
        exchange_id: u64,
        event: StreamEvent,
    ) -> (Option<ExchangeOutcome>, Vec<ConversationChange>) {
        let mut changes = Vec::new();
        if !self.is_current(exchange_id) {
            log::debug!("Ignoring {} event for finished exchange {}", event.kind(), exchange_id);
            return (None, changes);
        }

        match event {
            StreamEvent::SessionStarted { session_id } => {
                if self.session.establish(&session_id) {
                    log::info!("Session started: {}", session_id);
                    changes.push(ConversationChange::SessionStarted { session_id });
                } else if self.session.id.as_deref() != Some(session_id.as_str()) {
                    log::warn!(
                        "Ignoring session id {}; conversation already bound to {:?}",
                        session_id,
                        self.session.id
                    );
                }
                if self.status == ExchangeStatus::Dispatched {
                    self.set_status(ExchangeStatus::SessionPending, &mut changes);
                }
                (None, changes)
            }
            StreamEvent::ContentChunk { content } => {
                let Some(active) = self.active.as_mut() else {
                    return (None, changes);
                };
                let first = !active.received_chunk;
                active.received_chunk = true;
                let turn_id = active.assistant_turn;

                if let Some(turn) = self.turn_mut(turn_id) {
                    turn.text.push_str(&content);
                    if first {
                        turn.status = TurnStatus::Streaming;
                    }
                    changes.push(ConversationChange::TurnUpdated { turn: turn.clone() });
                }
                if first {
                    self.set_status(ExchangeStatus::Streaming, &mut changes);
                }
                (None, changes)
            }
            StreamEvent::Completed(metadata) => {
                log::debug!(
                    "Exchange {} done: message {} ({:?} tokens)",
                    exchange_id,
                    metadata.message_id,
                    metadata.total_tokens
                );
                self.last_completion = Some(metadata);
                let outcome = ExchangeOutcome::Settled;
                changes.extend(self.finish(exchange_id, &outcome));
                (Some(outcome), changes)
            }
            StreamEvent::Failed { error, code } => {
                let error = ChatError::Protocol { reason: error, code };
                log::debug!("Exchange {} ended by server: {:?}", exchange_id, error);
                let outcome = ExchangeOutcome::Failed(error.user_message());
                changes.extend(self.finish(exchange_id, &outcome));
                (Some(outcome), changes)
            }
            StreamEvent::ToolInvoked { tool_name, tool_input } => {
                log::debug!("Tool invoked during exchange {}: {} {}", exchange_id, tool_name, tool_input);
                (None, changes)
            }
        }
    }

    /// Move the active exchange into a terminal state and release the lock.
    fn finish(&mut self, exchange_id: u64, outcome: &ExchangeOutcome) -> Vec<ConversationChange> {
        let mut changes = Vec::new();
        if !self.is_current(exchange_id) {
            return changes;
        }
        let Some(active) = self.active.take() else {
            return changes;
        };

        let (turn_status, exchange_status) = match outcome {
            ExchangeOutcome::Settled => (TurnStatus::Complete, ExchangeStatus::Settled),
            ExchangeOutcome::Failed(_) => (TurnStatus::Failed, ExchangeStatus::Failed),
            ExchangeOutcome::Cancelled => (TurnStatus::Cancelled, ExchangeStatus::Cancelled),
        };

        if let Some(turn) = self.turn_mut(active.assistant_turn) {
            turn.status = turn_status;
            match outcome {
                ExchangeOutcome::Settled => {}
                ExchangeOutcome::Failed(reason) => {
                    append_marker(&mut turn.text, &error_marker(reason));
                }
                ExchangeOutcome::Cancelled => append_marker(&mut turn.text, STOPPED_MARKER),
            }
            changes.push(ConversationChange::TurnUpdated { turn: turn.clone() });
        }
        self.set_status(exchange_status, &mut changes);

        match outcome {
            ExchangeOutcome::Settled => log::info!("Exchange {} settled", exchange_id),
            ExchangeOutcome::Failed(reason) => {
                log::error!("Exchange {} failed: {}", exchange_id, reason)
            }
            ExchangeOutcome::Cancelled => log::info!("Exchange {} cancelled", exchange_id),
        }
        changes
    }
}

pub fn error_marker(reason: &str) -> String {
    format!("[Error: {}]", reason)
}

/// Partial output is kept; the marker goes in its own paragraph.
fn append_marker(text: &mut String, marker: &str) {
    if !text.is_empty() {
        text.push_str("\n\n");
    }
    text.push_str(marker);
}

// ─── Exchange future ─────────────────────────────────────────

/// One in-flight exchange. Resolves once the transport call has returned and
/// the assistant turn is terminal.
pub struct Exchange {
    assistant_turn: TurnId,
    request_kind: &'static str,
    inner: Pin<Box<dyn Future<Output = ExchangeOutcome>>>,
}

impl Exchange {
    pub fn assistant_turn(&self) -> TurnId {
        self.assistant_turn
    }

    /// `"create"` or `"continue"`
    pub fn request_kind(&self) -> &'static str {
        self.request_kind
    }
}

impl Future for Exchange {
    type Output = ExchangeOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<ExchangeOutcome> {
        self.inner.as_mut().poll(cx)
    }
}

/// Aborts and concludes the exchange as cancelled if its future is dropped early.
struct ExchangeGuard {
    conversation: Conversation,
    exchange_id: u64,
    cancel: CancellationToken,
    armed: bool,
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        if self.armed {
            log::warn!("Exchange {} dropped before completion", self.exchange_id);
            self.cancel.cancel();
            self.conversation
                .conclude(self.exchange_id, Err(ChatError::Cancelled));
        }
    }
}

async fn drive(
    mut guard: ExchangeGuard,
    request: ChatRequest,
    cancel: CancellationToken,
) -> ExchangeOutcome {
    let conversation = guard.conversation.clone();
    let exchange_id = guard.exchange_id;

    let mut ended_by_event: Option<ExchangeOutcome> = None;
    let result = {
        let mut on_event = |event: StreamEvent| {
            if let Some(outcome) = conversation.apply_event(exchange_id, event) {
                ended_by_event.get_or_insert(outcome);
            }
        };
        conversation
            .transport
            .open(&request, &mut on_event, &cancel)
            .await
    };

    guard.armed = false;
    match ended_by_event {
        Some(outcome) => {
            if let Err(e) = result {
                log::debug!("Exchange {} stream ended after terminal event: {}", exchange_id, e);
            }
            outcome
        }
        None => conversation.conclude(exchange_id, result),
    }
}
