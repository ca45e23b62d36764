//! Question/answer exchange controller and the chat transcript it owns.
//!
//! State lives inside a `watch` channel: every mutation happens under the
//! channel's lock and wakes observers, so the view only ever sees whole
//! turns. One exchange may be in flight at a time; `awaiting` is set when a
//! submission is accepted and cleared by a drop guard when its task ends,
//! however it ends. Callers only get a completion signal, never the task
//! itself, so an exchange cannot be cancelled from outside.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{oneshot, watch};

use crate::client::{round_ms, Client, ClientError};

/// One message in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User {
        text: String,
    },
    Assistant {
        text: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        citations: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        latency_ms: Option<u64>,
    },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn::User { text: text.into() }
    }

    /// Assistant turn for a failed exchange: no citations, no latency.
    pub fn error(err: &ClientError) -> Self {
        Turn::Assistant {
            text: format!("❌ Error: {}", err),
            citations: Vec::new(),
            latency_ms: None,
        }
    }

    /// Assistant turn for an exchange whose task ended without an outcome.
    pub fn interrupted() -> Self {
        Turn::Assistant {
            text: "❌ Error: exchange interrupted".into(),
            citations: Vec::new(),
            latency_ms: None,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Turn::User { text } | Turn::Assistant { text, .. } => text,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Turn::User { .. })
    }

    /// Failed exchanges are the only assistant turns without a latency.
    pub fn is_error(&self) -> bool {
        matches!(self, Turn::Assistant { latency_ms: None, .. })
    }
}

/// Everything the chat view renders.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub transcript: Vec<Turn>,
    /// Pending text in the input box.
    pub input: String,
    pub awaiting: bool,
}

struct Inner {
    client: Client,
    top_k: u32,
    state: watch::Sender<ChatState>,
}

/// Resolves once the exchange has appended its assistant turn. Dropping it
/// does not affect the exchange.
pub type Settled = oneshot::Receiver<()>;

/// Clears `awaiting` when the exchange task ends. If the task ends without
/// settling (panic, runtime shutdown) an error turn is appended in its place.
struct AwaitingGuard {
    inner: Arc<Inner>,
    settled: bool,
}

impl AwaitingGuard {
    fn new(inner: Arc<Inner>) -> Self {
        Self {
            inner,
            settled: false,
        }
    }

    fn settle(&mut self, turn: Turn) {
        self.inner.state.send_modify(|state| state.transcript.push(turn));
        self.settled = true;
    }
}

impl Drop for AwaitingGuard {
    fn drop(&mut self) {
        let settled = self.settled;
        self.inner.state.send_modify(|state| {
            if !settled {
                state.transcript.push(Turn::interrupted());
            }
            state.awaiting = false;
        });
    }
}

/// Drives one `POST /answer` per accepted submission. Cheap to clone; clones
/// share the same transcript.
#[derive(Clone)]
pub struct ExchangeController {
    inner: Arc<Inner>,
}

impl ExchangeController {
    pub fn new(client: Client, top_k: u32) -> Self {
        let (state, _rx) = watch::channel(ChatState::default());
        Self {
            inner: Arc::new(Inner {
                client,
                top_k,
                state,
            }),
        }
    }

    /// Submit `raw` as a question.
    ///
    /// Returns `None` without touching the transcript when the trimmed text is
    /// empty or another exchange is still awaiting its reply. Otherwise the
    /// user turn is already appended when this returns, and the returned
    /// [`Settled`] resolves once the assistant turn has been appended and
    /// `awaiting` cleared. Must be called from within a Tokio runtime.
    pub fn submit(&self, raw: &str) -> Option<Settled> {
        let query = raw.trim().to_string();
        let accepted = self.inner.state.send_if_modified(|state| {
            if query.is_empty() || state.awaiting {
                return false;
            }
            state.transcript.push(Turn::user(query.clone()));
            state.input.clear();
            state.awaiting = true;
            true
        });
        if !accepted {
            tracing::debug!(empty = query.is_empty(), "submission rejected");
            return None;
        }

        let mut guard = AwaitingGuard::new(Arc::clone(&self.inner));
        let started = Instant::now();
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(async move {
            let inner = Arc::clone(&guard.inner);
            let turn = match inner.client.answer(&query, inner.top_k).await {
                Ok((reply, responded)) => {
                    let latency_ms = round_ms(responded.saturating_duration_since(started));
                    tracing::info!(latency_ms, citations = reply.citations.len(), "answer received");
                    Turn::Assistant {
                        text: reply.text,
                        citations: reply.citations,
                        latency_ms: Some(latency_ms),
                    }
                }
                Err(e) => {
                    tracing::warn!(base = %inner.client.endpoint(), error = %e, "answer request failed");
                    Turn::error(&e)
                }
            };
            guard.settle(turn);
            drop(guard);
            let _ = done_tx.send(());
        });
        Some(done_rx)
    }

    /// Submit whatever is in the input buffer.
    pub fn submit_input(&self) -> Option<Settled> {
        let input = self.inner.state.borrow().input.clone();
        self.submit(&input)
    }

    pub fn set_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.inner.state.send_modify(|state| state.input = text);
    }

    pub fn is_awaiting(&self) -> bool {
        self.inner.state.borrow().awaiting
    }

    pub fn transcript(&self) -> Vec<Turn> {
        self.inner.state.borrow().transcript.clone()
    }

    pub fn snapshot(&self) -> ChatState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.inner.state.subscribe()
    }

    pub fn top_k(&self) -> u32 {
        self.inner.top_k
    }
}
