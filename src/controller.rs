//! the streaming-response controller.
//!
//! owns at most one live stream session. each submit appends the question and
//! an empty assistant placeholder, closes whatever stream was live, and opens
//! a fresh one. every fragment grows the session buffer and the whole buffer
//! is republished into the placeholder, so the transcript always holds the
//! full answer-so-far.

use bevy::prelude::*;
use flume::{Receiver, Sender, TryRecvError};
use std::sync::Arc;

use crate::config::ChatConfig;
use crate::conversation::{Conversation, Message};
use crate::error::StreamError;
use crate::transport::{ConnectionHandle, ConnectionId, EventSink, Inbound, StreamEvent, StreamTransport};

/// inbox events applied per `pump` call, so a bursty stream cannot stall a frame.
pub const MAX_EVENTS_PER_PUMP: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Connecting,
    Streaming,
}

#[derive(Debug)]
struct StreamSession {
    connection: ConnectionHandle,
    buffer: String,
}

impl StreamSession {
    fn id(&self) -> ConnectionId {
        self.connection.id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// blank input; nothing was appended or opened.
    Rejected,
    Started { id: ConnectionId },
    /// records were appended but the transport could not open a stream.
    Failed { error: StreamError },
}

/// terminal results reported by `pump`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed { id: ConnectionId, text: String },
    Failed { id: ConnectionId, error: StreamError, partial: String },
}

#[derive(Resource)]
pub struct StreamController {
    config: ChatConfig,
    transport: Arc<dyn StreamTransport>,
    state: StreamState,
    session: Option<StreamSession>,
    next_id: u64,
    tx: Sender<Inbound>,
    rx: Receiver<Inbound>,
    disposed: bool,
}

impl StreamController {
    pub fn new(config: ChatConfig, transport: Arc<dyn StreamTransport>) -> Self {
        let (tx, rx) = flume::bounded(config.inbox_capacity.max(1));
        Self {
            config,
            transport,
            state: StreamState::Idle,
            session: None,
            next_id: 0,
            tx,
            rx,
            disposed: false,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// id of the live connection, if any.
    pub fn active(&self) -> Option<ConnectionId> {
        self.session.as_ref().map(StreamSession::id)
    }

    /// the accumulated answer of the live session.
    pub fn buffer(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.buffer.as_str())
    }

    pub fn submit(&mut self, conversation: &mut Conversation, query: &str) -> SubmitOutcome {
        if query.trim().is_empty() {
            debug!(target: "bevy_sse_chat", "submit: ignoring blank input");
            return SubmitOutcome::Rejected;
        }

        info!(target: "bevy_sse_chat", "submit -> '{}' (len={})", query, query.len());
        conversation.append(Message::user(query));
        conversation.append(Message::assistant(""));
        self.disposed = false;

        match self.replace_session(query) {
            Ok(id) => {
                self.state = StreamState::Connecting;
                SubmitOutcome::Started { id }
            }
            Err(error) => {
                error!(target: "bevy_sse_chat", "submit: could not open stream: {}", error);
                self.state = StreamState::Idle;
                SubmitOutcome::Failed { error }
            }
        }
    }

    /// closes the live connection (if any) and only then opens the next one,
    /// so there is never a moment with two current handles.
    fn replace_session(&mut self, query: &str) -> Result<ConnectionId, StreamError> {
        if let Some(mut old) = self.session.take() {
            info!(target: "bevy_sse_chat", "superseding stream {}", old.id());
            old.connection.close();
        }

        let url = self.config.stream_url(query)?;
        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        let connection = self.transport.open(&url, EventSink::new(id, self.tx.clone()))?;
        info!(target: "bevy_sse_chat", "opened stream {} -> {}", id, url);
        self.session = Some(StreamSession {
            connection: ConnectionHandle::new(id, connection),
            buffer: String::new(),
        });
        Ok(id)
    }

    /// applies queued transport events in arrival order.
    pub fn pump(&mut self, conversation: &mut Conversation) -> Vec<StreamOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..MAX_EVENTS_PER_PUMP {
            let inbound = match self.rx.try_recv() {
                Ok(inbound) => inbound,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            if let Some(outcome) = self.apply(conversation, inbound) {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    fn apply(&mut self, conversation: &mut Conversation, inbound: Inbound) -> Option<StreamOutcome> {
        let Inbound { id, event } = inbound;
        let Some(session) = self.session.as_mut().filter(|s| s.id() == id) else {
            debug!(target: "bevy_sse_chat", "dropping {:?} from stale stream {}", event, id);
            return None;
        };

        match event {
            StreamEvent::Open => {
                debug!(target: "bevy_sse_chat", "stream {} connected", id);
                None
            }
            StreamEvent::Fragment(text) => {
                session.buffer.push_str(&text);
                conversation.update_tail(session.buffer.clone());
                self.state = StreamState::Streaming;
                debug!(target: "bevy_sse_chat", "stream {} fragment len={} total={}", id, text.len(), session.buffer.len());
                None
            }
            StreamEvent::End => {
                let text = self.finish();
                info!(target: "bevy_sse_chat", "stream {} completed: final_len={}", id, text.len());
                Some(StreamOutcome::Completed { id, text })
            }
            StreamEvent::Error(error) => {
                let partial = self.finish();
                warn!(target: "bevy_sse_chat", "stream {} failed after {} bytes: {}", id, partial.len(), error);
                if let Some(notice) = &self.config.error_notice {
                    conversation.update_tail(format!("{partial}{notice}"));
                }
                Some(StreamOutcome::Failed { id, error, partial })
            }
        }
    }

    /// closes the live session and returns its buffer.
    fn finish(&mut self) -> String {
        self.state = StreamState::Idle;
        match self.session.take() {
            Some(mut session) => {
                session.connection.close();
                std::mem::take(&mut session.buffer)
            }
            None => String::new(),
        }
    }

    /// tears down any live stream. safe to call with nothing open and safe to repeat.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(id) = self.active() {
            info!(target: "bevy_sse_chat", "disposing: closing stream {}", id);
        }
        self.finish();
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.dispose();
    }
}
