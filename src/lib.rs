//! bevy_sse_chat: stream chat answers from a server-sent-events endpoint
//! into a bevy transcript resource.
//!
//! - `Conversation` is the transcript ui code renders (append-only, tail-updated).
//! - `StreamController` owns the one live stream: every submit closes the
//!   previous stream before opening the next, and every fragment republishes
//!   the whole answer-so-far into the assistant placeholder.
//! - never blocks the main thread: on native the http body is read by a task
//!   on a tiny tokio runtime; on wasm the browser's `EventSource` drives a local
//!   task. both feed a bounded inbox the main thread drains each frame.
//!
//! endpoint: `GET {base_url}/chat/stream?query=<percent-encoded text>`,
//! `base_url` from `CHAT_API_BASE_URL` (default `http://localhost:8080`).

use bevy::prelude::*;
use std::sync::Arc;

pub mod config;
pub mod controller;
pub mod conversation;
pub mod error;
pub mod sse;
pub mod transport;

pub use config::ChatConfig;
pub use controller::{StreamController, StreamOutcome, StreamState, SubmitOutcome};
pub use conversation::{Conversation, Message};
pub use error::{ConfigError, StreamError};
pub use transport::{Connection, ConnectionHandle, ConnectionId, EventSink, StreamEvent, StreamTransport};

/// on native we keep a tiny tokio runtime that drives stream reads, so
/// neither the main thread nor bevy's compute pools wait on network io.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Resource, Clone)]
pub struct TokioRt(pub Arc<tokio::runtime::Runtime>);

#[cfg(not(target_arch = "wasm32"))]
impl Default for TokioRt {
    fn default() -> Self {
        info!(target: "bevy_sse_chat", "SseChatPlugin: initializing Tokio multi-thread runtime (native)");
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("tokio runtime");
        Self(Arc::new(rt))
    }
}

/// system ordering so uis can run after transcript updates land
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum ChatSet {
    /// `ChatSubmit` events are forwarded to the controller here
    Submit,
    /// the inbox is drained into `Conversation` and Chat* events are emitted here
    Drain,
}

/// ask the controller to stream an answer for `text`.
#[derive(Event, Debug, Clone)]
pub struct ChatSubmit {
    pub text: String,
}

/// helper to enqueue a question from any system.
pub fn send_user_text(writer: &mut EventWriter<ChatSubmit>, text: impl Into<String>) {
    let text = text.into();
    debug!(target: "bevy_sse_chat", "send_user_text -> '{}' (len={})", text, text.len());
    writer.write(ChatSubmit { text });
}

/// events emitted by the plugin as streams start and finish.
#[derive(Event, Debug)]
pub struct ChatStarted {
    pub connection: ConnectionId,
}
#[derive(Event, Debug)]
pub struct ChatCompletedEvt {
    pub connection: ConnectionId,
    /// the full answer as it stands in the transcript.
    pub text: String,
}
/// a stream failed to open or died mid-answer. `partial` is what the
/// transcript kept.
#[derive(Event, Debug)]
pub struct ChatErrorEvt {
    pub connection: Option<ConnectionId>,
    pub error: StreamError,
    pub partial: String,
}

/// bevy plugin: wires resources, events, and systems.
///
/// insert a `ChatConfig` before adding the plugin to override the environment,
/// or a whole `StreamController` to bring your own transport.
pub struct SseChatPlugin;

impl Plugin for SseChatPlugin {
    fn build(&self, app: &mut App) {
        info!(target: "bevy_sse_chat", "SseChatPlugin: build()");
        app.init_resource::<Conversation>()
            .add_event::<ChatSubmit>()
            .add_event::<ChatStarted>()
            .add_event::<ChatCompletedEvt>()
            .add_event::<ChatErrorEvt>()
            .configure_sets(Update, (ChatSet::Submit, ChatSet::Drain).chain())
            .add_systems(Update, forward_submissions.in_set(ChatSet::Submit))
            .add_systems(Update, drain_stream_inbox.in_set(ChatSet::Drain))
            .add_systems(Last, dispose_on_exit);

        if app.world().get_resource::<ChatConfig>().is_none() {
            let config = ChatConfig::from_env();
            if let Err(err) = config.validate() {
                warn!(target: "bevy_sse_chat", "chat config from environment is invalid: {}", err);
            }
            app.insert_resource(config);
        }

        if app.world().get_resource::<StreamController>().is_none() {
            let config = app.world().resource::<ChatConfig>().clone();
            let transport = default_transport(app);
            app.insert_resource(StreamController::new(config, transport));
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn default_transport(app: &mut App) -> Arc<dyn StreamTransport> {
    if app.world().get_resource::<TokioRt>().is_none() {
        app.insert_resource(TokioRt::default());
    }
    let rt = app.world().resource::<TokioRt>().0.handle().clone();
    Arc::new(transport::NativeTransport::new(rt))
}

#[cfg(target_arch = "wasm32")]
fn default_transport(_app: &mut App) -> Arc<dyn StreamTransport> {
    Arc::new(transport::BrowserTransport)
}

fn forward_submissions(
    mut ev_submit: EventReader<ChatSubmit>,
    mut controller: ResMut<StreamController>,
    mut conversation: ResMut<Conversation>,
    mut ev_start: EventWriter<ChatStarted>,
    mut ev_err: EventWriter<ChatErrorEvt>,
) {
    for ChatSubmit { text } in ev_submit.read() {
        match controller.submit(&mut conversation, text) {
            SubmitOutcome::Rejected => {}
            SubmitOutcome::Started { id } => {
                ev_start.write(ChatStarted { connection: id });
            }
            SubmitOutcome::Failed { error } => {
                ev_err.write(ChatErrorEvt { connection: None, error, partial: String::new() });
            }
        }
    }
}

/// drains the inbox into the transcript and emits outcome events.
fn drain_stream_inbox(
    mut controller: ResMut<StreamController>,
    mut conversation: ResMut<Conversation>,
    mut ev_done: EventWriter<ChatCompletedEvt>,
    mut ev_err: EventWriter<ChatErrorEvt>,
) {
    // only flag the transcript as changed when a record actually changed
    let before = conversation.revision();
    let outcomes = controller.pump(conversation.bypass_change_detection());
    if conversation.revision() != before {
        conversation.set_changed();
    }
    for outcome in outcomes {
        match outcome {
            StreamOutcome::Completed { id, text } => {
                ev_done.write(ChatCompletedEvt { connection: id, text });
            }
            StreamOutcome::Failed { id, error, partial } => {
                ev_err.write(ChatErrorEvt { connection: Some(id), error, partial });
            }
        }
    }
}

fn dispose_on_exit(mut ev_exit: EventReader<AppExit>, mut controller: ResMut<StreamController>) {
    if ev_exit.read().next().is_some() {
        controller.dispose();
    }
}
