//! minimal bevy + bevy_sse_chat example against a streaming chat endpoint.
//! - renders the whole transcript as `you:` / `assistant:` lines.
//! - type a question, enter sends it; sending again mid-answer supersedes it.
//! - base url comes from `CHAT_API_BASE_URL` (default http://localhost:8080).
//!
//! run a backend that serves `GET /chat/stream?query=...` as text/event-stream.

use bevy::input::keyboard::{KeyCode, KeyboardInput};
use bevy::prelude::*;
use bevy_sse_chat::{
    ChatCompletedEvt, ChatConfig, ChatErrorEvt, ChatSet, ChatStarted, ChatSubmit, Conversation,
    SseChatPlugin, StreamController, StreamState, send_user_text,
};

// ---------------------- ui tags ----------------------

#[derive(Component)]
struct TranscriptText;
#[derive(Component)]
struct StatusText;
#[derive(Component)]
struct PromptText;

// ---------------------- app state ----------------------

#[derive(Resource, Default)]
struct PromptBuf(String);

#[derive(Resource, Default)]
struct LastStatus(String);

// ---------------------- main ----------------------

fn main() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let config = ChatConfig::from_env();

    App::new()
        .insert_resource(ClearColor(Color::srgb_u8(18, 18, 20)))
        .insert_resource(config)
        .insert_resource(PromptBuf::default())
        .insert_resource(LastStatus::default())
        .add_plugins(DefaultPlugins)
        .add_plugins(SseChatPlugin)
        .add_systems(Startup, setup)
        .add_systems(Update, handle_text_input.before(ChatSet::Submit))
        // transcript readers should run after bevy_sse_chat drains the inbox
        .add_systems(
            Update,
            (on_started, on_done, on_error, refresh_transcript, refresh_status)
                .after(ChatSet::Drain),
        )
        .add_systems(Update, refresh_prompt_text)
        .run();
}

// ---------------------- setup ui ----------------------

fn setup(mut commands: Commands, config: Res<ChatConfig>) {
    info!(target: "minimal", "chat endpoint base: {}", config.base_url);
    commands.spawn(Camera2d::default());

    let style_18 = TextFont { font_size: 18.0, ..default() };
    let style_14 = TextFont { font_size: 14.0, ..default() };

    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                row_gap: Val::Px(8.0),
                padding: UiRect::all(Val::Px(12.0)),
                ..default()
            },
            BackgroundColor(Color::NONE),
        ))
        .with_children(|p| {
            p.spawn((
                Node {
                    width: Val::Percent(100.0),
                    height: Val::Percent(100.0),
                    flex_direction: FlexDirection::Column,
                    overflow: Overflow::clip(),
                    padding: UiRect::axes(Val::Px(8.0), Val::Px(12.0)),
                    ..default()
                },
                BackgroundColor(Color::srgb(0.10, 0.10, 0.12)),
            ))
            .with_children(|c| {
                c.spawn((
                    Text::new(""),
                    style_18.clone(),
                    TextColor(Color::WHITE),
                    TranscriptText,
                ));
            });
            p.spawn((
                Text::new("idle"),
                style_14.clone(),
                TextColor(Color::srgb_u8(160, 160, 160)),
                StatusText,
            ));
            p.spawn((
                Text::new("> "),
                style_14.clone(),
                TextColor(Color::WHITE),
                PromptText,
            ));
        });
}

// ---------------------- input ----------------------

fn handle_text_input(
    mut ev_kbd: EventReader<KeyboardInput>,
    keys: Res<ButtonInput<KeyCode>>,
    mut prompt: ResMut<PromptBuf>,
    mut ev_submit: EventWriter<ChatSubmit>,
) {
    for ev in ev_kbd.read() {
        if ev.state.is_pressed() {
            if let Some(txt) = &ev.text {
                let s = txt.replace('\r', "").replace('\n', "");
                prompt.0.push_str(&s);
            }
        }
    }

    if keys.just_pressed(KeyCode::Backspace) {
        prompt.0.pop();
    }

    // blank prompts are dropped by the controller; clear the line either way
    if keys.just_pressed(KeyCode::Enter) {
        let msg = std::mem::take(&mut prompt.0);
        send_user_text(&mut ev_submit, msg);
    }
}

// ---------------------- chat events ----------------------

fn on_started(mut ev: EventReader<ChatStarted>, mut status: ResMut<LastStatus>) {
    for ChatStarted { connection } in ev.read() {
        status.0 = format!("stream {connection} connecting...");
    }
}

fn on_done(mut ev: EventReader<ChatCompletedEvt>, mut status: ResMut<LastStatus>) {
    for ChatCompletedEvt { connection, text } in ev.read() {
        info!(target: "minimal", "stream {} done: {} bytes", connection, text.len());
        status.0 = format!("stream {connection} done");
    }
}

fn on_error(mut ev: EventReader<ChatErrorEvt>, mut status: ResMut<LastStatus>) {
    for ChatErrorEvt { connection, error, .. } in ev.read() {
        error!(target: "minimal", "chat error (stream={:?}): {}", connection, error);
        status.0 = format!("ERROR: {error}");
    }
}

// ---------------------- text refresh ----------------------

fn refresh_transcript(
    conversation: Res<Conversation>,
    mut q: Query<&mut Text, With<TranscriptText>>,
) {
    if !conversation.is_changed() {
        return;
    }
    let mut out = String::new();
    for m in conversation.messages() {
        out.push_str(if m.is_user { "you: " } else { "assistant: " });
        out.push_str(&m.text);
        out.push('\n');
    }
    if let Ok(mut t) = q.single_mut() {
        t.0 = out;
    }
}

fn refresh_status(
    controller: Res<StreamController>,
    status: Res<LastStatus>,
    mut q: Query<&mut Text, With<StatusText>>,
) {
    if !status.is_changed() && !controller.is_changed() {
        return;
    }
    let state = match controller.state() {
        StreamState::Idle => "idle",
        StreamState::Connecting => "connecting",
        StreamState::Streaming => "streaming",
    };
    if let Ok(mut t) = q.single_mut() {
        t.0 = if status.0.is_empty() {
            state.to_string()
        } else {
            format!("{state} | {}", status.0)
        };
    }
}

fn refresh_prompt_text(prompt: Res<PromptBuf>, mut q_prompt: Query<&mut Text, With<PromptText>>) {
    if prompt.is_changed() {
        if let Ok(mut t) = q_prompt.single_mut() {
            t.0 = format!("> {} |", prompt.0);
        }
    }
}
