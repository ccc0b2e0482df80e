//! browser event-stream transport over `EventSource` (gloo-net).

use bevy::log::{debug, info, warn};
use futures_lite::{StreamExt, future};
use gloo_net::eventsource::futures::EventSource;
use url::Url;

use super::{Connection, EventSink, StreamEvent, StreamTransport};
use crate::error::StreamError;

/// the `EventSource` lives inside a local task; closing signals the task,
/// which drops the source so the browser does not reconnect on its own.
#[derive(Default)]
pub struct BrowserTransport;

struct BrowserConnection {
    close_tx: Option<flume::Sender<()>>,
}

impl Connection for BrowserConnection {
    fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }
}

enum Step {
    Closed,
    Next(Option<Result<(String, web_sys::MessageEvent), gloo_net::eventsource::EventSourceError>>),
}

impl StreamTransport for BrowserTransport {
    fn open(&self, url: &Url, sink: EventSink) -> Result<Box<dyn Connection>, StreamError> {
        let mut source =
            EventSource::new(url.as_str()).map_err(|e| StreamError::Transport(e.to_string()))?;
        let mut messages = source
            .subscribe("message")
            .map_err(|e| StreamError::Transport(e.to_string()))?;
        let (close_tx, close_rx) = flume::bounded::<()>(1);

        info!(target: "bevy_sse_chat", "browser stream {} -> {}", sink.id(), url);
        wasm_bindgen_futures::spawn_local(async move {
            loop {
                let step = future::or(
                    async {
                        // a dropped sender counts as a close
                        let _ = close_rx.recv_async().await;
                        Step::Closed
                    },
                    async { Step::Next(messages.next().await) },
                )
                .await;

                match step {
                    Step::Closed => {
                        debug!(target: "bevy_sse_chat", "browser stream {} closed", sink.id());
                        break;
                    }
                    Step::Next(Some(Ok((_, event)))) => {
                        let text = event.data().as_string().unwrap_or_default();
                        if !sink.send_async(StreamEvent::Fragment(text)).await {
                            break;
                        }
                    }
                    Step::Next(Some(Err(err))) => {
                        // browsers fire `error` both on failure and when the server ends the stream
                        warn!(target: "bevy_sse_chat", "browser stream {} error: {:?}", sink.id(), err);
                        sink.send_async(StreamEvent::Error(StreamError::Transport(format!("{err:?}"))))
                            .await;
                        break;
                    }
                    Step::Next(None) => {
                        sink.send_async(StreamEvent::End).await;
                        break;
                    }
                }
            }
            source.close();
        });

        Ok(Box::new(BrowserConnection { close_tx: Some(close_tx) }))
    }
}
