//! native event-stream transport: a reqwest body stream on the tokio runtime.

use bevy::log::{debug, info, warn};
use futures_lite::StreamExt;
use reqwest::header::ACCEPT;
use url::Url;

use super::{Connection, EventSink, StreamEvent, StreamTransport};
use crate::error::StreamError;
use crate::sse::SseDecoder;

/// each connection is one task on the tokio runtime. closing aborts the
/// task, which drops the response body and with it the socket, even while
/// the server is silent.
pub struct NativeTransport {
    client: reqwest::Client,
    rt: tokio::runtime::Handle,
}

impl NativeTransport {
    pub fn new(rt: tokio::runtime::Handle) -> Self {
        Self { client: reqwest::Client::new(), rt }
    }

    pub fn with_client(client: reqwest::Client, rt: tokio::runtime::Handle) -> Self {
        Self { client, rt }
    }
}

struct NativeConnection {
    task: Option<tokio::task::JoinHandle<()>>,
}

impl Connection for NativeConnection {
    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl StreamTransport for NativeTransport {
    fn open(&self, url: &Url, sink: EventSink) -> Result<Box<dyn Connection>, StreamError> {
        let client = self.client.clone();
        let url = url.clone();
        info!(target: "bevy_sse_chat", "native stream {} -> {}", sink.id(), url);
        let task = self.rt.spawn(async move {
            if let Err(error) = read_stream(&client, url, &sink).await {
                warn!(target: "bevy_sse_chat", "stream {} failed: {}", sink.id(), error);
                sink.send_async(StreamEvent::Error(error)).await;
            }
        });
        Ok(Box::new(NativeConnection { task: Some(task) }))
    }
}

async fn read_stream(client: &reqwest::Client, url: Url, sink: &EventSink) -> Result<(), StreamError> {
    let response = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| StreamError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(StreamError::Http { status: status.as_u16() });
    }

    if !sink.send_async(StreamEvent::Open).await {
        return Ok(());
    }

    let mut body = std::pin::pin!(response.bytes_stream());
    let mut decoder = SseDecoder::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| StreamError::Transport(e.to_string()))?;
        for event in decoder.feed(&chunk) {
            if !event.is_message() {
                debug!(target: "bevy_sse_chat", "stream {} ignoring '{}' event", sink.id(), event.event);
                continue;
            }
            if !sink.send_async(StreamEvent::Fragment(event.data)).await {
                return Ok(());
            }
        }
    }

    sink.send_async(StreamEvent::End).await;
    Ok(())
}
