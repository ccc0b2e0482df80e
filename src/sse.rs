//! server-sent events decoder used by the native transport.
//!
//! fed raw body chunks (or one line at a time, without its `\n`), it follows
//! the event-stream field rules browsers apply for `EventSource`:
//! - lines are split on `\n` across chunk boundaries and decoded lossily as utf-8
//! - `data:` lines accumulate, joined by `\n`
//! - `event:` sets the event type (default `message`)
//! - `id:` is remembered across events; `retry:` and unknown fields are ignored
//! - a blank line dispatches, unless no data was collected
//! - lines starting with `:` are comments

/// the event type browsers deliver to `onmessage`.
pub const MESSAGE_EVENT: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    pub fn is_message(&self) -> bool {
        self.event == MESSAGE_EVENT
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    data: String,
    event: String,
    last_id: Option<String>,
    started: bool,
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// feeds a chunk of body bytes; returns the events it completes.
    ///
    /// a trailing partial line is held until the next chunk. invalid utf-8 is
    /// replaced with U+FFFD instead of failing the stream.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = String::from_utf8_lossy(&self.pending[start..end]).into_owned();
            start = end + 1;
            if let Some(event) = self.feed_line(&line) {
                events.push(event);
            }
        }
        self.pending.drain(..start);
        events
    }

    /// feeds one line; returns an event when the line completes one.
    pub fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        let mut line = line.strip_suffix('\r').unwrap_or(line);
        if !self.started {
            self.started = true;
            line = line.strip_prefix('\u{feff}').unwrap_or(line);
        }

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "event" => self.event = value.to_string(),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event.clear();
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        data.pop();
        let event = match std::mem::take(&mut self.event) {
            e if e.is_empty() => MESSAGE_EVENT.to_string(),
            e => e,
        };
        Some(SseEvent { event, data, id: self.last_id.clone() })
    }
}
