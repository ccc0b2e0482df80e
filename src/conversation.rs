//! the visible transcript: an append-only list of messages.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// one transcript entry. `text` is replaced wholesale on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub is_user: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_user: true }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_user: false }
    }
}

/// insertion-ordered transcript for the current session.
///
/// records are only ever appended or tail-updated; ui code observes
/// mutations through change detection on this resource or `revision()`.
#[derive(Resource, Debug, Default, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    revision: u64,
}

impl Conversation {
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.revision += 1;
    }

    /// replaces the tail's text when the tail is an assistant record.
    ///
    /// an empty transcript or a user tail is left alone, so a late fragment
    /// cannot overwrite a question that was appended after it was sent.
    pub fn update_tail(&mut self, text: impl Into<String>) -> bool {
        match self.messages.last_mut() {
            Some(last) if !last.is_user => {
                last.text = text.into();
                self.revision += 1;
                true
            }
            _ => false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// bumped once per effective mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn update_tail_replaces_assistant_text_only() {
        let mut conv = Conversation::default();
        conv.append(Message::user("q"));
        conv.append(Message::assistant(""));

        assert!(conv.update_tail("partial"));
        assert!(conv.update_tail("partial answer"));

        assert_eq!(
            conv.messages(),
            &[Message::user("q"), Message::assistant("partial answer")]
        );
        assert_eq!(conv.revision(), 4);
    }

    #[test]
    fn update_tail_is_a_noop_on_user_tail() {
        let mut conv = Conversation::default();
        conv.append(Message::user("q1"));
        conv.append(Message::assistant("a1"));
        conv.append(Message::user("q2"));
        let before = conv.revision();

        assert!(!conv.update_tail("late fragment"));
        assert_eq!(conv.last(), Some(&Message::user("q2")));
        assert_eq!(conv.messages()[1], Message::assistant("a1"));
        assert_eq!(conv.revision(), before);
    }

    #[test]
    fn update_tail_is_a_noop_on_empty_transcript() {
        let mut conv = Conversation::default();
        assert!(!conv.update_tail("x"));
        assert!(conv.is_empty());
        assert_eq!(conv.revision(), 0);
    }
}
