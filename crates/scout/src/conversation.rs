use crate::models::message::Message;

/// Append-only message log for one analysis.
///
/// Stages take the conversation by value and hand back an extended one; nothing is ever
/// removed or rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    system: String,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new<S: Into<String>>(system: S, first: Message) -> Self {
        Self {
            system: system.into(),
            messages: vec![first],
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_messages<I: IntoIterator<Item = Message>>(mut self, messages: I) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
