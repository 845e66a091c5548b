use super::Message;

/// The client-visible, append-only message sequence.
///
/// History and the live subscription race each other. Until history is in,
/// live messages are kept aside together with the block they were emitted in,
/// and land after it, so both orderings end with `history ++ live` and nothing
/// is dropped. A live message emitted at or before the block history was read
/// at is already part of it and is not appended a second time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLog {
    NotLoaded {
        early: Vec<Message>,
        blocks: Vec<u64>,
    },
    Loaded(Vec<Message>),
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::NotLoaded {
            early: Vec::new(),
            blocks: Vec::new(),
        }
    }
}

impl MessageLog {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Append one live message emitted in `block_number`.
    pub fn push(&mut self, message: Message, block_number: u64) {
        match self {
            Self::NotLoaded { early, blocks } => {
                early.push(message);
                blocks.push(block_number);
            }
            Self::Loaded(messages) => messages.push(message),
        }
    }

    /// Install the history read at `read_at`. Only the first call has any
    /// effect; it returns the resulting sequence.
    pub fn load(&mut self, history: Vec<Message>, read_at: u64) -> Option<&[Message]> {
        let Self::NotLoaded { early, blocks } = self else {
            return None;
        };
        let included = blocks.iter().take_while(|&&block| block <= read_at).count();
        let mut messages = history;
        messages.extend(early.drain(included..));
        *self = Self::Loaded(messages);
        self.messages()
    }

    /// What the user sees: nothing before the first message or the history
    /// arrives, an empty slice once history says there is nothing.
    pub fn messages(&self) -> Option<&[Message]> {
        match self {
            Self::NotLoaded { early, .. } if early.is_empty() => None,
            Self::NotLoaded { early, .. } => Some(early),
            Self::Loaded(messages) => Some(messages),
        }
    }
}
