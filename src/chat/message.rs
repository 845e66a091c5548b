use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::ledger::{NewMessageEvent, RawMessage};

/// One chat entry as observed from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Account that sent the message
    pub address: Address,
    /// Ledger-assigned timestamp, kept opaque
    pub date: U256,
    /// Message payload
    pub content: String,
}

impl Message {
    /// Whether `account` wrote this message.
    pub fn is_from(&self, account: Option<Address>) -> bool {
        account == Some(self.address)
    }
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        Self {
            address: raw.sender,
            date: raw.timestamp,
            content: raw.content,
        }
    }
}

impl From<NewMessageEvent> for Message {
    fn from(event: NewMessageEvent) -> Self {
        Self {
            address: event.sender,
            date: event.timestamp,
            content: event.content,
        }
    }
}
