use alloy_json_abi::{Event, Function, JsonAbi};
use alloy_primitives::{Selector, B256};

use crate::error::{ChatError, Result};

pub const GET_MESSAGES: &str = "getMessages";
pub const SEND_MESSAGE: &str = "sendMessage";
pub const NEW_MESSAGE: &str = "NewMessage";

/// The subset of the chat contract's ABI the client relies on.
///
/// Built from a full [`JsonAbi`]; construction fails if any of the three
/// entries is missing, so a handle never exists for an interface it can't use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatInterface {
    abi: JsonAbi,
    get_messages: Function,
    send_message: Function,
    new_message: Event,
}

impl ChatInterface {
    pub fn from_abi(abi: JsonAbi) -> Result<Self> {
        let get_messages = first_function(&abi, GET_MESSAGES)?;
        let send_message = first_function(&abi, SEND_MESSAGE)?;
        let new_message = abi
            .event(NEW_MESSAGE)
            .and_then(|events| events.first())
            .cloned()
            .ok_or(ChatError::MissingAbiEntry(NEW_MESSAGE))?;
        Ok(Self {
            abi,
            get_messages,
            send_message,
            new_message,
        })
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    pub fn get_messages_selector(&self) -> Selector {
        self.get_messages.selector()
    }

    pub fn send_message_selector(&self) -> Selector {
        self.send_message.selector()
    }

    /// Topic 0 of `NewMessage` logs.
    pub fn new_message_topic(&self) -> B256 {
        self.new_message.selector()
    }
}

fn first_function(abi: &JsonAbi, name: &'static str) -> Result<Function> {
    abi.function(name)
        .and_then(|overloads| overloads.first())
        .cloned()
        .ok_or(ChatError::MissingAbiEntry(name))
}
