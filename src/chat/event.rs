use serde::{Deserialize, Serialize};

use super::{Message, TxnStatus};

/// Changes published by the chat view for whoever renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatEvent {
    /// History resolved. Carries the whole sequence, including messages
    /// received live before the history arrived.
    #[serde(rename_all = "camelCase")]
    MessagesLoaded { messages: Vec<Message> },
    #[serde(rename_all = "camelCase")]
    MessageReceived { message: Message },
    #[serde(rename_all = "camelCase")]
    StatusChanged { status: TxnStatus },
    #[serde(rename_all = "camelCase")]
    Errored { message: String },
    /// The ledger closed the `NewMessage` subscription.
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_wire_format() {
        let json = serde_json::to_value(ChatEvent::StatusChanged {
            status: TxnStatus::PendingInclusion,
        })
        .unwrap();
        assert_eq!(json["type"], "statusChanged");
        assert_eq!(json["status"], "pendingInclusion");

        let json = serde_json::to_value(ChatEvent::Disconnected).unwrap();
        assert_eq!(json["type"], "disconnected");
    }
}
