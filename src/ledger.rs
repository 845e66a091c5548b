//! Ports onto the chat contract living on the ledger.
//!
//! The contract itself is external. These traits describe the calls the client
//! makes against it: a read side bound to the network connection, a write side
//! bound to an authorized signer, and the pending transaction a write yields.

use std::sync::Arc;

use alloy_primitives::{Address, TxHash, U256};
use anyhow::Result;
use async_trait::async_trait;
use n0_future::boxed::BoxStream;
use serde::{Deserialize, Serialize};

/// A `Message` struct as returned by `getMessages()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub sender: Address,
    pub timestamp: U256,
    pub content: String,
}

/// A decoded `NewMessage(sender, timestamp, content, style)` log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessageEvent {
    pub sender: Address,
    pub timestamp: U256,
    pub content: String,
    /// Emitted by the contract but not used by the client.
    pub style: String,
    /// Block the log was emitted in.
    pub block_number: u64,
}

/// The result of `getMessages()` and the block it was read at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHistory {
    pub messages: Vec<RawMessage>,
    pub block_number: u64,
}

/// Live `NewMessage` notifications for one contract.
pub type MessageStream = BoxStream<NewMessageEvent>;

/// Outcome of a transaction the ledger has included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
}

/// Network connection derived from the injected wallet. Read-only.
#[async_trait]
pub trait ChatLedger: Send + Sync {
    /// Full message history of the contract at `contract`, read at the
    /// latest block. Every `NewMessage` emitted up to and including that block
    /// is part of it.
    async fn get_messages(&self, contract: Address) -> Result<MessageHistory>;

    /// Register a listener for `NewMessage` events emitted by `contract`.
    ///
    /// Events emitted after this resolves are delivered on the stream;
    /// dropping the stream removes the listener.
    async fn subscribe(&self, contract: Address) -> Result<MessageStream>;

    /// Derive a signer authorized to act as `account`.
    async fn signer(&self, account: Address) -> Result<Arc<dyn ChatSigner>>;
}

/// Write access to the ledger on behalf of one account.
#[async_trait]
pub trait ChatSigner: Send + Sync {
    fn account(&self) -> Address;

    /// Ask the wallet to sign and broadcast `sendMessage(content)`.
    async fn send_message(
        &self,
        contract: Address,
        content: &str,
    ) -> Result<Box<dyn PendingTransaction>>;
}

/// A broadcast transaction that is not yet included.
#[async_trait]
pub trait PendingTransaction: Send {
    fn tx_hash(&self) -> TxHash;

    /// Resolve once the ledger has included the transaction.
    async fn wait(self: Box<Self>) -> Result<Receipt>;
}
