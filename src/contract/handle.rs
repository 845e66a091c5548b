use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use super::ChatInterface;
use crate::{
    error::{describe, ChatError, Result},
    ledger::{ChatLedger, ChatSigner, MessageHistory, MessageStream, PendingTransaction},
    wallet::WalletProvider,
};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one derived handle. Two derivations never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(u64);

impl HandleId {
    fn next() -> Self {
        Self(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HandleMode {
    /// Bound to the network connection only. Constant calls and events.
    ReadOnly,
    /// Bound to an authorized signer. Can also send transactions.
    ReadWrite,
}

/// Network connection opened through one injected wallet object.
#[derive(Clone)]
pub struct Connection {
    wallet: Arc<dyn WalletProvider>,
    ledger: Arc<dyn ChatLedger>,
}

impl Connection {
    pub fn open(wallet: Arc<dyn WalletProvider>) -> Self {
        let ledger = wallet.connect();
        Self { wallet, ledger }
    }

    /// Whether this connection was opened through `wallet`.
    pub fn is_for(&self, wallet: &Arc<dyn WalletProvider>) -> bool {
        Arc::ptr_eq(&self.wallet, wallet)
    }

    pub fn ledger(&self) -> &Arc<dyn ChatLedger> {
        &self.ledger
    }
}

/// The identifying inputs of a handle.
#[derive(Debug, Clone)]
pub struct HandleInputs {
    pub address: Address,
    pub interface: Arc<ChatInterface>,
    pub account: Option<Address>,
}

/// A capability bound to the chat contract, read-only or read-write.
///
/// Handles are never mutated: any change of inputs produces a new one through
/// [`derive_handle`], with a new [`HandleId`].
#[derive(Clone)]
pub struct ContractHandle {
    id: HandleId,
    address: Address,
    interface: Arc<ChatInterface>,
    ledger: Arc<dyn ChatLedger>,
    signer: Option<Arc<dyn ChatSigner>>,
}

/// Build a handle from its inputs.
///
/// Without a connection there is no handle. The handle is read-write only
/// when `signer` was resolved for the account in `inputs`; any other signer is
/// ignored and the handle falls back to read-only.
pub fn derive_handle(
    inputs: &HandleInputs,
    connection: Option<&Connection>,
    signer: Option<&Arc<dyn ChatSigner>>,
) -> Option<ContractHandle> {
    let connection = connection?;
    let signer = signer
        .filter(|signer| inputs.account == Some(signer.account()))
        .cloned();
    Some(ContractHandle {
        id: HandleId::next(),
        address: inputs.address,
        interface: inputs.interface.clone(),
        ledger: connection.ledger.clone(),
        signer,
    })
}

impl ContractHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Whether `other` sees the same `NewMessage` events: same contract,
    /// reached through the same connection.
    pub fn listens_like(&self, other: &ContractHandle) -> bool {
        self.address == other.address && Arc::ptr_eq(&self.ledger, &other.ledger)
    }

    pub fn interface(&self) -> &Arc<ChatInterface> {
        &self.interface
    }

    pub fn mode(&self) -> HandleMode {
        match self.signer {
            Some(_) => HandleMode::ReadWrite,
            None => HandleMode::ReadOnly,
        }
    }

    /// The account writes are signed as, if read-write.
    pub fn account(&self) -> Option<Address> {
        self.signer.as_ref().map(|signer| signer.account())
    }

    pub async fn get_messages(&self) -> Result<MessageHistory> {
        tracing::debug!(
            selector = %self.interface.get_messages_selector(),
            "{} calling getMessages on {}",
            self.id,
            self.address
        );
        self.ledger
            .get_messages(self.address)
            .await
            .map_err(|e| ChatError::HistoryFailed(describe(&e)))
    }

    pub async fn subscribe(&self) -> anyhow::Result<MessageStream> {
        tracing::debug!(
            topic = %self.interface.new_message_topic(),
            "{} listening for NewMessage on {}",
            self.id,
            self.address
        );
        self.ledger.subscribe(self.address).await
    }

    /// Submit `sendMessage(content)`. Fails without touching the ledger when
    /// the handle is read-only.
    pub async fn send_message(&self, content: &str) -> Result<Box<dyn PendingTransaction>> {
        let signer = self.signer.as_ref().ok_or(ChatError::ReadOnly)?;
        tracing::debug!(
            selector = %self.interface.send_message_selector(),
            "{} sending message as {}",
            self.id,
            signer.account()
        );
        signer
            .send_message(self.address, content)
            .await
            .map_err(|e| ChatError::SubmitFailed(describe(&e)))
    }
}

impl fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHandle")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("mode", &self.mode())
            .field("account", &self.account())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ChatConfig, testing::LocalChain};

    fn inputs(account: Option<Address>) -> HandleInputs {
        let config = ChatConfig::bundled().unwrap();
        HandleInputs {
            address: config.contract_address,
            interface: config.interface,
            account,
        }
    }

    #[test]
    fn no_connection_no_handle() {
        assert!(derive_handle(&inputs(None), None, None).is_none());
    }

    #[tokio::test]
    async fn signer_must_match_account() {
        let alice = Address::with_last_byte(0xa);
        let bob = Address::with_last_byte(0xb);
        let chain = LocalChain::builder().build();
        let connection = Connection::open(chain.wallet());
        let signer = connection.ledger().signer(alice).await.unwrap();

        let rw = derive_handle(&inputs(Some(alice)), Some(&connection), Some(&signer)).unwrap();
        assert_eq!(rw.mode(), HandleMode::ReadWrite);
        assert_eq!(rw.account(), Some(alice));

        let ro = derive_handle(&inputs(Some(bob)), Some(&connection), Some(&signer)).unwrap();
        assert_eq!(ro.mode(), HandleMode::ReadOnly);
        assert_eq!(ro.account(), None);

        let ro = derive_handle(&inputs(None), Some(&connection), Some(&signer)).unwrap();
        assert_eq!(ro.mode(), HandleMode::ReadOnly);
    }

    #[tokio::test]
    async fn every_derivation_is_a_new_instance() {
        let chain = LocalChain::builder().build();
        let connection = Connection::open(chain.wallet());
        let a = derive_handle(&inputs(None), Some(&connection), None).unwrap();
        let b = derive_handle(&inputs(None), Some(&connection), None).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.mode(), b.mode());
    }

    #[tokio::test]
    async fn upgraded_handle_listens_like_the_read_only_one() {
        let chain = LocalChain::builder().build();
        let connection = Connection::open(chain.wallet());
        let account = Address::with_last_byte(0xa);
        let signer = connection.ledger().signer(account).await.unwrap();
        let ro = derive_handle(&inputs(None), Some(&connection), None).unwrap();
        let rw = derive_handle(&inputs(Some(account)), Some(&connection), Some(&signer)).unwrap();
        assert!(ro.listens_like(&rw));

        let mut elsewhere = inputs(None);
        elsewhere.address = Address::with_last_byte(0xcc);
        let other = derive_handle(&elsewhere, Some(&connection), None).unwrap();
        assert!(!ro.listens_like(&other));

        let reconnected = Connection::open(chain.wallet());
        let other = derive_handle(&inputs(None), Some(&reconnected), None).unwrap();
        assert!(!ro.listens_like(&other));
    }

    #[tokio::test]
    async fn read_only_handle_refuses_writes() {
        let chain = LocalChain::builder().build();
        let connection = Connection::open(chain.wallet());
        let handle = derive_handle(&inputs(None), Some(&connection), None).unwrap();
        let err = handle.send_message("hello").await.err().unwrap();
        assert!(matches!(err, ChatError::ReadOnly));
        assert_eq!(chain.submitted(), 0);
    }
}
