//! An in-memory chain and wallet implementing every ledger port.
//!
//! Calls that would wait on the user or on the network in real life
//! (signer derivation, history reads, transaction confirmation, inclusion)
//! pass through gates tests can hold and release, so every interleaving can be
//! driven deterministically.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use alloy_primitives::{Address, TxHash, U256};
use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::{
    ledger::{
        ChatLedger, ChatSigner, MessageHistory, MessageStream, NewMessageEvent, PendingTransaction,
        RawMessage, Receipt,
    },
    wallet::WalletProvider,
};

/// First timestamp handed out by the chain.
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// Account the builder authorizes unless told otherwise.
pub const DEFAULT_ACCOUNT: Address = Address::with_last_byte(0xa);

/// Calls passing a held gate wait until a test releases it.
struct Gate {
    open: watch::Sender<bool>,
    waiting: watch::Sender<usize>,
}

impl Gate {
    fn new() -> Self {
        Self {
            open: watch::Sender::new(true),
            waiting: watch::Sender::new(0),
        }
    }

    fn hold(&self) {
        self.open.send_replace(false);
    }

    fn release(&self) {
        self.open.send_replace(true);
    }

    async fn pass(&self) {
        self.waiting.send_modify(|n| *n += 1);
        let mut open = self.open.subscribe();
        let _ = open.wait_for(|open| *open).await;
        self.waiting.send_modify(|n| *n -= 1);
    }

    /// Resolve once at least one call is waiting at the gate.
    async fn occupied(&self) {
        let mut waiting = self.waiting.subscribe();
        let _ = waiting.wait_for(|n| *n > 0).await;
    }
}

#[derive(Default)]
struct ChainState {
    messages: HashMap<Address, Vec<RawMessage>>,
    next_timestamp: u64,
    block_number: u64,
    submitted: usize,
    history_reads: usize,
    authorization_requests: usize,
    accounts: Vec<Address>,
    deny_authorization: bool,
    fail_signers: bool,
    fail_history: bool,
    reject_next_submission: bool,
    revert_next_inclusion: bool,
}

struct Inner {
    state: Mutex<ChainState>,
    events: broadcast::Sender<(Address, NewMessageEvent)>,
    signers: Gate,
    history: Gate,
    confirmations: Gate,
    inclusions: Gate,
}

impl Inner {
    fn state(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().expect("poisoned")
    }

    /// Store a message the way the contract does and emit `NewMessage`.
    fn append(&self, contract: Address, sender: Address, content: String) -> (U256, u64) {
        let (timestamp, block_number) = {
            let mut state = self.state();
            let timestamp = U256::from(state.next_timestamp);
            state.next_timestamp += 1;
            state.block_number += 1;
            state.messages.entry(contract).or_default().push(RawMessage {
                sender,
                timestamp,
                content: content.clone(),
            });
            (timestamp, state.block_number)
        };
        let _ = self.events.send((
            contract,
            NewMessageEvent {
                sender,
                timestamp,
                content,
                style: String::new(),
                block_number,
            },
        ));
        (timestamp, block_number)
    }
}

/// Builder for a [`LocalChain`].
pub struct LocalChainBuilder {
    metamask: bool,
    accounts: Vec<Address>,
}

impl LocalChainBuilder {
    /// Whether the wallet self-identifies as MetaMask. Defaults to true.
    pub fn metamask(mut self, metamask: bool) -> Self {
        self.metamask = metamask;
        self
    }

    /// Accounts returned by `request_accounts`, in order.
    pub fn accounts(mut self, accounts: impl IntoIterator<Item = Address>) -> Self {
        self.accounts = accounts.into_iter().collect();
        self
    }

    pub fn build(self) -> LocalChain {
        let (events, _) = broadcast::channel(1024);
        let inner = Arc::new(Inner {
            state: Mutex::new(ChainState {
                next_timestamp: GENESIS_TIMESTAMP,
                accounts: self.accounts,
                ..Default::default()
            }),
            events,
            signers: Gate::new(),
            history: Gate::new(),
            confirmations: Gate::new(),
            inclusions: Gate::new(),
        });
        let wallet = Arc::new(LocalWallet {
            inner: inner.clone(),
            metamask: self.metamask,
        });
        LocalChain { inner, wallet }
    }
}

/// In-memory ledger plus the wallet injected to reach it.
#[derive(Clone)]
pub struct LocalChain {
    inner: Arc<Inner>,
    wallet: Arc<LocalWallet>,
}

impl LocalChain {
    pub fn builder() -> LocalChainBuilder {
        LocalChainBuilder {
            metamask: true,
            accounts: vec![DEFAULT_ACCOUNT],
        }
    }

    /// The injected wallet object. Always the same instance.
    pub fn wallet(&self) -> Arc<dyn WalletProvider> {
        self.wallet.clone()
    }

    /// Someone posts a message: it is stored and `NewMessage` is emitted.
    pub fn post(&self, contract: Address, sender: Address, content: impl Into<String>) -> U256 {
        self.inner.append(contract, sender, content.into()).0
    }

    /// Put messages into the history without emitting events.
    pub fn seed(&self, contract: Address, messages: impl IntoIterator<Item = RawMessage>) {
        self.inner
            .state()
            .messages
            .entry(contract)
            .or_default()
            .extend(messages);
    }

    /// Latest block. `seed` does not produce blocks, every `post` does.
    pub fn block_number(&self) -> u64 {
        self.inner.state().block_number
    }

    /// Emit a `NewMessage` without storing anything.
    pub fn emit(&self, contract: Address, event: NewMessageEvent) {
        let _ = self.inner.events.send((contract, event));
    }

    /// Stored history of `contract`.
    pub fn messages(&self, contract: Address) -> Vec<RawMessage> {
        self.inner
            .state()
            .messages
            .get(&contract)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of `sendMessage` transactions the wallet was asked to sign.
    pub fn submitted(&self) -> usize {
        self.inner.state().submitted
    }

    /// Number of live `NewMessage` subscriptions.
    pub fn listeners(&self) -> usize {
        self.inner.events.receiver_count()
    }

    /// Number of `getMessages` calls served.
    pub fn history_reads(&self) -> usize {
        self.inner.state().history_reads
    }

    /// Number of times the wallet prompted the user for accounts.
    pub fn authorization_requests(&self) -> usize {
        self.inner.state().authorization_requests
    }

    pub fn deny_authorization(&self, deny: bool) {
        self.inner.state().deny_authorization = deny;
    }

    pub fn fail_signers(&self, fail: bool) {
        self.inner.state().fail_signers = fail;
    }

    pub fn fail_history(&self, fail: bool) {
        self.inner.state().fail_history = fail;
    }

    /// The user rejects the next transaction in the wallet.
    pub fn reject_next_submission(&self) {
        self.inner.state().reject_next_submission = true;
    }

    /// The next transaction is broadcast but reverts.
    pub fn revert_next_inclusion(&self) {
        self.inner.state().revert_next_inclusion = true;
    }

    pub fn hold_signers(&self) {
        self.inner.signers.hold();
    }

    pub fn release_signers(&self) {
        self.inner.signers.release();
    }

    pub async fn signer_requested(&self) {
        self.inner.signers.occupied().await;
    }

    pub fn hold_history(&self) {
        self.inner.history.hold();
    }

    pub fn release_history(&self) {
        self.inner.history.release();
    }

    pub async fn history_requested(&self) {
        self.inner.history.occupied().await;
    }

    pub fn hold_confirmations(&self) {
        self.inner.confirmations.hold();
    }

    pub fn release_confirmations(&self) {
        self.inner.confirmations.release();
    }

    pub async fn confirmation_requested(&self) {
        self.inner.confirmations.occupied().await;
    }

    pub fn hold_inclusions(&self) {
        self.inner.inclusions.hold();
    }

    pub fn release_inclusions(&self) {
        self.inner.inclusions.release();
    }

    pub async fn inclusion_requested(&self) {
        self.inner.inclusions.occupied().await;
    }
}

struct LocalWallet {
    inner: Arc<Inner>,
    metamask: bool,
}

#[async_trait]
impl WalletProvider for LocalWallet {
    fn is_metamask(&self) -> bool {
        self.metamask
    }

    async fn request_accounts(&self) -> Result<Vec<String>> {
        let mut state = self.inner.state();
        state.authorization_requests += 1;
        if state.deny_authorization {
            bail!("User rejected the request.");
        }
        // Wallets answer in lowercase.
        Ok(state
            .accounts
            .iter()
            .map(|account| account.to_string().to_lowercase())
            .collect())
    }

    fn connect(&self) -> Arc<dyn ChatLedger> {
        Arc::new(LocalLedger {
            inner: self.inner.clone(),
        })
    }
}

struct LocalLedger {
    inner: Arc<Inner>,
}

#[async_trait]
impl ChatLedger for LocalLedger {
    async fn get_messages(&self, contract: Address) -> Result<MessageHistory> {
        self.inner.history.pass().await;
        let mut state = self.inner.state();
        if state.fail_history {
            bail!("call to getMessages reverted");
        }
        state.history_reads += 1;
        Ok(MessageHistory {
            messages: state.messages.get(&contract).cloned().unwrap_or_default(),
            block_number: state.block_number,
        })
    }

    async fn subscribe(&self, contract: Address) -> Result<MessageStream> {
        let receiver = self.inner.events.subscribe();
        let stream = n0_future::stream::unfold(receiver, move |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok((emitter, event)) if emitter == contract => {
                        return Some((event, receiver));
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("listener lagged, {n} events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn signer(&self, account: Address) -> Result<Arc<dyn ChatSigner>> {
        self.inner.signers.pass().await;
        if self.inner.state().fail_signers {
            bail!("unknown account {account}");
        }
        Ok(Arc::new(LocalSigner {
            inner: self.inner.clone(),
            account,
        }))
    }
}

struct LocalSigner {
    inner: Arc<Inner>,
    account: Address,
}

#[async_trait]
impl ChatSigner for LocalSigner {
    fn account(&self) -> Address {
        self.account
    }

    async fn send_message(
        &self,
        contract: Address,
        content: &str,
    ) -> Result<Box<dyn PendingTransaction>> {
        self.inner.state().submitted += 1;
        self.inner.confirmations.pass().await;
        let rejected = std::mem::take(&mut self.inner.state().reject_next_submission);
        if rejected {
            bail!("MetaMask Tx Signature: User denied transaction signature.");
        }
        Ok(Box::new(LocalPendingTransaction {
            inner: self.inner.clone(),
            tx_hash: TxHash::from(rand::random::<[u8; 32]>()),
            contract,
            sender: self.account,
            content: content.to_string(),
        }))
    }
}

struct LocalPendingTransaction {
    inner: Arc<Inner>,
    tx_hash: TxHash,
    contract: Address,
    sender: Address,
    content: String,
}

#[async_trait]
impl PendingTransaction for LocalPendingTransaction {
    fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    async fn wait(self: Box<Self>) -> Result<Receipt> {
        let Self {
            inner,
            tx_hash,
            contract,
            sender,
            content,
        } = *self;
        inner.inclusions.pass().await;
        let reverted = std::mem::take(&mut inner.state().revert_next_inclusion);
        if reverted {
            bail!("transaction {tx_hash} reverted");
        }
        let (_, block_number) = inner.append(contract, sender, content);
        Ok(Receipt {
            tx_hash,
            block_number,
        })
    }
}
