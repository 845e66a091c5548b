use std::sync::Arc;

use alloy_primitives::Address;
use tokio::sync::{broadcast, Mutex as TokioMutex};

use crate::{
    chat::{ChatEvent, ChatView, Message, TxnStatus},
    config::ChatConfig,
    contract::{ContractHandle, HandleProvider},
    error::{describe, ChatError, Result},
    ledger::Receipt,
    utils::first_account,
    wallet::{is_wallet_installed, WalletEnvironment},
};

/// Holds the application's runtime context: the wallet environment, the
/// session account, the contract handle derived from them and the chat view
/// following that handle.
///
/// Every input change goes through here and ends with the view re-attached to
/// whatever handle the provider now derives.
pub struct AppContext {
    env: Arc<dyn WalletEnvironment>,
    provider: HandleProvider,
    view: ChatView,
    /// Held for the whole of `connect`, so the wallet is prompted once.
    connecting: TokioMutex<()>,
}

impl AppContext {
    /// Probe the environment and start following the chat contract read-only.
    pub async fn new(env: Arc<dyn WalletEnvironment>, config: &ChatConfig) -> Self {
        let provider = HandleProvider::new(env.clone(), config);
        let context = Self {
            env,
            provider,
            view: ChatView::new(),
            connecting: TokioMutex::new(()),
        };
        context.sync().await;
        context
    }

    pub fn is_wallet_installed(&self) -> bool {
        is_wallet_installed(self.env.as_ref())
    }

    /// The session account, once the user has connected.
    pub fn account(&self) -> Option<Address> {
        self.provider.account()
    }

    /// Ask the wallet to authorize the client and adopt the first account.
    ///
    /// The account is set once: connecting again returns it without prompting.
    /// A denied prompt leaves the session without an account. Concurrent calls
    /// wait for the one already prompting and share its account.
    pub async fn connect(&self) -> Result<Address> {
        let _connecting = self.connecting.lock().await;
        if let Some(account) = self.provider.account() {
            return Ok(account);
        }
        let wallet = self
            .env
            .injected()
            .filter(|wallet| wallet.is_metamask())
            .ok_or(ChatError::WalletNotInstalled)?;
        let accounts = wallet.request_accounts().await.map_err(|e| {
            tracing::warn!("wallet authorization failed: {e:#}");
            ChatError::AuthorizationDenied(describe(&e))
        })?;
        let account = first_account(&accounts).inspect_err(|e| tracing::warn!("{e}"))?;
        tracing::info!("connected as {account}");

        self.provider.refresh_environment();
        let upgraded = self.provider.set_account(Some(account)).await;
        self.sync().await;
        if let Err(e) = upgraded {
            tracing::warn!("{e}");
            return Err(e);
        }
        Ok(account)
    }

    /// Re-probe the wallet environment, e.g. after an extension was installed.
    pub async fn refresh(&self) {
        if self.provider.refresh_environment() {
            self.sync().await;
        }
    }

    /// Switch to another chat deployment or interface.
    pub async fn set_contract(&self, config: &ChatConfig) {
        self.provider
            .set_contract(config.contract_address, config.interface.clone());
        self.sync().await;
    }

    /// Fails with [`ChatError::SubmissionInProgress`] while a message is
    /// being sent.
    pub fn set_draft(&self, text: impl Into<String>) -> Result<()> {
        self.view.set_draft(text)
    }

    pub fn draft(&self) -> String {
        self.view.draft()
    }

    /// Submit the current draft.
    pub async fn send_message(&self) -> Result<Receipt> {
        self.view.submit().await
    }

    pub fn messages(&self) -> Option<Vec<Message>> {
        self.view.messages()
    }

    pub fn status(&self) -> TxnStatus {
        self.view.status()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.view.subscribe()
    }

    pub fn handle(&self) -> Option<ContractHandle> {
        self.provider.handle()
    }

    pub fn view(&self) -> &ChatView {
        &self.view
    }

    async fn sync(&self) {
        self.view.attach(self.provider.handle()).await;
    }
}
