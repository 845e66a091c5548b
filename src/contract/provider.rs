use std::sync::{Arc, Mutex};

use alloy_primitives::Address;

use super::{derive_handle, ChatInterface, Connection, ContractHandle, HandleInputs};
use crate::{
    config::ChatConfig,
    error::{describe, ChatError, Result},
    ledger::ChatSigner,
    wallet::WalletEnvironment,
};

struct ProviderState {
    inputs: HandleInputs,
    connection: Option<Connection>,
    signer: Option<Arc<dyn ChatSigner>>,
    handle: Option<ContractHandle>,
}

impl ProviderState {
    fn rederive(&mut self) {
        self.handle = derive_handle(&self.inputs, self.connection.as_ref(), self.signer.as_ref());
        match &self.handle {
            Some(handle) => tracing::info!(
                "derived {} ({:?}) for {}",
                handle.id(),
                handle.mode(),
                handle.address()
            ),
            None => tracing::info!("no wallet connection, contract handle unavailable"),
        }
    }
}

/// Keeps the current [`ContractHandle`] in step with its inputs.
///
/// The connection is opened once per injected wallet object and reused until
/// the environment reports a different one. Signers are resolved
/// asynchronously; until then, and whenever the resolved signer belongs to an
/// account that is no longer current, the handle stays read-only.
pub struct HandleProvider {
    env: Arc<dyn WalletEnvironment>,
    state: Mutex<ProviderState>,
}

impl HandleProvider {
    pub fn new(env: Arc<dyn WalletEnvironment>, config: &ChatConfig) -> Self {
        let provider = Self {
            env,
            state: Mutex::new(ProviderState {
                inputs: HandleInputs {
                    address: config.contract_address,
                    interface: config.interface.clone(),
                    account: None,
                },
                connection: None,
                signer: None,
                handle: None,
            }),
        };
        provider.refresh_environment();
        provider
    }

    pub fn handle(&self) -> Option<ContractHandle> {
        self.state.lock().expect("poisoned").handle.clone()
    }

    pub fn account(&self) -> Option<Address> {
        self.state.lock().expect("poisoned").inputs.account
    }

    /// Probe the environment again. A new (or vanished) wallet object drops
    /// the connection and any signer derived from it. Returns whether the
    /// handle changed.
    pub fn refresh_environment(&self) -> bool {
        let injected = self.env.injected();
        let mut state = self.state.lock().expect("poisoned");
        let unchanged = match (&state.connection, &injected) {
            (Some(connection), Some(wallet)) => connection.is_for(wallet),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return false;
        }
        state.connection = injected.map(Connection::open);
        state.signer = None;
        state.rederive();
        true
    }

    /// Point the provider at another deployment or interface.
    pub fn set_contract(&self, address: Address, interface: Arc<ChatInterface>) {
        let mut state = self.state.lock().expect("poisoned");
        if state.inputs.address == address && Arc::ptr_eq(&state.inputs.interface, &interface) {
            return;
        }
        state.inputs.address = address;
        state.inputs.interface = interface;
        state.rederive();
    }

    /// Change the session account and resolve a signer for it.
    ///
    /// The handle is re-derived read-only right away and becomes read-write
    /// once the signer resolves. A signer resolving after the account or
    /// connection has moved on is discarded.
    pub async fn set_account(&self, account: Option<Address>) -> Result<Option<ContractHandle>> {
        let (account, ledger) = {
            let mut state = self.state.lock().expect("poisoned");
            let signer_current = match (&state.signer, account) {
                (Some(signer), Some(account)) => signer.account() == account,
                (None, None) => true,
                _ => false,
            };
            if state.inputs.account == account && signer_current {
                return Ok(state.handle.clone());
            }
            state.inputs.account = account;
            state.signer = None;
            state.rederive();
            match (account, &state.connection) {
                (Some(account), Some(connection)) => (account, connection.ledger().clone()),
                _ => return Ok(state.handle.clone()),
            }
        };

        let signer = ledger
            .signer(account)
            .await
            .map_err(|e| ChatError::SignerUnavailable {
                account,
                reason: describe(&e),
            })?;

        let mut state = self.state.lock().expect("poisoned");
        let same_connection = state
            .connection
            .as_ref()
            .is_some_and(|connection| Arc::ptr_eq(connection.ledger(), &ledger));
        if state.inputs.account != Some(account) || !same_connection {
            tracing::debug!("discarding stale signer for {account}");
            return Ok(state.handle.clone());
        }
        state.signer = Some(signer);
        state.rederive();
        Ok(state.handle.clone())
    }
}
