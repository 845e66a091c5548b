//! The host wallet environment.
//!
//! In a browser this is whatever the extension injected into the page. Here it
//! is an explicit dependency so the rest of the client can run against any
//! implementation, including the in-memory one used in tests.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use crate::ledger::ChatLedger;

/// An injected, EIP-1193 style wallet object.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Whether the object self-identifies as MetaMask.
    fn is_metamask(&self) -> bool;

    /// Prompt the user to authorize the client. Returns the account list as
    /// the wallet reports it, unnormalized.
    async fn request_accounts(&self) -> Result<Vec<String>>;

    /// Open a network connection through this wallet.
    fn connect(&self) -> Arc<dyn ChatLedger>;
}

/// Access to the injected wallet object, if there is one.
pub trait WalletEnvironment: Send + Sync {
    fn injected(&self) -> Option<Arc<dyn WalletProvider>>;
}

/// Returns true only when a wallet object is present and identifies as MetaMask.
pub fn is_wallet_installed(env: &dyn WalletEnvironment) -> bool {
    env.injected().is_some_and(|wallet| wallet.is_metamask())
}

/// A [`WalletEnvironment`] whose injected object can be swapped at runtime,
/// the way an extension can be installed or removed while the page lives.
#[derive(Default)]
pub struct InjectedEnvironment {
    wallet: Mutex<Option<Arc<dyn WalletProvider>>>,
}

impl InjectedEnvironment {
    pub fn new(wallet: Option<Arc<dyn WalletProvider>>) -> Self {
        Self {
            wallet: Mutex::new(wallet),
        }
    }

    /// An environment without any wallet.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn inject(&self, wallet: Option<Arc<dyn WalletProvider>>) {
        *self.wallet.lock().expect("poisoned") = wallet;
    }
}

impl WalletEnvironment for InjectedEnvironment {
    fn injected(&self) -> Option<Arc<dyn WalletProvider>> {
        self.wallet.lock().expect("poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::LocalChain;

    #[test]
    fn probe_without_wallet() {
        assert!(!is_wallet_installed(&InjectedEnvironment::empty()));
    }

    #[test]
    fn probe_requires_metamask() {
        let other = LocalChain::builder().metamask(false).build();
        let env = InjectedEnvironment::new(Some(other.wallet()));
        assert!(!is_wallet_installed(&env));

        let metamask = LocalChain::builder().build();
        env.inject(Some(metamask.wallet()));
        assert!(is_wallet_installed(&env));

        env.inject(None);
        assert!(!is_wallet_installed(&env));
    }
}
