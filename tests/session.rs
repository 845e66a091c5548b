mod common;

use std::sync::Arc;

use alloy_primitives::Address;
use common::*;
use wallet_chat::{
    contract::HandleMode,
    testing::{LocalChain, DEFAULT_ACCOUNT},
    wallet::InjectedEnvironment,
    AppContext, ChatConfig, ChatError,
};

#[tokio::test]
async fn connect_adopts_the_first_account_checksummed() {
    let first: Address = "0xD99f113cAd1fe2eeebe0E7383415B586704DB5a3".parse().unwrap();
    let chain = LocalChain::builder()
        .accounts([first, Address::with_last_byte(2)])
        .build();
    let (ctx, _) = context(&chain).await;
    assert!(ctx.is_wallet_installed());
    assert_eq!(ctx.account(), None);
    assert_eq!(ctx.handle().unwrap().mode(), HandleMode::ReadOnly);

    let account = ctx.connect().await.unwrap();
    assert_eq!(account, first);
    assert_eq!(
        account.to_checksum(None),
        "0xD99f113cAd1fe2eeebe0E7383415B586704DB5a3"
    );
    assert_eq!(ctx.account(), Some(first));

    let handle = ctx.handle().unwrap();
    assert_eq!(handle.mode(), HandleMode::ReadWrite);
    assert_eq!(handle.account(), Some(first));
    assert_eq!(ctx.view().handle().await.unwrap().id(), handle.id());
}

#[tokio::test]
async fn account_is_set_once() {
    let chain = LocalChain::builder().build();
    let (ctx, _) = context(&chain).await;
    assert_eq!(ctx.connect().await.unwrap(), DEFAULT_ACCOUNT);
    let handle = ctx.handle().unwrap();

    // A later denial does not matter, the wallet is not asked again.
    chain.deny_authorization(true);
    assert_eq!(ctx.connect().await.unwrap(), DEFAULT_ACCOUNT);
    assert_eq!(ctx.handle().unwrap().id(), handle.id());
}

#[tokio::test]
async fn denied_authorization_leaves_no_account() {
    let chain = LocalChain::builder().build();
    chain.deny_authorization(true);
    let (ctx, _) = context(&chain).await;
    let before = ctx.handle().unwrap();

    let err = ctx.connect().await.unwrap_err();
    assert!(matches!(err, ChatError::AuthorizationDenied(_)), "{err}");
    assert_eq!(ctx.account(), None);
    assert_eq!(ctx.handle().unwrap().id(), before.id());

    // The user can try again.
    chain.deny_authorization(false);
    assert_eq!(ctx.connect().await.unwrap(), DEFAULT_ACCOUNT);
}

#[tokio::test]
async fn wallet_without_accounts() {
    let chain = LocalChain::builder().accounts([]).build();
    let (ctx, _) = context(&chain).await;
    assert!(matches!(
        ctx.connect().await.unwrap_err(),
        ChatError::NoAccounts
    ));
    assert_eq!(ctx.account(), None);
}

#[tokio::test]
async fn connect_requires_metamask() {
    let chain = LocalChain::builder().metamask(false).build();
    let (ctx, _) = context(&chain).await;
    assert!(!ctx.is_wallet_installed());
    // The read-only handle still works through the injected object.
    assert!(ctx.handle().is_some());
    assert!(matches!(
        ctx.connect().await.unwrap_err(),
        ChatError::WalletNotInstalled
    ));

    let config = ChatConfig::bundled().unwrap();
    let ctx = AppContext::new(Arc::new(InjectedEnvironment::empty()), &config).await;
    assert!(!ctx.is_wallet_installed());
    assert!(matches!(
        ctx.connect().await.unwrap_err(),
        ChatError::WalletNotInstalled
    ));
}

#[tokio::test]
async fn signer_failure_keeps_the_session_read_only() {
    let chain = LocalChain::builder().build();
    chain.fail_signers(true);
    let (ctx, _) = context(&chain).await;
    let err = ctx.connect().await.unwrap_err();
    assert!(matches!(err, ChatError::SignerUnavailable { .. }), "{err}");
    assert_eq!(ctx.account(), Some(DEFAULT_ACCOUNT));
    assert_eq!(ctx.handle().unwrap().mode(), HandleMode::ReadOnly);
}

#[tokio::test]
async fn wallet_installed_later() {
    let chain = LocalChain::builder().build();
    let config = ChatConfig::bundled().unwrap();
    let env = Arc::new(InjectedEnvironment::empty());
    let ctx = AppContext::new(env.clone(), &config).await;
    let mut events = ctx.subscribe();
    assert!(ctx.handle().is_none());

    env.inject(Some(chain.wallet()));
    ctx.refresh().await;
    assert!(ctx.is_wallet_installed());
    assert!(ctx.handle().is_some());
    assert_eq!(next_loaded(&mut events).await, Vec::new());

    ctx.connect().await.unwrap();
    assert_eq!(ctx.handle().unwrap().mode(), HandleMode::ReadWrite);
}

#[tokio::test]
async fn concurrent_connects_prompt_once() {
    let chain = LocalChain::builder().build();
    let (ctx, _) = context(&chain).await;
    chain.hold_signers();

    let first = tokio::spawn({
        let ctx = ctx.clone();
        async move { ctx.connect().await }
    });
    within(chain.signer_requested()).await;
    let second = tokio::spawn({
        let ctx = ctx.clone();
        async move { ctx.connect().await }
    });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(!second.is_finished());

    chain.release_signers();
    assert_eq!(within(first).await.unwrap().unwrap(), DEFAULT_ACCOUNT);
    assert_eq!(within(second).await.unwrap().unwrap(), DEFAULT_ACCOUNT);
    assert_eq!(chain.authorization_requests(), 1);
    assert_eq!(ctx.handle().unwrap().mode(), HandleMode::ReadWrite);
}
