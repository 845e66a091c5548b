#![allow(dead_code)]

use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::broadcast;
use wallet_chat::{
    testing::LocalChain, wallet::InjectedEnvironment, AppContext, ChatConfig, ChatEvent, Message,
    TxnStatus,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(TIMEOUT, future)
        .await
        .expect("timed out")
}

/// A context following the bundled contract on `chain`.
pub async fn context(chain: &LocalChain) -> (Arc<AppContext>, ChatConfig) {
    let config = ChatConfig::bundled().unwrap();
    let env = Arc::new(InjectedEnvironment::new(Some(chain.wallet())));
    (Arc::new(AppContext::new(env, &config).await), config)
}

pub async fn next_loaded(events: &mut broadcast::Receiver<ChatEvent>) -> Vec<Message> {
    within(async {
        loop {
            if let ChatEvent::MessagesLoaded { messages } = events.recv().await.unwrap() {
                return messages;
            }
        }
    })
    .await
}

pub async fn next_received(events: &mut broadcast::Receiver<ChatEvent>) -> Message {
    within(async {
        loop {
            if let ChatEvent::MessageReceived { message } = events.recv().await.unwrap() {
                return message;
            }
        }
    })
    .await
}

pub async fn next_error(events: &mut broadcast::Receiver<ChatEvent>) -> String {
    within(async {
        loop {
            if let ChatEvent::Errored { message } = events.recv().await.unwrap() {
                return message;
            }
        }
    })
    .await
}

/// Drain every status change published so far.
pub fn status_changes(events: &mut broadcast::Receiver<ChatEvent>) -> Vec<TxnStatus> {
    let mut changes = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ChatEvent::StatusChanged { status } = event {
            changes.push(status);
        }
    }
    changes
}

/// Wait until the chain reports exactly `n` listeners.
pub async fn listeners_settle(chain: &LocalChain, n: usize) {
    within(async {
        while chain.listeners() != n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
}
