//! Read and post chat messages stored on a smart contract, signing through an
//! injected wallet.
//!
//! The contract stores the messages and emits `NewMessage`; this crate is the
//! client side of it. [`AppContext`] ties the pieces together: it probes the
//! [`wallet`] environment, derives a [`contract`] handle and keeps a
//! [`chat::ChatView`] attached to it.

pub mod chat;
pub mod config;
pub mod contract;
pub mod error;
pub mod ledger;
mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod utils;
pub mod wallet;

pub use chat::{ChatEvent, ChatView, Message, TxnStatus};
pub use config::ChatConfig;
pub use error::ChatError;
pub use state::AppContext;

/// Install a `tracing` subscriber printing to stdout.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .pretty()
        .with_ansi(false)
        .init();
}
