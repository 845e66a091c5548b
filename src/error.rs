use alloy_primitives::{Address, TxHash};

/// Every failure the chat client can report.
///
/// None of these are fatal. The session stays interactive after any of them,
/// and nothing is retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("no MetaMask wallet is installed")]
    WalletNotInstalled,
    #[error("wallet authorization was denied: {0}")]
    AuthorizationDenied(String),
    #[error("wallet did not return any account")]
    NoAccounts,
    #[error("invalid account identifier {0:?}")]
    InvalidAccount(String),
    #[error("could not derive a signer for {account}: {reason}")]
    SignerUnavailable { account: Address, reason: String },
    #[error("no contract handle is available")]
    NoHandle,
    #[error("contract handle is read-only")]
    ReadOnly,
    #[error("a message submission is already in progress")]
    SubmissionInProgress,
    #[error("transaction was not submitted: {0}")]
    SubmitFailed(String),
    #[error("transaction {hash} was not included: {reason}")]
    InclusionFailed { hash: TxHash, reason: String },
    #[error("failed to fetch message history: {0}")]
    HistoryFailed(String),
    #[error("contract interface has no `{0}` entry")]
    MissingAbiEntry(&'static str),
    #[error("invalid contract artifact: {0}")]
    Artifact(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;

/// Render an [`anyhow::Error`] with its whole context chain on one line.
pub(crate) fn describe(err: &anyhow::Error) -> String {
    format!("{err:#}")
}
