use serde::{Deserialize, Serialize};

/// Where a message submission stands.
///
/// Every path ends back at [`TxnStatus::Idle`]; a failed submission is not
/// remembered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TxnStatus {
    #[default]
    Idle,
    /// Waiting for the user to confirm the transaction in the wallet.
    PendingConfirmation,
    /// Broadcast, waiting for the ledger to include it.
    PendingInclusion,
}

impl TxnStatus {
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }

    /// Text shown on the send button while a submission is running.
    pub fn label(self) -> Option<&'static str> {
        match self {
            Self::Idle => None,
            Self::PendingConfirmation => Some("WAIT"),
            Self::PendingInclusion => Some("SENDING"),
        }
    }
}
