use alloy_primitives::Address;

use crate::error::{ChatError, Result};

/// Parse an account identifier returned by the wallet into its checksummed
/// form. Wallets hand back lowercase hex, we always work with [`Address`].
pub fn normalize_account(raw: &str) -> Result<Address> {
    raw.trim()
        .parse::<Address>()
        .map_err(|_| ChatError::InvalidAccount(raw.to_string()))
}

/// Pick the session account out of a `requestAccounts` answer.
pub fn first_account(accounts: &[String]) -> Result<Address> {
    let first = accounts.first().ok_or(ChatError::NoAccounts)?;
    normalize_account(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksums_lowercase_accounts() {
        let account = normalize_account("0xd99f113cad1fe2eeebe0e7383415b586704db5a3").unwrap();
        assert_eq!(
            account.to_checksum(None),
            "0xD99f113cAd1fe2eeebe0E7383415B586704DB5a3"
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            normalize_account("not an account"),
            Err(ChatError::InvalidAccount(_))
        ));
    }

    #[test]
    fn first_account_needs_one() {
        assert!(matches!(first_account(&[]), Err(ChatError::NoAccounts)));
        let accounts = vec![
            "0x0000000000000000000000000000000000000001".to_string(),
            "garbage".to_string(),
        ];
        assert_eq!(
            first_account(&accounts).unwrap(),
            Address::with_last_byte(1)
        );
    }
}
