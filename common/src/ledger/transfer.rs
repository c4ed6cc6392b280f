use std::collections::HashMap;

use hedera::{AccountId, TokenId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTransfer {
    pub token_id: TokenId,
    pub account_id: AccountId,
    // Negative moves tokens out of the account
    pub amount: i64,
}

/// A token transfer that has been described but not yet signed nor submitted.
///
/// The batch is handed around between steps: one party builds it, another one
/// adds its signature and submits it through [`super::Ledger::submit_transfer`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenTransferBatch {
    transfers: Vec<TokenTransfer>,
    payer: Option<AccountId>,
}

impl TokenTransferBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_transfer(&mut self, token_id: TokenId, account_id: AccountId, amount: i64) -> &mut Self {
        self.transfers.push(TokenTransfer {
            token_id,
            account_id,
            amount,
        });
        self
    }

    /// Account whose id seeds the transaction id, and therefore pays the fee.
    /// When unset the submitting client's operator pays.
    pub fn payer(&mut self, account_id: AccountId) -> &mut Self {
        self.payer = Some(account_id);
        self
    }

    pub fn get_payer(&self) -> Option<AccountId> {
        self.payer
    }

    pub fn transfers(&self) -> &[TokenTransfer] {
        &self.transfers
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Accounts that lose tokens, in insertion order, without duplicates
    pub fn debited_accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> = Vec::new();
        for transfer in self.transfers.iter().filter(|t| t.amount < 0) {
            if !accounts.contains(&transfer.account_id) {
                accounts.push(transfer.account_id);
            }
        }
        accounts
    }

    /// Net amount per token sums to zero
    pub fn is_balanced(&self) -> bool {
        let mut totals: HashMap<TokenId, i128> = HashMap::new();
        for transfer in &self.transfers {
            *totals.entry(transfer.token_id).or_default() += transfer.amount as i128;
        }
        totals.values().all(|total| *total == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(num: u64) -> AccountId {
        format!("0.0.{}", num).parse().unwrap()
    }

    fn token() -> TokenId {
        "0.0.5005".parse().unwrap()
    }

    #[test]
    fn test_multi_party_batch() {
        let mut batch = TokenTransferBatch::new();
        batch
            .token_transfer(token(), account(1), -10)
            .token_transfer(token(), account(2), -10)
            .token_transfer(token(), account(3), 5)
            .token_transfer(token(), account(4), 15)
            .payer(account(1));

        assert!(batch.is_balanced());
        assert_eq!(batch.transfers().len(), 4);
        assert_eq!(batch.debited_accounts(), vec![account(1), account(2)]);
        assert_eq!(batch.get_payer(), Some(account(1)));
    }

    #[test]
    fn test_unbalanced_batch() {
        let mut batch = TokenTransferBatch::new();
        batch
            .token_transfer(token(), account(1), -10)
            .token_transfer(token(), account(3), 9);

        assert!(!batch.is_balanced());
        assert_eq!(batch.get_payer(), None);
    }

    #[test]
    fn test_debited_accounts_are_unique() {
        let mut batch = TokenTransferBatch::new();
        batch
            .token_transfer(token(), account(7), -1)
            .token_transfer(token(), account(7), -1)
            .token_transfer(token(), account(8), 2);

        assert_eq!(batch.debited_accounts(), vec![account(7)]);
        assert!(TokenTransferBatch::new().is_empty());
    }
}
