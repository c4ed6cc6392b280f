//! Assertion helpers for the step definitions
//!
//! Each helper queries the ledger afresh and fails with a readable message
//! instead of panicking, so a failed check ends the scenario cleanly.

use anyhow::{bail, Context, Result};
use hedera::{AccountId, Hbar, Status, TokenId};

use acceptance_common::{
    config::TINYBARS_PER_HBAR,
    ledger::{AccountBalance, Ledger},
};

/// `amount` whole hbars, failing when it does not fit the tinybar range
pub fn whole_hbars(amount: i64) -> Result<Hbar> {
    amount
        .checked_mul(TINYBARS_PER_HBAR)
        .map(Hbar::from_tinybars)
        .with_context(|| format!("{} hbar is out of range", amount))
}

/// Assert that an account holds strictly more than `hbars`
///
/// # Errors
///
/// Returns an error if:
/// - `hbars` does not fit the tinybar range
/// - the balance query fails
/// - the balance is `hbars` or less
///
/// # Example
///
/// ```rust,ignore
/// let balance = assert_hbar_above(ledger.as_ref(), account, 10).await?;
/// ```
pub async fn assert_hbar_above(ledger: &dyn Ledger, account: AccountId, hbars: i64) -> Result<AccountBalance> {
    let threshold = whole_hbars(hbars)?;
    let balance = ledger
        .account_balance(account)
        .await
        .with_context(|| format!("Failed to get balance for account {}", account))?;

    if balance.hbars.to_tinybars() <= threshold.to_tinybars() {
        bail!(
            "Balance of account {} is {}, expected more than {}",
            account,
            balance.hbars,
            threshold
        );
    }

    Ok(balance)
}

/// Assert that an account holds exactly `hbars`
pub async fn assert_hbar_equals(ledger: &dyn Ledger, account: AccountId, hbars: i64) -> Result<()> {
    let expected = whole_hbars(hbars)?;
    let balance = ledger
        .account_balance(account)
        .await
        .with_context(|| format!("Failed to get balance for account {}", account))?;

    if balance.hbars.to_tinybars() != expected.to_tinybars() {
        bail!(
            "Balance mismatch for account {}: expected {}, got {}",
            account,
            expected,
            balance.hbars
        );
    }

    Ok(())
}

/// Assert the token balance of an account, an unassociated token counts as zero
pub async fn assert_token_balance(
    ledger: &dyn Ledger,
    account: AccountId,
    token: TokenId,
    expected: u64,
) -> Result<()> {
    let balance = ledger
        .account_balance(account)
        .await
        .with_context(|| format!("Failed to get balance for account {}", account))?;

    let actual = balance.token(&token);
    if actual != expected {
        bail!(
            "Token balance mismatch for account {} on {}: expected {}, got {}",
            account,
            token,
            expected,
            actual
        );
    }

    Ok(())
}

pub fn assert_success(status: Status, operation: &str) -> Result<()> {
    if status != Status::Success {
        bail!("{} ended with status {:?}, expected Success", operation, status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_success() {
        assert!(assert_success(Status::Success, "token mint").is_ok());
        let err = assert_success(Status::InvalidSignature, "token mint").unwrap_err();
        assert!(err.to_string().contains("InvalidSignature"));
    }

    #[test]
    fn test_whole_hbars_range() {
        assert_eq!(whole_hbars(10).unwrap().to_tinybars(), 1_000_000_000);
        assert_eq!(whole_hbars(0).unwrap().to_tinybars(), 0);

        let err = whole_hbars(100_000_000_000).unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(whole_hbars(i64::MAX).is_err());
    }
}
