//! Token service helpers

use hedera::{AccountId, Hbar, PrivateKey, Status, TokenId};
use log::{debug, info};

use acceptance_common::{
    config::{TEST_TOKEN_DECIMALS, TEST_TOKEN_NAME, TEST_TOKEN_SYMBOL},
    error::LedgerError,
    ledger::{
        AccountBalance, Ledger, LedgerResult, Operator, Receipt, TokenCreateOptions, TokenSummary,
        TokenSupply, TokenTransferBatch,
    },
};

/// A freshly created token with the key allowed to mint it
#[derive(Debug, Clone)]
pub struct CreatedToken {
    pub receipt: Receipt,
    pub token_id: TokenId,
    pub supply_key: PrivateKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Association {
    Associated(Status),
    AlreadyAssociated,
}

#[derive(Debug, Clone)]
pub struct TransferTokenOptions<'a> {
    pub source: AccountId,
    pub destination: AccountId,
    /// When absent the transfer is returned unsigned instead of being submitted
    pub source_key: Option<&'a PrivateKey>,
    pub token_id: TokenId,
    pub amount: u64,
}

#[derive(Debug, Clone)]
pub enum TransferOutcome {
    Submitted(Status),
    Unsigned(TokenTransferBatch),
}

/// Result of the idempotent "account holds N tokens" setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Funding {
    Funded {
        association: Status,
        // None when there was nothing to transfer
        transfer: Option<Status>,
    },
    AlreadyAssociated,
}

pub async fn account_balance(ledger: &dyn Ledger, account: AccountId) -> LedgerResult<AccountBalance> {
    ledger.account_balance(account).await
}

/// Options for the "Test Token (HTT)" every scenario works with
pub fn test_token(treasury: AccountId, initial_supply: u64, supply: TokenSupply) -> TokenCreateOptions {
    TokenCreateOptions {
        name: TEST_TOKEN_NAME.to_owned(),
        symbol: TEST_TOKEN_SYMBOL.to_owned(),
        decimals: TEST_TOKEN_DECIMALS,
        treasury_account_id: treasury,
        initial_supply,
        supply,
    }
}

/// Create a fungible token with a newly generated supply key.
/// `signer` must be the treasury key.
pub async fn create_token(
    ledger: &dyn Ledger,
    signer: &PrivateKey,
    options: &TokenCreateOptions,
) -> LedgerResult<CreatedToken> {
    let supply_key = PrivateKey::generate_ed25519();
    let receipt = ledger
        .create_token(options, supply_key.public_key(), signer)
        .await?;
    let token_id = receipt.require_token_id("token creation")?;

    info!(
        "Created token {} ({}) with treasury {}",
        token_id, options.symbol, options.treasury_account_id
    );
    Ok(CreatedToken {
        receipt,
        token_id,
        supply_key,
    })
}

pub async fn token_info(ledger: &dyn Ledger, token: TokenId) -> LedgerResult<TokenSummary> {
    ledger.token_info(token).await
}

pub async fn mint_token(
    ledger: &dyn Ledger,
    token: TokenId,
    amount: u64,
    supply_key: &PrivateKey,
) -> LedgerResult<Status> {
    let receipt = ledger.mint_token(token, amount, supply_key).await?;
    debug!("Minted {} of {}: {:?}", amount, token, receipt.status);
    Ok(receipt.status)
}

/// Associate `account` with `token`. Only the "already associated" answer is
/// tolerated, it comes back as [`Association::AlreadyAssociated`].
pub async fn associate_token(
    ledger: &dyn Ledger,
    account: AccountId,
    token: TokenId,
    key: &PrivateKey,
) -> LedgerResult<Association> {
    match ledger.associate_token(account, token, key).await {
        Ok(receipt) => Ok(Association::Associated(receipt.status)),
        Err(e) if e.is_already_associated() => {
            debug!("{} is already associated with {}", account, token);
            Ok(Association::AlreadyAssociated)
        }
        Err(e) => Err(e),
    }
}

fn transfer_batch(options: &TransferTokenOptions<'_>) -> LedgerResult<TokenTransferBatch> {
    let amount = i64::try_from(options.amount).map_err(|_| LedgerError::InvalidRequest {
        operation: "token transfer",
        reason: format!("amount {} is too large", options.amount),
    })?;

    let mut batch = TokenTransferBatch::new();
    batch
        .token_transfer(options.token_id, options.source, -amount)
        .token_transfer(options.token_id, options.destination, amount);
    Ok(batch)
}

/// Move `amount` tokens from source to destination.
/// Without a source key the prepared transfer is returned for another party to complete.
pub async fn transfer_token(
    ledger: &dyn Ledger,
    options: TransferTokenOptions<'_>,
) -> LedgerResult<TransferOutcome> {
    let batch = transfer_batch(&options)?;
    let Some(key) = options.source_key else {
        return Ok(TransferOutcome::Unsigned(batch));
    };

    let receipt = ledger
        .submit_transfer(&batch, std::slice::from_ref(key))
        .await?;
    Ok(TransferOutcome::Submitted(receipt.status))
}

/// Create an account controlled by a newly generated ed25519 key
pub async fn create_account(ledger: &dyn Ledger, initial_balance: Hbar) -> LedgerResult<Operator> {
    let private_key = PrivateKey::generate_ed25519();
    let receipt = ledger
        .create_account(private_key.public_key(), initial_balance)
        .await?;
    let account_id = receipt.require_account_id("account creation")?;

    info!("Created account {} with {}", account_id, initial_balance);
    Ok(Operator::new(account_id, private_key))
}

/// Associate `account` with `token` and send it `amount` tokens from the treasury.
///
/// An account that is already associated is left untouched, which keeps the
/// setup steps idempotent when scenarios reuse fixture accounts. Zero amounts
/// are not transferred.
pub async fn fund_account(
    ledger: &dyn Ledger,
    treasury: &Operator,
    account: &Operator,
    token: TokenId,
    amount: u64,
) -> LedgerResult<Funding> {
    let association =
        match associate_token(ledger, account.account_id, token, &account.private_key).await? {
            Association::Associated(status) => status,
            Association::AlreadyAssociated => return Ok(Funding::AlreadyAssociated),
        };

    if amount == 0 {
        return Ok(Funding::Funded {
            association,
            transfer: None,
        });
    }

    let options = TransferTokenOptions {
        source: treasury.account_id,
        destination: account.account_id,
        source_key: Some(&treasury.private_key),
        token_id: token,
        amount,
    };
    let batch = transfer_batch(&options)?;
    let receipt = ledger
        .submit_transfer(&batch, std::slice::from_ref(&treasury.private_key))
        .await?;

    Ok(Funding::Funded {
        association,
        transfer: Some(receipt.status),
    })
}
