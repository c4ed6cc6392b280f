//! Ledger client seam
//!
//! Every network operation the scenarios consume goes through the [`Ledger`]
//! trait. [`HederaLedger`] binds it to the Hedera SDK, scenario code
//! never touches SDK transactions directly.
//!
//! Nothing here caches or models ledger state: every call is one round trip.

mod client;
mod transfer;

pub use client::{HederaConnector, HederaLedger};
pub use transfer::{TokenTransfer, TokenTransferBatch};

use std::{collections::HashMap, fmt, sync::Arc, time::Duration, time::SystemTime};

use async_trait::async_trait;
use hedera::{AccountId, Hbar, Key, PrivateKey, PublicKey, Status, TokenId, TopicId};

use crate::error::LedgerError;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Account credentials a client is bound to
#[derive(Clone)]
pub struct Operator {
    pub account_id: AccountId,
    pub private_key: PrivateKey,
}

impl Operator {
    pub fn new(account_id: AccountId, private_key: PrivateKey) -> Self {
        Self {
            account_id,
            private_key,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key()
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("account_id", &self.account_id)
            .field("public_key", &self.public_key())
            .finish()
    }
}

/// Outcome of a transaction as reported by its receipt
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub status: Status,
    pub account_id: Option<AccountId>,
    pub topic_id: Option<TopicId>,
    pub token_id: Option<TokenId>,
}

impl Receipt {
    pub fn with_status(status: Status) -> Self {
        Self {
            status,
            account_id: None,
            topic_id: None,
            token_id: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn require_account_id(&self, operation: &'static str) -> LedgerResult<AccountId> {
        self.account_id.ok_or(LedgerError::MissingEntity {
            operation,
            entity: "account",
        })
    }

    pub fn require_topic_id(&self, operation: &'static str) -> LedgerResult<TopicId> {
        self.topic_id.ok_or(LedgerError::MissingEntity {
            operation,
            entity: "topic",
        })
    }

    pub fn require_token_id(&self, operation: &'static str) -> LedgerResult<TokenId> {
        self.token_id.ok_or(LedgerError::MissingEntity {
            operation,
            entity: "token",
        })
    }
}

#[derive(Debug, Clone)]
pub struct AccountBalance {
    pub hbars: Hbar,
    pub tokens: HashMap<TokenId, u64>,
}

impl AccountBalance {
    /// Balance held for `token`. Tokens missing from the answer read as zero.
    pub fn token(&self, token: &TokenId) -> u64 {
        self.tokens.get(token).copied().unwrap_or(0)
    }

    pub fn is_associated(&self, token: &TokenId) -> bool {
        self.tokens.contains_key(token)
    }
}

#[derive(Debug, Clone)]
pub struct TopicSummary {
    pub topic_id: TopicId,
    pub memo: String,
    pub submit_key: Option<Key>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSupply {
    Infinite,
    Finite { max_supply: u64 },
}

#[derive(Debug, Clone)]
pub struct TokenSummary {
    pub token_id: TokenId,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub treasury_account_id: AccountId,
    pub total_supply: u64,
}

/// Parameters of a fungible token creation
#[derive(Debug, Clone)]
pub struct TokenCreateOptions {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub treasury_account_id: AccountId,
    pub initial_supply: u64,
    pub supply: TokenSupply,
}

/// Network operations used by the scenarios.
///
/// Transactions are frozen with the bound operator, signed by the extra
/// keys given, executed, and their receipt fetched before returning.
/// Any non-success status surfaces as [`LedgerError::Status`].
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Account the client pays with by default
    fn operator_account(&self) -> AccountId;

    async fn account_balance(&self, account: AccountId) -> LedgerResult<AccountBalance>;

    async fn create_account(&self, key: PublicKey, initial_balance: Hbar) -> LedgerResult<Receipt>;

    async fn create_topic(&self, memo: &str, submit_key: Key) -> LedgerResult<Receipt>;

    async fn topic_info(&self, topic: TopicId) -> LedgerResult<TopicSummary>;

    async fn submit_topic_message(
        &self,
        topic: TopicId,
        message: &[u8],
        signer: &PrivateKey,
    ) -> LedgerResult<Receipt>;

    /// Subscribe from `start` and resolve with the contents of the first message.
    /// Fails when the subscription errors or nothing arrives within `wait`.
    async fn first_topic_message(
        &self,
        topic: TopicId,
        start: SystemTime,
        wait: Duration,
    ) -> LedgerResult<Vec<u8>>;

    async fn create_token(
        &self,
        options: &TokenCreateOptions,
        supply_key: PublicKey,
        signer: &PrivateKey,
    ) -> LedgerResult<Receipt>;

    async fn token_info(&self, token: TokenId) -> LedgerResult<TokenSummary>;

    async fn mint_token(
        &self,
        token: TokenId,
        amount: u64,
        signer: &PrivateKey,
    ) -> LedgerResult<Receipt>;

    async fn associate_token(
        &self,
        account: AccountId,
        token: TokenId,
        signer: &PrivateKey,
    ) -> LedgerResult<Receipt>;

    /// Submit a prepared transfer batch, signed by every key in `signers`
    async fn submit_transfer(
        &self,
        batch: &TokenTransferBatch,
        signers: &[PrivateKey],
    ) -> LedgerResult<Receipt>;
}

/// Builds ledger clients bound to an operator
pub trait LedgerConnector: Send + Sync {
    fn connect(&self, operator: &Operator) -> LedgerResult<Arc<dyn Ledger>>;
}
