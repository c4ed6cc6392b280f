//! In-memory ledger used by the offline tests
//!
//! Follows the network rules the scenarios rely on: signatures required by
//! accounts, submit keys and supply keys, token associations, zero-sum
//! transfers and a flat fee charged to the payer of every transaction.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use hedera::{AccountId, Hbar, Key, PrivateKey, PublicKey, Status, TokenId, TopicId};
use parking_lot::Mutex;

use acceptance_common::{
    config::{FixtureAccount, Fixtures},
    error::LedgerError,
    ledger::{
        AccountBalance, Ledger, LedgerConnector, LedgerResult, Operator, Receipt,
        TokenCreateOptions, TokenSummary, TokenSupply, TokenTransferBatch, TopicSummary,
    },
};

// Flat fee charged for every transaction
pub const FEE_TINYBARS: i64 = 5_000_000;

struct MockAccount {
    key: PublicKey,
    tinybars: i64,
    tokens: HashMap<TokenId, u64>,
}

struct MockTopic {
    memo: String,
    submit_key: Key,
    messages: Vec<Vec<u8>>,
}

struct MockToken {
    options: TokenCreateOptions,
    supply_key: PublicKey,
    total_supply: u64,
}

#[derive(Default)]
struct State {
    next_entity: u64,
    accounts: HashMap<AccountId, MockAccount>,
    topics: HashMap<TopicId, MockTopic>,
    tokens: HashMap<TokenId, MockToken>,
    transactions: usize,
}

impl State {
    fn next_id<T: std::str::FromStr>(&mut self) -> T
    where
        T::Err: std::fmt::Debug,
    {
        self.next_entity += 1;
        format!("0.0.{}", 5000 + self.next_entity)
            .parse()
            .expect("generated entity id")
    }

    fn account(&mut self, id: AccountId) -> LedgerResult<&mut MockAccount> {
        self.accounts.get_mut(&id).ok_or(LedgerError::Status {
            operation: "mock",
            status: Status::InvalidAccountId,
        })
    }

    // Every transaction costs the payer the flat fee
    fn charge(&mut self, operation: &'static str, payer: AccountId, signatures: &[PublicKey]) -> LedgerResult<()> {
        let account = self.account(payer)?;
        if !signatures.contains(&account.key) {
            return Err(fail(operation, Status::InvalidSignature));
        }
        if account.tinybars < FEE_TINYBARS {
            return Err(fail(operation, Status::InsufficientPayerBalance));
        }
        account.tinybars -= FEE_TINYBARS;
        self.transactions += 1;
        Ok(())
    }
}

fn fail(operation: &'static str, status: Status) -> LedgerError {
    LedgerError::Status { operation, status }
}

fn satisfies(key: &Key, signatures: &[PublicKey]) -> bool {
    match key {
        Key::Single(public_key) => signatures.contains(public_key),
        Key::KeyList(list) => {
            let signed = list.keys.iter().filter(|k| satisfies(k, signatures)).count();
            let needed = list.threshold.map(|t| t as usize).unwrap_or(list.keys.len());
            signed >= needed
        }
        _ => false,
    }
}

/// Shared in-memory network state
#[derive(Default)]
pub struct MockNetwork {
    state: Mutex<State>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a funded account and return credentials for it
    pub fn add_account(&self, hbars: i64) -> Operator {
        let private_key = PrivateKey::generate_ed25519();
        let mut state = self.state.lock();
        let account_id: AccountId = state.next_id();
        state.accounts.insert(
            account_id,
            MockAccount {
                key: private_key.public_key(),
                tinybars: Hbar::new(hbars).to_tinybars(),
                tokens: HashMap::new(),
            },
        );
        Operator::new(account_id, private_key)
    }

    /// Fixture file contents for `count` accounts holding `hbars` each
    pub fn fixtures(&self, count: usize, hbars: i64) -> Fixtures {
        let accounts = (0..count)
            .map(|_| {
                let operator = self.add_account(hbars);
                FixtureAccount {
                    id: operator.account_id.to_string(),
                    private_key: operator.private_key.to_string_raw(),
                }
            })
            .collect();
        Fixtures::new(accounts)
    }

    pub fn token_balance(&self, account: AccountId, token: TokenId) -> Option<u64> {
        self.state
            .lock()
            .accounts
            .get(&account)
            .and_then(|a| a.tokens.get(&token).copied())
    }

    pub fn transactions(&self) -> usize {
        self.state.lock().transactions
    }

    pub fn topic_count(&self) -> usize {
        self.state.lock().topics.len()
    }

    pub fn token_count(&self) -> usize {
        self.state.lock().tokens.len()
    }
}

pub struct MockConnector {
    network: Arc<MockNetwork>,
    connections: AtomicUsize,
}

impl MockConnector {
    pub fn new(network: Arc<MockNetwork>) -> Arc<Self> {
        Arc::new(Self {
            network,
            connections: AtomicUsize::new(0),
        })
    }

    /// Clients built so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl LedgerConnector for MockConnector {
    fn connect(&self, operator: &Operator) -> LedgerResult<Arc<dyn Ledger>> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockLedger {
            network: self.network.clone(),
            operator: operator.clone(),
        }))
    }
}

/// Client bound to one operator of a [`MockNetwork`]
pub struct MockLedger {
    network: Arc<MockNetwork>,
    operator: Operator,
}

impl MockLedger {
    pub fn new(network: Arc<MockNetwork>, operator: Operator) -> Self {
        Self { network, operator }
    }

    // Keys signing a transaction: the operator plus any extra signer
    fn signatures<'a>(&self, extra: impl IntoIterator<Item = &'a PrivateKey>) -> Vec<PublicKey> {
        extra
            .into_iter()
            .map(|k| k.public_key())
            .chain(std::iter::once(self.operator.public_key()))
            .collect()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    fn operator_account(&self) -> AccountId {
        self.operator.account_id
    }

    async fn account_balance(&self, account: AccountId) -> LedgerResult<AccountBalance> {
        let mut state = self.network.state.lock();
        let entry = state.account(account)?;
        Ok(AccountBalance {
            hbars: Hbar::from_tinybars(entry.tinybars),
            tokens: entry.tokens.clone(),
        })
    }

    async fn create_account(&self, key: PublicKey, initial_balance: Hbar) -> LedgerResult<Receipt> {
        const OP: &str = "account creation";
        let signatures = self.signatures(std::iter::empty());
        let mut state = self.network.state.lock();
        state.charge(OP, self.operator.account_id, &signatures)?;

        let amount = initial_balance.to_tinybars();
        let payer = state.account(self.operator.account_id)?;
        if payer.tinybars < amount {
            return Err(fail(OP, Status::InsufficientPayerBalance));
        }
        payer.tinybars -= amount;

        let account_id: AccountId = state.next_id();
        state.accounts.insert(
            account_id,
            MockAccount {
                key,
                tinybars: amount,
                tokens: HashMap::new(),
            },
        );
        let mut receipt = Receipt::with_status(Status::Success);
        receipt.account_id = Some(account_id);
        Ok(receipt)
    }

    async fn create_topic(&self, memo: &str, submit_key: Key) -> LedgerResult<Receipt> {
        let signatures = self.signatures(std::iter::empty());
        let mut state = self.network.state.lock();
        state.charge("topic creation", self.operator.account_id, &signatures)?;

        let topic_id: TopicId = state.next_id();
        state.topics.insert(
            topic_id,
            MockTopic {
                memo: memo.to_owned(),
                submit_key,
                messages: Vec::new(),
            },
        );
        let mut receipt = Receipt::with_status(Status::Success);
        receipt.topic_id = Some(topic_id);
        Ok(receipt)
    }

    async fn topic_info(&self, topic: TopicId) -> LedgerResult<TopicSummary> {
        let state = self.network.state.lock();
        let entry = state
            .topics
            .get(&topic)
            .ok_or(fail("topic info query", Status::InvalidTopicId))?;
        Ok(TopicSummary {
            topic_id: topic,
            memo: entry.memo.clone(),
            submit_key: Some(entry.submit_key.clone()),
        })
    }

    async fn submit_topic_message(
        &self,
        topic: TopicId,
        message: &[u8],
        signer: &PrivateKey,
    ) -> LedgerResult<Receipt> {
        const OP: &str = "topic message submission";
        let signatures = self.signatures([signer]);
        let mut state = self.network.state.lock();
        state.charge(OP, self.operator.account_id, &signatures)?;

        let entry = state
            .topics
            .get_mut(&topic)
            .ok_or(fail(OP, Status::InvalidTopicId))?;
        if !satisfies(&entry.submit_key, &signatures) {
            return Err(fail(OP, Status::InvalidSignature));
        }
        entry.messages.push(message.to_vec());
        Ok(Receipt::with_status(Status::Success))
    }

    async fn first_topic_message(
        &self,
        topic: TopicId,
        _start: SystemTime,
        wait: Duration,
    ) -> LedgerResult<Vec<u8>> {
        let state = self.network.state.lock();
        let entry = state.topics.get(&topic).ok_or(LedgerError::Subscription {
            topic: topic.to_string(),
            reason: "unknown topic".to_owned(),
        })?;
        entry
            .messages
            .first()
            .cloned()
            .ok_or(LedgerError::SubscriptionTimeout {
                topic: topic.to_string(),
                waited: wait,
            })
    }

    async fn create_token(
        &self,
        options: &TokenCreateOptions,
        supply_key: PublicKey,
        signer: &PrivateKey,
    ) -> LedgerResult<Receipt> {
        const OP: &str = "token creation";
        let signatures = self.signatures([signer]);
        let mut state = self.network.state.lock();
        state.charge(OP, self.operator.account_id, &signatures)?;

        let treasury = state.account(options.treasury_account_id)?;
        if !signatures.contains(&treasury.key) {
            return Err(fail(OP, Status::InvalidSignature));
        }

        let token_id: TokenId = state.next_id();
        state
            .account(options.treasury_account_id)?
            .tokens
            .insert(token_id, options.initial_supply);
        state.tokens.insert(
            token_id,
            MockToken {
                options: options.clone(),
                supply_key,
                total_supply: options.initial_supply,
            },
        );
        let mut receipt = Receipt::with_status(Status::Success);
        receipt.token_id = Some(token_id);
        Ok(receipt)
    }

    async fn token_info(&self, token: TokenId) -> LedgerResult<TokenSummary> {
        let state = self.network.state.lock();
        let entry = state
            .tokens
            .get(&token)
            .ok_or(fail("token info query", Status::InvalidTokenId))?;
        Ok(TokenSummary {
            token_id: token,
            name: entry.options.name.clone(),
            symbol: entry.options.symbol.clone(),
            decimals: entry.options.decimals,
            treasury_account_id: entry.options.treasury_account_id,
            total_supply: entry.total_supply,
        })
    }

    async fn mint_token(
        &self,
        token: TokenId,
        amount: u64,
        signer: &PrivateKey,
    ) -> LedgerResult<Receipt> {
        const OP: &str = "token mint";
        let signatures = self.signatures([signer]);
        let mut state = self.network.state.lock();
        state.charge(OP, self.operator.account_id, &signatures)?;

        let entry = state
            .tokens
            .get_mut(&token)
            .ok_or(fail(OP, Status::InvalidTokenId))?;
        if !signatures.contains(&entry.supply_key) {
            return Err(fail(OP, Status::InvalidSignature));
        }
        if let TokenSupply::Finite { max_supply } = entry.options.supply {
            if entry.total_supply + amount > max_supply {
                return Err(fail(OP, Status::TokenMaxSupplyReached));
            }
        }
        entry.total_supply += amount;
        let treasury = entry.options.treasury_account_id;
        *state.account(treasury)?.tokens.entry(token).or_default() += amount;
        Ok(Receipt::with_status(Status::Success))
    }

    async fn associate_token(
        &self,
        account: AccountId,
        token: TokenId,
        signer: &PrivateKey,
    ) -> LedgerResult<Receipt> {
        const OP: &str = "token association";
        let signatures = self.signatures([signer]);
        let mut state = self.network.state.lock();
        state.charge(OP, self.operator.account_id, &signatures)?;

        if !state.tokens.contains_key(&token) {
            return Err(fail(OP, Status::InvalidTokenId));
        }
        let entry = state.account(account)?;
        if !signatures.contains(&entry.key) {
            return Err(fail(OP, Status::InvalidSignature));
        }
        if entry.tokens.contains_key(&token) {
            return Err(fail(OP, Status::TokenAlreadyAssociatedToAccount));
        }
        entry.tokens.insert(token, 0);
        Ok(Receipt::with_status(Status::Success))
    }

    async fn submit_transfer(
        &self,
        batch: &TokenTransferBatch,
        signers: &[PrivateKey],
    ) -> LedgerResult<Receipt> {
        const OP: &str = "token transfer";
        let signatures = self.signatures(signers);
        let payer = batch.get_payer().unwrap_or(self.operator.account_id);
        let mut state = self.network.state.lock();

        if !batch.is_balanced() {
            return Err(fail(OP, Status::TransfersNotZeroSumForToken));
        }
        for account in batch.debited_accounts() {
            if !signatures.contains(&state.account(account)?.key) {
                return Err(fail(OP, Status::InvalidSignature));
            }
        }
        for transfer in batch.transfers() {
            let entry = state.account(transfer.account_id)?;
            let Some(balance) = entry.tokens.get(&transfer.token_id) else {
                return Err(fail(OP, Status::TokenNotAssociatedToAccount));
            };
            if (*balance as i128) + (transfer.amount as i128) < 0 {
                return Err(fail(OP, Status::InsufficientTokenBalance));
            }
        }
        state.charge(OP, payer, &signatures)?;

        for transfer in batch.transfers() {
            let entry = state.account(transfer.account_id)?;
            if let Some(balance) = entry.tokens.get_mut(&transfer.token_id) {
                *balance = (*balance as i128 + transfer.amount as i128) as u64;
            }
        }
        Ok(Receipt::with_status(Status::Success))
    }
}
