use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use futures::StreamExt;
use hedera::{
    AccountBalanceQuery, AccountCreateTransaction, AccountId, Client, Hbar, Key, PrivateKey,
    PublicKey, TokenAssociateTransaction, TokenCreateTransaction, TokenId, TokenInfoQuery,
    TokenMintTransaction, TokenSupplyType, TokenType, TopicCreateTransaction, TopicId,
    TopicInfoQuery, TopicMessageQuery, TopicMessageSubmitTransaction, TransactionId,
    TransactionReceipt, TransferTransaction,
};
use log::{debug, trace};
use time::OffsetDateTime;

use super::{
    AccountBalance, Ledger, LedgerConnector, LedgerResult, Operator, Receipt, TokenCreateOptions,
    TokenSummary, TokenSupply, TokenTransferBatch, TopicSummary,
};
use crate::{
    config::{Network, TOKEN_CREATE_MAX_FEE_HBAR, TOKEN_MINT_MAX_FEE_HBAR},
    error::LedgerError,
};

// Receipts and prechecks with a failing status become `LedgerError::Status`,
// anything else is a transport or SDK level failure
fn map_sdk_error(operation: &'static str, err: hedera::Error) -> LedgerError {
    match err {
        hedera::Error::ReceiptStatus { status, .. }
        | hedera::Error::TransactionPreCheckStatus { status, .. } => {
            LedgerError::Status { operation, status }
        }
        other => LedgerError::Sdk {
            operation,
            message: other.to_string(),
        },
    }
}

impl From<TransactionReceipt> for Receipt {
    fn from(receipt: TransactionReceipt) -> Self {
        Self {
            status: receipt.status,
            account_id: receipt.account_id,
            topic_id: receipt.topic_id,
            token_id: receipt.token_id,
        }
    }
}

/// Builds one SDK client per operator for a public network
#[derive(Debug, Clone, Copy)]
pub struct HederaConnector {
    network: Network,
}

impl HederaConnector {
    pub fn new(network: Network) -> Self {
        Self { network }
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

impl LedgerConnector for HederaConnector {
    fn connect(&self, operator: &Operator) -> LedgerResult<Arc<dyn Ledger>> {
        Ok(Arc::new(HederaLedger::new(self.network, operator)))
    }
}

/// [`Ledger`] backed by a Hedera SDK client
pub struct HederaLedger {
    client: Client,
    operator: AccountId,
}

impl HederaLedger {
    pub fn new(network: Network, operator: &Operator) -> Self {
        let client = match network {
            Network::Mainnet => Client::for_mainnet(),
            Network::Testnet => Client::for_testnet(),
            Network::Previewnet => Client::for_previewnet(),
        };
        client.set_operator(operator.account_id, operator.private_key.clone());
        debug!("client for {} bound to operator {}", network, operator.account_id);

        Self {
            client,
            operator: operator.account_id,
        }
    }
}

#[async_trait]
impl Ledger for HederaLedger {
    fn operator_account(&self) -> AccountId {
        self.operator
    }

    #[allow(deprecated)]
    async fn account_balance(&self, account: AccountId) -> LedgerResult<AccountBalance> {
        const OP: &str = "account balance query";
        let balance = AccountBalanceQuery::new()
            .account_id(account)
            .execute(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;

        trace!("balance of {}: {}", account, balance.hbars);
        Ok(AccountBalance {
            hbars: balance.hbars,
            tokens: balance.tokens,
        })
    }

    async fn create_account(&self, key: PublicKey, initial_balance: Hbar) -> LedgerResult<Receipt> {
        const OP: &str = "account creation";
        let response = AccountCreateTransaction::new()
            .key(key)
            .initial_balance(initial_balance)
            .execute(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;

        let receipt = response
            .get_receipt(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;
        Ok(receipt.into())
    }

    async fn create_topic(&self, memo: &str, submit_key: Key) -> LedgerResult<Receipt> {
        const OP: &str = "topic creation";
        let response = TopicCreateTransaction::new()
            .submit_key(submit_key)
            .topic_memo(memo)
            .execute(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;

        let receipt = response
            .get_receipt(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;
        Ok(receipt.into())
    }

    async fn topic_info(&self, topic: TopicId) -> LedgerResult<TopicSummary> {
        const OP: &str = "topic info query";
        let info = TopicInfoQuery::new()
            .topic_id(topic)
            .execute(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;

        Ok(TopicSummary {
            topic_id: topic,
            memo: info.topic_memo,
            submit_key: info.submit_key,
        })
    }

    async fn submit_topic_message(
        &self,
        topic: TopicId,
        message: &[u8],
        signer: &PrivateKey,
    ) -> LedgerResult<Receipt> {
        const OP: &str = "topic message submission";
        let mut tx = TopicMessageSubmitTransaction::new();
        tx.topic_id(topic).message(message.to_vec());
        tx.freeze_with(&self.client)
            .map_err(|e| map_sdk_error(OP, e))?;
        tx.sign(signer.clone());

        let response = tx
            .execute(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;
        let receipt = response
            .get_receipt(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;
        Ok(receipt.into())
    }

    async fn first_topic_message(
        &self,
        topic: TopicId,
        start: SystemTime,
        wait: Duration,
    ) -> LedgerResult<Vec<u8>> {
        let mut query = TopicMessageQuery::new();
        query.topic_id(topic).start_time(OffsetDateTime::from(start));

        let mut stream = query.subscribe(&self.client);
        match tokio::time::timeout(wait, stream.next()).await {
            Ok(Some(Ok(message))) => Ok(message.contents),
            Ok(Some(Err(e))) => Err(LedgerError::Subscription {
                topic: topic.to_string(),
                reason: e.to_string(),
            }),
            Ok(None) => Err(LedgerError::Subscription {
                topic: topic.to_string(),
                reason: "stream closed before any message".to_owned(),
            }),
            Err(_) => Err(LedgerError::SubscriptionTimeout {
                topic: topic.to_string(),
                waited: wait,
            }),
        }
    }

    async fn create_token(
        &self,
        options: &TokenCreateOptions,
        supply_key: PublicKey,
        signer: &PrivateKey,
    ) -> LedgerResult<Receipt> {
        const OP: &str = "token creation";
        let mut tx = TokenCreateTransaction::new();
        tx.name(options.name.as_str())
            .symbol(options.symbol.as_str())
            .decimals(options.decimals)
            .treasury_account_id(options.treasury_account_id)
            .initial_supply(options.initial_supply)
            .token_type(TokenType::FungibleCommon)
            .supply_key(supply_key)
            .max_transaction_fee(Hbar::new(TOKEN_CREATE_MAX_FEE_HBAR));

        match options.supply {
            TokenSupply::Infinite => {
                tx.token_supply_type(TokenSupplyType::Infinite);
            }
            TokenSupply::Finite { max_supply } => {
                tx.token_supply_type(TokenSupplyType::Finite)
                    .max_supply(max_supply);
            }
        }

        tx.freeze_with(&self.client)
            .map_err(|e| map_sdk_error(OP, e))?;
        tx.sign(signer.clone());

        let response = tx
            .execute(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;
        let receipt = response
            .get_receipt(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;
        Ok(receipt.into())
    }

    async fn token_info(&self, token: TokenId) -> LedgerResult<TokenSummary> {
        const OP: &str = "token info query";
        let info = TokenInfoQuery::new()
            .token_id(token)
            .execute(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;

        Ok(TokenSummary {
            token_id: token,
            name: info.name,
            symbol: info.symbol,
            decimals: info.decimals,
            treasury_account_id: info.treasury_account_id,
            total_supply: info.total_supply,
        })
    }

    async fn mint_token(
        &self,
        token: TokenId,
        amount: u64,
        signer: &PrivateKey,
    ) -> LedgerResult<Receipt> {
        const OP: &str = "token mint";
        let mut tx = TokenMintTransaction::new();
        tx.token_id(token)
            .amount(amount)
            .max_transaction_fee(Hbar::new(TOKEN_MINT_MAX_FEE_HBAR));
        tx.freeze_with(&self.client)
            .map_err(|e| map_sdk_error(OP, e))?;
        tx.sign(signer.clone());

        let response = tx
            .execute(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;
        let receipt = response
            .get_receipt(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;
        Ok(receipt.into())
    }

    async fn associate_token(
        &self,
        account: AccountId,
        token: TokenId,
        signer: &PrivateKey,
    ) -> LedgerResult<Receipt> {
        const OP: &str = "token association";
        let mut tx = TokenAssociateTransaction::new();
        tx.account_id(account).token_ids([token]);
        tx.freeze_with(&self.client)
            .map_err(|e| map_sdk_error(OP, e))?;
        tx.sign(signer.clone());

        let response = tx
            .execute(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;
        let receipt = response
            .get_receipt(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;
        Ok(receipt.into())
    }

    async fn submit_transfer(
        &self,
        batch: &TokenTransferBatch,
        signers: &[PrivateKey],
    ) -> LedgerResult<Receipt> {
        const OP: &str = "token transfer";
        let mut tx = TransferTransaction::new();
        for transfer in batch.transfers() {
            tx.token_transfer(transfer.token_id, transfer.account_id, transfer.amount);
        }
        if let Some(payer) = batch.get_payer() {
            tx.transaction_id(TransactionId::generate(payer));
        }

        tx.freeze_with(&self.client)
            .map_err(|e| map_sdk_error(OP, e))?;
        for signer in signers {
            tx.sign(signer.clone());
        }

        let response = tx
            .execute(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;
        let receipt = response
            .get_receipt(&self.client)
            .await
            .map_err(|e| map_sdk_error(OP, e))?;
        Ok(receipt.into())
    }
}
