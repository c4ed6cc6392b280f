//! Per-scenario context
//!
//! One [`AcceptanceWorld`] is built for every scenario and dropped at its end,
//! nothing a step records leaks into the next scenario.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use hedera::{AccountId, Hbar, KeyList, PrivateKey, TokenId, TopicId};
use log::debug;
use strum::{Display, EnumString};

use acceptance_common::{
    config::{Fixtures, DEFAULT_MESSAGE_WAIT, TREASURY_SLOT},
    ledger::{Ledger, LedgerConnector, Operator, TokenSummary, TokenTransferBatch},
};

#[derive(Debug, Clone)]
pub struct WorldSettings {
    /// How long the subscription step waits for the first topic message
    pub message_wait: Duration,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            message_wait: DEFAULT_MESSAGE_WAIT,
        }
    }
}

/// Accounts a token scenario refers to by ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Party {
    First,
    Second,
    Third,
    Fourth,
}

/// A transfer prepared by one step and submitted by a later one
#[derive(Debug, Clone)]
pub struct PendingTransfer {
    pub batch: TokenTransferBatch,
    /// Signatures collected when the transfer was created
    pub signers: Vec<PrivateKey>,
}

pub struct AcceptanceWorld {
    connector: Arc<dyn LedgerConnector>,
    fixtures: Arc<Fixtures>,
    settings: WorldSettings,
    // Default client of the scenario and the operator it is bound to
    bound: Option<(Operator, Arc<dyn Ledger>)>,
    // One client per operator account, reused for the whole scenario
    clients: HashMap<AccountId, Arc<dyn Ledger>>,
    parties: HashMap<Party, Operator>,

    pub first_key: Option<PrivateKey>,
    pub second_key: Option<PrivateKey>,
    pub threshold_key: Option<KeyList>,
    pub topic_id: Option<TopicId>,

    pub token_id: Option<TokenId>,
    pub supply_key: Option<PrivateKey>,
    pub token_info: Option<TokenSummary>,
    pub treasury: Option<Operator>,
    pub pending_transfer: Option<PendingTransfer>,
    pub hbar_before: Option<Hbar>,
    pub hbar_after: Option<Hbar>,
}

impl AcceptanceWorld {
    pub fn new(
        connector: Arc<dyn LedgerConnector>,
        fixtures: Arc<Fixtures>,
        settings: WorldSettings,
    ) -> Self {
        Self {
            connector,
            fixtures,
            settings,
            bound: None,
            clients: HashMap::new(),
            parties: HashMap::new(),
            first_key: None,
            second_key: None,
            threshold_key: None,
            topic_id: None,
            token_id: None,
            supply_key: None,
            token_info: None,
            treasury: None,
            pending_transfer: None,
            hbar_before: None,
            hbar_after: None,
        }
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn fixture(&self, slot: usize) -> Result<Operator> {
        let operator = self
            .fixtures
            .operator(slot)
            .with_context(|| format!("Error while loading fixture account #{}", slot))?;
        Ok(operator)
    }

    /// Make `operator` the account the scenario client pays and signs with
    pub fn bind_operator(&mut self, operator: Operator) -> Result<Arc<dyn Ledger>> {
        let ledger = self.client_for(&operator)?;
        debug!("Scenario client bound to {}", operator.account_id);
        self.bound = Some((operator, ledger.clone()));
        Ok(ledger)
    }

    pub fn bound_operator(&self) -> Option<&Operator> {
        self.bound.as_ref().map(|(operator, _)| operator)
    }

    pub fn bound_account(&self) -> Result<AccountId> {
        self.bound_operator()
            .map(|operator| operator.account_id)
            .context("No account is bound to the scenario client yet")
    }

    /// Scenario client, bound to the treasury fixture when no step chose an account
    pub fn client(&mut self) -> Result<Arc<dyn Ledger>> {
        if let Some((_, ledger)) = &self.bound {
            return Ok(ledger.clone());
        }
        let treasury = self.fixture(TREASURY_SLOT)?;
        self.bind_operator(treasury)
    }

    /// Client paying and signing with `operator`, the scenario client is left untouched.
    /// Built on first use, then reused until the scenario ends.
    pub fn client_for(&mut self, operator: &Operator) -> Result<Arc<dyn Ledger>> {
        if let Some(ledger) = self.clients.get(&operator.account_id) {
            return Ok(ledger.clone());
        }

        let ledger = self
            .connector
            .connect(operator)
            .with_context(|| format!("Error while connecting as {}", operator.account_id))?;
        self.clients.insert(operator.account_id, ledger.clone());
        Ok(ledger)
    }

    pub fn set_party(&mut self, party: Party, operator: Operator) {
        debug!("{} account is {}", party, operator.account_id);
        self.parties.insert(party, operator);
    }

    pub fn party(&self, party: Party) -> Result<&Operator> {
        self.parties
            .get(&party)
            .with_context(|| format!("The {} account has not been set up in this scenario", party))
    }

    pub fn first_key(&self) -> Result<&PrivateKey> {
        self.first_key
            .as_ref()
            .context("No first account has been loaded")
    }

    pub fn second_key(&self) -> Result<&PrivateKey> {
        self.second_key
            .as_ref()
            .context("No second account has been loaded")
    }

    pub fn threshold_key(&self) -> Result<&KeyList> {
        self.threshold_key
            .as_ref()
            .context("No threshold key has been built")
    }

    pub fn topic_id(&self) -> Result<TopicId> {
        self.topic_id.context("No topic has been created")
    }

    pub fn token_id(&self) -> Result<TokenId> {
        self.token_id.context("No token has been created")
    }

    pub fn supply_key(&self) -> Result<&PrivateKey> {
        self.supply_key
            .as_ref()
            .context("No supply key recorded for the token")
    }

    pub fn token_info(&self) -> Result<&TokenSummary> {
        self.token_info
            .as_ref()
            .context("Token info has not been queried yet")
    }

    /// Treasury of the scenario token, the bound account when no treasury was recorded
    pub fn treasury(&self) -> Result<&Operator> {
        self.treasury
            .as_ref()
            .or_else(|| self.bound_operator())
            .context("No treasury account for the token")
    }
}
