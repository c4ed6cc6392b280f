use std::{fmt, fs::File, path::Path, str::FromStr, time::Duration};

use hedera::{AccountId, PrivateKey};
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, ledger::Operator};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Network used when nothing else is configured
pub const DEFAULT_NETWORK: Network = Network::Testnet;

// Ceiling for a single step, raised to absorb real network latency
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(120);
// How long a topic subscription waits for its first message
pub const DEFAULT_MESSAGE_WAIT: Duration = Duration::from_secs(60);

// One hbar in tinybars
pub const TINYBARS_PER_HBAR: i64 = 100_000_000;

// Max fee (in hbar) attached to a token creation
pub const TOKEN_CREATE_MAX_FEE_HBAR: i64 = 100;
// Max fee (in hbar) attached to a mint, enough while hbar is under 10 cents
pub const TOKEN_MINT_MAX_FEE_HBAR: i64 = 10;

// Every token created by the scenarios shares this shape
pub const TEST_TOKEN_NAME: &str = "Test Token";
pub const TEST_TOKEN_SYMBOL: &str = "HTT";
pub const TEST_TOKEN_DECIMALS: u32 = 2;

// Fixture slots, positional indexes in the fixture account list
pub const TREASURY_SLOT: usize = 0;
pub const TOPIC_FIRST_SLOT: usize = 1;
pub const TOKEN_FIRST_SLOT: usize = 2;
pub const SECOND_SLOT: usize = 3;

// Environment variable pointing to the runner config used by the live test target
pub const CONFIG_ENV: &str = "ACCEPTANCE_CONFIG";

/// Public networks a client can be built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Previewnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Previewnet => "previewnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "previewnet" => Ok(Self::Previewnet),
            other => Err(ConfigError::UnknownNetwork(other.to_owned())),
        }
    }
}

/// A pre-funded account as written in the fixture file
#[derive(Clone, Serialize, Deserialize)]
pub struct FixtureAccount {
    pub id: String,
    #[serde(alias = "privateKey")]
    pub private_key: String,
}

// Never leak the key through logs or assertion messages
impl fmt::Debug for FixtureAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureAccount")
            .field("id", &self.id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Pre-funded accounts, indexed positionally by the step definitions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixtures {
    pub accounts: Vec<FixtureAccount>,
}

impl Fixtures {
    pub fn new(accounts: Vec<FixtureAccount>) -> Self {
        Self { accounts }
    }

    /// Load the fixture list from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_reader(file).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Resolve the account stored at `slot` into usable credentials
    pub fn operator(&self, slot: usize) -> Result<Operator, ConfigError> {
        let account = self.accounts.get(slot).ok_or(ConfigError::MissingFixture {
            slot,
            available: self.accounts.len(),
        })?;

        let account_id =
            AccountId::from_str(account.id.trim()).map_err(|e| ConfigError::InvalidAccountId {
                slot,
                value: account.id.clone(),
                reason: e.to_string(),
            })?;
        let private_key = parse_private_key(&account.private_key)
            .ok_or(ConfigError::InvalidPrivateKey { slot })?;

        Ok(Operator::new(account_id, private_key))
    }
}

// Keys are expected as ed25519 hex, DER encoded keys are accepted as well
fn parse_private_key(raw: &str) -> Option<PrivateKey> {
    let raw = raw.trim();
    PrivateKey::from_str_ed25519(raw)
        .or_else(|_| PrivateKey::from_str_der(raw))
        .ok()
}
