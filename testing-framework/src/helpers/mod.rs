//! Helpers shared by the step definitions
//!
//! Each network helper runs one build, sign, execute and receipt cycle
//! through a [`Ledger`](acceptance_common::ledger::Ledger) and hands back the
//! outcome. Nothing is retried.

pub mod assertions;
pub mod token;
pub mod topic;

pub use assertions::{
    assert_hbar_above, assert_hbar_equals, assert_success, assert_token_balance, whole_hbars,
};
pub use token::{
    account_balance, associate_token, create_account, create_token, fund_account, mint_token,
    test_token, token_info, transfer_token, Association, CreatedToken, Funding,
    TransferOutcome, TransferTokenOptions,
};
pub use topic::{create_topic, first_message, publish_message, threshold_key};
