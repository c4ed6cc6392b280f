//! Token service steps
//!
//! Token scenarios talk about up to four parties. The first and second are
//! pre-funded fixture accounts (or, in the multi-party transfer, accounts
//! created on the fly), the third and fourth are always created on the fly.
//! The treasury fixture pays for every setup transaction.

use anyhow::{bail, ensure, Context, Result};
use hedera::{PrivateKey, Status};
use log::{debug, info};

use acceptance_common::{
    config::{SECOND_SLOT, TOKEN_FIRST_SLOT, TREASURY_SLOT},
    ledger::{TokenSupply, TokenTransferBatch},
};

use super::step;
use crate::{
    helpers::{
        account_balance, assert_hbar_above, assert_hbar_equals, assert_success,
        assert_token_balance, create_account, create_token, fund_account, mint_token, test_token,
        token_info, transfer_token, whole_hbars, Funding, TransferOutcome, TransferTokenOptions,
    },
    scenarios::{StepArgs, StepRegistry},
    world::{AcceptanceWorld, Party, PendingTransfer},
};

pub(super) fn register(registry: &mut StepRegistry<AcceptanceWorld>) -> Result<(), regex::Error> {
    registry
        .given(r"^A Hedera account with more than (\d+) hbar$", step!(primary_account))?
        .when(r"^I create a token named Test Token \(HTT\)$", step!(create_mintable_token))?
        .when(
            r"^I create a fixed supply token named Test Token \(HTT\) with (\d+) tokens$",
            step!(create_fixed_token),
        )?
        .then(r#"^The token has the name "([^"]*)"$"#, step!(token_has_name))?
        .then(r#"^The token has the symbol "([^"]*)"$"#, step!(token_has_symbol))?
        .then(r"^The token has (\d+) decimals$", step!(token_has_decimals))?
        .then(r"^The token is owned by the account$", step!(token_owned_by_account))?
        .then(r"^An attempt to mint (\d+) additional tokens succeeds$", step!(mint_succeeds))?
        .then(r"^An attempt to mint tokens fails$", step!(mint_fails))?
        .then(r"^The total supply of the token is (\d+)$", step!(total_supply))?;

    registry
        .given(r"^A first hedera account with more than (\d+) hbar$", step!(first_account))?
        .given(r"^A second Hedera account$", step!(second_account))?
        .given(r"^A token named Test Token \(HTT\) with (\d+) tokens$", step!(treasury_token))?
        .given(
            r"^The (first|second|third|fourth) account holds (\d+) HTT tokens$",
            step!(party_holds),
        )?
        .when(
            r"^The (first|second) account creates a transaction to transfer (\d+) HTT tokens to the (first|second) account$",
            step!(create_transfer),
        )?
        .when(r"^The first account submits the transaction$", step!(submit_transfer))?
        .then(r"^The first account has paid for the transaction fee$", step!(first_paid_fee))?;

    registry
        .given(
            r"^A first hedera account with more than (\d+) hbar and (\d+) HTT tokens$",
            step!(first_account_with_tokens),
        )?
        .given(
            r"^A (second|third|fourth) Hedera account with (\d+) hbar and (\d+) HTT tokens$",
            step!(new_account_with_tokens),
        )?
        .when(
            r"^A transaction is created to transfer (\d+) HTT tokens out of the first and second account and (\d+) HTT tokens into the third account and (\d+) HTT tokens into the fourth account$",
            step!(create_multi_party_transfer),
        )?;
    Ok(())
}

async fn primary_account(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let hbars: i64 = args.parse(0)?;
    let operator = world.fixture(TREASURY_SLOT)?;
    let ledger = world.bind_operator(operator.clone())?;
    assert_hbar_above(ledger.as_ref(), operator.account_id, hbars).await?;
    Ok(())
}

// Create the scenario token with the current treasury and remember it
async fn create_scenario_token(world: &mut AcceptanceWorld, initial_supply: u64, supply: TokenSupply) -> Result<()> {
    let ledger = world.client()?;
    let treasury = world.treasury()?.clone();
    let options = test_token(treasury.account_id, initial_supply, supply);

    let created = create_token(ledger.as_ref(), &treasury.private_key, &options).await?;
    assert_success(created.receipt.status, "token creation")?;

    world.token_id = Some(created.token_id);
    world.supply_key = Some(created.supply_key);
    world.token_info = None;
    Ok(())
}

async fn create_mintable_token(world: &mut AcceptanceWorld, _args: StepArgs) -> Result<()> {
    create_scenario_token(world, 0, TokenSupply::Infinite).await
}

async fn create_fixed_token(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let tokens: u64 = args.parse(0)?;
    create_scenario_token(world, tokens, TokenSupply::Finite { max_supply: tokens }).await
}

async fn token_has_name(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let name = args.get(0)?;
    let token = world.token_id()?;
    let ledger = world.client()?;

    let summary = token_info(ledger.as_ref(), token)
        .await
        .with_context(|| format!("Failed to get info of token {}", token))?;
    ensure!(
        summary.name == name,
        "token name is '{}', expected '{}'",
        summary.name,
        name
    );
    // Following checks read from this answer
    world.token_info = Some(summary);
    Ok(())
}

async fn token_has_symbol(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let symbol = args.get(0)?;
    let summary = world.token_info()?;
    ensure!(
        summary.symbol == symbol,
        "token symbol is '{}', expected '{}'",
        summary.symbol,
        symbol
    );
    Ok(())
}

async fn token_has_decimals(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let decimals: u32 = args.parse(0)?;
    let summary = world.token_info()?;
    ensure!(
        summary.decimals == decimals,
        "token has {} decimals, expected {}",
        summary.decimals,
        decimals
    );
    Ok(())
}

async fn token_owned_by_account(world: &mut AcceptanceWorld, _args: StepArgs) -> Result<()> {
    let account = world.bound_account()?;
    let summary = world.token_info()?;
    ensure!(
        summary.treasury_account_id == account,
        "token treasury is {}, expected {}",
        summary.treasury_account_id,
        account
    );
    Ok(())
}

async fn mint_succeeds(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let amount: u64 = args.parse(0)?;
    let token = world.token_id()?;
    let supply_key = world.supply_key()?.clone();
    let ledger = world.client()?;

    let status = mint_token(ledger.as_ref(), token, amount, &supply_key).await?;
    assert_success(status, "token mint")
}

async fn mint_fails(world: &mut AcceptanceWorld, _args: StepArgs) -> Result<()> {
    let token = world.token_id()?;
    let ledger = world.client()?;
    let foreign_key = PrivateKey::generate_ed25519();

    match mint_token(ledger.as_ref(), token, 2, &foreign_key).await {
        Ok(status) => bail!("mint signed by a foreign key was accepted with status {:?}", status),
        Err(e) if e.is_status(Status::InvalidSignature) => {
            info!("Mint signed by a foreign key rejected: {}", e);
            Ok(())
        }
        Err(e) => Err(e).context("mint signed by a foreign key did not fail with InvalidSignature"),
    }
}

async fn total_supply(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let expected: u64 = args.parse(0)?;
    let token = world.token_id()?;
    let ledger = world.client()?;

    let summary = token_info(ledger.as_ref(), token)
        .await
        .with_context(|| format!("Failed to get info of token {}", token))?;
    ensure!(
        summary.total_supply == expected,
        "total supply is {}, expected {}",
        summary.total_supply,
        expected
    );
    Ok(())
}

async fn first_account(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let hbars: i64 = args.parse(0)?;
    let operator = world.fixture(TOKEN_FIRST_SLOT)?;
    let ledger = world.client()?;
    assert_hbar_above(ledger.as_ref(), operator.account_id, hbars).await?;
    world.set_party(Party::First, operator);
    Ok(())
}

async fn second_account(world: &mut AcceptanceWorld, _args: StepArgs) -> Result<()> {
    let operator = world.fixture(SECOND_SLOT)?;
    world.set_party(Party::Second, operator);
    Ok(())
}

async fn treasury_token(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let tokens: u64 = args.parse(0)?;
    let treasury = world.fixture(TREASURY_SLOT)?;
    world.bind_operator(treasury.clone())?;
    world.treasury = Some(treasury);
    create_scenario_token(world, tokens, TokenSupply::Finite { max_supply: tokens }).await
}

// Associate and fund a party once, then check it holds exactly `amount`.
// An account already associated is only queried.
async fn hold_tokens(world: &mut AcceptanceWorld, party: Party, amount: u64) -> Result<()> {
    let token = world.token_id()?;
    let account = world.party(party)?.clone();
    let treasury = world.treasury()?.clone();
    let ledger = world.client()?;

    let balance = account_balance(ledger.as_ref(), account.account_id)
        .await
        .with_context(|| format!("Failed to get balance of the {} account", party))?;
    if balance.is_associated(&token) {
        debug!("The {} account already holds the token, checking its balance only", party);
        return assert_token_balance(ledger.as_ref(), account.account_id, token, amount).await;
    }

    let funding = fund_account(ledger.as_ref(), &treasury, &account, token, amount)
        .await
        .with_context(|| format!("Failed to give {} tokens to the {} account", amount, party))?;
    match funding {
        Funding::Funded {
            association,
            transfer,
        } => {
            assert_success(association, "token association")?;
            if let Some(status) = transfer {
                assert_success(status, "token transfer")?;
            }
        }
        // Associated between the query and the association
        Funding::AlreadyAssociated => {
            debug!("The {} account was associated concurrently", party);
        }
    }

    assert_token_balance(ledger.as_ref(), account.account_id, token, amount).await
}

async fn party_holds(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let party: Party = args.parse(0)?;
    let amount: u64 = args.parse(1)?;
    hold_tokens(world, party, amount).await
}

async fn create_transfer(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let from: Party = args.parse(0)?;
    let amount: u64 = args.parse(1)?;
    let to: Party = args.parse(2)?;

    let token = world.token_id()?;
    let source = world.party(from)?.clone();
    let destination = world.party(to)?.account_id;
    let payer = world.party(Party::First)?.account_id;
    let ledger = world.client_for(&source)?;

    let options = TransferTokenOptions {
        source: source.account_id,
        destination,
        source_key: None,
        token_id: token,
        amount,
    };
    let mut batch = match transfer_token(ledger.as_ref(), options).await? {
        TransferOutcome::Unsigned(batch) => batch,
        TransferOutcome::Submitted(status) => {
            bail!("transfer was submitted ({:?}) instead of being prepared", status)
        }
    };
    batch.payer(payer);

    world.pending_transfer = Some(PendingTransfer {
        batch,
        signers: vec![source.private_key],
    });
    info!("Token transfer transaction from {} account to {} account created", from, to);
    Ok(())
}

async fn submit_transfer(world: &mut AcceptanceWorld, _args: StepArgs) -> Result<()> {
    let first = world.party(Party::First)?.clone();
    let pending = world
        .pending_transfer
        .take()
        .context("No transaction is waiting to be submitted")?;
    let ledger = world.client_for(&first)?;

    let before = ledger
        .account_balance(first.account_id)
        .await
        .context("Failed to get balance of the first account")?;

    let mut signers = pending.signers;
    if !signers.iter().any(|key| key.public_key() == first.public_key()) {
        signers.push(first.private_key.clone());
    }
    let receipt = ledger
        .submit_transfer(&pending.batch, &signers)
        .await
        .context("Token transfer submitted by the first account failed")?;
    info!("Token transfer transaction status: {:?}", receipt.status);

    let after = ledger
        .account_balance(first.account_id)
        .await
        .context("Failed to get balance of the first account")?;
    world.hbar_before = Some(before.hbars);
    world.hbar_after = Some(after.hbars);

    assert_success(receipt.status, "token transfer")
}

async fn first_paid_fee(world: &mut AcceptanceWorld, _args: StepArgs) -> Result<()> {
    let before = world
        .hbar_before
        .context("No balance was recorded before the transaction")?;
    let after = world
        .hbar_after
        .context("No balance was recorded after the transaction")?;
    ensure!(
        before.to_tinybars() > after.to_tinybars(),
        "first account balance went from {} to {}, no fee was paid",
        before,
        after
    );
    Ok(())
}

async fn first_account_with_tokens(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let hbars: i64 = args.parse(0)?;
    let tokens: u64 = args.parse(1)?;
    let operator = world.fixture(TOKEN_FIRST_SLOT)?;
    let ledger = world.client()?;

    assert_hbar_above(ledger.as_ref(), operator.account_id, hbars).await?;
    world.set_party(Party::First, operator);
    hold_tokens(world, Party::First, tokens).await
}

async fn new_account_with_tokens(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let party: Party = args.parse(0)?;
    let hbars: i64 = args.parse(1)?;
    let tokens: u64 = args.parse(2)?;
    let ledger = world.client()?;

    let account = create_account(ledger.as_ref(), whole_hbars(hbars)?).await?;
    assert_hbar_equals(ledger.as_ref(), account.account_id, hbars).await?;
    world.set_party(party, account);
    hold_tokens(world, party, tokens).await
}

async fn create_multi_party_transfer(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let out_of_each: i64 = args.parse(0)?;
    let into_third: i64 = args.parse(1)?;
    let into_fourth: i64 = args.parse(2)?;

    let token = world.token_id()?;
    let first = world.party(Party::First)?.account_id;
    let second = world.party(Party::Second)?.clone();
    let third = world.party(Party::Third)?.account_id;
    let fourth = world.party(Party::Fourth)?.account_id;

    let mut batch = TokenTransferBatch::new();
    batch
        .token_transfer(token, first, -out_of_each)
        .token_transfer(token, second.account_id, -out_of_each)
        .token_transfer(token, third, into_third)
        .token_transfer(token, fourth, into_fourth)
        .payer(first);
    ensure!(
        batch.is_balanced(),
        "moving {} out of two accounts cannot put {} and {} into the others",
        out_of_each,
        into_third,
        into_fourth
    );

    world.pending_transfer = Some(PendingTransfer {
        batch,
        signers: vec![second.private_key],
    });
    info!("Multi-party token transfer created");
    Ok(())
}
