//! Consensus topic steps

use anyhow::{ensure, Context, Result};
use hedera::Key;
use log::info;

use acceptance_common::config::{SECOND_SLOT, TOPIC_FIRST_SLOT};

use super::step;
use crate::{
    helpers::{assert_hbar_above, assert_success, create_topic, first_message, publish_message, threshold_key},
    scenarios::{StepArgs, StepRegistry},
    world::AcceptanceWorld,
};

pub(super) fn register(registry: &mut StepRegistry<AcceptanceWorld>) -> Result<(), regex::Error> {
    registry
        .given(r"^a first account with more than (\d+) hbars$", step!(first_account))?
        .given(r"^A second account with more than (\d+) hbars$", step!(second_account))?
        .given(
            r"^A (\d+) of (\d+) threshold key with the first and second account$",
            step!(threshold_key_of_both),
        )?
        .when(
            r#"^A topic is created with the memo "([^"]*)" with the first account as the submit key$"#,
            step!(topic_with_first_key),
        )?
        .when(
            r#"^A topic is created with the memo "([^"]*)" with the threshold key as the submit key$"#,
            step!(topic_with_threshold_key),
        )?
        .when(r#"^The message "([^"]*)" is published to the topic$"#, step!(publish))?
        .then(
            r#"^The message "([^"]*)" is received by the topic and can be printed to the console$"#,
            step!(receive),
        )?;
    Ok(())
}

// Bind the scenario client to a fixture account and check its funds
async fn load_account(world: &mut AcceptanceWorld, slot: usize, hbars: i64) -> Result<hedera::PrivateKey> {
    let operator = world.fixture(slot)?;
    let ledger = world.bind_operator(operator.clone())?;
    assert_hbar_above(ledger.as_ref(), operator.account_id, hbars).await?;
    Ok(operator.private_key)
}

async fn first_account(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let hbars: i64 = args.parse(0)?;
    let key = load_account(world, TOPIC_FIRST_SLOT, hbars).await?;
    world.first_key = Some(key);
    Ok(())
}

async fn second_account(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let hbars: i64 = args.parse(0)?;
    let key = load_account(world, SECOND_SLOT, hbars).await?;
    world.second_key = Some(key);
    Ok(())
}

async fn threshold_key_of_both(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let threshold: u32 = args.parse(0)?;
    let size: usize = args.parse(1)?;
    let keys = vec![world.first_key()?.public_key(), world.second_key()?.public_key()];

    let key_list = threshold_key(keys, threshold)?;
    ensure!(
        size > threshold as usize,
        "threshold {} must stay below the key count {}",
        threshold,
        size
    );
    ensure!(
        key_list.keys.len() == size,
        "threshold key holds {} keys, expected {}",
        key_list.keys.len(),
        size
    );
    ensure!(
        key_list.threshold == Some(threshold),
        "threshold key reports {:?}, expected {}",
        key_list.threshold,
        threshold
    );

    world.threshold_key = Some(key_list);
    Ok(())
}

async fn create_and_check_topic(world: &mut AcceptanceWorld, memo: &str, submit_key: Key) -> Result<()> {
    let ledger = world.client()?;
    let topic = create_topic(ledger.as_ref(), memo, submit_key.clone()).await?;
    world.topic_id = Some(topic);

    let summary = ledger
        .topic_info(topic)
        .await
        .with_context(|| format!("Failed to get info of topic {}", topic))?;
    ensure!(
        summary.memo == memo,
        "topic memo is '{}', expected '{}'",
        summary.memo,
        memo
    );
    ensure!(
        summary.submit_key.as_ref() == Some(&submit_key),
        "topic submit key is {:?}, expected {:?}",
        summary.submit_key,
        submit_key
    );
    Ok(())
}

async fn topic_with_first_key(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let memo = args.get(0)?;
    let submit_key = Key::from(world.first_key()?.public_key());
    create_and_check_topic(world, memo, submit_key).await
}

async fn topic_with_threshold_key(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let memo = args.get(0)?;
    let submit_key = Key::from(world.threshold_key()?.clone());
    create_and_check_topic(world, memo, submit_key).await
}

async fn publish(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let message = args.get(0)?;
    let topic = world.topic_id()?;
    let signer = world.first_key()?.clone();
    let ledger = world.client()?;

    let status = publish_message(ledger.as_ref(), topic, message, &signer).await?;
    assert_success(status, "topic message submission")
}

async fn receive(world: &mut AcceptanceWorld, args: StepArgs) -> Result<()> {
    let expected = args.get(0)?;
    let topic = world.topic_id()?;
    let wait = world.settings().message_wait;
    let ledger = world.client()?;

    let contents = first_message(ledger.as_ref(), topic, wait).await?;
    info!(
        "Received message from the topic: {}",
        String::from_utf8_lossy(&contents)
    );
    ensure!(
        contents == expected.as_bytes(),
        "received '{}', expected '{}'",
        String::from_utf8_lossy(&contents),
        expected
    );
    Ok(())
}
