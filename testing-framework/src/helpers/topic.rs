//! Consensus topic helpers

use std::time::{Duration, SystemTime};

use hedera::{Key, KeyList, PrivateKey, PublicKey, Status, TopicId};
use log::info;

use acceptance_common::{
    error::LedgerError,
    ledger::{Ledger, LedgerResult},
};

/// Create a topic and return its id
pub async fn create_topic(ledger: &dyn Ledger, memo: &str, submit_key: Key) -> LedgerResult<TopicId> {
    let receipt = ledger.create_topic(memo, submit_key).await?;
    let topic_id = receipt.require_topic_id("topic creation")?;
    info!("Created topic {} with memo '{}'", topic_id, memo);
    Ok(topic_id)
}

pub async fn publish_message(
    ledger: &dyn Ledger,
    topic: TopicId,
    message: &str,
    signer: &PrivateKey,
) -> LedgerResult<Status> {
    let receipt = ledger
        .submit_topic_message(topic, message.as_bytes(), signer)
        .await?;
    Ok(receipt.status)
}

/// First message of the topic, reading from the very beginning of its history
pub async fn first_message(ledger: &dyn Ledger, topic: TopicId, wait: Duration) -> LedgerResult<Vec<u8>> {
    ledger
        .first_topic_message(topic, SystemTime::UNIX_EPOCH, wait)
        .await
}

/// `threshold`-of-n key list over `keys`
pub fn threshold_key(keys: Vec<PublicKey>, threshold: u32) -> LedgerResult<KeyList> {
    if threshold == 0 || threshold as usize > keys.len() {
        return Err(LedgerError::InvalidRequest {
            operation: "threshold key",
            reason: format!("threshold {} with {} keys", threshold, keys.len()),
        });
    }

    Ok(KeyList {
        keys: keys.into_iter().map(Key::from).collect(),
        threshold: Some(threshold),
    })
}
