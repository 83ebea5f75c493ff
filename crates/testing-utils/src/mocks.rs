//! Mock implementations for the repository and delivery traits
//!
//! In-memory test doubles that can be used for unit and integration
//! testing without a database connection or an external messaging
//! provider. They also record enough call history for tests to assert
//! batching, retry counts and counter monotonicity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use broadcaster_core::errors::DeliveryError;
use broadcaster_core::models::{
    Broadcast, BroadcastRecipient, BroadcastStatus, ConversationContact, Label, MessageContent,
    RecipientStatus,
};
use broadcaster_core::traits::{
    BroadcastRepository, ConversationRepository, DeliveryApi, DeliveryReceipt, RecipientRepository,
};
use broadcaster_core::{BroadcastError, BroadcastResult};

/// Mock implementation of BroadcastRepository
#[derive(Debug, Clone, Default)]
pub struct MockBroadcastRepository {
    broadcasts: Arc<Mutex<HashMap<Uuid, Broadcast>>>,
    /// Every (status, sent, failed) write, per broadcast, in order
    status_log: Arc<Mutex<Vec<(Uuid, BroadcastStatus, i64, i64)>>>,
}

impl MockBroadcastRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_broadcasts(broadcasts: Vec<Broadcast>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.broadcasts.lock().unwrap();
            for b in broadcasts {
                map.insert(b.id, b);
            }
        }
        repo
    }

    pub fn get(&self, id: Uuid) -> Option<Broadcast> {
        self.broadcasts.lock().unwrap().get(&id).cloned()
    }

    /// Ordered history of status/counter writes for one broadcast
    pub fn status_history(&self, id: Uuid) -> Vec<(BroadcastStatus, i64, i64)> {
        self.status_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(bid, _, _, _)| *bid == id)
            .map(|(_, s, sent, failed)| (*s, *sent, *failed))
            .collect()
    }
}

#[async_trait]
impl BroadcastRepository for MockBroadcastRepository {
    async fn create(&self, broadcast: &Broadcast) -> BroadcastResult<Broadcast> {
        self.broadcasts
            .lock()
            .unwrap()
            .insert(broadcast.id, broadcast.clone());
        Ok(broadcast.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> BroadcastResult<Option<Broadcast>> {
        Ok(self.broadcasts.lock().unwrap().get(&id).cloned())
    }

    async fn get_pending_broadcasts(&self) -> BroadcastResult<Vec<Broadcast>> {
        let mut pending: Vec<Broadcast> = self
            .broadcasts
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.status == BroadcastStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|b| b.created_at);
        Ok(pending)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BroadcastStatus,
        sent_count: i64,
        failed_count: i64,
    ) -> BroadcastResult<()> {
        let mut map = self.broadcasts.lock().unwrap();
        let broadcast = map
            .get_mut(&id)
            .ok_or(BroadcastError::BroadcastNotFound { id })?;
        broadcast.status = status;
        broadcast.sent_count = sent_count;
        broadcast.failed_count = failed_count;
        self.status_log
            .lock()
            .unwrap()
            .push((id, status, sent_count, failed_count));
        Ok(())
    }
}

/// Mock implementation of RecipientRepository
#[derive(Debug, Clone, Default)]
pub struct MockRecipientRepository {
    recipients: Arc<Mutex<Vec<BroadcastRecipient>>>,
    pending_fetches: Arc<Mutex<usize>>,
    fail_updates: Arc<Mutex<bool>>,
}

impl MockRecipientRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recipients(recipients: Vec<BroadcastRecipient>) -> Self {
        let repo = Self::new();
        *repo.recipients.lock().unwrap() = recipients;
        repo
    }

    /// Number of get_pending calls observed (batch-iteration assertions)
    pub fn pending_fetch_count(&self) -> usize {
        *self.pending_fetches.lock().unwrap()
    }

    /// Make every status update fail, to exercise persistence-error paths
    pub fn fail_next_updates(&self, fail: bool) {
        *self.fail_updates.lock().unwrap() = fail;
    }

    pub fn all_for(&self, broadcast_id: Uuid) -> Vec<BroadcastRecipient> {
        self.recipients
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.broadcast_id == broadcast_id)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.recipients.lock().unwrap().len()
    }
}

#[async_trait]
impl RecipientRepository for MockRecipientRepository {
    async fn bulk_insert(&self, recipients: &[BroadcastRecipient]) -> BroadcastResult<()> {
        let mut store = self.recipients.lock().unwrap();
        let existing: HashSet<(Uuid, String)> = store
            .iter()
            .map(|r| (r.broadcast_id, r.phone_number.clone()))
            .collect();
        // Mirrors the ON CONFLICT DO NOTHING semantics of the real table
        for r in recipients {
            if !existing.contains(&(r.broadcast_id, r.phone_number.clone())) {
                store.push(r.clone());
            }
        }
        Ok(())
    }

    async fn get_pending(
        &self,
        broadcast_id: Uuid,
        limit: i64,
    ) -> BroadcastResult<Vec<BroadcastRecipient>> {
        *self.pending_fetches.lock().unwrap() += 1;
        let store = self.recipients.lock().unwrap();
        Ok(store
            .iter()
            .filter(|r| r.broadcast_id == broadcast_id && r.status == RecipientStatus::Pending)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: RecipientStatus,
        error_message: Option<&str>,
        sent_at: Option<DateTime<Utc>>,
    ) -> BroadcastResult<()> {
        if *self.fail_updates.lock().unwrap() {
            return Err(BroadcastError::DatabaseOperation(
                "simulated store failure".to_string(),
            ));
        }
        let mut store = self.recipients.lock().unwrap();
        let recipient = store
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| BroadcastError::DatabaseOperation(format!("recipient {id} not found")))?;
        recipient.status = status;
        recipient.error_message = error_message.map(|s| s.to_string());
        recipient.sent_at = sent_at;
        Ok(())
    }

    async fn count_by_status(
        &self,
        broadcast_id: Uuid,
        status: RecipientStatus,
    ) -> BroadcastResult<i64> {
        Ok(self
            .recipients
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.broadcast_id == broadcast_id && r.status == status)
            .count() as i64)
    }
}

/// Mock implementation of ConversationRepository
#[derive(Debug, Clone, Default)]
pub struct MockConversationRepository {
    contacts: Arc<Mutex<Vec<ConversationContact>>>,
    labels: Arc<Mutex<HashMap<Uuid, Label>>>,
    label_members: Arc<Mutex<HashMap<Uuid, Vec<ConversationContact>>>>,
}

impl MockConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contacts(contacts: Vec<ConversationContact>) -> Self {
        let repo = Self::new();
        *repo.contacts.lock().unwrap() = contacts;
        repo
    }

    pub fn add_label(&self, label: Label, members: Vec<ConversationContact>) {
        self.label_members
            .lock()
            .unwrap()
            .insert(label.id, members);
        self.labels.lock().unwrap().insert(label.id, label);
    }
}

#[async_trait]
impl ConversationRepository for MockConversationRepository {
    async fn get_all_contacts(&self) -> BroadcastResult<Vec<ConversationContact>> {
        Ok(self.contacts.lock().unwrap().clone())
    }

    async fn get_contacts_by_label(
        &self,
        label_id: Uuid,
    ) -> BroadcastResult<Vec<ConversationContact>> {
        Ok(self
            .label_members
            .lock()
            .unwrap()
            .get(&label_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_label(&self, label_id: Uuid) -> BroadcastResult<Option<Label>> {
        Ok(self.labels.lock().unwrap().get(&label_id).cloned())
    }

    async fn get_contacts_by_numbers(
        &self,
        numbers: &[String],
    ) -> BroadcastResult<Vec<ConversationContact>> {
        let wanted: HashSet<&String> = numbers.iter().collect();
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .filter(|c| wanted.contains(&c.phone_number))
            .cloned()
            .collect())
    }
}

/// Scripted outcome for one FakeDeliveryApi send attempt
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Success,
    RateLimited,
    InvalidNumber,
    Rejected(String),
}

/// Fake delivery API with per-number scripted outcomes
///
/// Unscripted numbers always succeed. Scripted numbers consume one
/// outcome per attempt and fall back to success once the script is
/// exhausted, which makes "fail N times then succeed" retry scenarios
/// trivial to express.
#[derive(Debug, Clone, Default)]
pub struct FakeDeliveryApi {
    scripts: Arc<Mutex<HashMap<String, VecDeque<SendOutcome>>>>,
    attempts: Arc<Mutex<HashMap<String, usize>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeDeliveryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, phone_number: &str, outcomes: Vec<SendOutcome>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(phone_number.to_string(), outcomes.into());
    }

    /// Total send attempts observed for one number, retries included
    pub fn attempts_for(&self, phone_number: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(phone_number)
            .copied()
            .unwrap_or(0)
    }

    /// Every destination in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryApi for FakeDeliveryApi {
    async fn send(
        &self,
        to: &str,
        _message: &MessageContent,
        _channel_id: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        *self.attempts.lock().unwrap().entry(to.to_string()).or_insert(0) += 1;
        self.calls.lock().unwrap().push(to.to_string());

        let outcome = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(to)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(SendOutcome::Success);

        match outcome {
            SendOutcome::Success => Ok(DeliveryReceipt {
                message_id: format!("fake_{}", Uuid::new_v4()),
            }),
            SendOutcome::RateLimited => Err(DeliveryError::RateLimited(
                "429 Too Many Requests".to_string(),
            )),
            SendOutcome::InvalidNumber => {
                Err(DeliveryError::InvalidNumber(format!("invalid_number: {to}")))
            }
            SendOutcome::Rejected(reason) => Err(DeliveryError::Rejected(reason)),
        }
    }
}
