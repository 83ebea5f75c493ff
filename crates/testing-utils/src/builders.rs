//! Test data builders
//!
//! Fluent builders for constructing broadcast and recipient fixtures
//! with sensible defaults, so tests only spell out the fields they
//! actually care about.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use broadcaster_core::models::{
    Broadcast, BroadcastRecipient, BroadcastStatus, ConversationContact, Label, MessageContent,
    RecipientStatus, TargetRule,
};

/// Builder for Broadcast entities
pub struct BroadcastBuilder {
    id: Uuid,
    message: MessageContent,
    target: TargetRule,
    status: BroadcastStatus,
    sent_count: i64,
    failed_count: i64,
    created_at: DateTime<Utc>,
}

impl Default for BroadcastBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastBuilder {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            message: MessageContent::Text {
                body: "test broadcast message".to_string(),
            },
            target: TargetRule::All,
            status: BroadcastStatus::Pending,
            sent_count: 0,
            failed_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_message(mut self, message: MessageContent) -> Self {
        self.message = message;
        self
    }

    pub fn with_text(mut self, body: &str) -> Self {
        self.message = MessageContent::Text {
            body: body.to_string(),
        };
        self
    }

    pub fn with_target(mut self, target: TargetRule) -> Self {
        self.target = target;
        self
    }

    pub fn with_status(mut self, status: BroadcastStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_counts(mut self, sent: i64, failed: i64) -> Self {
        self.sent_count = sent;
        self.failed_count = failed;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn build(self) -> Broadcast {
        Broadcast {
            id: self.id,
            message: self.message,
            target: self.target,
            status: self.status,
            sent_count: self.sent_count,
            failed_count: self.failed_count,
            created_at: self.created_at,
        }
    }
}

/// Builder for BroadcastRecipient entities
pub struct RecipientBuilder {
    id: Uuid,
    broadcast_id: Uuid,
    phone_number: String,
    channel_id: String,
    status: RecipientStatus,
    error_message: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl Default for RecipientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipientBuilder {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            broadcast_id: Uuid::new_v4(),
            phone_number: "+8613800000000".to_string(),
            channel_id: "channel-1".to_string(),
            status: RecipientStatus::Pending,
            error_message: None,
            sent_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_broadcast_id(mut self, broadcast_id: Uuid) -> Self {
        self.broadcast_id = broadcast_id;
        self
    }

    pub fn with_phone_number(mut self, phone_number: &str) -> Self {
        self.phone_number = phone_number.to_string();
        self
    }

    pub fn with_channel_id(mut self, channel_id: &str) -> Self {
        self.channel_id = channel_id.to_string();
        self
    }

    pub fn with_status(mut self, status: RecipientStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> BroadcastRecipient {
        BroadcastRecipient {
            id: self.id,
            broadcast_id: self.broadcast_id,
            phone_number: self.phone_number,
            channel_id: self.channel_id,
            status: self.status,
            error_message: self.error_message,
            sent_at: self.sent_at,
            created_at: self.created_at,
        }
    }
}

/// Shorthand for a contact fixture
pub fn contact(phone_number: &str, channel_id: &str) -> ConversationContact {
    ConversationContact {
        phone_number: phone_number.to_string(),
        channel_id: channel_id.to_string(),
    }
}

/// Shorthand for an active label fixture
pub fn active_label(name: &str) -> Label {
    Label {
        id: Uuid::new_v4(),
        name: name.to_string(),
        is_active: true,
    }
}
