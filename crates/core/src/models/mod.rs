pub mod broadcast;
pub mod recipient;

pub use broadcast::{BatchOutcome, Broadcast, BroadcastOutcome, BroadcastStatus, MessageContent, TargetRule};
pub use recipient::{BroadcastRecipient, ConversationContact, Label, RecipientStatus};
