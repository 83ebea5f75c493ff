pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::{BroadcastError, DeliveryError};
pub use models::{
    BatchOutcome, Broadcast, BroadcastOutcome, BroadcastRecipient, BroadcastStatus,
    ConversationContact, Label, MessageContent, RecipientStatus, TargetRule,
};
pub use traits::{
    BroadcastProcessService, BroadcastRepository, ConversationRepository, DeliveryApi,
    DeliveryReceipt, RecipientRepository,
};

/// 统一的Result类型
pub type BroadcastResult<T> = std::result::Result<T, BroadcastError>;
