pub mod delivery;
pub mod processor;
pub mod repository;

pub use delivery::{DeliveryApi, DeliveryReceipt};
pub use processor::BroadcastProcessService;
pub use repository::{BroadcastRepository, ConversationRepository, RecipientRepository};
