pub mod postgres_broadcast_repository;
pub mod postgres_conversation_repository;
pub mod postgres_recipient_repository;

pub use postgres_broadcast_repository::PostgresBroadcastRepository;
pub use postgres_conversation_repository::PostgresConversationRepository;
pub use postgres_recipient_repository::PostgresRecipientRepository;
