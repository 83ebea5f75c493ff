//! 基础设施层
//!
//! 核心层抽象接口的具体实现：PostgreSQL仓储与Maytapi投递API的
//! HTTP客户端。上层只依赖 `broadcaster-core` 的trait，本层在
//! 组装阶段注入。

pub mod database;
pub mod delivery;

pub use database::{
    create_pool, PostgresBroadcastRepository, PostgresConversationRepository,
    PostgresRecipientRepository,
};
pub use delivery::MaytapiClient;
