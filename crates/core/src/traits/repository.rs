//! 数据仓储层接口定义
//!
//! 此模块定义了数据持久化层的核心抽象接口，包括：
//! - 广播仓储接口 (BroadcastRepository)
//! - 收件人仓储接口 (RecipientRepository)
//! - 会话/联系人查询接口 (ConversationRepository)
//!
//! ## 设计原则
//!
//! ### 接口隔离
//! 每个仓储接口职责单一，只负责特定实体的数据操作：
//! - `BroadcastRepository` - 广播记录的生命周期与聚合计数
//! - `RecipientRepository` - 收件人行的批量创建与逐行终态写入
//! - `ConversationRepository` - 目标规则解析所需的只读联接查询
//!
//! ### 异步设计
//! 所有数据库操作都是异步的，返回 `BroadcastResult<T>` 统一错误处理，
//! 实现 `Send + Sync` 确保线程安全。
//!
//! ### 抽象解耦
//! 接口与具体实现分离：生产环境使用PostgreSQL实现，
//! 测试使用内存实现（见 broadcaster-testing-utils）。
//!
//! ## 一致性要求
//!
//! - 单行更新必须是原子的；
//! - `bulk_insert` 必须是全有或全无的事务；
//! - 收件人的唯一键为 `(broadcast_id, phone_number)`，重复插入必须
//!   被静默忽略（解析操作因此天然幂等）。

use crate::models::{Broadcast, BroadcastRecipient, BroadcastStatus, ConversationContact, Label, RecipientStatus};
use crate::BroadcastResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 广播仓储接口
#[async_trait]
pub trait BroadcastRepository: Send + Sync {
    /// 创建新广播，初始状态为pending，计数为0
    async fn create(&self, broadcast: &Broadcast) -> BroadcastResult<Broadcast>;

    /// 根据ID获取广播，未找到时返回 `None`
    async fn get_by_id(&self, id: Uuid) -> BroadcastResult<Option<Broadcast>>;

    /// 获取所有pending状态的广播，按创建时间升序排列
    ///
    /// 批量排空循环按此顺序逐个处理，一个广播处理完成后才开始下一个。
    async fn get_pending_broadcasts(&self) -> BroadcastResult<Vec<Broadcast>>;

    /// 更新广播状态与聚合计数
    ///
    /// 计数是收件人终态的派生缓存，每个批次结束后重写一次。
    /// 调用方保证计数单调不减。
    async fn update_status(
        &self,
        id: Uuid,
        status: BroadcastStatus,
        sent_count: i64,
        failed_count: i64,
    ) -> BroadcastResult<()>;
}

/// 收件人仓储接口
#[async_trait]
pub trait RecipientRepository: Send + Sync {
    /// 批量插入收件人（全有或全无）
    ///
    /// 与唯一索引 `(broadcast_id, phone_number)` 冲突的行被静默跳过，
    /// 因此对同一目标规则重复解析不会产生重复行。
    async fn bulk_insert(&self, recipients: &[BroadcastRecipient]) -> BroadcastResult<()>;

    /// 获取指定广播下最多 `limit` 个pending收件人
    ///
    /// 严格按 `status = pending` 过滤，这是崩溃后可恢复性的基础：
    /// 重启后的排空循环只会看到尚未处理的行。
    async fn get_pending(
        &self,
        broadcast_id: Uuid,
        limit: i64,
    ) -> BroadcastResult<Vec<BroadcastRecipient>>;

    /// 将收件人写入终态
    ///
    /// `sent_at` 仅在状态为sent时写入；`error_message` 仅在failed时写入。
    /// 每个收件人处理完立即调用，不在内存中攒批。
    async fn update_status(
        &self,
        id: Uuid,
        status: RecipientStatus,
        error_message: Option<&str>,
        sent_at: Option<DateTime<Utc>>,
    ) -> BroadcastResult<()>;

    /// 统计指定广播下处于某状态的收件人数量
    async fn count_by_status(
        &self,
        broadcast_id: Uuid,
        status: RecipientStatus,
    ) -> BroadcastResult<i64>;
}

/// 会话/联系人查询接口
///
/// 收件人解析器的只读数据源。号码取自联系人，通道ID取自会话元数据。
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// 所有有联系人的会话
    async fn get_all_contacts(&self) -> BroadcastResult<Vec<ConversationContact>>;

    /// 指定标签下有联系人的会话（经由标签关联表联接）
    async fn get_contacts_by_label(&self, label_id: Uuid) -> BroadcastResult<Vec<ConversationContact>>;

    /// 查询标签，未找到时返回 `None`
    async fn get_label(&self, label_id: Uuid) -> BroadcastResult<Option<Label>>;

    /// 显式号码列表与已知联系人的交集
    ///
    /// 未知号码被静默排除：这是显式策略，防止向从未与商家建立
    /// 会话的任意号码群发。
    async fn get_contacts_by_numbers(
        &self,
        numbers: &[String],
    ) -> BroadcastResult<Vec<ConversationContact>>;
}
