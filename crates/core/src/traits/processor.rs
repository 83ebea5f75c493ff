use async_trait::async_trait;
use uuid::Uuid;

use crate::models::BroadcastOutcome;
use crate::BroadcastResult;

/// 广播处理服务接口
///
/// API层通过此接口触发排空循环，实现位于 broadcaster-dispatcher。
#[async_trait]
pub trait BroadcastProcessService: Send + Sync {
    /// 将单个pending广播处理到完成
    async fn process_broadcast(&self, broadcast_id: Uuid) -> BroadcastResult<BroadcastOutcome>;

    /// 按创建时间顺序排空所有pending广播
    ///
    /// 单个广播的失败不会中断其余广播的处理。
    async fn process_pending_broadcasts(&self) -> BroadcastResult<()>;
}
