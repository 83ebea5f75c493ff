//! 广播排空工作器
//!
//! 驱动广播的完整生命周期：pending广播先解析收件人快照，
//! 随后进入sending，按批次拉取pending收件人交给批次发送器，
//! 每批结束后回写聚合计数，排空后落入sent或failed终态。
//! 所有进度立即持久化，进程中途崩溃后重新处理同一广播会从
//! 剩余的pending收件人继续。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use broadcaster_core::models::{Broadcast, BroadcastOutcome, BroadcastStatus, RecipientStatus};
use broadcaster_core::traits::{BroadcastProcessService, BroadcastRepository, RecipientRepository};
use broadcaster_core::{BroadcastError, BroadcastResult};
use uuid::Uuid;

use crate::resolver::RecipientResolver;
use crate::sender::BatchSender;

/// 广播处理工作器
pub struct BroadcastWorker {
    broadcasts: Arc<dyn BroadcastRepository>,
    recipients: Arc<dyn RecipientRepository>,
    resolver: RecipientResolver,
    sender: BatchSender,
    batch_size: i64,
}

impl BroadcastWorker {
    pub fn new(
        broadcasts: Arc<dyn BroadcastRepository>,
        recipients: Arc<dyn RecipientRepository>,
        resolver: RecipientResolver,
        sender: BatchSender,
        batch_size: i64,
    ) -> Self {
        Self {
            broadcasts,
            recipients,
            resolver,
            sender,
            batch_size,
        }
    }

    /// 批次排空循环：拉取、发送、回写计数，直到没有pending收件人
    async fn drain(&self, broadcast: &Broadcast) -> BroadcastResult<BroadcastOutcome> {
        // 续跑时从已持久化的计数继续累加，计数只增不减
        let mut total_sent = broadcast.sent_count;
        let mut total_failed = broadcast.failed_count;

        loop {
            let batch = self
                .recipients
                .get_pending(broadcast.id, self.batch_size)
                .await?;
            if batch.is_empty() {
                break;
            }

            let outcome = self.sender.send_batch(broadcast, &batch).await?;
            total_sent += outcome.sent;
            total_failed += outcome.failed;

            self.broadcasts
                .update_status(
                    broadcast.id,
                    BroadcastStatus::Sending,
                    total_sent,
                    total_failed,
                )
                .await?;
            info!(
                broadcast_id = %broadcast.id,
                batch_sent = outcome.sent,
                batch_failed = outcome.failed,
                total_sent,
                total_failed,
                "批次处理完成"
            );
        }

        Ok(BroadcastOutcome {
            total_sent,
            total_failed,
        })
    }

    /// 把广播强制置为failed，计数从收件人终态行重新统计
    ///
    /// 只在广播级错误逃逸后调用。不使用内存中的累计值，
    /// 收件人状态已落库但聚合计数回写丢失时也能得到一致的计数。
    async fn force_failed(&self, broadcast_id: Uuid) {
        let sent = match self
            .recipients
            .count_by_status(broadcast_id, RecipientStatus::Sent)
            .await
        {
            Ok(n) => n,
            Err(err) => {
                error!(broadcast_id = %broadcast_id, error = %err, "强制失败时统计已发送收件人失败");
                return;
            }
        };
        let failed = match self
            .recipients
            .count_by_status(broadcast_id, RecipientStatus::Failed)
            .await
        {
            Ok(n) => n,
            Err(err) => {
                error!(broadcast_id = %broadcast_id, error = %err, "强制失败时统计已失败收件人失败");
                return;
            }
        };
        if let Err(err) = self
            .broadcasts
            .update_status(broadcast_id, BroadcastStatus::Failed, sent, failed)
            .await
        {
            error!(broadcast_id = %broadcast_id, error = %err, "强制失败状态写入失败");
        }
    }
}

#[async_trait]
impl BroadcastProcessService for BroadcastWorker {
    /// 处理单个广播直到终态
    #[instrument(skip(self))]
    async fn process_broadcast(&self, broadcast_id: Uuid) -> BroadcastResult<BroadcastOutcome> {
        let broadcast = self
            .broadcasts
            .get_by_id(broadcast_id)
            .await?
            .ok_or(BroadcastError::BroadcastNotFound { id: broadcast_id })?;

        // 终态广播不再处理，重复调用是无害的空操作
        if broadcast.status.is_terminal() {
            warn!(
                broadcast_id = %broadcast.id,
                status = broadcast.status.as_str(),
                "广播已处于终态，跳过"
            );
            return Ok(BroadcastOutcome {
                total_sent: broadcast.sent_count,
                total_failed: broadcast.failed_count,
            });
        }

        // 快照解析是幂等的，pending广播每次进入前都会执行；
        // 解析失败时广播保持pending，可以再次尝试
        if broadcast.status == BroadcastStatus::Pending {
            self.resolver.resolve_and_persist(&broadcast).await?;
        }

        self.broadcasts
            .update_status(
                broadcast.id,
                BroadcastStatus::Sending,
                broadcast.sent_count,
                broadcast.failed_count,
            )
            .await?;
        info!(
            broadcast_id = %broadcast.id,
            message_kind = broadcast.message.kind(),
            "广播进入发送状态"
        );

        let outcome = self.drain(&broadcast).await?;

        let final_status = Broadcast::final_status(outcome.total_sent, outcome.total_failed);
        self.broadcasts
            .update_status(
                broadcast.id,
                final_status,
                outcome.total_sent,
                outcome.total_failed,
            )
            .await?;
        info!(
            broadcast_id = %broadcast.id,
            status = final_status.as_str(),
            total_sent = outcome.total_sent,
            total_failed = outcome.total_failed,
            "广播处理完成"
        );

        Ok(outcome)
    }

    /// 按创建时间顺序依次排空所有pending广播
    ///
    /// 单个广播的失败不会中断整体排空：该广播被强制置为failed
    /// 后继续处理下一个。列出pending广播本身失败时直接向外传播。
    async fn process_pending_broadcasts(&self) -> BroadcastResult<()> {
        let pending = self.broadcasts.get_pending_broadcasts().await?;
        info!(count = pending.len(), "开始批量处理pending广播");

        for broadcast in pending {
            match self.process_broadcast(broadcast.id).await {
                Ok(outcome) => {
                    info!(
                        broadcast_id = %broadcast.id,
                        total_sent = outcome.total_sent,
                        total_failed = outcome.total_failed,
                        "广播排空完成"
                    );
                }
                Err(err) => {
                    error!(
                        broadcast_id = %broadcast.id,
                        error = %err,
                        "广播处理失败，强制置为failed后继续"
                    );
                    self.force_failed(broadcast.id).await;
                }
            }
        }
        Ok(())
    }
}
