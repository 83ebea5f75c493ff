use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// 优雅关闭管理器
///
/// 基于tokio广播通道：组件订阅一次，收到信号后各自收尾。
/// 重复触发关闭是无害的空操作。
pub struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    is_shutdown: Arc<RwLock<bool>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            shutdown_tx,
            is_shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// 订阅关闭信号
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// 触发关闭，通知所有订阅者
    pub async fn shutdown(&self) {
        let mut is_shutdown = self.is_shutdown.write().await;
        if *is_shutdown {
            debug!("关闭已触发过，忽略重复调用");
            return;
        }
        *is_shutdown = true;

        let subscriber_count = self.shutdown_tx.receiver_count();
        debug!("发送关闭信号给 {subscriber_count} 个订阅者");
        // 可能没有订阅者，发送失败可以忽略
        let _ = self.shutdown_tx.send(());
        info!("关闭信号已发送");
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_shutdown_signal() {
        let manager = ShutdownManager::new();
        let mut rx = manager.subscribe();
        manager.shutdown().await;
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_repeated_shutdown_is_noop() {
        let manager = ShutdownManager::new();
        let mut rx = manager.subscribe();
        manager.shutdown().await;
        manager.shutdown().await;
        assert!(rx.recv().await.is_ok());
        // 第二次调用没有发送第二个信号
        assert!(rx.try_recv().is_err());
    }
}
