//! 广播分发引擎
//!
//! 把一条广播消息可靠地投递给解析出的收件人集合：
//! - [`resolver`] 将目标规则展开为去重后的收件人快照；
//! - [`retry`] 提供面向限速错误的有界重试策略;
//! - [`sender`] 严格串行、限速地发送单个批次并立即落盘终态;
//! - [`worker`] 驱动广播状态机与可恢复的批次排空循环。

pub mod resolver;
pub mod retry;
pub mod sender;
pub mod worker;

pub use resolver::RecipientResolver;
pub use retry::RetryPolicy;
pub use sender::BatchSender;
pub use worker::BroadcastWorker;
