//! 收件人解析器
//!
//! 在处理开始前把广播的目标规则展开为具体的收件人快照。
//! 解析只发生一次，批量插入后的排空循环只看收件人表，
//! 目标规则此后的变化不会影响一个已解析的广播。

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use broadcaster_core::models::{Broadcast, BroadcastRecipient, TargetRule};
use broadcaster_core::traits::{ConversationRepository, RecipientRepository};
use broadcaster_core::{BroadcastError, BroadcastResult};

/// 目标规则到收件人快照的解析器
pub struct RecipientResolver {
    conversations: Arc<dyn ConversationRepository>,
    recipients: Arc<dyn RecipientRepository>,
}

impl RecipientResolver {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        recipients: Arc<dyn RecipientRepository>,
    ) -> Self {
        Self {
            conversations,
            recipients,
        }
    }

    /// 按目标规则解析收件人集合
    ///
    /// 以号码为键去重，首次出现者保留其通道ID。显式号码列表中
    /// 不属于任何已知联系人的号码被静默排除。解析结果为空时
    /// 返回 `NoRecipients`，广播保持pending不进入状态机。
    pub async fn resolve(&self, broadcast: &Broadcast) -> BroadcastResult<Vec<BroadcastRecipient>> {
        let contacts = match &broadcast.target {
            TargetRule::All => self.conversations.get_all_contacts().await?,
            TargetRule::Label { label_id } => {
                let label = self
                    .conversations
                    .get_label(*label_id)
                    .await?
                    .filter(|l| l.is_active)
                    .ok_or(BroadcastError::LabelNotFound { id: *label_id })?;
                info!(broadcast_id = %broadcast.id, label = %label.name, "按标签解析收件人");
                self.conversations.get_contacts_by_label(*label_id).await?
            }
            TargetRule::Numbers { numbers } => {
                self.conversations.get_contacts_by_numbers(numbers).await?
            }
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut resolved = Vec::with_capacity(contacts.len());
        for contact in contacts {
            if seen.insert(contact.phone_number.clone()) {
                resolved.push(BroadcastRecipient::new(
                    broadcast.id,
                    contact.phone_number,
                    contact.channel_id,
                ));
            }
        }

        if resolved.is_empty() {
            return Err(BroadcastError::NoRecipients);
        }
        Ok(resolved)
    }

    /// 解析并批量写入收件人快照，返回快照大小
    ///
    /// 插入带唯一键冲突忽略，重复调用不会产生重复行。
    pub async fn resolve_and_persist(&self, broadcast: &Broadcast) -> BroadcastResult<usize> {
        let resolved = self.resolve(broadcast).await?;
        let count = resolved.len();
        self.recipients.bulk_insert(&resolved).await?;
        info!(broadcast_id = %broadcast.id, recipients = count, "收件人快照已写入");
        Ok(count)
    }
}
