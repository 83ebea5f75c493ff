//! 广播处理全流程场景测试
//!
//! 使用内存仓储与脚本化投递API覆盖解析、批次排空、重试分类、
//! 状态机终态与崩溃恢复等关键行为。所有用例在暂停的tokio时钟
//! 下运行，限速与重试等待瞬时推进。

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use broadcaster_core::models::{BroadcastStatus, RecipientStatus, TargetRule};
use broadcaster_core::traits::{
    BroadcastProcessService, BroadcastRepository, RecipientRepository,
};
use broadcaster_core::BroadcastError;
use broadcaster_dispatcher::{BatchSender, BroadcastWorker, RecipientResolver, RetryPolicy};
use broadcaster_testing_utils::builders::{contact, BroadcastBuilder, RecipientBuilder};
use broadcaster_testing_utils::{
    FakeDeliveryApi, MockBroadcastRepository, MockConversationRepository, MockRecipientRepository,
    SendOutcome,
};

const BATCH_SIZE: i64 = 10;

struct Harness {
    broadcasts: MockBroadcastRepository,
    recipients: MockRecipientRepository,
    delivery: FakeDeliveryApi,
    worker: BroadcastWorker,
}

fn harness() -> Harness {
    harness_with_contacts(Vec::new())
}

fn harness_with_contacts(
    contacts: Vec<broadcaster_core::models::ConversationContact>,
) -> Harness {
    let broadcasts = MockBroadcastRepository::new();
    let recipients = MockRecipientRepository::new();
    let conversations = MockConversationRepository::with_contacts(contacts);
    let delivery = FakeDeliveryApi::new();

    let resolver = RecipientResolver::new(
        Arc::new(conversations.clone()),
        Arc::new(recipients.clone()),
    );
    let sender = BatchSender::new(
        Arc::new(delivery.clone()),
        Arc::new(recipients.clone()),
        RetryPolicy::new(3, Duration::from_millis(1000)),
        Duration::from_millis(1000),
    );
    let worker = BroadcastWorker::new(
        Arc::new(broadcasts.clone()),
        Arc::new(recipients.clone()),
        resolver,
        sender,
        BATCH_SIZE,
    );

    Harness {
        broadcasts,
        recipients,
        delivery,
        worker,
    }
}

fn numbered_contacts(count: usize) -> Vec<broadcaster_core::models::ConversationContact> {
    (0..count)
        .map(|i| contact(&format!("+155500000{i:02}"), &format!("ch-{}", i % 3)))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_full_drain_over_multiple_batches() {
    let h = harness_with_contacts(numbered_contacts(23));
    let broadcast = BroadcastBuilder::new().build();
    h.broadcasts.create(&broadcast).await.unwrap();

    let outcome = h.worker.process_broadcast(broadcast.id).await.unwrap();
    assert_eq!(outcome.total_sent, 23);
    assert_eq!(outcome.total_failed, 0);

    // 三个非空批次(10/10/3)加一次终止判定的空拉取
    assert_eq!(h.recipients.pending_fetch_count(), 4);
    assert_eq!(h.delivery.calls().len(), 23);

    let stored = h.broadcasts.get(broadcast.id).unwrap();
    assert_eq!(stored.status, BroadcastStatus::Sent);
    assert_eq!(stored.sent_count, 23);
    assert_eq!(stored.failed_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_counters_monotonic_and_bounded() {
    let h = harness();
    let broadcast = BroadcastBuilder::new().build();
    h.broadcasts.create(&broadcast).await.unwrap();
    for i in 0..15 {
        h.recipients
            .bulk_insert(&[RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number(&format!("+155511110{i:02}"))
                .build()])
            .await
            .unwrap();
    }
    // 其中一个号码投递失败
    h.delivery
        .script("+15551111003", vec![SendOutcome::Rejected("boom".into())]);

    // 已有收件人快照，直接从sending继续
    h.broadcasts
        .update_status(broadcast.id, BroadcastStatus::Sending, 0, 0)
        .await
        .unwrap();
    h.worker.process_broadcast(broadcast.id).await.unwrap();

    let history = h.broadcasts.status_history(broadcast.id);
    let mut prev = (0i64, 0i64);
    for (_, sent, failed) in &history {
        assert!(*sent >= prev.0, "sent计数不得回退");
        assert!(*failed >= prev.1, "failed计数不得回退");
        assert!(sent + failed <= 15, "计数之和不得超过收件人总数");
        prev = (*sent, *failed);
    }
    let stored = h.broadcasts.get(broadcast.id).unwrap();
    assert_eq!(stored.sent_count + stored.failed_count, 15);
    assert_eq!(stored.status, BroadcastStatus::Sent);
}

#[tokio::test(start_paused = true)]
async fn test_all_failed_broadcast_is_failed() {
    let h = harness();
    let broadcast = BroadcastBuilder::new().build();
    h.broadcasts.create(&broadcast).await.unwrap();
    for i in 0..3 {
        let phone = format!("+155522220{i:02}");
        h.recipients
            .bulk_insert(&[RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number(&phone)
                .build()])
            .await
            .unwrap();
        h.delivery
            .script(&phone, vec![SendOutcome::Rejected("provider down".into())]);
    }
    h.broadcasts
        .update_status(broadcast.id, BroadcastStatus::Sending, 0, 0)
        .await
        .unwrap();

    let outcome = h.worker.process_broadcast(broadcast.id).await.unwrap();
    assert_eq!(outcome.total_sent, 0);
    assert_eq!(outcome.total_failed, 3);
    assert_eq!(
        h.broadcasts.get(broadcast.id).unwrap().status,
        BroadcastStatus::Failed
    );
}

#[tokio::test(start_paused = true)]
async fn test_single_success_dominates_final_status() {
    let h = harness();
    let broadcast = BroadcastBuilder::new().build();
    h.broadcasts.create(&broadcast).await.unwrap();
    for i in 0..4 {
        let phone = format!("+155533330{i:02}");
        h.recipients
            .bulk_insert(&[RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number(&phone)
                .build()])
            .await
            .unwrap();
        if i > 0 {
            h.delivery
                .script(&phone, vec![SendOutcome::Rejected("rejected".into())]);
        }
    }
    h.broadcasts
        .update_status(broadcast.id, BroadcastStatus::Sending, 0, 0)
        .await
        .unwrap();

    h.worker.process_broadcast(broadcast.id).await.unwrap();
    let stored = h.broadcasts.get(broadcast.id).unwrap();
    assert_eq!(stored.status, BroadcastStatus::Sent);
    assert_eq!(stored.sent_count, 1);
    assert_eq!(stored.failed_count, 3);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_send_retries_then_succeeds() {
    let h = harness();
    let broadcast = BroadcastBuilder::new().build();
    h.broadcasts.create(&broadcast).await.unwrap();
    h.recipients
        .bulk_insert(&[RecipientBuilder::new()
            .with_broadcast_id(broadcast.id)
            .with_phone_number("+15554440001")
            .build()])
        .await
        .unwrap();
    h.delivery.script(
        "+15554440001",
        vec![SendOutcome::RateLimited, SendOutcome::RateLimited],
    );
    h.broadcasts
        .update_status(broadcast.id, BroadcastStatus::Sending, 0, 0)
        .await
        .unwrap();

    h.worker.process_broadcast(broadcast.id).await.unwrap();

    assert_eq!(h.delivery.attempts_for("+15554440001"), 3);
    assert_eq!(
        h.broadcasts.get(broadcast.id).unwrap().status,
        BroadcastStatus::Sent
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_exhaustion_marks_recipient_failed() {
    let h = harness();
    let broadcast = BroadcastBuilder::new().build();
    h.broadcasts.create(&broadcast).await.unwrap();
    h.recipients
        .bulk_insert(&[RecipientBuilder::new()
            .with_broadcast_id(broadcast.id)
            .with_phone_number("+15554440002")
            .build()])
        .await
        .unwrap();
    h.delivery.script(
        "+15554440002",
        vec![
            SendOutcome::RateLimited,
            SendOutcome::RateLimited,
            SendOutcome::RateLimited,
            SendOutcome::RateLimited,
        ],
    );
    h.broadcasts
        .update_status(broadcast.id, BroadcastStatus::Sending, 0, 0)
        .await
        .unwrap();

    h.worker.process_broadcast(broadcast.id).await.unwrap();

    // 首次尝试 + 3次重试后放弃
    assert_eq!(h.delivery.attempts_for("+15554440002"), 4);
    let rows = h.recipients.all_for(broadcast.id);
    assert_eq!(rows[0].status, RecipientStatus::Failed);
    assert!(rows[0].error_message.is_some());
    assert_eq!(
        h.broadcasts.get(broadcast.id).unwrap().status,
        BroadcastStatus::Failed
    );
}

#[tokio::test(start_paused = true)]
async fn test_invalid_number_fails_without_retry() {
    let h = harness();
    let broadcast = BroadcastBuilder::new().build();
    h.broadcasts.create(&broadcast).await.unwrap();
    h.recipients
        .bulk_insert(&[RecipientBuilder::new()
            .with_broadcast_id(broadcast.id)
            .with_phone_number("+15554440003")
            .build()])
        .await
        .unwrap();
    h.delivery.script(
        "+15554440003",
        vec![SendOutcome::InvalidNumber, SendOutcome::Success],
    );
    h.broadcasts
        .update_status(broadcast.id, BroadcastStatus::Sending, 0, 0)
        .await
        .unwrap();

    h.worker.process_broadcast(broadcast.id).await.unwrap();

    // 永久错误不重试，队列中的第二个结果不会被消费
    assert_eq!(h.delivery.attempts_for("+15554440003"), 1);
    let rows = h.recipients.all_for(broadcast.id);
    assert_eq!(rows[0].status, RecipientStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_number_skips_delivery_call() {
    let h = harness();
    let broadcast = BroadcastBuilder::new().build();
    h.broadcasts.create(&broadcast).await.unwrap();
    h.recipients
        .bulk_insert(&[
            RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number("123")
                .build(),
            RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number("+15554440004")
                .build(),
        ])
        .await
        .unwrap();
    h.broadcasts
        .update_status(broadcast.id, BroadcastStatus::Sending, 0, 0)
        .await
        .unwrap();

    h.worker.process_broadcast(broadcast.id).await.unwrap();

    // 无效号码不产生任何网络调用
    assert_eq!(h.delivery.calls(), vec!["+15554440004".to_string()]);
    let stored = h.broadcasts.get(broadcast.id).unwrap();
    assert_eq!(stored.status, BroadcastStatus::Sent);
    assert_eq!(stored.sent_count, 1);
    assert_eq!(stored.failed_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_processes_only_pending_rows() {
    let h = harness();
    let broadcast = BroadcastBuilder::new()
        .with_status(BroadcastStatus::Sending)
        .with_counts(2, 1)
        .build();
    h.broadcasts.create(&broadcast).await.unwrap();

    // 崩溃前已处理的3行与剩余的3行pending
    h.recipients
        .bulk_insert(&[
            RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number("+15556660001")
                .with_status(RecipientStatus::Sent)
                .build(),
            RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number("+15556660002")
                .with_status(RecipientStatus::Sent)
                .build(),
            RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number("+15556660003")
                .with_status(RecipientStatus::Failed)
                .build(),
            RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number("+15556660004")
                .build(),
            RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number("+15556660005")
                .build(),
            RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number("+15556660006")
                .build(),
        ])
        .await
        .unwrap();

    let outcome = h.worker.process_broadcast(broadcast.id).await.unwrap();

    // 只有3个pending行被投递，终态行不被触碰
    assert_eq!(h.delivery.calls().len(), 3);
    assert_eq!(outcome.total_sent, 5);
    assert_eq!(outcome.total_failed, 1);
    let stored = h.broadcasts.get(broadcast.id).unwrap();
    assert_eq!(stored.status, BroadcastStatus::Sent);
    assert_eq!(stored.sent_count, 5);
    assert_eq!(stored.failed_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_broadcast_is_untouched_on_reprocess() {
    let h = harness();
    let broadcast = BroadcastBuilder::new()
        .with_status(BroadcastStatus::Sent)
        .with_counts(5, 2)
        .build();
    h.broadcasts.create(&broadcast).await.unwrap();

    let outcome = h.worker.process_broadcast(broadcast.id).await.unwrap();
    assert_eq!(outcome.total_sent, 5);
    assert_eq!(outcome.total_failed, 2);
    // 没有任何新的状态写入
    assert!(h.broadcasts.status_history(broadcast.id).is_empty());
    assert!(h.delivery.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_broadcast_is_not_found() {
    let h = harness();
    let err = h.worker.process_broadcast(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, BroadcastError::BroadcastNotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_numbers_target_resolves_deduped_intersection() {
    let conversations = MockConversationRepository::with_contacts(vec![contact(
        "+1555000001",
        "ch-1",
    )]);
    let recipients = MockRecipientRepository::new();
    let resolver =
        RecipientResolver::new(Arc::new(conversations), Arc::new(recipients.clone()));

    let broadcast = BroadcastBuilder::new()
        .with_target(TargetRule::Numbers {
            numbers: vec![
                "+1555000001".to_string(),
                "+1555000001".to_string(),
                "not-a-number".to_string(),
            ],
        })
        .build();

    let count = resolver.resolve_and_persist(&broadcast).await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(recipients.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_aborts_without_falsifying_status() {
    let h = harness();
    let broadcast = BroadcastBuilder::new()
        .with_status(BroadcastStatus::Sending)
        .build();
    h.broadcasts.create(&broadcast).await.unwrap();
    h.recipients
        .bulk_insert(&[RecipientBuilder::new()
            .with_broadcast_id(broadcast.id)
            .with_phone_number("+15557770001")
            .build()])
        .await
        .unwrap();
    h.recipients.fail_next_updates(true);

    let err = h.worker.process_broadcast(broadcast.id).await.unwrap_err();
    assert!(matches!(err, BroadcastError::DatabaseOperation(_)));
    // 广播保持sending，不被伪造成终态
    assert_eq!(
        h.broadcasts.get(broadcast.id).unwrap().status,
        BroadcastStatus::Sending
    );
}

#[tokio::test(start_paused = true)]
async fn test_forced_failure_recounts_from_recipient_rows() {
    let h = harness_with_contacts(numbered_contacts(4));
    // 计数回写落后于收件人终态：3行已终态但广播计数仍是0/0
    let broadcast = BroadcastBuilder::new().build();
    h.broadcasts.create(&broadcast).await.unwrap();
    h.recipients
        .bulk_insert(&[
            RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number("+15550000000")
                .with_status(RecipientStatus::Sent)
                .build(),
            RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number("+15550000001")
                .with_status(RecipientStatus::Sent)
                .build(),
            RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number("+15550000002")
                .with_status(RecipientStatus::Failed)
                .build(),
            RecipientBuilder::new()
                .with_broadcast_id(broadcast.id)
                .with_phone_number("+15550000003")
                .build(),
        ])
        .await
        .unwrap();
    h.recipients.fail_next_updates(true);

    h.worker.process_pending_broadcasts().await.unwrap();

    // 强制失败的计数来自收件人行的重新统计，不是落后的0/0
    let stored = h.broadcasts.get(broadcast.id).unwrap();
    assert_eq!(stored.status, BroadcastStatus::Failed);
    assert_eq!(stored.sent_count, 2);
    assert_eq!(stored.failed_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_bulk_drain_continues_past_failing_broadcast() {
    let h = harness();
    // 第一个广播按不存在的标签解析，必然失败
    let doomed = BroadcastBuilder::new()
        .with_target(TargetRule::Label {
            label_id: Uuid::new_v4(),
        })
        .with_created_at(chrono::Utc::now() - chrono::Duration::minutes(5))
        .build();
    h.broadcasts.create(&doomed).await.unwrap();

    // 第二个广播正常解析并发送
    let healthy = BroadcastBuilder::new().build();
    h.broadcasts.create(&healthy).await.unwrap();
    let conversations = MockConversationRepository::with_contacts(vec![contact(
        "+15558880001",
        "ch-1",
    )]);
    let resolver = RecipientResolver::new(
        Arc::new(conversations),
        Arc::new(h.recipients.clone()),
    );
    let sender = BatchSender::new(
        Arc::new(h.delivery.clone()),
        Arc::new(h.recipients.clone()),
        RetryPolicy::new(3, Duration::from_millis(1000)),
        Duration::from_millis(1000),
    );
    let worker = BroadcastWorker::new(
        Arc::new(h.broadcasts.clone()),
        Arc::new(h.recipients.clone()),
        resolver,
        sender,
        BATCH_SIZE,
    );

    worker.process_pending_broadcasts().await.unwrap();

    assert_eq!(
        h.broadcasts.get(doomed.id).unwrap().status,
        BroadcastStatus::Failed
    );
    assert_eq!(
        h.broadcasts.get(healthy.id).unwrap().status,
        BroadcastStatus::Sent
    );
}
