// Producer -> store -> scheduler -> queue -> consumer -> chat, in one process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use herald_core::{payload::Reminder, Owner, TaskPayload, TaskRecord, TaskStatus};
use herald_dispatch::{ChatAction, ChatClient, ChatError, Consumer, Dispatcher};
use herald_queue::{DeliveryQueue, MemoryQueue, QueueOptions, SqliteQueue};
use herald_scheduler::{SchedulerEngine, TaskManager};
use herald_store::{DocumentStore, SqliteStore};
use tokio::sync::{mpsc, watch};

/// Forwards every chat action to the test.
struct ChannelChat(mpsc::UnboundedSender<ChatAction>);

impl ChannelChat {
    fn send(&self, a: ChatAction) -> Result<(), ChatError> {
        let _ = self.0.send(a);
        Ok(())
    }
}

#[async_trait]
impl ChatClient for ChannelChat {
    fn name(&self) -> &str {
        "test"
    }
    async fn send_message(&self, target: &str, text: &str) -> Result<(), ChatError> {
        self.send(ChatAction::SendMessage {
            target: target.into(),
            text: text.into(),
        })
    }
    async fn unban(&self, channel: &str, mask: &str) -> Result<(), ChatError> {
        self.send(ChatAction::Unban {
            channel: channel.into(),
            mask: mask.into(),
        })
    }
    async fn unmute(&self, channel: &str, mask: &str) -> Result<(), ChatError> {
        self.send(ChatAction::Unmute {
            channel: channel.into(),
            mask: mask.into(),
        })
    }
    async fn join(&self, channel: &str) -> Result<(), ChatError> {
        self.send(ChatAction::Join {
            channel: channel.into(),
        })
    }
    async fn reconnect(&self, network: &str) -> Result<(), ChatError> {
        self.send(ChatAction::Reconnect {
            network: network.into(),
        })
    }
}

fn buy_milk(delay: chrono::Duration) -> TaskRecord {
    TaskRecord::new(
        TaskPayload::Reminder(Reminder {
            user: "alice".into(),
            destination: "#test".into(),
            content: "buy milk".into(),
        }),
        Utc::now() + delay,
    )
}

struct Harness {
    tasks: Arc<TaskManager>,
    engine: SchedulerEngine,
    chat_rx: mpsc::UnboundedReceiver<ChatAction>,
    stop_tx: watch::Sender<bool>,
    consumer: tokio::task::JoinHandle<()>,
}

async fn harness(queue: Arc<dyn DeliveryQueue>) -> Harness {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let tasks = Arc::new(TaskManager::new(store));
    let engine = SchedulerEngine::new(Arc::clone(&tasks), Arc::clone(&queue));

    let (chat_tx, chat_rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::with_chat_handlers(Arc::new(ChannelChat(chat_tx)));
    let consumer = Arc::new(Consumer::new(Arc::new(dispatcher)));

    queue.ensure_subscription("task-consumer", "tasks").await.unwrap();
    let (stop_tx, stop_rx) = watch::channel(false);
    let consumer = tokio::spawn(async move {
        queue
            .subscribe("task-consumer", consumer, stop_rx)
            .await
            .unwrap();
    });

    Harness {
        tasks,
        engine,
        chat_rx,
        stop_tx,
        consumer,
    }
}

impl Harness {
    async fn shutdown(self) {
        self.stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), self.consumer)
            .await
            .expect("consumer stops")
            .unwrap();
    }
}

#[tokio::test]
async fn reminder_reaches_the_channel() {
    let mut h = harness(Arc::new(MemoryQueue::default())).await;
    let r = buy_milk(chrono::Duration::milliseconds(-10));
    h.tasks.add_task(&r).await.unwrap();

    let report = h.engine.tick().await;
    assert_eq!(report.published, 1);

    let action = tokio::time::timeout(Duration::from_secs(2), h.chat_rx.recv())
        .await
        .expect("chat action in time")
        .unwrap();
    match action {
        ChatAction::SendMessage { target, text } => {
            assert_eq!(target, "#test");
            assert!(text.starts_with("alice: "), "{text}");
            assert!(text.ends_with(" ago you asked me to remind you: buy milk"), "{text}");
        }
        other => panic!("unexpected action: {other:?}"),
    }

    assert!(h.engine.tick().await.is_idle());
    assert!(
        tokio::time::timeout(Duration::from_millis(100), h.chat_rx.recv())
            .await
            .is_err(),
        "reminder delivered more than once"
    );

    let stored = h
        .tasks
        .get_task(&Owner::user("alice"), &r.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TaskStatus::Complete);
    assert!(h.tasks.due_tasks(Utc::now()).await.unwrap().is_empty());
    h.shutdown().await;
}

#[tokio::test]
async fn cancelling_a_fired_reminder_is_a_no_op() {
    let mut h = harness(Arc::new(MemoryQueue::default())).await;
    let r = buy_milk(chrono::Duration::milliseconds(-10));
    h.tasks.add_task(&r).await.unwrap();
    assert_eq!(h.engine.tick().await.published, 1);
    tokio::time::timeout(Duration::from_secs(2), h.chat_rx.recv())
        .await
        .expect("chat action in time")
        .unwrap();

    assert!(!h.tasks.remove_task(&r.id, TaskStatus::Cancelled).await.unwrap());
    let stored = h
        .tasks
        .get_task(&Owner::user("alice"), &r.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TaskStatus::Complete);
    h.shutdown().await;
}

#[tokio::test]
async fn reminder_over_durable_queue() {
    let queue = SqliteQueue::open_in_memory(QueueOptions {
        poll_interval: Duration::from_millis(10),
        ..QueueOptions::default()
    })
    .unwrap();
    let mut h = harness(Arc::new(queue)).await;
    h.tasks
        .add_task(&buy_milk(chrono::Duration::zero()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(h.engine.tick().await.published, 1);

    let action = tokio::time::timeout(Duration::from_secs(5), h.chat_rx.recv())
        .await
        .expect("chat action in time")
        .unwrap();
    assert!(matches!(action, ChatAction::SendMessage { ref target, .. } if target == "#test"));
    h.shutdown().await;
}

#[tokio::test]
async fn cancelled_reminder_is_never_sent() {
    let mut h = harness(Arc::new(MemoryQueue::default())).await;
    let r = buy_milk(chrono::Duration::milliseconds(50));
    h.tasks.add_task(&r).await.unwrap();
    assert!(h.tasks.remove_task(&r.id, TaskStatus::Cancelled).await.unwrap());

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(h.engine.tick().await.is_idle());
    assert!(
        tokio::time::timeout(Duration::from_millis(100), h.chat_rx.recv())
            .await
            .is_err(),
        "nothing should reach the chat"
    );

    let stored = h
        .tasks
        .get_task(&Owner::user("alice"), &r.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TaskStatus::Cancelled);
    h.shutdown().await;
}

#[tokio::test]
async fn unknown_type_is_acknowledged() {
    let queue = Arc::new(
        SqliteQueue::open_in_memory(QueueOptions {
            poll_interval: Duration::from_millis(10),
            ..QueueOptions::default()
        })
        .unwrap(),
    );
    let h = harness(queue.clone()).await;

    let body = br#"{"id":"x","type":"summon-dragon","created_at":"2026-03-01T12:00:00.000Z","due_at":"2026-03-01T12:00:00.000Z","status":"pending","data":{}}"#;
    queue.publish("tasks", body).await.unwrap();

    let mut backlog = 1;
    for _ in 0..100 {
        backlog = queue.backlog("task-consumer").unwrap();
        if backlog == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(backlog, 0, "unknown message should be acked, not redelivered");
    h.shutdown().await;
}
