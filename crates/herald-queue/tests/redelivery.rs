// At-least-once across a consumer crash: a delivery that was claimed but never
// acked comes back to the next subscriber once its lease runs out.

use std::sync::Arc;
use std::time::Duration;

use herald_queue::{Delivery, DeliveryQueue, MessageHandler, QueueOptions, SqliteQueue};
use rusqlite::Connection;
use tokio::sync::{mpsc, watch};

fn options(ack_deadline: Duration) -> QueueOptions {
    QueueOptions {
        poll_interval: Duration::from_millis(10),
        ack_deadline,
        max_in_flight: 4,
    }
}

#[tokio::test]
async fn unacked_delivery_survives_consumer_crash() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("queue.db");

    let scheduler_side = SqliteQueue::new(Connection::open(&db).unwrap(), options(Duration::from_secs(60))).unwrap();
    scheduler_side.ensure_subscription("consumer", "tasks").await.unwrap();
    scheduler_side.publish("tasks", b"remind alice").await.unwrap();

    // First consumer claims the message and "crashes" before acking.
    {
        let crashed = SqliteQueue::new(Connection::open(&db).unwrap(), options(Duration::from_millis(50))).unwrap();
        let claimed = crashed.claim("consumer", 10).unwrap();
        assert_eq!(claimed.len(), 1);
    }

    // Restarted consumer gets it again after the lease expires.
    let restarted = Arc::new(
        SqliteQueue::new(Connection::open(&db).unwrap(), options(Duration::from_secs(60))).unwrap(),
    );
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<Delivery>();
    let handler: Arc<dyn MessageHandler> = Arc::new(move |d: Delivery| {
        let seen_tx = seen_tx.clone();
        async move {
            let _ = seen_tx.send(d);
        }
    });
    let (stop_tx, stop_rx) = watch::channel(false);
    let q = Arc::clone(&restarted);
    let sub = tokio::spawn(async move { q.subscribe("consumer", handler, stop_rx).await });

    let got = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
        .await
        .expect("redelivered in time")
        .expect("handler ran");
    assert_eq!(got.payload, b"remind alice");
    assert_eq!(got.attempt, 2);

    // acked after the handler returned
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(restarted.backlog("consumer").unwrap(), 0);

    stop_tx.send(true).unwrap();
    sub.await.unwrap().unwrap();
}

#[tokio::test]
async fn each_message_is_handled_once_per_subscriber_when_acked() {
    let q = Arc::new(SqliteQueue::open_in_memory(options(Duration::from_secs(60))).unwrap());
    q.ensure_subscription("consumer", "tasks").await.unwrap();
    for i in 0..5u8 {
        q.publish("tasks", &[i]).await.unwrap();
    }

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<u8>();
    let handler: Arc<dyn MessageHandler> = Arc::new(move |d: Delivery| {
        let seen_tx = seen_tx.clone();
        async move {
            let _ = seen_tx.send(d.payload[0]);
        }
    });
    let (stop_tx, stop_rx) = watch::channel(false);
    let q2 = Arc::clone(&q);
    let sub = tokio::spawn(async move { q2.subscribe("consumer", handler, stop_rx).await });

    let mut got = Vec::new();
    while got.len() < 5 {
        let v = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .expect("all messages in time")
            .expect("handler ran");
        got.push(v);
    }
    got.sort_unstable();
    assert_eq!(got, [0, 1, 2, 3, 4]);

    // nothing left to redeliver
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(seen_rx.try_recv().is_err());
    assert_eq!(q.backlog("consumer").unwrap(), 0);

    stop_tx.send(true).unwrap();
    sub.await.unwrap().unwrap();
}
