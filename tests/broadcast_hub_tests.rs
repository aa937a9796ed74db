use skylift::hub::{BroadcastHub, OBSERVER_QUEUE_DEPTH};

#[tokio::test]
async fn test_broadcast_reaches_every_observer_exactly_once() {
    let hub = BroadcastHub::new();
    let mut a = hub.register().await;
    let mut b = hub.register().await;
    let mut c = hub.register().await;

    let delivered = hub.broadcast("snapshot-1").await;
    assert_eq!(delivered, 3);

    assert_eq!(a.recv().await.as_deref(), Some("snapshot-1"));
    assert_eq!(b.recv().await.as_deref(), Some("snapshot-1"));
    assert_eq!(c.recv().await.as_deref(), Some("snapshot-1"));

    // Exactly once: nothing further is queued.
    hub.broadcast("snapshot-2").await;
    assert_eq!(a.recv().await.as_deref(), Some("snapshot-2"));
}

#[tokio::test]
async fn test_disconnected_observer_is_pruned_on_next_broadcast() {
    let hub = BroadcastHub::new();
    let mut alive = hub.register().await;
    let dead = hub.register().await;
    assert_eq!(hub.observer_count().await, 2);

    drop(dead);

    // The registry still lists the dead observer until a delivery fails.
    assert_eq!(hub.observer_count().await, 2);
    let delivered = hub.broadcast("snapshot").await;
    assert_eq!(delivered, 1);
    assert_eq!(hub.observer_count().await, 1);

    assert_eq!(alive.recv().await.as_deref(), Some("snapshot"));
}

#[tokio::test]
async fn test_stalled_observer_is_dropped_not_blocked_on() {
    let hub = BroadcastHub::new();
    let stalled = hub.register().await;
    let mut draining = hub.register().await;

    // Fill the stalled observer's queue to capacity without draining it.
    for i in 0..OBSERVER_QUEUE_DEPTH {
        let delivered = hub.broadcast(&format!("snapshot-{}", i)).await;
        assert_eq!(delivered, 2);
        draining.recv().await;
    }

    // The next broadcast fails for the full queue and prunes it; the other
    // observer still gets the message.
    let delivered = hub.broadcast("overflow").await;
    assert_eq!(delivered, 1);
    assert_eq!(hub.observer_count().await, 1);
    assert_eq!(draining.recv().await.as_deref(), Some("overflow"));

    // The pruned handle sees its stream end after draining the backlog.
    let mut stalled = stalled;
    for _ in 0..OBSERVER_QUEUE_DEPTH {
        assert!(stalled.recv().await.is_some());
    }
    assert!(stalled.recv().await.is_none());
}

#[tokio::test]
async fn test_unregister_removes_observer() {
    let hub = BroadcastHub::new();
    let observer = hub.register().await;
    let id = observer.id();
    assert_eq!(hub.observer_count().await, 1);

    hub.unregister(id).await;
    assert_eq!(hub.observer_count().await, 0);

    // Unregistering twice is harmless.
    hub.unregister(id).await;
    assert_eq!(hub.broadcast("snapshot").await, 0);
}
