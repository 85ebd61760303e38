use std::time::Duration;

use tokio::time::timeout;
use tokio_stream::StreamExt;

use service_repository::services::event::{EventError, RegistryEvent, RegistryEventBus};
use service_repository::services::{ComponentName, ServiceKey, UserHandle};

fn key(user: u32) -> ServiceKey {
    ServiceKey::new(
        ComponentName::new("com.android.phone", "DialerService"),
        UserHandle(user),
    )
}

#[tokio::test]
async fn test_publish_reaches_every_subscriber() {
    let bus = RegistryEventBus::new(16);
    assert_eq!(bus.subscriber_count(), 0);

    // 没有订阅者时发布不是错误
    assert_eq!(bus.publish(RegistryEvent::Created { key: key(0) }), 0);

    let mut first = bus.subscribe();
    let mut second = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 2);

    let delivered = bus.publish(RegistryEvent::Evicted { key: key(10) });
    assert_eq!(delivered, 2);

    for stream in [&mut first, &mut second] {
        let event = timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("Timeout waiting for event")
            .expect("Stream ended unexpectedly")
            .expect("Event stream error");
        assert_eq!(event, RegistryEvent::Evicted { key: key(10) });
        assert_eq!(event.key(), &key(10));
    }

    drop(second);
    assert_eq!(bus.subscriber_count(), 1);
}

#[tokio::test]
async fn test_slow_subscriber_reports_lag() {
    let bus = RegistryEventBus::new(2);
    let mut events = bus.subscribe();

    for user in 0..4 {
        bus.publish(RegistryEvent::Discarded { key: key(user) });
    }

    let first = timeout(Duration::from_secs(1), events.next())
        .await
        .expect("Timeout waiting for event")
        .expect("Stream ended unexpectedly");
    assert_eq!(first, Err(EventError::Lagged(2)));

    let next = timeout(Duration::from_secs(1), events.next())
        .await
        .expect("Timeout waiting for event")
        .expect("Stream ended unexpectedly")
        .expect("Event stream error");
    assert_eq!(next.key(), &key(2));
}
