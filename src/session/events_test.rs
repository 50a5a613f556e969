use super::*;

#[tokio::test]
async fn subscriber_receives_emitted_event() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    bus.emit(SessionEvent::Cleared { role: Role::Admin });
    match rx.recv().await.unwrap() {
        SessionEvent::Cleared { role } => assert_eq!(role, Role::Admin),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn all_subscribers_receive_events() {
    let bus = EventBus::new();
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();
    bus.emit(SessionEvent::Refreshed {
        role: Role::User,
        access_token: "tok".to_owned(),
        source: RefreshSource::Login,
    });
    assert!(matches!(a.recv().await.unwrap(), SessionEvent::Refreshed { .. }));
    assert!(matches!(b.recv().await.unwrap(), SessionEvent::Refreshed { .. }));
}

#[test]
fn emit_without_subscribers_is_fine() {
    let bus = EventBus::new();
    bus.emit(SessionEvent::Cleared { role: Role::User });
}

#[tokio::test]
async fn clones_share_the_channel() {
    let bus = EventBus::new();
    let clone = bus.clone();
    let mut rx = bus.subscribe();
    clone.emit(SessionEvent::Cleared { role: Role::User });
    assert!(matches!(rx.recv().await.unwrap(), SessionEvent::Cleared { .. }));
}
