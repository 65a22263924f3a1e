//! Integration tests for the Registry Actor.
//!
//! These tests verify the registry works correctly as a complete system,
//! testing the spawn functions and the RegistryHandle interface with real
//! per-session outbox channels.
//!
//! Tests CAN use `.unwrap()` and `.expect()`; the panic-free behavior of
//! production code is checked through assertions.

use relay_core::{HistoryBuffer, Login, SessionId};
use relayd::registry::{
    spawn_registry, spawn_registry_with_history, LoginOutcome, RegistryError, RegistryHandle,
    SessionEvent,
};
use tokio::sync::mpsc;

// ============================================================================
// Test Helpers
// ============================================================================

type Inbox = mpsc::UnboundedReceiver<String>;

/// Connects a session with a fresh outbox and returns its inbox.
async fn connect(handle: &RegistryHandle, id: u64) -> Inbox {
    let (outbox, inbox) = mpsc::unbounded_channel();
    handle
        .connect(SessionId::new(id), outbox)
        .await
        .expect("connect should succeed");
    inbox
}

/// Connects and logs in a session, discarding the welcome/replay lines.
async fn connect_as(handle: &RegistryHandle, id: u64, name: &str) -> Inbox {
    let mut inbox = connect(handle, id).await;
    let outcome = handle
        .login(SessionId::new(id), Login::new(name))
        .await
        .expect("login should reach registry");
    assert_eq!(outcome, LoginOutcome::Accepted);
    drain(&mut inbox);
    inbox
}

fn drain(inbox: &mut Inbox) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(line) = inbox.try_recv() {
        lines.push(line);
    }
    lines
}

fn registry_with_capacity(capacity: usize) -> RegistryHandle {
    spawn_registry_with_history(HistoryBuffer::new(capacity).unwrap())
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_basic_lifecycle() {
    let handle = spawn_registry();

    let _inbox = connect(&handle, 1).await;
    let view = handle.get_session(SessionId::new(1)).await.expect("session should exist");
    assert_eq!(view.id, SessionId::new(1));
    assert!(!view.is_authenticated());

    assert!(handle.disconnect(SessionId::new(1)).await);
    assert!(handle.get_session(SessionId::new(1)).await.is_none());
    assert!(handle.is_connected());
}

#[tokio::test]
async fn test_connect_does_not_check_logins() {
    let handle = spawn_registry();

    let _a = connect(&handle, 1).await;
    let _b = connect(&handle, 2).await;
    let _c = connect(&handle, 3).await;

    assert_eq!(handle.get_all_sessions().await.len(), 3);
}

#[tokio::test]
async fn test_duplicate_connect_fails() {
    let handle = spawn_registry();
    let _inbox = connect(&handle, 1).await;

    let (outbox, _other) = mpsc::unbounded_channel();
    let result = handle.connect(SessionId::new(1), outbox).await;

    assert_eq!(result, Err(RegistryError::SessionAlreadyExists(SessionId::new(1))));
}

#[tokio::test]
async fn test_disconnect_cleanup_idempotence() {
    let handle = spawn_registry();
    let _a = connect_as(&handle, 1, "a").await;
    let mut b = connect_as(&handle, 2, "b").await;

    assert!(handle.disconnect(SessionId::new(1)).await);
    assert!(!handle.disconnect(SessionId::new(1)).await);
    assert!(!handle.disconnect(SessionId::new(42)).await);

    // Remaining sessions keep working normally.
    let _c = connect_as(&handle, 3, "c").await;
    handle.publish(SessionId::new(3), "after".into()).await.unwrap();
    assert_eq!(drain(&mut b), vec!["<c>: after"]);
    assert_eq!(handle.history().await, vec!["<c>: after"]);
}

// ============================================================================
// Login Tests
// ============================================================================

#[tokio::test]
async fn test_empty_history_replay() {
    let handle = spawn_registry();
    let mut inbox = connect(&handle, 1).await;

    handle.login(SessionId::new(1), Login::new("solo")).await.unwrap();

    assert_eq!(drain(&mut inbox), vec!["Welcome!!!"]);
}

#[tokio::test]
async fn test_uniqueness_enforcement() {
    let handle = spawn_registry();
    let _bob = connect_as(&handle, 1, "bob").await;
    let mut second = connect(&handle, 2).await;

    let outcome = handle.login(SessionId::new(2), Login::new("bob")).await.unwrap();

    assert_eq!(outcome, LoginOutcome::Taken);
    assert_eq!(drain(&mut second), vec!["Логин bob занят, попробуйте другой"]);

    let views = handle.get_all_sessions().await;
    let bobs: Vec<_> = views
        .iter()
        .filter(|v| v.login.as_ref() == Some(&Login::new("bob")))
        .collect();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].id, SessionId::new(1));
}

#[tokio::test]
async fn test_is_login_taken() {
    let handle = spawn_registry();
    let _bob = connect_as(&handle, 1, "bob").await;

    assert!(handle.is_login_taken(Login::new("bob"), None).await.unwrap());
    assert!(handle
        .is_login_taken(Login::new("bob"), Some(SessionId::new(2)))
        .await
        .unwrap());
    assert!(!handle
        .is_login_taken(Login::new("bob"), Some(SessionId::new(1)))
        .await
        .unwrap());
    assert!(!handle.is_login_taken(Login::new("BOB"), None).await.unwrap());
}

#[tokio::test]
async fn test_login_unknown_session() {
    let handle = spawn_registry();
    let result = handle.login(SessionId::new(9), Login::new("ghost")).await;
    assert_eq!(result, Err(RegistryError::SessionNotFound(SessionId::new(9))));
}

// ============================================================================
// Broadcast & History Tests
// ============================================================================

#[tokio::test]
async fn test_broadcast_exclusion() {
    let handle = spawn_registry();
    let mut s1 = connect_as(&handle, 1, "a").await;
    let mut s2 = connect_as(&handle, 2, "b").await;

    let recipients = handle.publish(SessionId::new(1), "hi".into()).await.unwrap();

    assert_eq!(recipients, 1);
    assert_eq!(drain(&mut s2), vec!["<a>: hi"]);
    assert!(drain(&mut s1).is_empty());
}

#[tokio::test]
async fn test_publish_before_login_rejected() {
    let handle = spawn_registry();
    let _inbox = connect(&handle, 1).await;

    let result = handle.publish(SessionId::new(1), "sneaky".into()).await;

    assert_eq!(result, Err(RegistryError::NotAuthenticated(SessionId::new(1))));
    assert!(handle.history().await.is_empty());
}

#[tokio::test]
async fn test_fifo_eviction() {
    let handle = registry_with_capacity(2);
    let _a = connect_as(&handle, 1, "a").await;

    for body in ["A", "B", "C"] {
        handle.publish(SessionId::new(1), body.into()).await.unwrap();
    }

    assert_eq!(handle.history().await, vec!["<a>: B", "<a>: C"]);
}

#[tokio::test]
async fn test_history_bound_on_replay() {
    let capacity = 10;
    let handle = registry_with_capacity(capacity);
    let _a = connect_as(&handle, 1, "a").await;

    for i in 0..25 {
        handle.publish(SessionId::new(1), format!("m{i}")).await.unwrap();
    }

    let mut late = connect(&handle, 2).await;
    handle.login(SessionId::new(2), Login::new("late")).await.unwrap();

    let lines = drain(&mut late);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "Welcome!!!");

    let expected: Vec<String> = (15..25).map(|i| format!("<a>: m{i}")).collect();
    assert_eq!(lines[1], expected.join("\n"));
}

#[tokio::test]
async fn test_registries_are_isolated() {
    let first = spawn_registry();
    let second = spawn_registry();

    let _a = connect_as(&first, 1, "a").await;
    first.publish(SessionId::new(1), "only here".into()).await.unwrap();

    let _b = connect_as(&second, 1, "a").await;

    assert_eq!(first.history().await, vec!["<a>: only here"]);
    assert!(second.history().await.is_empty());
}

#[tokio::test]
async fn test_failed_recipient_does_not_block_others() {
    let handle = spawn_registry();
    let _sender = connect_as(&handle, 1, "a").await;
    let dead = connect_as(&handle, 2, "dead").await;
    let mut alive = connect_as(&handle, 3, "alive").await;
    drop(dead);

    let recipients = handle.publish(SessionId::new(1), "ping".into()).await.unwrap();

    assert_eq!(recipients, 1);
    assert_eq!(drain(&mut alive), vec!["<a>: ping"]);
}

// ============================================================================
// Event Tests
// ============================================================================

#[tokio::test]
async fn test_lifecycle_events() {
    let handle = spawn_registry();
    let mut events = handle.subscribe();

    let _inbox = connect(&handle, 1).await;
    handle.login(SessionId::new(1), Login::new("eve")).await.unwrap();
    handle.publish(SessionId::new(1), "hello".into()).await.unwrap();
    handle.disconnect(SessionId::new(1)).await;

    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Connected {
            session_id: SessionId::new(1)
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Authenticated {
            session_id: SessionId::new(1),
            login: Login::new("eve"),
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Published {
            session_id: SessionId::new(1),
            message: "<eve>: hello".to_string(),
            recipients: 0,
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Disconnected {
            session_id: SessionId::new(1),
            login: Some(Login::new("eve")),
        }
    );
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_logins_for_same_name() {
    let handle = spawn_registry();

    let mut tasks = Vec::new();
    for id in 0..20u64 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let (outbox, _inbox) = mpsc::unbounded_channel();
            handle.connect(SessionId::new(id), outbox).await.unwrap();
            handle
                .login(SessionId::new(id), Login::new("same"))
                .await
                .unwrap()
        }));
    }

    let mut accepted = 0;
    for task in tasks {
        if task.await.unwrap() == LoginOutcome::Accepted {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 1, "exactly one session may hold a login");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_publishers_keep_history_consistent() {
    let handle = registry_with_capacity(5);

    let mut tasks = Vec::new();
    for id in 0..4u64 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let (outbox, inbox) = mpsc::unbounded_channel();
            handle.connect(SessionId::new(id), outbox).await.unwrap();
            handle
                .login(SessionId::new(id), Login::new(format!("u{id}")))
                .await
                .unwrap();
            for n in 0..10 {
                handle.publish(SessionId::new(id), format!("{n}")).await.unwrap();
            }
            inbox
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    let history = handle.history().await;
    assert_eq!(history.len(), 5);
    assert!(history.iter().all(|m| m.starts_with("<u")));
}
