use std::net::SocketAddr;
use std::sync::Arc;
use vhost_proxy::registry::ConnectionRegistry;

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[test]
fn test_register_tracks_both_peers() {
    let registry = Arc::new(ConnectionRegistry::new());
    let guard = registry.register(addr(1000), addr(2000));

    assert_eq!(registry.len(), 1);
    assert!(registry.contains(guard.id()));
    assert_eq!(registry.downstream_peers(), [addr(1000)]);
    assert_eq!(registry.upstream_peers(), [addr(2000)]);
}

#[test]
fn test_session_is_removed_exactly_once() {
    let registry = Arc::new(ConnectionRegistry::new());
    let guard = registry.register(addr(1000), addr(2000));
    let id = guard.id();

    assert!(registry.deregister(id));
    assert!(!registry.deregister(id));

    // dropping the guard after an explicit removal is harmless
    drop(guard);
    assert!(registry.is_empty());
}

#[test]
fn test_guard_drop_deregisters() {
    let registry = Arc::new(ConnectionRegistry::new());
    let first = registry.register(addr(1000), addr(2000));
    let second = registry.register(addr(1001), addr(2001));
    assert_ne!(first.id(), second.id());

    drop(first);
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.downstream_peers(), [addr(1001)]);
    drop(second);
    assert!(registry.is_empty());
}

#[test]
fn test_close_all_cancels_and_clears() {
    let registry = Arc::new(ConnectionRegistry::new());
    let guards: Vec<_> = (0..5)
        .map(|i| registry.register(addr(1000 + i), addr(2000 + i)))
        .collect();

    assert_eq!(registry.close_all(), 5);
    assert!(registry.is_empty());
    assert!(guards.iter().all(|g| g.is_closed()));

    // new sessions register cleanly after a flush
    let fresh = registry.register(addr(3000), addr(4000));
    assert!(!fresh.is_closed());
    assert_eq!(registry.len(), 1);

    drop(guards);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_closing_twice_is_a_noop() {
    let registry = Arc::new(ConnectionRegistry::new());
    let guard = registry.register(addr(1000), addr(2000));

    guard.close();
    guard.close();
    assert!(guard.is_closed());
    assert_eq!(registry.close_all(), 1);
    assert_eq!(registry.close_all(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_register_and_flush() {
    let registry = Arc::new(ConnectionRegistry::new());

    let mut tasks = Vec::new();
    for t in 0..8u16 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            for i in 0..200u16 {
                let guard = registry.register(addr(t * 1000 + i), addr(40000 + i));
                tokio::task::yield_now().await;
                drop(guard);
            }
        }));
    }

    let flusher = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            for _ in 0..50 {
                registry.close_all();
                tokio::task::yield_now().await;
            }
        })
    };

    for task in tasks {
        task.await.unwrap();
    }
    flusher.await.unwrap();
    assert!(registry.is_empty());
}
