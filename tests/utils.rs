use std::time::Duration;
use vhost_proxy::utils::{AcceptBackoff, exponential_backoff};

#[test]
fn test_exponential_backoff() {
    assert_eq!(exponential_backoff(0, 10, 1000), Duration::from_millis(10));
    assert_eq!(exponential_backoff(1, 10, 1000), Duration::from_millis(20));
    assert_eq!(exponential_backoff(3, 10, 1000), Duration::from_millis(80));
    assert_eq!(exponential_backoff(7, 10, 1000), Duration::from_millis(1000));
    assert_eq!(exponential_backoff(100, 10, 1000), Duration::from_millis(1000));
}

#[test]
fn test_accept_backoff_grows_and_resets() {
    let backoff = AcceptBackoff::default();
    assert_eq!(backoff.next_delay(), Duration::from_millis(10));
    assert_eq!(backoff.next_delay(), Duration::from_millis(20));
    assert_eq!(backoff.next_delay(), Duration::from_millis(40));
    assert_eq!(backoff.failures(), 3);

    backoff.reset();
    assert_eq!(backoff.failures(), 0);
    assert_eq!(backoff.next_delay(), Duration::from_millis(10));
}

#[test]
fn test_accept_backoff_is_capped() {
    let backoff = AcceptBackoff::new(100, 500);
    for _ in 0..20 {
        assert!(backoff.next_delay() <= Duration::from_millis(500));
    }
    assert_eq!(backoff.next_delay(), Duration::from_millis(500));
}
