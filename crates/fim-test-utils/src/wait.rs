//! Polling helpers for assertions on background work.

use std::thread;
use std::time::{Duration, Instant};

/// Poll `condition` every 20 ms until it holds or `timeout` elapses.
/// Returns whether the condition was met.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(20));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_true_once_condition_holds() {
        let mut calls = 0;
        assert!(wait_until(Duration::from_secs(1), || {
            calls += 1;
            calls >= 3
        }));
    }

    #[test]
    fn gives_up_after_timeout() {
        assert!(!wait_until(Duration::from_millis(50), || false));
    }
}
