use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Monotonic identifier for a captured frame.
///
/// Tokens strictly increase in publish order, so "newer frame" and
/// "larger token" are the same statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameToken(u64);

/// Single-slot latest-value cell.
///
/// `publish` replaces the previous value wholesale and assigns the next
/// token; the replaced value is dropped immediately. Waiters observe only
/// whatever is newest when they wake, never intermediate values.
pub struct LatestCell<T> {
    inner: Mutex<CellState<T>>,
    changed: Condvar,
}

struct CellState<T> {
    latest: Option<(FrameToken, T)>,
    issued: u64,
}

impl<T: Clone> LatestCell<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CellState {
                latest: None,
                issued: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// Stores `value` as the current frame and returns its token.
    pub fn publish(&self, value: T) -> FrameToken {
        let mut state = self.inner.lock().unwrap();
        state.issued += 1;
        let token = FrameToken(state.issued);
        state.latest = Some((token, value));
        self.changed.notify_all();
        token
    }

    /// Current value and token, if any.
    pub fn snapshot(&self) -> Option<(FrameToken, T)> {
        self.inner.lock().unwrap().latest.clone()
    }

    /// Token of the newest published value, if any.
    pub fn latest_token(&self) -> Option<FrameToken> {
        self.inner.lock().unwrap().latest.as_ref().map(|(t, _)| *t)
    }

    /// Blocks until a value newer than `seen` is available, or `timeout`
    /// elapses. Returns `None` on timeout so callers can re-check their
    /// shutdown flag.
    pub fn wait_newer(
        &self,
        seen: Option<FrameToken>,
        timeout: Duration,
    ) -> Option<(FrameToken, T)> {
        let mut state = self.inner.lock().unwrap();
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some((token, value)) = &state.latest {
                if Some(*token) > seen {
                    return Some((*token, value.clone()));
                }
            }
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (next, result) = self.changed.wait_timeout(state, remaining).unwrap();
            state = next;
            if result.timed_out() {
                if let Some((token, value)) = &state.latest {
                    if Some(*token) > seen {
                        return Some((*token, value.clone()));
                    }
                }
                return None;
            }
        }
    }
}

/// Slot that keeps at most one value, guarded by frame tokens.
///
/// A value is applied only when its token is newer than the token of the
/// value currently held, so a stale completion can never overwrite a
/// newer result no matter the order completions land in.
pub struct TokenGate<T> {
    inner: Mutex<Option<(FrameToken, T)>>,
}

impl<T: Clone> TokenGate<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Applies `value` if `token` is newer than the last applied token.
    /// Returns whether the value was kept.
    pub fn apply(&self, token: FrameToken, value: T) -> bool {
        let mut slot = self.inner.lock().unwrap();
        match &*slot {
            Some((held, _)) if *held >= token => false,
            _ => {
                *slot = Some((token, value));
                true
            }
        }
    }

    pub fn snapshot(&self) -> Option<(FrameToken, T)> {
        self.inner.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn publish_replaces_and_tokens_increase() {
        let cell = LatestCell::new();
        let t1 = cell.publish(1u8);
        let t2 = cell.publish(2u8);
        assert!(t2 > t1);
        assert_eq!(cell.snapshot(), Some((t2, 2)));
    }

    #[test]
    fn wait_newer_skips_already_seen_values() {
        let cell = LatestCell::new();
        let t1 = cell.publish(10u8);
        assert!(cell
            .wait_newer(Some(t1), Duration::from_millis(10))
            .is_none());
        let t2 = cell.publish(20u8);
        let (token, value) = cell
            .wait_newer(Some(t1), Duration::from_millis(10))
            .unwrap();
        assert_eq!(token, t2);
        assert_eq!(value, 20);
    }

    #[test]
    fn waiter_observes_only_the_newest_value() {
        let cell = Arc::new(LatestCell::new());
        let waiter = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.wait_newer(None, Duration::from_secs(2)))
        };
        // Two rapid publishes; the waiter may wake for either notify but
        // must never hand back the overwritten value once both landed.
        cell.publish(1u8);
        cell.publish(2u8);
        let (_, value) = waiter.join().unwrap().unwrap();
        assert!(value == 1 || value == 2);
        let (_, current) = cell.snapshot().unwrap();
        assert_eq!(current, 2);
    }

    #[test]
    fn gate_keeps_newest_token_regardless_of_apply_order() {
        let cell = LatestCell::new();
        let t1 = cell.publish(());
        let t2 = cell.publish(());

        // Completion for the newer frame resolves first.
        let gate = TokenGate::new();
        assert!(gate.apply(t2, "new"));
        assert!(!gate.apply(t1, "stale"));
        assert_eq!(gate.snapshot(), Some((t2, "new")));

        // And in publish order.
        let gate = TokenGate::new();
        assert!(gate.apply(t1, "old"));
        assert!(gate.apply(t2, "new"));
        assert_eq!(gate.snapshot(), Some((t2, "new")));
    }

    #[test]
    fn gate_rejects_duplicate_token() {
        let cell = LatestCell::new();
        let t1 = cell.publish(());
        let gate = TokenGate::new();
        assert!(gate.apply(t1, 1));
        assert!(!gate.apply(t1, 2));
        assert_eq!(gate.snapshot(), Some((t1, 1)));
    }
}
