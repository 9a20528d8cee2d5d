use std::collections::HashMap;
use std::sync::Mutex;

/// Per-chat store of the single pending continuation: "what to do with the
/// next text message from this chat".
///
/// Invariants:
/// - at most one live continuation per chat; [`register`] replaces any
///   previous one,
/// - [`take`] removes the slot before the caller runs the handler, so two
///   near-simultaneous dispatches for one chat can consume it at most once,
///   and a handler crash cannot leave a stale continuation behind,
/// - chats are fully independent of each other.
///
/// [`register`]: PendingSteps::register
/// [`take`]: PendingSteps::take
#[derive(Debug)]
pub struct PendingSteps<S> {
    slots: Mutex<HashMap<i64, S>>,
}

impl<S> Default for PendingSteps<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> PendingSteps<S> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Register a continuation, silently discarding any previous one for the
    /// chat. Returns the replaced continuation, if there was one.
    pub fn register(&self, chat_id: i64, step: S) -> Option<S> {
        self.slots
            .lock()
            .expect("pending steps mutex poisoned")
            .insert(chat_id, step)
    }

    /// Atomically remove and return the continuation for this chat.
    pub fn take(&self, chat_id: i64) -> Option<S> {
        self.slots
            .lock()
            .expect("pending steps mutex poisoned")
            .remove(&chat_id)
    }

    /// Remove without invoking; called on every menu navigation so a stale
    /// "please type X" prompt never fires later.
    pub fn clear(&self, chat_id: i64) {
        self.slots
            .lock()
            .expect("pending steps mutex poisoned")
            .remove(&chat_id);
    }

    pub fn is_pending(&self, chat_id: i64) -> bool {
        self.slots
            .lock()
            .expect("pending steps mutex poisoned")
            .contains_key(&chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn register_replaces_previous_continuation() {
        let steps = PendingSteps::new();
        assert!(steps.register(1, "first").is_none());
        assert_eq!(steps.register(1, "second"), Some("first"));
        // Only the second handler is left to run.
        assert_eq!(steps.take(1), Some("second"));
        assert_eq!(steps.take(1), None);
    }

    #[test]
    fn take_consumes_exactly_once() {
        let steps = PendingSteps::new();
        steps.register(7, "x");
        assert_eq!(steps.take(7), Some("x"));
        assert_eq!(steps.take(7), None);
    }

    #[test]
    fn clear_removes_without_invoking() {
        let steps = PendingSteps::new();
        steps.register(7, "x");
        steps.clear(7);
        assert!(!steps.is_pending(7));
        assert_eq!(steps.take(7), None);
    }

    #[test]
    fn chats_are_independent() {
        let steps = PendingSteps::new();
        steps.register(1, "a");
        steps.register(2, "b");
        steps.clear(1);
        assert_eq!(steps.take(2), Some("b"));
    }

    #[test]
    fn concurrent_takes_consume_at_most_once() {
        let steps = Arc::new(PendingSteps::new());
        for round in 0..64 {
            steps.register(round, round);
            let winners = Arc::new(AtomicUsize::new(0));
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let steps = Arc::clone(&steps);
                    let winners = Arc::clone(&winners);
                    std::thread::spawn(move || {
                        if steps.take(round).is_some() {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
            assert_eq!(winners.load(Ordering::SeqCst), 1);
        }
    }
}
