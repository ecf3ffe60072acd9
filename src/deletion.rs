//! Deferred deletion queue.
//!
//! Welcome messages are not deleted one by one.  Every new message resets
//! a shared countdown, and the whole batch is flushed once the chat has
//! been quiet for `debounce_ticks` scheduler ticks.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::MessageHandle;

/// Outcome of a single [`DeletionQueue::tick`].
#[derive(Debug, PartialEq, Eq)]
pub enum Tick {
    /// The countdown was still running and has been decremented.
    NotYetDue,
    /// The countdown expired; the caller now owns this batch.
    Due(Vec<MessageHandle>),
    /// Nothing is pending.
    Idle,
}

#[derive(Debug, Default)]
struct QueueState {
    items: Vec<MessageHandle>,
    countdown: u32,
}

#[derive(Debug)]
pub struct DeletionQueue {
    state: Mutex<QueueState>,
    debounce_ticks: u32,
}

impl DeletionQueue {
    pub fn new(debounce_ticks: u32) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            debounce_ticks,
        }
    }

    /// Schedules `handle` for deletion and restarts the debounce window.
    pub fn enqueue(&self, handle: MessageHandle) {
        let mut state = self.lock();
        state.items.push(handle);
        state.countdown = self.debounce_ticks;
    }

    /// Advances the countdown by one tick, taking the pending batch once
    /// it has expired.
    pub fn tick(&self) -> Tick {
        let mut state = self.lock();
        if state.countdown > 0 {
            state.countdown -= 1;
            Tick::NotYetDue
        } else if state.items.is_empty() {
            Tick::Idle
        } else {
            Tick::Due(std::mem::take(&mut state.items))
        }
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The state is plain data that is never left half-updated, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn handle(message_id: i64) -> MessageHandle {
        MessageHandle {
            chat_id: -100,
            message_id,
        }
    }

    #[test]
    fn test_idle_when_empty() {
        let queue = DeletionQueue::new(2);
        assert_eq!(queue.tick(), Tick::Idle);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_flush_after_debounce() {
        let queue = DeletionQueue::new(2);
        queue.enqueue(handle(1));
        assert_eq!(queue.tick(), Tick::NotYetDue);
        assert_eq!(queue.tick(), Tick::NotYetDue);
        assert_eq!(queue.tick(), Tick::Due(vec![handle(1)]));
        assert_eq!(queue.tick(), Tick::Idle);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_burst_resets_countdown() {
        let queue = DeletionQueue::new(2);
        queue.enqueue(handle(1));
        queue.enqueue(handle(2));
        queue.enqueue(handle(3));
        assert_eq!(queue.tick(), Tick::NotYetDue);
        assert_eq!(queue.tick(), Tick::NotYetDue);
        assert_eq!(
            queue.tick(),
            Tick::Due(vec![handle(1), handle(2), handle(3)])
        );
    }

    #[test]
    fn test_enqueue_extends_window_not_accumulates() {
        let queue = DeletionQueue::new(2);
        queue.enqueue(handle(1));
        assert_eq!(queue.tick(), Tick::NotYetDue);
        // Countdown is back to 2, not 1 + 2.
        queue.enqueue(handle(2));
        assert_eq!(queue.tick(), Tick::NotYetDue);
        assert_eq!(queue.tick(), Tick::NotYetDue);
        assert_eq!(queue.tick(), Tick::Due(vec![handle(1), handle(2)]));
    }

    #[test]
    fn test_staggered_joins_flush_together() {
        // Joins between consecutive ticks: the sweep only happens once the
        // last join's own window has elapsed.
        let queue = DeletionQueue::new(2);
        queue.enqueue(handle(1));
        assert_eq!(queue.tick(), Tick::NotYetDue);
        queue.enqueue(handle(2));
        assert_eq!(queue.tick(), Tick::NotYetDue);
        queue.enqueue(handle(3));
        assert_eq!(queue.tick(), Tick::NotYetDue);
        assert_eq!(queue.tick(), Tick::NotYetDue);
        assert_eq!(
            queue.tick(),
            Tick::Due(vec![handle(1), handle(2), handle(3)])
        );
    }

    #[test]
    fn test_batches_are_never_repeated() {
        let queue = DeletionQueue::new(2);
        queue.enqueue(handle(1));
        queue.enqueue(handle(2));
        let first = loop {
            if let Tick::Due(batch) = queue.tick() {
                break batch;
            }
        };
        assert_eq!(first, vec![handle(1), handle(2)]);

        queue.enqueue(handle(3));
        let second = loop {
            if let Tick::Due(batch) = queue.tick() {
                break batch;
            }
        };
        assert_eq!(second, vec![handle(3)]);
    }

    #[test]
    fn test_zero_debounce_flushes_on_next_tick() {
        let queue = DeletionQueue::new(0);
        queue.enqueue(handle(7));
        assert_eq!(queue.tick(), Tick::Due(vec![handle(7)]));
    }

    #[test]
    fn test_concurrent_ticks_share_no_items() {
        let queue = Arc::new(DeletionQueue::new(0));
        for id in 0..1000 {
            queue.enqueue(handle(id));
        }

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || match queue.tick() {
                    Tick::Due(batch) => batch,
                    _ => Vec::new(),
                })
            })
            .collect();

        let mut flushed: Vec<i64> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .map(|h| h.message_id)
            .collect();
        flushed.sort_unstable();
        assert_eq!(flushed, (0..1000).collect::<Vec<_>>());
    }
}
