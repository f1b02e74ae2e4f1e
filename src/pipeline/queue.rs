//! Unbounded per-source FIFO between producers and drain loops.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Unbounded FIFO decoupling producer timing from persistence timing.
///
/// `push` never blocks on a consumer and never fails; memory grows with the
/// backlog. Any number of threads may push; one drain loop pops.
pub(crate) struct IngressQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> IngressQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends an item at the back.
    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
    }

    /// Removes the front item, if any. Never waits.
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Takes every queued item, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }

    /// Puts items back at the front, keeping their order ahead of anything
    /// pushed since they were taken.
    pub fn requeue(&self, items: Vec<T>) {
        let mut queue = self.items.lock();
        for item in items.into_iter().rev() {
            queue.push_front(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
