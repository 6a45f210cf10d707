//! Bounded handoff queue between the producing (row-reading) side and the
//! consuming (handler) thread.
//!
//! `put` blocks at capacity; that backpressure is what keeps a fast reader
//! from buffering an unbounded number of assembled batches ahead of a slow
//! consumer. `force_put` bypasses the bound so teardown messages get through
//! even when the queue is full.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        BoundedQueue {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Blocking insert; waits while the queue is at capacity.
    pub fn put(&self, item: T) {
        let mut items = self.items.lock();
        while items.len() >= self.capacity {
            self.not_full.wait(&mut items);
        }
        items.push_back(item);
        self.not_empty.notify_one();
    }

    /// Insert regardless of capacity. Teardown only.
    pub fn force_put(&self, item: T) {
        let mut items = self.items.lock();
        items.push_back(item);
        self.not_empty.notify_one();
    }

    /// Blocking remove; waits while the queue is empty.
    pub fn take(&self) -> T {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                self.not_full.notify_one();
                return item;
            }
            self.not_empty.wait(&mut items);
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn put_blocks_at_capacity_until_a_take() {
        let queue = BoundedQueue::new(2);
        queue.put(1);
        queue.put(2);
        let second_put_done = AtomicBool::new(false);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                queue.put(3);
                second_put_done.store(true, Ordering::SeqCst);
            });
            std::thread::sleep(Duration::from_millis(50));
            assert!(!second_put_done.load(Ordering::SeqCst));
            assert_eq!(queue.take(), 1);
        });
        assert!(second_put_done.load(Ordering::SeqCst));
        assert_eq!(queue.take(), 2);
        assert_eq!(queue.take(), 3);
    }

    #[test]
    fn force_put_ignores_the_bound() {
        let queue = BoundedQueue::new(1);
        queue.put("a");
        queue.force_put("b");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.take(), "a");
        assert_eq!(queue.take(), "b");
    }

    #[test]
    fn take_waits_for_an_item() {
        let queue: BoundedQueue<u32> = BoundedQueue::new(4);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(20));
                queue.put(7);
            });
            assert_eq!(queue.take(), 7);
        });
    }
}
