use std::collections::VecDeque;

use crate::locking::Mutex;

/// An entry in a [`PriorityActionQueue`], ordered by `(band, id)`.
///
/// Lower bands are served first; within the same band, lower ids (earlier-created actions) are
/// served first. This mirrors `PriorityQueue((priority, action))` in the original dispatcher,
/// where `BaseAction.__lt__` compares by id.
struct Entry<T> {
    band: i32,
    id: u64,
    item: T,
}

/// A priority queue of actions, ordered by `(band, id)`.
///
/// Backs `immediate_q` and `series_q`. Unlike a plain binary-heap priority queue, this type
/// exposes [`PriorityActionQueue::pop_front_if`], which peeks and conditionally removes the head
/// under a single lock acquisition. A worker uses this to decide whether it is allowed to take the
/// head action (e.g. it must not dequeue a standard action while suspended) without a separate
/// peek-then-pop pair that could race against another worker.
pub struct PriorityActionQueue<T> {
    data: Mutex<VecDeque<Entry<T>>>,
}

impl<T> Default for PriorityActionQueue<T> {
    fn default() -> Self {
        Self {
            data: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> PriorityActionQueue<T> {
    /// Creates a new, empty queue
    pub fn new() -> Self {
        Self::default()
    }
    /// Inserts an item at the position dictated by `(band, id)`
    pub fn push(&self, band: i32, id: u64, item: T) {
        let mut data = self.data.lock();
        let pos = data
            .iter()
            .position(|e| (e.band, e.id) > (band, id))
            .unwrap_or(data.len());
        data.insert(pos, Entry { band, id, item });
    }
    /// Removes and returns the head item if `predicate` accepts it, atomically.
    ///
    /// The predicate is evaluated under the same lock that guards the removal, so a caller can
    /// safely implement "dequeue only if it's not a standard action while paused" without a
    /// separate peek call.
    pub fn pop_front_if<F>(&self, predicate: F) -> Option<T>
    where
        F: FnOnce(&T) -> bool,
    {
        let mut data = self.data.lock();
        if data.front().map(|e| predicate(&e.item)).unwrap_or(false) {
            data.pop_front().map(|e| e.item)
        } else {
            None
        }
    }
    /// Returns the number of queued items
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }
    /// Returns true if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }
    /// Removes and returns every queued item, in order, clearing the queue.
    ///
    /// Used by `stop_dispatcher` to discard anything still pending once shutdown has been
    /// requested.
    pub fn drain(&self) -> Vec<T> {
        self.data.lock().drain(..).map(|e| e.item).collect()
    }
}

impl<T: Clone> PriorityActionQueue<T> {
    /// Returns a clone of the head item without removing it
    pub fn peek(&self) -> Option<T> {
        self.data.lock().front().map(|e| e.item.clone())
    }
    /// Returns clones of every queued item, in order, without removing them.
    ///
    /// Backs the queue-contents observable view (spec §4.6).
    pub fn snapshot(&self) -> Vec<T> {
        self.data.lock().iter().map(|e| e.item.clone()).collect()
    }
}

/// A plain FIFO staging queue, used for `demand_q`.
///
/// Actions pushed here sit until [`DemandQueue::drain`] moves them onto the immediate queue (see
/// `Dispatcher::start_demand_queue`); unlike `immediate_q`/`series_q` there is no priority
/// ordering, matching the original's plain `queue.Queue`.
pub struct DemandQueue<T> {
    data: Mutex<VecDeque<T>>,
}

impl<T> Default for DemandQueue<T> {
    fn default() -> Self {
        Self {
            data: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> DemandQueue<T> {
    /// Creates a new, empty demand queue
    pub fn new() -> Self {
        Self::default()
    }
    /// Appends an item to the back of the queue
    pub fn push(&self, item: T) {
        self.data.lock().push_back(item);
    }
    /// Removes and returns the item at the front of the queue, if any.
    ///
    /// `Dispatcher::start_demand_queue` pops one at a time (rather than draining in bulk) so it
    /// can emit a `contents-changed` notification after each removal, per spec §4.2.
    pub fn pop_front(&self) -> Option<T> {
        self.data.lock().pop_front()
    }
    /// Removes and returns every queued item, in FIFO order, clearing the queue
    pub fn drain(&self) -> Vec<T> {
        self.data.lock().drain(..).collect()
    }
    /// Returns the number of queued items
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }
    /// Returns true if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }
}

impl<T: Clone> DemandQueue<T> {
    /// Returns a clone of every queued item, in order, without removing them.
    ///
    /// Backs the queue-contents observable view (spec §4.6).
    pub fn snapshot(&self) -> Vec<T> {
        self.data.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod test {
    use super::{DemandQueue, PriorityActionQueue};

    #[test]
    fn test_priority_and_id_ordering() {
        let q = PriorityActionQueue::new();
        q.push(2, 1, "a");
        q.push(0, 2, "b");
        q.push(2, 0, "c");
        q.push(-5, 3, "d");
        // order should be: band -5 first, then band 0, then band 2 sorted by id (0 before 1)
        assert_eq!(q.drain(), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_pop_front_if_is_atomic_and_conditional() {
        let q = PriorityActionQueue::new();
        q.push(2, 0, 10);
        assert_eq!(q.pop_front_if(|v| *v == 99), None);
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_front_if(|v| *v == 10), Some(10));
        assert!(q.is_empty());
    }

    #[test]
    fn test_peek_does_not_remove() {
        let q = PriorityActionQueue::new();
        q.push(2, 0, "x");
        assert_eq!(q.peek(), Some("x"));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_demand_queue_fifo() {
        let q = DemandQueue::new();
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.drain(), vec![1, 2, 3]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_demand_queue_pop_front_and_snapshot() {
        let q = DemandQueue::new();
        q.push(1);
        q.push(2);
        assert_eq!(q.snapshot(), vec![1, 2]);
        assert_eq!(q.pop_front(), Some(1));
        assert_eq!(q.snapshot(), vec![2]);
        assert_eq!(q.pop_front(), Some(2));
        assert_eq!(q.pop_front(), None);
    }
}
