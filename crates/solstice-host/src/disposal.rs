//! Grace-period disposal queue for hot-swapped instances.

use std::collections::VecDeque;
use std::time::Instant;

/// Ordered batches of retired items awaiting expiry of their grace
/// period. Deadlines are monotonically non-decreasing because batches
/// are appended with `now + grace`.
#[derive(Debug)]
pub struct DisposalQueue<T> {
    batches: VecDeque<(Instant, Vec<T>)>,
}

impl<T> DisposalQueue<T> {
    pub fn new() -> Self {
        Self {
            batches: VecDeque::new(),
        }
    }

    /// Append a batch with the given deadline.
    pub fn push(&mut self, deadline: Instant, items: Vec<T>) {
        if !items.is_empty() {
            self.batches.push_back((deadline, items));
        }
    }

    /// Remove and return every item whose deadline is at or before
    /// `now`. Items past their deadline are never returned early.
    pub fn drain_expired(&mut self, now: Instant) -> Vec<T> {
        let mut expired = Vec::new();
        while self
            .batches
            .front()
            .is_some_and(|(deadline, _)| *deadline <= now)
        {
            if let Some((_, mut items)) = self.batches.pop_front() {
                expired.append(&mut items);
            }
        }
        expired
    }

    /// Remove and return everything regardless of deadline; used at
    /// shutdown.
    pub fn drain_all(&mut self) -> Vec<T> {
        let mut all = Vec::new();
        while let Some((_, mut items)) = self.batches.pop_front() {
            all.append(&mut items);
        }
        all
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.batches.iter().map(|(_, items)| items.len()).sum()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl<T> Default for DisposalQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn items_are_held_until_their_deadline() {
        let mut queue = DisposalQueue::new();
        let now = Instant::now();

        queue.push(now + Duration::from_secs(30), vec!["v1"]);
        assert_eq!(queue.len(), 1);

        // Not yet.
        assert!(queue.drain_expired(now + Duration::from_secs(29)).is_empty());
        assert_eq!(queue.len(), 1);

        // At the deadline.
        assert_eq!(queue.drain_expired(now + Duration::from_secs(30)), vec!["v1"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn only_expired_batches_drain() {
        let mut queue = DisposalQueue::new();
        let now = Instant::now();

        queue.push(now + Duration::from_secs(10), vec!["old"]);
        queue.push(now + Duration::from_secs(20), vec!["newer"]);

        let drained = queue.drain_expired(now + Duration::from_secs(15));
        assert_eq!(drained, vec!["old"]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn drain_all_ignores_deadlines() {
        let mut queue = DisposalQueue::new();
        let now = Instant::now();

        queue.push(now + Duration::from_secs(60), vec!["a", "b"]);
        queue.push(now + Duration::from_secs(120), vec!["c"]);

        let mut drained = queue.drain_all();
        drained.sort();
        assert_eq!(drained, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn empty_batches_are_not_queued() {
        let mut queue: DisposalQueue<&str> = DisposalQueue::new();
        queue.push(Instant::now(), Vec::new());
        assert!(queue.is_empty());
    }
}
