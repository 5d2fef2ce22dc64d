#![allow(clippy::non_canonical_partial_ord_impl)]

use std::{cmp::Reverse, collections::BinaryHeap};

use crate::time::Time;

// Only the key takes part in comparisons, so items never need to be ordered themselves. Equal
// times fall back to insertion order.
#[derive(Debug, derivative::Derivative)]
#[derivative(
    PartialEq(bound = ""),
    Eq(bound = ""),
    PartialOrd(bound = ""),
    Ord(bound = "")
)]
struct Entry<T> {
    key: Reverse<(Time, u64)>,
    #[derivative(PartialEq = "ignore", PartialOrd = "ignore", Ord = "ignore")]
    item: T,
}

/// A min-queue keyed by `(time, insertion sequence)`.
#[derive(Debug)]
pub(crate) struct TimedQueue<T> {
    inner: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T> Default for TimedQueue<T> {
    fn default() -> Self {
        Self {
            inner: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<T> TimedQueue<T> {
    pub(crate) fn push(&mut self, time: Time, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.inner.push(Entry {
            key: Reverse((time, seq)),
            item,
        });
    }

    pub(crate) fn pop(&mut self) -> Option<(Time, T)> {
        self.inner.pop().map(|e| (e.key.0 .0, e.item))
    }

    pub(crate) fn peek_time(&self) -> Option<Time> {
        self.inner.peek().map(|e| e.key.0 .0)
    }

    delegate::delegate! {
        to self.inner {
            pub(crate) fn is_empty(&self) -> bool;
            pub(crate) fn len(&self) -> usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_earliest_first() {
        let mut q = TimedQueue::default();
        q.push(Time::new(3), "c");
        q.push(Time::new(1), "a");
        q.push(Time::new(2), "b");
        assert_eq!(q.peek_time(), Some(Time::new(1)));
        assert_eq!(q.pop(), Some((Time::new(1), "a")));
        assert_eq!(q.pop(), Some((Time::new(2), "b")));
        assert_eq!(q.pop(), Some((Time::new(3), "c")));
        assert!(q.pop().is_none());
    }

    #[test]
    fn equal_times_are_fifo() {
        let mut q = TimedQueue::default();
        for i in 0..100 {
            q.push(Time::new(7), i);
        }
        let order = std::iter::from_fn(|| q.pop().map(|(_, i)| i)).collect::<Vec<_>>();
        assert_eq!(order, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn items_need_not_be_comparable() {
        struct Opaque;
        let mut q = TimedQueue::default();
        q.push(Time::ONE, Opaque);
        q.push(Time::ZERO, Opaque);
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop().map(|(t, _)| t), Some(Time::ZERO));
    }
}
