use std::collections::VecDeque;

/// Bounded FIFO of pending items. Insertion order is delivery order.
///
/// `push_overwrite` sheds the oldest entry when full. `requeue_front` puts a
/// failed batch back ahead of newer items and then sheds from the tail, so
/// under a sustained outage the oldest unsent items are the ones kept.
#[derive(Debug)]
pub struct EventBuffer<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> EventBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);

        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `value`, returning the evicted oldest entry if the buffer was full.
    pub fn push_overwrite(&mut self, value: T) -> Option<T> {
        let evicted = if self.buf.len() >= self.capacity {
            self.buf.pop_front()
        } else {
            None
        };
        self.buf.push_back(value);
        evicted
    }

    /// Move every entry out, leaving the buffer empty.
    pub fn take_all(&mut self) -> Vec<T> {
        self.buf.drain(..).collect()
    }

    /// Prepend `batch` in its original order, then truncate to capacity from
    /// the tail. Returns how many entries were dropped.
    pub fn requeue_front(&mut self, batch: Vec<T>) -> usize {
        for value in batch.into_iter().rev() {
            self.buf.push_front(value);
        }

        let dropped = self.buf.len().saturating_sub(self.capacity);
        self.buf.truncate(self.capacity);
        dropped
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }
}
