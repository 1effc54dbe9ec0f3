//! Fixed-capacity history buffer.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// A FIFO that evicts its oldest entry once `capacity` is reached.
///
/// Deserializing clamps the capacity and keeps only the newest entries
/// that fit, so a hand-edited file cannot break the bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredRing<T>")]
pub struct RingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

/// Wire shape of a [`RingBuffer`] before its bound is enforced.
#[derive(Deserialize)]
struct StoredRing<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> From<StoredRing<T>> for RingBuffer<T> {
    fn from(stored: StoredRing<T>) -> Self {
        let mut ring = Self {
            capacity: stored.capacity,
            items: stored.items,
        };
        ring.resize(stored.capacity);
        ring
    }
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` items (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends `item`, returning the evicted entry if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let mut evicted = None;
        while self.items.len() >= self.capacity {
            evicted = self.items.pop_front();
        }
        self.items.push_back(item);
        evicted
    }

    /// Changes the capacity, dropping the oldest entries that no longer fit.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entries, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Newest entry.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copies the entries, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut ring = RingBuffer::with_capacity(3);
        assert_eq!(ring.push(1), None);
        ring.push(2);
        ring.push(3);
        assert_eq!(ring.push(4), Some(1));
        assert_eq!(ring.to_vec(), vec![2, 3, 4]);
        assert_eq!(ring.latest(), Some(&4));
    }

    #[test]
    fn test_resize_keeps_newest() {
        let mut ring = RingBuffer::with_capacity(5);
        for i in 0..5 {
            ring.push(i);
        }
        ring.resize(2);
        assert_eq!(ring.to_vec(), vec![3, 4]);
        assert_eq!(ring.capacity(), 2);
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        let mut ring = RingBuffer::with_capacity(0);
        ring.push("a");
        ring.push("b");
        assert_eq!(ring.to_vec(), vec!["b"]);
    }

    #[test]
    fn test_overfull_file_is_trimmed_on_load() {
        let mut ring: RingBuffer<u32> =
            serde_json::from_str(r#"{"capacity":2,"items":[1,2,3]}"#).unwrap();
        assert_eq!(ring.to_vec(), vec![2, 3]);
        for i in 10..20 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.to_vec(), vec![18, 19]);
    }

    #[test]
    fn test_zero_capacity_file_clamps_to_one() {
        let mut ring: RingBuffer<u32> =
            serde_json::from_str(r#"{"capacity":0,"items":[]}"#).unwrap();
        ring.push(1);
        ring.push(2);
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.to_vec(), vec![2]);
    }
}
