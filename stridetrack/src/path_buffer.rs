//! # Path Buffer
//!
//! A fixed-capacity ring buffer for a run's accepted GPS points.
//! Once full, each push overwrites the oldest slot in O(1) instead of
//! shifting or re-truncating a list.
//!
//! The buffer serializes as a plain JSON array ordered oldest to newest,
//! which is the shape the persisted run document has always used.

use std::fmt;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_PATH_CAPACITY;

/// Ring buffer keeping the most recent `capacity` items in insertion order.
#[derive(Clone)]
pub struct PathBuffer<T> {
    capacity: usize,
    items: Vec<T>,
    /// Slot holding the oldest item once the buffer is full; 0 until then.
    head: usize,
}

impl<T> PathBuffer<T> {
    /// Create an empty buffer holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: Vec::with_capacity(capacity.min(DEFAULT_PATH_CAPACITY)),
            head: 0,
        }
    }

    /// Build a buffer from items ordered oldest to newest, keeping the
    /// most recent `capacity` of them.
    pub fn from_vec(mut items: Vec<T>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        if items.len() > capacity {
            items.drain(..items.len() - capacity);
        }
        Self {
            capacity,
            items,
            head: 0,
        }
    }

    /// Append an item, evicting the oldest if at capacity.
    /// Returns the evicted item, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.items.len() < self.capacity {
            self.items.push(item);
            return None;
        }
        let evicted = std::mem::replace(&mut self.items[self.head], item);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    /// The most recently pushed item.
    pub fn last(&self) -> Option<&T> {
        if self.items.is_empty() {
            return None;
        }
        let newest = (self.head + self.items.len() - 1) % self.items.len();
        self.items.get(newest)
    }

    /// The oldest retained item.
    pub fn first(&self) -> Option<&T> {
        self.items.get(self.head)
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let (newer, older) = self.items.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// Remove all items, keeping the capacity.
    pub fn clear(&mut self) {
        self.items.clear();
        self.head = 0;
    }

    /// Change the capacity, dropping the oldest items if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        if capacity.max(1) == self.capacity {
            return;
        }
        let items = std::mem::take(self).into_vec();
        *self = Self::from_vec(items, capacity);
    }

    /// Consume the buffer, returning its items oldest to newest.
    pub fn into_vec(mut self) -> Vec<T> {
        self.items.rotate_left(self.head);
        self.items
    }
}

impl<T: Clone> PathBuffer<T> {
    /// Copy the items out, oldest to newest.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T> Default for PathBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_CAPACITY)
    }
}

impl<T: PartialEq> PartialEq for PathBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.capacity == other.capacity
            && self.items.len() == other.items.len()
            && self.iter().eq(other.iter())
    }
}

impl<T: fmt::Debug> fmt::Debug for PathBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.items.len())
            .field("last", &self.last())
            .finish()
    }
}

impl<T: Serialize> Serialize for PathBuffer<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for PathBuffer<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        Ok(Self::from_vec(items, DEFAULT_PATH_CAPACITY))
    }
}
