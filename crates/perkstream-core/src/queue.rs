//! # Outbound Queue
//!
//! Bounded FIFO for messages that could not be transmitted right away.
//!
//! ## Overflow Policy (drop-oldest)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  capacity = 3                                                           │
//! │                                                                         │
//! │  push(A) push(B) push(C)     [A, B, C]                                  │
//! │  push(D)                     [B, C, D]   ── A returned as evicted       │
//! │                                                                         │
//! │  front() ─► B   (next to transmit on reconnect)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::VecDeque;

use crate::message::Message;

/// Default number of messages held while offline.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Bounded FIFO of outbound messages.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    items: VecDeque<Message>,
    capacity: usize,
}

impl OutboundQueue {
    /// Creates a queue holding at most `capacity` messages (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        OutboundQueue {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a message, returning the evicted oldest entry if the queue was full.
    pub fn push(&mut self, message: Message) -> Option<Message> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(message);
        evicted
    }

    /// The next message to transmit.
    pub fn front(&self) -> Option<&Message> {
        self.items.front()
    }

    /// Removes and returns the next message.
    pub fn pop_front(&mut self) -> Option<Message> {
        self.items.pop_front()
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

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterates from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.items.iter()
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        OutboundQueue::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn numbered(n: usize) -> Message {
        Message::new("custom", json!({ "n": n }))
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = OutboundQueue::new(10);
        for n in 0..3 {
            assert!(queue.push(numbered(n)).is_none());
        }
        let order: Vec<_> = std::iter::from_fn(|| queue.pop_front())
            .map(|m| m.data["n"].as_u64().unwrap())
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_overflow_evicts_exactly_the_oldest() {
        let mut queue = OutboundQueue::default();
        let mut evicted = Vec::new();
        for n in 0..105 {
            if let Some(old) = queue.push(numbered(n)) {
                evicted.push(old.data["n"].as_u64().unwrap());
            }
            assert!(queue.len() <= queue.capacity());
        }

        assert_eq!(queue.len(), 100);
        assert_eq!(evicted, vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.front().unwrap().data["n"], 5);
        assert_eq!(queue.iter().last().unwrap().data["n"], 104);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut queue = OutboundQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.push(numbered(1));
        let evicted = queue.push(numbered(2)).unwrap();
        assert_eq!(evicted.data["n"], 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut queue = OutboundQueue::new(4);
        queue.push(numbered(1));
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.front().is_none());
    }
}
