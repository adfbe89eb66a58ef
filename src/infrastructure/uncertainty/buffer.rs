//! Bounded buffer of recent generations awaiting uncertainty selection

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// One successful generation with its raw output scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferedGeneration {
    pub prompt: String,
    pub output: String,
    pub logits: Vec<f32>,
}

#[derive(Debug)]
struct Ring {
    entries: VecDeque<BufferedGeneration>,
    dropped: u64,
}

/// Fixed-capacity ring of recent generations; the oldest entry is dropped when full
#[derive(Debug)]
pub struct UncertaintyBuffer {
    ring: Mutex<Ring>,
    capacity: usize,
}

impl UncertaintyBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity.min(4096)),
                dropped: 0,
            }),
            capacity,
        }
    }

    pub fn push(&self, prompt: impl Into<String>, output: impl Into<String>, logits: Vec<f32>) {
        if self.capacity == 0 {
            return;
        }

        let mut ring = self.lock();

        if ring.entries.len() == self.capacity {
            ring.entries.pop_front();
            ring.dropped += 1;
        }

        ring.entries.push_back(BufferedGeneration {
            prompt: prompt.into(),
            output: output.into(),
            logits,
        });
    }

    /// Copy of the buffered entries, oldest first
    pub fn snapshot(&self) -> Vec<BufferedGeneration> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Remove and return every buffered entry, oldest first
    pub fn drain(&self) -> Vec<BufferedGeneration> {
        self.lock().entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries overwritten before anyone read them
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for UncertaintyBuffer {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_snapshot() {
        let buffer = UncertaintyBuffer::new(4);
        buffer.push("p1", "o1", vec![1.0]);
        buffer.push("p2", "o2", vec![2.0]);

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].prompt, "p1");
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_oldest_dropped_when_full() {
        let buffer = UncertaintyBuffer::new(2);
        buffer.push("p1", "o1", vec![]);
        buffer.push("p2", "o2", vec![]);
        buffer.push("p3", "o3", vec![]);

        let prompts: Vec<String> = buffer.snapshot().into_iter().map(|g| g.prompt).collect();
        assert_eq!(prompts, vec!["p2", "p3"]);
        assert_eq!(buffer.dropped(), 1);
    }

    #[test]
    fn test_drain_empties_buffer() {
        let buffer = UncertaintyBuffer::new(2);
        buffer.push("p1", "o1", vec![]);

        assert_eq!(buffer.drain().len(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let buffer = UncertaintyBuffer::new(0);
        buffer.push("p1", "o1", vec![]);
        assert!(buffer.is_empty());
    }
}
