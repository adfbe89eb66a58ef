//! Fixed-size latency window

/// Ring buffer holding the most recent latency samples
#[derive(Debug, Clone)]
pub struct LatencyReservoir {
    samples: Vec<u64>,
    capacity: usize,
    next: usize,
}

impl LatencyReservoir {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            samples: Vec::with_capacity(capacity.min(4096)),
            capacity,
            next: 0,
        }
    }

    /// Add a sample, overwriting the oldest once full
    pub fn push(&mut self, sample: u64) {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        } else {
            self.samples[self.next] = sample;
        }

        self.next = (self.next + 1) % self.capacity;
    }

    /// Samples currently in the window, unordered
    pub fn samples(&self) -> &[u64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_up_to_capacity() {
        let mut reservoir = LatencyReservoir::new(3);
        reservoir.push(10);
        reservoir.push(20);

        assert_eq!(reservoir.len(), 2);
        assert_eq!(reservoir.samples(), &[10, 20]);
    }

    #[test]
    fn test_overwrites_oldest_when_full() {
        let mut reservoir = LatencyReservoir::new(3);
        for sample in [1, 2, 3, 4, 5] {
            reservoir.push(sample);
        }

        let mut samples = reservoir.samples().to_vec();
        samples.sort_unstable();
        assert_eq!(samples, vec![3, 4, 5]);
        assert_eq!(reservoir.len(), 3);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut reservoir = LatencyReservoir::new(0);
        reservoir.push(7);
        reservoir.push(8);

        assert_eq!(reservoir.capacity(), 1);
        assert_eq!(reservoir.samples(), &[8]);
    }
}
