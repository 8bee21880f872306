//! Fixed-capacity ring buffer used as the rolling input window during
//! recursive inference.

use crate::{MathError, Result};

/// A ring of exactly `capacity` values once seeded.
///
/// Pushing a value overwrites the oldest one; iteration always yields values
/// oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer {
    slots: Vec<f64>,
    head: usize,
}

impl RingBuffer {
    /// Seed the ring with `values`; its capacity becomes `values.len()`.
    pub fn seeded(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(MathError::InvalidInput(
                "Ring buffer capacity must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            slots: values.to_vec(),
            head: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Append `value` and evict the oldest entry, returning it.
    pub fn push(&mut self, value: f64) -> f64 {
        let evicted = std::mem::replace(&mut self.slots[self.head], value);
        self.head = (self.head + 1) % self.slots.len();
        evicted
    }

    /// Values oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &f64> + '_ {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_evicts_oldest() {
        let mut ring = RingBuffer::seeded(&[1.0, 2.0, 3.0]).unwrap();
        let contents = |ring: &RingBuffer| ring.iter().copied().collect::<Vec<_>>();
        assert_eq!(ring.push(4.0), 1.0);
        assert_eq!(contents(&ring), vec![2.0, 3.0, 4.0]);
        assert_eq!(ring.push(5.0), 2.0);
        assert_eq!(ring.push(6.0), 3.0);
        assert_eq!(contents(&ring), vec![4.0, 5.0, 6.0]);
        assert_eq!(ring.capacity(), 3);
    }

    #[test]
    fn test_empty_seed_rejected() {
        assert!(RingBuffer::seeded(&[]).is_err());
    }
}
