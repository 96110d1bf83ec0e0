use crate::error::{AnalysisError, StorageKind};

/// Small bounded buffer of states, searched linearly.
///
/// Holds the successors of a single state while they are being computed, so
/// that a model emitting the same successor twice only produces one entry.
/// The buffer is cleared before every expansion; a linear scan over a handful
/// of entries is faster than hashing them.
pub struct TemporaryStateStorage {
    data: Vec<u8>,
    slot_size: usize,
    capacity: usize,
    len: usize,
}

impl TemporaryStateStorage {
    pub fn new(slot_size: usize, capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(slot_size * capacity.min(64)),
            slot_size,
            capacity,
            len: 0,
        }
    }

    pub fn get(&self, index: usize) -> &[u8] {
        assert!(index < self.len, "Index {} is not occupied", index);
        &self.data[index * self.slot_size..(index + 1) * self.slot_size]
    }

    pub fn try_find(&self, bytes: &[u8]) -> Option<usize> {
        self.data
            .chunks_exact(self.slot_size)
            .position(|slot| slot == bytes)
    }

    /// Append `bytes` without looking for duplicates.
    pub fn push(&mut self, bytes: &[u8]) -> Result<usize, AnalysisError> {
        assert_eq!(bytes.len(), self.slot_size);
        if self.len >= self.capacity {
            return Err(AnalysisError::ResourceExhausted {
                kind: StorageKind::Successors,
                capacity: self.capacity,
            });
        }
        self.data.extend_from_slice(bytes);
        self.len += 1;
        Ok(self.len - 1)
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.len = 0;
    }
}
