use std::cmp::min;
use std::ops::Index;

use crate::error::{AnalysisError, StorageKind};

/// Hash table of fixed-size byte slots.
///
/// Slots live back to back in one zero-filled arena. Every bucket holds the
/// index of the first slot in its chain, every slot holds the index of the next
/// one. Index 0 is the sentry: it never stores a state, so `0` doubles as the
/// end-of-chain marker.
pub struct StateTable {
    data: Vec<u8>,
    next: Vec<usize>,

    buckets: Vec<usize>,
    bitmask: u64,

    /// Length of a single slot in bytes.
    slot_size: usize,
    /// Maximum number of stored slots.
    capacity: usize,
    /// Number of occupied slots.
    len: usize,
}

impl StateTable {
    /// Create a new table holding up to `capacity` slots of `slot_size` bytes,
    /// with `2^min(bucket_bits, 16)` buckets.
    pub fn new(slot_size: usize, capacity: usize, bucket_bits: usize) -> Self {
        assert!(bucket_bits <= 31, "Bucket bits should be in the range 0..=31");

        let buckets_size = 1 << min(bucket_bits, 16);
        Self {
            data: vec![0; slot_size], // sentry
            next: vec![0],
            buckets: vec![0; buckets_size],
            bitmask: (buckets_size - 1) as u64,
            slot_size,
            capacity,
            len: 0,
        }
    }

    /// Get the capacity of the table.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// Get the number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Get the bytes stored at the given index.
    pub fn get(&self, index: usize) -> &[u8] {
        assert_ne!(index, 0, "Index is 0");
        assert!(index <= self.len, "Index {} is not occupied", index);
        &self.data[index * self.slot_size..(index + 1) * self.slot_size]
    }

    fn bucket_index(&self, hash: u64) -> usize {
        (hash & self.bitmask) as usize
    }

    /// Find the index of `bytes`, if present.
    pub fn try_find(&self, bytes: &[u8], hash: u64) -> Option<usize> {
        let mut index = self.buckets[self.bucket_index(hash)];
        while index != 0 {
            if self.get(index) == bytes {
                return Some(index);
            }
            index = self.next[index];
        }
        None
    }

    /// Append a new slot, without looking for duplicates.
    fn add(&mut self, bytes: &[u8]) -> Result<usize, AnalysisError> {
        if self.len >= self.capacity {
            return Err(AnalysisError::ResourceExhausted {
                kind: StorageKind::States,
                capacity: self.capacity,
            });
        }
        self.len += 1;
        self.data.extend_from_slice(bytes);
        self.next.push(0);
        Ok(self.len)
    }

    /// Put `bytes` into the table.
    ///
    /// Returns the index of the slot and whether it was newly created.
    pub fn put(&mut self, bytes: &[u8], hash: u64) -> Result<(usize, bool), AnalysisError> {
        assert_eq!(
            bytes.len(),
            self.slot_size,
            "State has {} bytes, table slots have {}",
            bytes.len(),
            self.slot_size
        );

        let bucket_index = self.bucket_index(hash);
        let mut index = self.buckets[bucket_index];

        if index == 0 {
            // Create new slot and put it into the bucket.
            let i = self.add(bytes)?;
            self.buckets[bucket_index] = i;
            return Ok((i, true));
        }

        loop {
            if self.get(index) == bytes {
                // The state already exists.
                return Ok((index, false));
            }

            let next = self.next[index];

            if next == 0 {
                // Create new slot and append it to the chain.
                let i = self.add(bytes)?;
                self.next[index] = i;
                return Ok((i, true));
            } else {
                index = next;
            }
        }
    }

    /// Remove all slots.
    pub fn clear(&mut self) {
        self.data.truncate(self.slot_size);
        self.data.fill(0);
        self.next.truncate(1);
        self.buckets.fill(0);
        self.len = 0;
    }

    /// Widen every slot by `extra` bytes.
    ///
    /// # Panics
    ///
    /// Panics if the table is not empty.
    pub fn grow(&mut self, extra: usize) {
        assert!(self.is_empty(), "Cannot grow a non-empty table");
        self.slot_size += extra;
        self.data = vec![0; self.slot_size];
    }
}

impl Index<usize> for StateTable {
    type Output = [u8];

    fn index(&self, index: usize) -> &Self::Output {
        self.get(index)
    }
}
