//! Concurrent, capacity-bounded state storage.
//!
//! [`StateStorage`] deduplicates the states of one traversal run. It is split
//! into shards, each a [`StateTable`] behind its own lock; the shard of a state
//! is derived from the hash of its bytes, so equal states always meet in the same
//! shard and [`StateStorage::add`] is a single atomic check-then-insert. A global
//! counter enforces the capacity across all shards.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use parking_lot::Mutex;

use crate::error::{AnalysisError, StorageKind};
use crate::state::{StateIndex, StateVector};
use crate::table::StateTable;
use crate::utils::hash_bytes;

/// Largest supported number of stored states.
pub const MAX_CAPACITY: usize = 1 << 30;

/// Outcome of [`StateStorage::add`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Added {
    /// The state was not stored before.
    New(StateIndex),
    /// An equal state was already stored.
    Existing(StateIndex),
}

impl Added {
    pub fn index(self) -> StateIndex {
        match self {
            Added::New(i) | Added::Existing(i) => i,
        }
    }

    pub fn is_new(self) -> bool {
        matches!(self, Added::New(_))
    }
}

pub struct StateStorage {
    shards: Box<[Mutex<StateTable>]>,
    shard_bits: u32,
    model_size: usize,
    extra_size: usize,
    capacity: usize,
    len: AtomicUsize,
}

impl StateStorage {
    /// Create a storage for states of `model_size` bytes.
    ///
    /// The number of shards is rounded up to a power of two.
    pub fn new(model_size: usize, capacity: usize, shards: usize) -> Self {
        assert!(
            capacity <= MAX_CAPACITY,
            "Maximum supported capacity is {}",
            MAX_CAPACITY
        );

        let shard_count = shards.max(1).next_power_of_two();
        let shard_bits = shard_count.trailing_zeros();
        // Enough buckets for the whole capacity, spread over all shards.
        let bucket_bits = (capacity.max(1).next_power_of_two().trailing_zeros())
            .saturating_sub(shard_bits) as usize;

        debug!(
            "StateStorage::new(model_size = {}, capacity = {}, shards = {})",
            model_size, capacity, shard_count
        );

        Self {
            shards: (0..shard_count)
                .map(|_| Mutex::new(StateTable::new(model_size, capacity, bucket_bits)))
                .collect(),
            shard_bits,
            model_size,
            extra_size: 0,
            capacity,
            len: AtomicUsize::new(0),
        }
    }

    /// Length of a stored vector: the model's bytes plus traversal bytes.
    pub fn vector_size(&self) -> usize {
        self.model_size + self.extra_size
    }
    /// Length of the model's part of a stored vector.
    pub fn model_size(&self) -> usize {
        self.model_size
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// Number of stored states.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A zero-filled scratch vector of the current vector size.
    pub fn allocate_candidate(&self) -> StateVector {
        StateVector::zeroed(self.vector_size())
    }

    fn shard_of(&self, hash: u64) -> usize {
        if self.shard_bits == 0 {
            0
        } else {
            (hash >> (64 - self.shard_bits)) as usize
        }
    }

    fn encode(&self, shard: usize, local: usize) -> StateIndex {
        StateIndex::new(((local as u64) << self.shard_bits) | shard as u64)
    }

    fn decode(&self, index: StateIndex) -> (usize, usize) {
        let raw = index.get();
        let shard = (raw & ((1 << self.shard_bits) - 1)) as usize;
        (shard, (raw >> self.shard_bits) as usize)
    }

    /// Find the handle of `bytes`, if stored.
    pub fn try_find(&self, bytes: &[u8]) -> Option<StateIndex> {
        let hash = hash_bytes(bytes);
        let shard = self.shard_of(hash);
        let local = self.shards[shard].lock().try_find(bytes, hash)?;
        Some(self.encode(shard, local))
    }

    /// Store `bytes` unless an equal state is already stored.
    pub fn add(&self, bytes: &[u8]) -> Result<Added, AnalysisError> {
        let hash = hash_bytes(bytes);
        let shard = self.shard_of(hash);
        let mut table = self.shards[shard].lock();

        if let Some(local) = table.try_find(bytes, hash) {
            return Ok(Added::Existing(self.encode(shard, local)));
        }

        // Reserve a slot of the global capacity while holding the shard lock.
        if self.len.fetch_add(1, Ordering::AcqRel) >= self.capacity {
            self.len.fetch_sub(1, Ordering::AcqRel);
            return Err(AnalysisError::ResourceExhausted {
                kind: StorageKind::States,
                capacity: self.capacity,
            });
        }

        let (local, inserted) = table.put(bytes, hash)?;
        debug_assert!(inserted);
        Ok(Added::New(self.encode(shard, local)))
    }

    /// Store `bytes`, returning its handle whether or not it was new.
    pub fn insert(&self, bytes: &[u8]) -> Result<StateIndex, AnalysisError> {
        self.add(bytes).map(Added::index)
    }

    /// Copy of the stored vector behind `index`.
    pub fn get(&self, index: StateIndex) -> StateVector {
        let (shard, local) = self.decode(index);
        StateVector::from_bytes(self.shards[shard].lock().get(local))
    }

    /// Remove all states.
    pub fn reset(&mut self) {
        for shard in self.shards.iter_mut() {
            shard.get_mut().clear();
        }
        *self.len.get_mut() = 0;
    }

    /// Widen every vector by `extra` traversal bytes appended to the model's.
    ///
    /// # Panics
    ///
    /// Panics if the storage is not empty.
    pub fn grow(&mut self, extra: usize) {
        assert!(self.is_empty(), "Cannot grow a non-empty storage");
        for shard in self.shards.iter_mut() {
            shard.get_mut().grow(extra);
        }
        self.extra_size += extra;
    }
}
