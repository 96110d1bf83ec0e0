//! Faults and fault sets.
//!
//! A model declares its faults once, as a dense list indexed by [`FaultId`].
//! Every analysis refers to faults through these identifiers; sets of faults are
//! represented by [`FaultSet`], a compact bit set over fault identifiers that is
//! cheap to hash, compare and test for inclusion.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A fault identifier (0-indexed position in the model's fault list).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct FaultId(u32);

impl FaultId {
    pub const fn new(id: u32) -> Self {
        FaultId(id)
    }

    /// Returns the raw identifier.
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns the identifier as an index into the model's fault list.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

impl From<u32> for FaultId {
    fn from(id: u32) -> Self {
        FaultId(id)
    }
}

/// How a fault may behave during a traversal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub enum ActivationMode {
    /// The fault occurs at every opportunity.
    Forced,
    /// The fault never occurs.
    Suppressed,
    /// The fault may or may not occur.
    #[default]
    Nondeterministic,
}

/// A fault declared by a model.
///
/// The declared [`ActivationMode`] scopes the safety analysis: suppressed faults
/// are left out of the analysis entirely, forced faults are assumed to be part
/// of every fault set that gets checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    id: FaultId,
    name: String,
    activation: ActivationMode,
    probability: f64,
}

impl Fault {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: FaultId(id),
            name: name.into(),
            activation: ActivationMode::Nondeterministic,
            probability: 0.0,
        }
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = probability;
        self
    }

    pub fn with_activation(mut self, activation: ActivationMode) -> Self {
        self.activation = activation;
        self
    }

    pub fn id(&self) -> FaultId {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn activation(&self) -> ActivationMode {
        self.activation
    }
    /// Probability that the fault occurs at a single opportunity.
    pub fn probability(&self) -> f64 {
        self.probability
    }
}

/// An immutable-by-value set of fault identifiers.
///
/// The backing words never carry trailing zero words, so the derived equality
/// and hash only depend on the members of the set.
#[derive(Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<FaultId>", into = "Vec<FaultId>")]
pub struct FaultSet {
    words: Vec<u64>,
}

impl FaultSet {
    /// Number of bits per word.
    const BITS_PER_WORD: usize = 64;

    /// Creates the empty set.
    pub fn empty() -> Self {
        Self { words: Vec::new() }
    }

    /// Creates a set holding the first `count` fault identifiers.
    pub fn full(count: usize) -> Self {
        (0..count as u32).map(FaultId).collect()
    }

    pub fn singleton(id: FaultId) -> Self {
        let mut set = Self::empty();
        set.insert(id);
        set
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        (index / Self::BITS_PER_WORD, index % Self::BITS_PER_WORD)
    }

    fn normalize(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }

    /// Returns the number of faults in the set.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn contains(&self, id: FaultId) -> bool {
        let (word, bit) = Self::word_and_bit(id.index());
        self.words.get(word).is_some_and(|&w| w & (1 << bit) != 0)
    }

    /// Adds a fault. Returns true if the fault was not previously present.
    pub fn insert(&mut self, id: FaultId) -> bool {
        let (word, bit) = Self::word_and_bit(id.index());
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let was_clear = self.words[word] & (1 << bit) == 0;
        self.words[word] |= 1 << bit;
        was_clear
    }

    /// Removes a fault. Returns true if the fault was present.
    pub fn remove(&mut self, id: FaultId) -> bool {
        let (word, bit) = Self::word_and_bit(id.index());
        if word >= self.words.len() {
            return false;
        }
        let was_set = self.words[word] & (1 << bit) != 0;
        self.words[word] &= !(1 << bit);
        self.normalize();
        was_set
    }

    /// Returns a copy of this set with `id` added.
    pub fn with(&self, id: FaultId) -> Self {
        let mut set = self.clone();
        set.insert(id);
        set
    }

    pub fn union(&self, other: &Self) -> Self {
        let (long, short) = if self.words.len() >= other.words.len() {
            (self, other)
        } else {
            (other, self)
        };
        let mut words = long.words.clone();
        for (w, o) in words.iter_mut().zip(&short.words) {
            *w |= o;
        }
        Self { words }
    }

    pub fn intersection(&self, other: &Self) -> Self {
        let mut set = Self {
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| a & b)
                .collect(),
        };
        set.normalize();
        set
    }

    pub fn difference(&self, other: &Self) -> Self {
        let mut set = Self {
            words: self
                .words
                .iter()
                .enumerate()
                .map(|(i, w)| w & !other.words.get(i).copied().unwrap_or(0))
                .collect(),
        };
        set.normalize();
        set
    }

    /// Checks whether every member of `self` is a member of `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.words.len() <= other.words.len()
            && self.words.iter().zip(&other.words).all(|(a, b)| a & !b == 0)
    }

    pub fn is_proper_subset(&self, other: &Self) -> bool {
        self.is_subset(other) && self != other
    }

    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Iterates over the members in ascending order.
    pub fn iter(&self) -> FaultSetIter<'_> {
        FaultSetIter {
            set: self,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }

    /// Names of the members, in ascending identifier order.
    pub fn names<'a>(&self, faults: &'a [Fault]) -> Vec<&'a str> {
        self.iter()
            .filter_map(|id| faults.get(id.index()).map(|f| f.name()))
            .collect()
    }

    /// Number of bytes needed to encode a set over `fault_count` faults.
    pub fn encoded_len(fault_count: usize) -> usize {
        fault_count.div_ceil(8)
    }

    /// Writes the set as a little-endian bit mask into `out`.
    ///
    /// # Panics
    ///
    /// Panics if a member does not fit into `out`.
    pub fn write_bytes(&self, out: &mut [u8]) {
        out.fill(0);
        for id in self.iter() {
            let (byte, bit) = (id.index() / 8, id.index() % 8);
            assert!(byte < out.len(), "Fault {} does not fit into the mask", id);
            out[byte] |= 1 << bit;
        }
    }

    /// Reads a set previously written by [`FaultSet::write_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut set = Self::empty();
        for (i, &byte) in bytes.iter().enumerate() {
            for bit in 0..8 {
                if byte & (1 << bit) != 0 {
                    set.insert(FaultId((i * 8 + bit) as u32));
                }
            }
        }
        set
    }
}

impl fmt::Debug for FaultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for FaultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, id) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", id)?;
        }
        write!(f, "}}")
    }
}

/// Orders sets by cardinality first, then lexicographically by members.
impl Ord for FaultSet {
    fn cmp(&self, other: &Self) -> Ordering {
        self.len()
            .cmp(&other.len())
            .then_with(|| self.iter().cmp(other.iter()))
    }
}

impl PartialOrd for FaultSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromIterator<FaultId> for FaultSet {
    fn from_iter<I: IntoIterator<Item = FaultId>>(iter: I) -> Self {
        let mut set = Self::empty();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl From<Vec<FaultId>> for FaultSet {
    fn from(ids: Vec<FaultId>) -> Self {
        ids.into_iter().collect()
    }
}

impl From<FaultSet> for Vec<FaultId> {
    fn from(set: FaultSet) -> Self {
        set.iter().collect()
    }
}

impl<'a> IntoIterator for &'a FaultSet {
    type Item = FaultId;
    type IntoIter = FaultSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the members of a [`FaultSet`].
pub struct FaultSetIter<'a> {
    set: &'a FaultSet,
    word_idx: usize,
    current_word: u64,
}

impl Iterator for FaultSetIter<'_> {
    type Item = FaultId;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1;
                return Some(FaultId((self.word_idx * FaultSet::BITS_PER_WORD + bit) as u32));
            }
            self.word_idx += 1;
            if self.word_idx >= self.set.words.len() {
                return None;
            }
            self.current_word = self.set.words[self.word_idx];
        }
    }
}

/// Iterates over all `k`-element subsets of `ids` in lexicographic order.
pub fn combinations(ids: &[FaultId], k: usize) -> Combinations<'_> {
    Combinations {
        ids,
        indices: (0..k).collect(),
        done: k > ids.len(),
    }
}

/// Iterator produced by [`combinations`].
pub struct Combinations<'a> {
    ids: &'a [FaultId],
    indices: Vec<usize>,
    done: bool,
}

impl Iterator for Combinations<'_> {
    type Item = FaultSet;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let current = self.indices.iter().map(|&i| self.ids[i]).collect();

        // Advance to the next combination.
        let n = self.ids.len();
        let k = self.indices.len();
        match (0..k).rev().find(|&i| self.indices[i] != i + n - k) {
            Some(i) => {
                self.indices[i] += 1;
                for j in i + 1..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
            }
            None => self.done = true,
        }

        Some(current)
    }
}
