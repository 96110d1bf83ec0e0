//! Serialized model states.
//!
//! A model state is a fixed-length byte vector produced by the model itself.
//! Two states are the same state if and only if their bytes are equal, which is
//! why fresh vectors are always zero-filled: bytes a model does not write stay
//! deterministic.
//!
//! Models never get raw buffers. They read states through [`StateView`] (or any
//! [`ReadState`]) and write successors through the typed setters of
//! [`StateVector`]. All multi-byte values are little-endian.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle of a state stored in a [`StateStorage`][crate::storage::StateStorage].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct StateIndex(u64);

impl StateIndex {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Return the internal representation of the handle.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StateIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Read accessors shared by owned vectors and borrowed views.
pub trait ReadState {
    fn bytes(&self) -> &[u8];

    fn get_u8(&self, offset: usize) -> u8 {
        self.bytes()[offset]
    }
    fn get_bool(&self, offset: usize) -> bool {
        self.get_u8(offset) != 0
    }
    fn get_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes(read_array(self.bytes(), offset))
    }
    fn get_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(read_array(self.bytes(), offset))
    }
    fn get_i32(&self, offset: usize) -> i32 {
        i32::from_le_bytes(read_array(self.bytes(), offset))
    }
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

/// An owned, fixed-length state vector.
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct StateVector(Box<[u8]>);

impl StateVector {
    /// Creates a zero-filled vector of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self(vec![0; len].into_boxed_slice())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn view(&self) -> StateView<'_> {
        StateView(&self.0)
    }

    pub fn set_u8(&mut self, offset: usize, value: u8) {
        self.0[offset] = value;
    }
    pub fn set_bool(&mut self, offset: usize, value: bool) {
        self.0[offset] = value as u8;
    }
    pub fn set_u16(&mut self, offset: usize, value: u16) {
        self.0[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }
    pub fn set_u32(&mut self, offset: usize, value: u32) {
        self.0[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
    pub fn set_i32(&mut self, offset: usize, value: i32) {
        self.0[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

impl ReadState for StateVector {
    fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateVector({})", self.view())
    }
}

/// A borrowed, read-only view of a state.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct StateView<'a>(&'a [u8]);

impl<'a> StateView<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Restricts the view to its first `len` bytes.
    pub fn prefix(self, len: usize) -> StateView<'a> {
        StateView(&self.0[..len])
    }

    pub fn to_vector(self) -> StateVector {
        StateVector::from_bytes(self.0)
    }
}

impl ReadState for StateView<'_> {
    fn bytes(&self) -> &[u8] {
        self.0
    }
}

impl fmt::Display for StateView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for StateView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateView({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed() {
        let s = StateVector::zeroed(5);
        assert_eq!(s.as_bytes(), &[0, 0, 0, 0, 0]);
        assert_eq!(s.len(), 5);
    }

    #[test]
    fn test_typed_accessors() {
        let mut s = StateVector::zeroed(12);
        s.set_bool(0, true);
        s.set_u8(1, 200);
        s.set_u16(2, 0xBEEF);
        s.set_u32(4, 0xDEAD_BEEF);
        s.set_i32(8, -42);

        let v = s.view();
        assert!(v.get_bool(0));
        assert_eq!(v.get_u8(1), 200);
        assert_eq!(v.get_u16(2), 0xBEEF);
        assert_eq!(v.get_u32(4), 0xDEAD_BEEF);
        assert_eq!(v.get_i32(8), -42);
        assert_eq!(&s.as_bytes()[2..4], &[0xEF, 0xBE]);
    }

    #[test]
    fn test_same_logical_state_same_bytes() {
        let mut a = StateVector::zeroed(4);
        let mut b = StateVector::zeroed(4);
        b.set_u32(0, 0x1234_5678);
        b.set_u32(0, 0);
        a.set_u8(3, 7);
        b.set_u8(3, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_view_prefix() {
        let s = StateVector::from_bytes(&[1, 2, 3, 4]);
        let p = s.view().prefix(2);
        assert_eq!(p.bytes(), &[1, 2]);
        assert_eq!(p.to_vector(), StateVector::from_bytes(&[1, 2]));
        assert_eq!(s.view().to_string(), "01020304");
    }

    #[test]
    #[should_panic]
    fn test_out_of_bounds() {
        let s = StateVector::zeroed(2);
        s.view().get_u32(0);
    }
}
