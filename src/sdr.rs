//! Sparse distributed representations.
//!
//! An [`Sdr`] is a fixed-length bit vector in which semantically similar
//! values produce overlapping bit patterns. Storage uses the `bitvec` crate
//! (`BitVec<u32, Lsb0>`), giving word-level popcounts for the overlap
//! operation.
//!
//! The integer encoder maps `i` to a run of `set` contiguous bits starting
//! at index `i` inside a vector of length `base + set`, so neighboring
//! integers overlap in `set - |distance|` positions.
//!
//! # Examples
//!
//! ```
//! use cortical::Sdr;
//!
//! let a = Sdr::encode(3, 16, 4).unwrap();
//! let b = Sdr::encode(5, 16, 4).unwrap();
//! assert_eq!(a.len(), 20);
//! assert_eq!(a.num_set(), 4);
//! assert_eq!(a.overlap(&b), 2);
//! ```

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

/// Fixed-length sparse bit vector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sdr {
    bits: BitVec<u32, Lsb0>,
}

impl Sdr {
    /// Create an all-zero SDR with `len` bits.
    #[inline]
    pub fn new(len: usize) -> Self {
        Self {
            bits: BitVec::repeat(false, len),
        }
    }

    /// Encode an integer as a run of `set` contiguous bits starting at
    /// index `value`, in a vector of length `base + set`.
    ///
    /// Returns `None` (and logs a diagnostic) when `value >= base`; callers
    /// must treat that as a no-op.
    pub fn encode(value: usize, base: usize, set: usize) -> Option<Self> {
        if value >= base {
            log::warn!("invalid integer for SDR encoding: {} (base {})", value, base);
            return None;
        }
        let mut sdr = Self::new(base + set);
        for b in value..value + set {
            sdr.bits.set(b, true);
        }
        Some(sdr)
    }

    /// Build an SDR from an iterator of bit values.
    pub fn from_bits<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }

    /// Total number of bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Whether the SDR has zero bits of storage.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Read the bit at `index`.
    ///
    /// An out-of-bounds probe is a non-fatal domain error: it logs a
    /// diagnostic and reads as unset.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        match self.bits.get(index) {
            Some(b) => *b,
            None => {
                log::warn!("invalid SDR bit index: {} (len {})", index, self.bits.len());
                false
            }
        }
    }

    /// Set the bit at `index`.
    ///
    /// Out of bounds logs a diagnostic and is a no-op.
    #[inline]
    pub fn set(&mut self, index: usize) {
        if index < self.bits.len() {
            self.bits.set(index, true);
        } else {
            log::warn!("invalid SDR bit index: {} (len {})", index, self.bits.len());
        }
    }

    /// Number of set bits.
    #[inline]
    pub fn num_set(&self) -> usize {
        self.bits.count_ones()
    }

    /// Indices of all set bits, ascending.
    pub fn get_acts(&self) -> Vec<usize> {
        self.bits.iter_ones().collect()
    }

    /// Count of positions set in both SDRs.
    ///
    /// Lengths may differ; only the common prefix is compared.
    pub fn overlap(&self, other: &Sdr) -> usize {
        let n = self.bits.len().min(other.bits.len());
        self.bits[..n].iter_ones().filter(|&i| other.bits[i]).count()
    }

    /// Bitwise union. The result has the length of the longer operand.
    pub fn union(&self, other: &Sdr) -> Sdr {
        let (long, short) = if self.bits.len() >= other.bits.len() {
            (&self.bits, &other.bits)
        } else {
            (&other.bits, &self.bits)
        };
        let mut out = long.clone();
        for i in short.iter_ones() {
            out.set(i, true);
        }
        Sdr { bits: out }
    }

    /// Concatenate several SDRs into one, in order.
    ///
    /// Used to assemble a downstream region's input from the predictive
    /// bitmaps of multiple upstream regions.
    pub fn concat(parts: &[Sdr]) -> Sdr {
        let mut bits = BitVec::with_capacity(parts.iter().map(|p| p.len()).sum());
        for part in parts {
            bits.extend_from_bitslice(&part.bits);
        }
        Sdr { bits }
    }
}
