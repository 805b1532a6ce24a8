//! Dense, fixed-size bit-vectors.
//!
//! A [`BitVector`] is a set of small integers `0 .. len` stored one bit per element in `u64`
//! words. Its length is chosen when it is created, and bulk operations work a word at a time,
//! which is where iterative dataflow analyses spend most of their time.
//!
//! Indexing past the length is a programming error and panics.

#![deny(missing_docs)]

use core::fmt;
use core::slice;
#[cfg(feature = "enable-serde")]
use serde_derive::{Deserialize, Serialize};

type Word = u64;

const WORD_BITS: usize = Word::BITS as usize;

/// Number of words needed to hold `len` bits.
fn words_for(len: usize) -> usize {
    len.div_ceil(WORD_BITS)
}

/// A fixed-size set of integers in `0 .. len`.
///
/// Bits past `len` in the last word are always kept clear, so equality, hashing and
/// [`BitVector::count`] only ever see the bits that belong to the vector.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "enable-serde",
    derive(Serialize, Deserialize),
    serde(try_from = "RawBitVector")
)]
pub struct BitVector {
    words: Vec<Word>,
    len: usize,
}

/// Serialized form of a `BitVector`, checked before it becomes one.
#[cfg(feature = "enable-serde")]
#[derive(Deserialize)]
struct RawBitVector {
    words: Vec<Word>,
    len: usize,
}

#[cfg(feature = "enable-serde")]
impl TryFrom<RawBitVector> for BitVector {
    type Error = &'static str;

    fn try_from(raw: RawBitVector) -> Result<Self, Self::Error> {
        Self::from_words(raw.len, raw.words)
            .ok_or("bit-vector words don't match its length or have bits set past it")
    }
}

impl BitVector {
    /// Create a vector of `len` bits, all clear.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; words_for(len)],
            len,
        }
    }

    /// Create a vector of `len` bits, all set.
    pub fn full(len: usize) -> Self {
        let mut bv = Self::new(len);
        bv.set_all();
        bv
    }

    /// Create a vector of `len` bits from its raw `u64` words, least significant bit first.
    ///
    /// Returns `None` unless there are exactly enough words for `len` bits and no bit at or past
    /// `len` is set.
    pub fn from_words(len: usize, words: Vec<u64>) -> Option<Self> {
        if words.len() != words_for(len) {
            return None;
        }
        let mut bv = Self { words, len };
        let last = bv.words.last().copied();
        bv.mask_tail();
        (bv.words.last().copied() == last).then_some(bv)
    }

    /// Number of bits in the vector.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Is this a zero-length vector?
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn locate(&self, index: usize) -> (usize, Word) {
        assert!(
            index < self.len,
            "bit index {index} out of range for a vector of {} bits",
            self.len
        );
        (index / WORD_BITS, 1 << (index % WORD_BITS))
    }

    /// Is bit `index` set?
    pub fn get(&self, index: usize) -> bool {
        let (word, mask) = self.locate(index);
        self.words[word] & mask != 0
    }

    /// Set bit `index`.
    pub fn set(&mut self, index: usize) {
        let (word, mask) = self.locate(index);
        self.words[word] |= mask;
    }

    /// Clear bit `index`.
    pub fn reset(&mut self, index: usize) {
        let (word, mask) = self.locate(index);
        self.words[word] &= !mask;
    }

    /// Set every bit.
    pub fn set_all(&mut self) {
        self.words.fill(!0);
        self.mask_tail();
    }

    /// Clear every bit.
    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Reinitialize this vector to `len` bits, all set if `full` and all clear otherwise.
    ///
    /// This reuses the existing allocation when it is large enough.
    pub fn reset_to(&mut self, len: usize, full: bool) {
        self.words.clear();
        self.words.resize(words_for(len), if full { !0 } else { 0 });
        self.len = len;
        self.mask_tail();
    }

    /// Replace `self` with the intersection of `self` and `other`.
    pub fn intersect_with(&mut self, other: &Self) {
        assert_eq!(self.len, other.len, "intersecting bit-vectors of different lengths");
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= *b;
        }
    }

    /// Replace `self` with the union of `self` and `other`.
    pub fn union_with(&mut self, other: &Self) {
        assert_eq!(self.len, other.len, "joining bit-vectors of different lengths");
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= *b;
        }
    }

    /// Is every bit set in `self` also set in `other`?
    pub fn is_subset(&self, other: &Self) -> bool {
        assert_eq!(self.len, other.len, "comparing bit-vectors of different lengths");
        self.words
            .iter()
            .zip(&other.words)
            .all(|(a, b)| a & !b == 0)
    }

    /// Overwrite `self` with the contents of `other` without reallocating.
    pub fn copy_from(&mut self, other: &Self) {
        assert_eq!(self.len, other.len, "copying between bit-vectors of different lengths");
        self.words.copy_from_slice(&other.words);
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate over the indices of the set bits in ascending order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            words: self.words.iter().enumerate(),
            base: 0,
            current: 0,
        }
    }

    fn mask_tail(&mut self) {
        let used = self.len % WORD_BITS;
        if used != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1 << used) - 1;
            }
        }
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a BitVector {
    type Item = usize;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Iterator over the set bits of a [`BitVector`], in ascending order.
pub struct Iter<'a> {
    words: core::iter::Enumerate<slice::Iter<'a, Word>>,
    base: usize,
    current: Word,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.current == 0 {
            let (idx, &word) = self.words.next()?;
            self.base = idx * WORD_BITS;
            self.current = word;
        }
        let bit = self.current.trailing_zeros() as usize;
        // Clear the lowest set bit.
        self.current &= self.current - 1;
        Some(self.base + bit)
    }
}
