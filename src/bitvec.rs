use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::measure::Measure;

pub mod popcnt;
use popcnt::{popcnt_and, popcnt_words};

/// Number of bits in a backing word.
pub const WORD_BITS: usize = 64;

/// A fixed-length binary fingerprint backed by 64-bit words.
///
/// Bit `i` lives in word `i / 64` at position `i % 64`. Serialized forms write
/// each word in little-endian byte order.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitVector {
    length: usize,
    words: Vec<u64>,
}

/// Checks that `length` is a positive multiple of the word size.
pub fn check_length(length: usize) -> Result<()> {
    if length == 0 || length % WORD_BITS != 0 {
        return Err(Error::InvalidLength(length));
    }
    Ok(())
}

impl BitVector {
    /// Creates a zero-filled fingerprint of `length` bits.
    pub fn new(length: usize) -> Result<Self> {
        check_length(length)?;
        Ok(Self {
            length,
            words: vec![0; length / WORD_BITS],
        })
    }

    /// Creates a fingerprint of `length` bits from its words.
    /// Missing words are zero and surplus words are dropped.
    pub fn from_words(words: &[u64], length: usize) -> Result<Self> {
        check_length(length)?;
        let mut words = words.to_vec();
        words.resize(length / WORD_BITS, 0);
        Ok(Self { length, words })
    }

    /// Decodes a fingerprint from its little-endian byte form.
    /// The length in bits is `bytes.len() * 8`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let length = bytes.len() * 8;
        check_length(length)?;
        let mut words = vec![0; length / WORD_BITS];
        LittleEndian::read_u64_into(bytes, &mut words);
        Ok(Self { length, words })
    }

    /// Decodes a fingerprint of `length` bits from two hex digits per byte,
    /// bytes in the order of [`BitVector::to_bytes`]. Accepts either case.
    pub fn from_hex(hex: &str, length: usize) -> Result<Self> {
        check_length(length)?;
        let digits = hex.as_bytes();
        if digits.len() * 4 != length {
            return Err(Error::LengthMismatch {
                expected: length,
                found: digits.len() * 4,
            });
        }

        let mut bytes = Vec::with_capacity(digits.len() / 2);
        for pair in digits.chunks(2) {
            let hi = nibble(pair[0]).ok_or_else(|| Error::InvalidHex(hex.to_string()))?;
            let lo = nibble(pair[1]).ok_or_else(|| Error::InvalidHex(hex.to_string()))?;
            bytes.push((hi << 4) | lo);
        }
        Self::from_bytes(&bytes)
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Always false; a fingerprint holds at least one word.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn set(&mut self, i: usize) -> Result<()> {
        self.check_index(i)?;
        self.words[i / WORD_BITS] |= 1 << (i % WORD_BITS);
        Ok(())
    }

    pub fn clear(&mut self, i: usize) -> Result<()> {
        self.check_index(i)?;
        self.words[i / WORD_BITS] &= !(1 << (i % WORD_BITS));
        Ok(())
    }

    pub fn test(&self, i: usize) -> Result<bool> {
        self.check_index(i)?;
        Ok((self.words[i / WORD_BITS] >> (i % WORD_BITS)) & 1 == 1)
    }

    /// Number of set bits.
    pub fn popcount(&self) -> u32 {
        popcnt_words(&self.words)
    }

    pub fn and(&self, other: &BitVector) -> Result<BitVector> {
        self.zip_with(other, |a, b| a & b)
    }

    pub fn xor(&self, other: &BitVector) -> Result<BitVector> {
        self.zip_with(other, |a, b| a ^ b)
    }

    /// True if every bit set in `self` is also set in `other`.
    pub fn contains(&self, other: &BitVector) -> Result<bool> {
        self.check_same_length(other)?;
        Ok(self
            .words
            .iter()
            .zip(&other.words)
            .all(|(a, b)| a & b == *a))
    }

    /// True if `self` and `other` share at least one set bit.
    pub fn intersects(&self, other: &BitVector) -> Result<bool> {
        self.check_same_length(other)?;
        Ok(self.words.iter().zip(&other.words).any(|(a, b)| a & b != 0))
    }

    /// Folds the fingerprint down to `length` bits: bit `i` maps to `i % length`.
    pub fn fold(&self, length: usize) -> Result<BitVector> {
        check_length(length)?;
        if length > self.length {
            return Err(Error::LengthMismatch {
                expected: self.length,
                found: length,
            });
        }
        let n = length / WORD_BITS;
        let mut folded = vec![0u64; n];
        for (i, w) in self.words.iter().enumerate() {
            folded[i % n] |= *w;
        }
        Ok(BitVector {
            length,
            words: folded,
        })
    }

    /// Scores `self` against `other` with `measure`.
    pub fn similarity<M: Measure + ?Sized>(&self, other: &BitVector, measure: &M) -> Result<f64> {
        self.check_same_length(other)?;
        let a = self.popcount();
        let b = other.popcount();
        let both = popcnt_and(&self.words, &other.words);
        Ok(score(measure, self.length, a, b, both))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0; self.length / 8];
        self.write_bytes(&mut bytes);
        bytes
    }

    /// Writes the little-endian byte form into `out`, which must hold `len() / 8` bytes.
    pub fn write_bytes(&self, out: &mut [u8]) {
        LittleEndian::write_u64_into(&self.words, out);
    }

    /// Lowercase hex, two digits per byte of [`BitVector::to_bytes`].
    pub fn to_hex(&self) -> String {
        const DIGITS: &[u8; 16] = b"0123456789abcdef";
        let mut s = String::with_capacity(self.length / 4);
        for b in self.to_bytes() {
            s.push(DIGITS[(b >> 4) as usize] as char);
            s.push(DIGITS[(b & 0xf) as usize] as char);
        }
        s
    }

    fn zip_with<F: Fn(u64, u64) -> u64>(&self, other: &BitVector, f: F) -> Result<BitVector> {
        self.check_same_length(other)?;
        let words = self
            .words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| f(*a, *b))
            .collect();
        Ok(BitVector {
            length: self.length,
            words,
        })
    }

    fn check_index(&self, i: usize) -> Result<()> {
        if i >= self.length {
            return Err(Error::OutOfRange {
                index: i,
                length: self.length,
            });
        }
        Ok(())
    }

    pub(crate) fn check_same_length(&self, other: &BitVector) -> Result<()> {
        if self.length != other.length {
            return Err(Error::LengthMismatch {
                expected: self.length,
                found: other.length,
            });
        }
        Ok(())
    }
}

/// Derives the four statistics from popcounts `a`, `b` and `both` and applies `measure`.
#[inline]
pub(crate) fn score<M: Measure + ?Sized>(measure: &M, length: usize, a: u32, b: u32, both: u32) -> f64 {
    let only_a = a - both;
    let only_b = b - both;
    let neither = length as u32 - (only_a + only_b + both);
    measure.compute(only_a, only_b, both, neither)
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<")?;
        let mut first = true;
        for i in 0..self.length {
            if (self.words[i / WORD_BITS] >> (i % WORD_BITS)) & 1 == 1 {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{}", i)?;
                first = false;
            }
        }
        write!(f, ">")
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({}, {})", self.length, self)
    }
}
