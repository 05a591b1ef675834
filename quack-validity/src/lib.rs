//! Validity bitmaps as laid out by the engine: one bit per row, packed little-endian into `u64`
//! words, a set bit meaning the row holds a value. A missing bitmap means every row is valid.
#![deny(missing_docs)]

use std::fmt::{Debug, Formatter};

use itertools::Itertools;

/// Number of rows covered by one bitmap word.
pub const BITS_PER_WORD: usize = u64::BITS as usize;

/// Number of `u64` words needed to hold validity for `rows` rows.
#[inline]
pub const fn words_for(rows: usize) -> usize {
    rows.div_ceil(BITS_PER_WORD)
}

#[inline]
const fn locate(row: usize) -> (usize, u64) {
    (row / BITS_PER_WORD, 1u64 << (row % BITS_PER_WORD))
}

/// Returns true when `words` is absent or the bit for `row` is set.
///
/// `row` must be below the capacity the bitmap was allocated for.
#[inline]
pub fn is_valid(words: Option<&[u64]>, row: usize) -> bool {
    match words {
        None => true,
        Some(words) => {
            let (word, mask) = locate(row);
            words[word] & mask != 0
        }
    }
}

/// Marks `row` as holding a value.
#[inline]
pub fn set_valid(words: &mut [u64], row: usize) {
    let (word, mask) = locate(row);
    words[word] |= mask;
}

/// Marks `row` as NULL.
#[inline]
pub fn set_invalid(words: &mut [u64], row: usize) {
    let (word, mask) = locate(row);
    words[word] &= !mask;
}

/// Sets the validity of `row`.
#[inline]
pub fn set(words: &mut [u64], row: usize, valid: bool) {
    if valid {
        set_valid(words, row)
    } else {
        set_invalid(words, row)
    }
}

/// A read-only view over a (possibly absent) validity bitmap.
#[derive(Clone, Copy, Default)]
pub struct Validity<'a> {
    words: Option<&'a [u64]>,
}

impl<'a> Validity<'a> {
    /// Wrap a bitmap, `None` meaning all rows are valid.
    pub fn new(words: Option<&'a [u64]>) -> Self {
        Self { words }
    }

    /// A view where every row is valid.
    pub fn all_valid() -> Self {
        Self { words: None }
    }

    /// See [`is_valid`].
    #[inline]
    pub fn is_valid(&self, row: usize) -> bool {
        is_valid(self.words, row)
    }
}

impl Debug for Validity<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.words {
            None => f.write_str("Validity(all)"),
            Some(words) => f
                .debug_tuple("Validity")
                .field(&words.iter().map(|w| format!("{w:#066b}")).join(" "))
                .finish(),
        }
    }
}

/// A writable view over a materialized validity bitmap.
pub struct ValidityMut<'a> {
    words: &'a mut [u64],
}

impl<'a> ValidityMut<'a> {
    /// Wrap a materialized bitmap.
    pub fn new(words: &'a mut [u64]) -> Self {
        Self { words }
    }

    /// See [`is_valid`].
    #[inline]
    pub fn is_valid(&self, row: usize) -> bool {
        is_valid(Some(&*self.words), row)
    }

    /// See [`set_valid`].
    #[inline]
    pub fn set_valid(&mut self, row: usize) {
        set_valid(self.words, row)
    }

    /// See [`set_invalid`].
    #[inline]
    pub fn set_invalid(&mut self, row: usize) {
        set_invalid(self.words, row)
    }

    /// See [`set`].
    #[inline]
    pub fn set(&mut self, row: usize, valid: bool) {
        set(self.words, row, valid)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn absent_bitmap_is_all_valid() {
        assert!(is_valid(None, 0));
        assert!(is_valid(None, 2047));
        assert!(Validity::all_valid().is_valid(10));
        assert!(Validity::default().is_valid(0));
    }

    #[test]
    fn write_after_materialize() {
        // A freshly materialized bitmap has every bit set.
        let mut words = vec![u64::MAX; words_for(2048)];
        assert_eq!(words[0] & 0xff, 0b1111_1111);

        set_invalid(&mut words, 1);
        assert_eq!(words[0] & 0xff, 0b1111_1101);
        assert!(!is_valid(Some(words.as_slice()), 1));
        assert!(is_valid(Some(words.as_slice()), 0));

        set_valid(&mut words, 1);
        assert_eq!(words[0] & 0xff, 0b1111_1111);
    }

    #[rstest]
    #[case(0)]
    #[case(63)]
    #[case(64)]
    #[case(65)]
    #[case(2047)]
    fn word_boundaries(#[case] row: usize) {
        let mut words = vec![u64::MAX; words_for(2048)];
        set(&mut words, row, false);
        assert!(!is_valid(Some(words.as_slice()), row));
        let validity = Validity::new(Some(words.as_slice()));
        assert_eq!((0..2048).filter(|&r| !validity.is_valid(r)).collect::<Vec<_>>(), vec![row]);
        set(&mut words, row, true);
        assert!(is_valid(Some(words.as_slice()), row));
    }

    #[test]
    fn write_view() {
        let mut words = vec![u64::MAX; 2];
        let mut validity = ValidityMut::new(&mut words);
        validity.set_invalid(64);
        validity.set(3, false);
        assert!(!validity.is_valid(64));
        validity.set_valid(3);
        assert!(validity.is_valid(3));
        assert_eq!(words, [u64::MAX, u64::MAX - 1]);
    }

    #[test]
    fn words_for_rounds_up() {
        assert_eq!(words_for(0), 0);
        assert_eq!(words_for(1), 1);
        assert_eq!(words_for(64), 1);
        assert_eq!(words_for(65), 2);
        assert_eq!(words_for(2048), 32);
    }
}
