//! Fixed-size chunks

use crate::error::{Error, Result};

/// Splits ids into `ceil(N / size)` consecutive slices of at most `size` ids
#[derive(Debug, Clone)]
pub struct Chunks<'a, T = i64> {
    ids: &'a [T],
    size: usize,
}

impl<'a, T> Chunks<'a, T> {
    pub fn new(ids: &'a [T], size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidInput(
                "chunk size must be greater than zero".into(),
            ));
        }
        Ok(Self { ids, size })
    }

    /// Number of chunks the ids split into
    pub const fn chunk_count(&self) -> usize {
        self.ids.len().div_ceil(self.size)
    }
}

impl<'a, T> Iterator for Chunks<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        if self.ids.is_empty() {
            return None;
        }
        let split = self.size.min(self.ids.len());
        let (head, tail) = self.ids.split_at(split);
        self.ids = tail;
        Some(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_ceil_chunks() {
        let ids: Vec<i64> = (1..=7).collect();
        let chunks = Chunks::new(&ids, 3).unwrap();
        assert_eq!(chunks.chunk_count(), 3);

        let collected: Vec<&[i64]> = chunks.collect();
        assert_eq!(collected, vec![&[1, 2, 3][..], &[4, 5, 6][..], &[7][..]]);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let ids: Vec<i64> = (1..=6).collect();
        let chunks = Chunks::new(&ids, 3).unwrap();
        assert_eq!(chunks.chunk_count(), 2);
        assert!(chunks.clone().all(|chunk| chunk.len() == 3));
        assert_eq!(chunks.count(), 2);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let ids: [i64; 0] = [];
        let chunks = Chunks::new(&ids, 30).unwrap();
        assert_eq!(chunks.chunk_count(), 0);
        assert_eq!(chunks.count(), 0);
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(Chunks::new(&[1], 0), Err(Error::InvalidInput(_))));
    }
}
