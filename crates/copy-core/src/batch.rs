//! Bounded-size chunking of bulk mutations.
//!
//! Transport layers cap the size of a single request (MySQL's
//! `max_allowed_packet`, for one). [`BatchExecutor`] splits an unordered set
//! of identifiers into chunks no larger than the configured size and applies
//! a mutation to each chunk in turn.
//!
//! Chunks are applied one after another without a surrounding transaction:
//! when one chunk fails the remaining chunks are not attempted and the chunks
//! already applied stay applied.

use std::collections::hash_set;
use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::DEFAULT_BATCH_SIZE;

/// A mutation applied to one chunk of identifiers.
#[async_trait]
pub trait ChunkMutation<T: Send>: Send {
    async fn apply(&mut self, chunk: Vec<T>) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct BatchExecutor {
    max_chunk: usize,
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchExecutor {
    /// A zero size is treated as one.
    pub fn new(max_chunk: usize) -> Self {
        Self {
            max_chunk: max_chunk.max(1),
        }
    }

    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    /// Number of chunks `len` identifiers are split into.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.max_chunk)
    }

    /// Consume `items` as a sequence of chunks of at most `max_chunk`.
    pub fn chunks<T>(&self, items: HashSet<T>) -> Chunks<T> {
        Chunks {
            inner: items.into_iter(),
            max_chunk: self.max_chunk,
        }
    }

    /// Apply `mutation` to every chunk of `items`, stopping at the first
    /// error. Returns the number of chunks applied.
    pub async fn run<T, M>(&self, items: HashSet<T>, mutation: &mut M) -> Result<usize>
    where
        T: Send,
        M: ChunkMutation<T> + ?Sized,
    {
        let total = items.len();
        let mut applied = 0;
        for chunk in self.chunks(items) {
            mutation.apply(chunk).await?;
            applied += 1;
        }
        debug!("Applied {} chunk(s) covering {} item(s)", applied, total);
        Ok(applied)
    }
}

/// Draining iterator returned by [`BatchExecutor::chunks`].
pub struct Chunks<T> {
    inner: hash_set::IntoIter<T>,
    max_chunk: usize,
}

impl<T> Iterator for Chunks<T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Vec<T>> {
        let chunk: Vec<T> = self.inner.by_ref().take(self.max_chunk).collect();
        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        sizes: Vec<usize>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl ChunkMutation<u32> for Recorder {
        async fn apply(&mut self, chunk: Vec<u32>) -> Result<()> {
            if self.fail_at == Some(self.sizes.len()) {
                anyhow::bail!("packet too large");
            }
            self.sizes.push(chunk.len());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_chunks_respect_limit() {
        let mut recorder = Recorder::default();
        let applied = BatchExecutor::new(20)
            .run((0..45).collect(), &mut recorder)
            .await
            .unwrap();

        assert_eq!(applied, 3);
        recorder.sizes.sort_unstable();
        assert_eq!(recorder.sizes, vec![5, 20, 20]);
    }

    #[tokio::test]
    async fn test_empty_set_applies_nothing() {
        let mut recorder = Recorder::default();
        let applied = BatchExecutor::default()
            .run(HashSet::new(), &mut recorder)
            .await
            .unwrap();

        assert_eq!(applied, 0);
        assert!(recorder.sizes.is_empty());
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let mut recorder = Recorder {
            fail_at: Some(1),
            ..Default::default()
        };
        let result = BatchExecutor::new(3)
            .run((0..10).collect(), &mut recorder)
            .await;

        assert!(result.is_err());
        assert_eq!(recorder.sizes, vec![3]);
    }

    #[test]
    fn test_zero_size_is_clamped() {
        let executor = BatchExecutor::new(0);
        assert_eq!(executor.max_chunk(), 1);
        assert_eq!(executor.chunk_count(3), 3);
        assert_eq!(executor.chunks((0..3).collect::<HashSet<u32>>()).count(), 3);
    }
}
