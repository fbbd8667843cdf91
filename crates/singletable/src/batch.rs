//! Chunked dispatch for batch operations.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use futures_util::stream::{self, StreamExt, TryStreamExt};

use singletable_core::storage::{Item, PrimaryKey, Result};

/// Removes repeated keys, keeping the first occurrence's position.
pub(crate) fn dedup_keys(keys: Vec<PrimaryKey>) -> Vec<PrimaryKey> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.into_iter()
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// Collapses items sharing a primary key. The last item wins but keeps the
/// position of the first.
pub(crate) fn dedup_items(items: Vec<(PrimaryKey, Item)>) -> Vec<Item> {
    let mut positions: HashMap<PrimaryKey, usize> = HashMap::with_capacity(items.len());
    let mut unique: Vec<Item> = Vec::with_capacity(items.len());

    for (key, item) in items {
        match positions.get(&key) {
            Some(&position) => unique[position] = item,
            None => {
                positions.insert(key, unique.len());
                unique.push(item);
            }
        }
    }

    unique
}

/// Splits `entries` into chunks of at most `chunk_size`, preserving order.
pub(crate) fn chunk<E>(entries: Vec<E>, chunk_size: usize) -> Vec<Vec<E>> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(entries.len().div_ceil(chunk_size));
    let mut iter = entries.into_iter();
    loop {
        let next: Vec<E> = iter.by_ref().take(chunk_size).collect();
        if next.is_empty() {
            break;
        }
        chunks.push(next);
    }
    chunks
}

/// Runs `op` once per chunk with at most `concurrency` chunks in flight.
///
/// Stops at the first failing chunk. Chunks already completed stay applied
/// and chunks not yet started are never issued.
pub(crate) async fn for_each_chunk<E, R, F, Fut>(
    entries: Vec<E>,
    chunk_size: usize,
    concurrency: usize,
    op: F,
) -> Result<Vec<R>>
where
    F: Fn(Vec<E>) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    stream::iter(chunk(entries, chunk_size).into_iter().map(op))
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use singletable_core::storage::StorageError;

    use super::*;

    fn item(value: i64) -> Item {
        json!({ "value": value }).as_object().cloned().unwrap()
    }

    #[test]
    fn test_chunk_sizes() {
        let chunks = chunk((0..30).collect::<Vec<_>>(), 25);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 25);
        assert_eq!(chunks[1], vec![25, 26, 27, 28, 29]);
        assert!(chunk(Vec::<u8>::new(), 25).is_empty());
    }

    #[test]
    fn test_dedup_keys_keeps_first_position() {
        let a = PrimaryKey::new("A", "1");
        let b = PrimaryKey::new("B", "1");
        assert_eq!(
            dedup_keys(vec![a.clone(), b.clone(), a.clone()]),
            vec![a, b]
        );
    }

    #[test]
    fn test_dedup_items_last_write_wins() {
        let a = PrimaryKey::new("A", "1");
        let b = PrimaryKey::new("B", "1");
        let unique = dedup_items(vec![(a.clone(), item(1)), (b, item(2)), (a, item(3))]);
        assert_eq!(unique, vec![item(3), item(2)]);
    }

    #[tokio::test]
    async fn test_empty_input_issues_no_calls() {
        let calls = AtomicUsize::new(0);
        let results = for_each_chunk(Vec::<u8>::new(), 25, 4, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await
        .unwrap();

        assert!(results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sequential_dispatch_stops_at_first_failure() {
        let calls = AtomicUsize::new(0);
        let result = for_each_chunk((0..75).collect::<Vec<u32>>(), 25, 1, |chunk| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if chunk[0] == 25 {
                    Err(StorageError::engine("BatchWriteItem", "throttled"))
                } else {
                    Ok(chunk.len())
                }
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
