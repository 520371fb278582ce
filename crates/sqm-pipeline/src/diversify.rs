//! Step 9: provider diversification. Round-robin interleaves streams by
//! provider id (ascending) within each contiguous "rank slice" of equal
//! score, trading a little raw score for failover diversity. Streams with
//! no provider sort to the tail of their slice.

use sqm_common::ProviderId;

pub trait Ranked {
    fn score(&self) -> f64;
    fn provider_id(&self) -> Option<ProviderId>;
}

/// `items` must already be sorted descending by score (the scoring pass's
/// output order) before calling this.
pub fn diversify<T: Ranked>(items: Vec<T>) -> Vec<T> {
    let mut result = Vec::with_capacity(items.len());
    let mut slice_start = 0;

    let scores: Vec<f64> = items.iter().map(|i| i.score()).collect();
    let mut items: Vec<Option<T>> = items.into_iter().map(Some).collect();

    while slice_start < items.len() {
        let mut slice_end = slice_start + 1;
        while slice_end < items.len() && scores[slice_end] == scores[slice_start] {
            slice_end += 1;
        }

        let mut slice_indices: Vec<usize> = (slice_start..slice_end).collect();
        slice_indices.sort_by_key(|&i| match items[i].as_ref().unwrap().provider_id() {
            Some(id) => (0, id.0),
            None => (1, i64::MAX),
        });

        for i in slice_indices {
            result.push(items[i].take().unwrap());
        }
        slice_start = slice_end;
    }

    result
}
