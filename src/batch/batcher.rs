//! Single-pass batcher over discovered files.
//!
//! Consumes a lazy `(path, size)` sequence and yields completed batches as
//! thresholds are crossed, so dispatch can begin before discovery finishes.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::emit;
use crate::feed::FeedType;
use crate::metrics::events::FileSkipped;

use super::Batch;

/// Group discovered files into size-bounded batches, lazily.
///
/// One open batch is kept per feed type so unrelated feeds are never mixed
/// in a dispatch unit and one feed's burst cannot starve another's progress.
/// A file whose name matches no feed type is skipped with a warning.
///
/// An open batch rolls over before insertion when either bound would be
/// violated: the raw byte sum passing `threshold`, or the serialized payload
/// already past its fixed ceiling. Either check alone forces the rollover.
/// After the input is exhausted every still-open non-empty batch is yielded.
pub fn batch_files(
    files: impl IntoIterator<Item = (String, u64)>,
    threshold: u64,
) -> impl Iterator<Item = Batch> {
    let mut open: HashMap<FeedType, Batch> = HashMap::new();
    let mut files = files.into_iter();
    let mut drained = false;
    let mut leftovers: Vec<Batch> = Vec::new();

    std::iter::from_fn(move || {
        loop {
            if drained {
                return leftovers.pop();
            }

            let Some((path, size)) = files.next() else {
                drained = true;
                leftovers = open
                    .drain()
                    .map(|(_, batch)| batch)
                    .filter(|batch| !batch.is_empty())
                    .collect();
                for batch in &leftovers {
                    info!(%batch, "yielding final batch");
                }
                continue;
            };

            let feed_type = match FeedType::from_filename(&path) {
                Ok(feed_type) => feed_type,
                Err(error) => {
                    warn!(path, %error, "skipping unclassifiable file");
                    emit!(FileSkipped);
                    continue;
                }
            };

            let batch = open.entry(feed_type).or_insert_with(|| Batch::new(feed_type));

            let over_threshold = batch.total_bytes() + size > threshold;
            let over_payload = batch.is_over_payload_limit();

            if (over_threshold || over_payload) && !batch.is_empty() {
                let full = std::mem::replace(batch, Batch::new(feed_type));
                batch.add_file(path, size);
                info!(batch = %full, "yielding completed batch");
                return Some(full);
            }

            batch.add_file(path, size);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn alerts(n: usize) -> String {
        format!("incoming/{n:04}_https_cdn.mbta.com_realtime_Alerts_enhanced.json.gz")
    }

    fn trip_updates(n: usize) -> String {
        format!("incoming/{n:04}_https_cdn.mbta.com_realtime_TripUpdates_enhanced.json.gz")
    }

    #[test]
    fn test_all_files_end_up_in_exactly_one_batch() {
        let input: Vec<(String, u64)> = (0..50)
            .map(|n| (alerts(n), 10))
            .chain((0..30).map(|n| (trip_updates(n), 25)))
            .collect();

        let batches: Vec<Batch> = batch_files(input.clone(), 100).collect();

        let mut seen = HashSet::new();
        for batch in &batches {
            for file in batch.files() {
                assert!(seen.insert(file.path.clone()), "duplicate: {}", file.path);
            }
        }
        let expected: HashSet<String> = input.into_iter().map(|(p, _)| p).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_threshold_forces_rollover_before_insert() {
        let input: Vec<(String, u64)> = (0..10).map(|n| (alerts(n), 40)).collect();

        let batches: Vec<Batch> = batch_files(input, 100).collect();

        // 40+40 fits under 100; the third 40 forces a rollover.
        for batch in &batches[..batches.len() - 1] {
            assert!(batch.total_bytes() <= 100);
            assert_eq!(batch.len(), 2);
        }
    }

    #[test]
    fn test_oversized_single_file_still_batched_alone() {
        let input = vec![(alerts(0), 500), (alerts(1), 500)];

        let batches: Vec<Batch> = batch_files(input, 100).collect();

        // Each file alone exceeds the threshold but an empty open batch
        // never rolls over, so each lands in its own batch.
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 1));
    }

    #[test]
    fn test_feed_types_never_mixed() {
        let input: Vec<(String, u64)> = (0..20)
            .flat_map(|n| [(alerts(n), 10), (trip_updates(n), 10)])
            .collect();

        for batch in batch_files(input, 1000) {
            let first = batch.feed_type();
            assert!(batch.files().iter().all(|f| {
                crate::feed::FeedType::from_filename(&f.path) == Ok(first)
            }));
        }
    }

    #[test]
    fn test_unclassifiable_files_skipped() {
        let input = vec![
            (alerts(0), 10),
            ("incoming/vehicleCount.gz".to_string(), 10),
            (alerts(1), 10),
        ];

        let batches: Vec<Batch> = batch_files(input, 1000).collect();
        let total: usize = batches.iter().map(Batch::len).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_lazy_yield_before_input_exhausted() {
        // An iterator that panics past a point proves batches are yielded
        // without draining the whole input first.
        let input = (0..).map(|n| {
            assert!(n < 6, "batcher consumed more input than needed");
            (alerts(n), 50u64)
        });

        let mut batches = batch_files(input, 100);
        let first = batches.next().unwrap();
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_payload_limit_alone_forces_rollover() {
        // Threshold high enough that the byte-sum check never fires; the
        // repeated-digit middles defeat compression so only the payload
        // check can split the stream.
        let input: Vec<(String, u64)> = (0..3000u32)
            .map(|n| {
                (
                    format!(
                        "incoming/{}_https_cdn.mbta.com_realtime_Alerts_enhanced.json.gz",
                        n.to_string().repeat(40)
                    ),
                    1,
                )
            })
            .collect();

        let batches: Vec<Batch> = batch_files(input.clone(), u64::MAX).collect();

        assert!(batches.len() > 1, "payload check never forced a rollover");
        let total: usize = batches.iter().map(Batch::len).sum();
        assert_eq!(total, input.len());
        // Rollover happens one file after the ceiling is crossed, which is
        // exactly the margin kept under the 256 KB hard cap.
        for batch in &batches {
            assert!(batch.payload_bytes() < 256_000);
        }
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let mut batches = batch_files(Vec::new(), 100);
        assert!(batches.next().is_none());
    }

    #[test]
    fn test_discovery_order_preserved_within_type() {
        let input: Vec<(String, u64)> = (0..10).map(|n| (alerts(n), 10)).collect();

        let batches: Vec<Batch> = batch_files(input.clone(), 35).collect();
        let flattened: Vec<String> = batches
            .iter()
            .flat_map(|b| b.files().iter().map(|f| f.path.clone()))
            .collect();
        let expected: Vec<String> = input.into_iter().map(|(p, _)| p).collect();
        assert_eq!(flattened, expected);
    }
}
