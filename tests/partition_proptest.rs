use edgebc::betweenness::partition::{batch_bounds, partition};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_batches_concatenate_to_sources(
        sources in proptest::collection::vec(any::<u32>(), 0..200),
        workers in 1usize..17,
    ) {
        let mut joined = Vec::with_capacity(sources.len());
        for i in 0..workers {
            joined.extend_from_slice(partition(&sources, workers, i));
        }
        prop_assert_eq!(joined, sources);
    }

    #[test]
    fn test_batches_are_contiguous_and_near_equal(len in 0usize..500, workers in 1usize..17) {
        let base = len / workers;
        let mut expected_begin = 0;
        for i in 0..workers {
            let range = batch_bounds(len, workers, i);
            prop_assert_eq!(range.start, expected_begin);
            if i + 1 < workers {
                prop_assert_eq!(range.len(), base);
            } else {
                prop_assert_eq!(range.len(), base + len % workers);
                prop_assert_eq!(range.end, len);
            }
            expected_begin = range.end;
        }
    }

    #[test]
    fn test_single_worker_gets_all(sources in proptest::collection::vec(any::<i64>(), 0..100)) {
        prop_assert_eq!(partition(&sources, 1, 0), sources.as_slice());
    }
}

#[test]
fn test_documented_batch_shapes() {
    let four = [0, 1, 2, 3];
    assert_eq!(partition(&four, 2, 0), &[0, 1]);
    assert_eq!(partition(&four, 2, 1), &[2, 3]);

    let sizes: Vec<usize> = (0..3).map(|i| batch_bounds(5, 3, i).len()).collect();
    assert_eq!(sizes, vec![1, 1, 3]);
}
