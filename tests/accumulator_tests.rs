// Tests for transcript accumulation and canonical ordering.

use meetscribe::transcript::{TranscriptAccumulator, TranscriptFragment};

#[tokio::test]
async fn canonical_transcript_is_invariant_to_arrival_order() {
    let fragments = vec![
        TranscriptFragment::final_text("first", 0, 0.9),
        TranscriptFragment::final_text("second", 5000, 0.9),
        TranscriptFragment::final_text("third", 10000, 0.9),
        TranscriptFragment::final_text("fourth", 15000, 0.9),
    ];

    // Every arrival permutation of the same fragment set must produce the
    // same canonical transcript.
    let permutations: Vec<Vec<usize>> = vec![
        vec![0, 1, 2, 3],
        vec![3, 2, 1, 0],
        vec![1, 3, 0, 2],
        vec![2, 0, 3, 1],
    ];

    for order in permutations {
        let acc = TranscriptAccumulator::new();
        for &i in &order {
            acc.append(fragments[i].clone()).await;
        }
        assert_eq!(
            acc.canonical_transcript().await,
            "first second third fourth",
            "order {:?} changed the canonical transcript",
            order
        );
    }
}

#[tokio::test]
async fn interim_fragments_never_reach_the_canonical_transcript() {
    let acc = TranscriptAccumulator::new();

    acc.append(TranscriptFragment::final_text("hello", 0, 0.9))
        .await;
    acc.append(TranscriptFragment::interim("provisional text", 2500))
        .await;
    acc.append(TranscriptFragment::final_text("world", 5000, 0.9))
        .await;

    assert_eq!(acc.canonical_transcript().await, "hello world");
    // The interim fragment stays in the live view, never retracted.
    assert_eq!(acc.len().await, 3);
    assert_eq!(acc.final_count().await, 2);
}

#[tokio::test]
async fn empty_final_fragments_are_skipped_in_join() {
    let acc = TranscriptAccumulator::new();

    acc.append(TranscriptFragment::final_text("hello", 0, 0.9))
        .await;
    acc.append(TranscriptFragment::final_text("   ", 5000, 0.9))
        .await;
    acc.append(TranscriptFragment::final_text("world", 10000, 0.9))
        .await;

    assert_eq!(acc.canonical_transcript().await, "hello world");
}

#[tokio::test]
async fn frozen_accumulator_discards_stragglers() {
    let acc = TranscriptAccumulator::new();

    acc.append(TranscriptFragment::final_text("kept", 0, 0.9))
        .await;
    acc.freeze().await;
    acc.append(TranscriptFragment::final_text("straggler", 5000, 0.9))
        .await;

    assert_eq!(acc.canonical_transcript().await, "kept");
    assert_eq!(acc.len().await, 1);
}

#[tokio::test]
async fn fragments_view_is_ordered_by_timestamp() {
    let acc = TranscriptAccumulator::new();

    acc.append(TranscriptFragment::final_text("late", 9000, 0.9))
        .await;
    acc.append(TranscriptFragment::final_text("early", 1000, 0.9))
        .await;
    acc.append(TranscriptFragment::interim("middle", 4000)).await;

    let view = acc.fragments().await;
    let timestamps: Vec<u64> = view.iter().map(|f| f.timestamp_ms).collect();
    assert_eq!(timestamps, vec![1000, 4000, 9000]);
}
