use crate::engine::core::memory::MemoryPool;
use crate::engine::core::posting::PostingOptions;
use crate::test_helpers::factories::PostingFactory;

#[test]
fn docs_are_strictly_increasing_with_sorted_positions() {
    let docs = PostingFactory::new().with_doc_count(50).docs();
    assert_eq!(docs.len(), 50);
    for pair in docs.windows(2) {
        assert!(pair[0].doc_id < pair[1].doc_id);
    }
    for doc in &docs {
        assert!(doc.tf() >= 1);
        assert!(doc.positions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(doc.pos_payloads.len(), doc.positions.len());
    }
}

#[test]
fn create_feeds_every_document() {
    let pool = MemoryPool::unbounded("factory");
    let factory = PostingFactory::new()
        .with_options(PostingOptions::TERM_FREQUENCY)
        .with_doc_count(7)
        .with_first_doc(100);
    let (writer, docs) = factory.create_finished(&pool);

    let meta = writer.term_meta();
    assert_eq!(meta.df, 7);
    assert_eq!(meta.total_tf, docs.iter().map(|d| d.tf()).sum::<u32>());
    assert_eq!(docs[0].doc_id, 100);
}
