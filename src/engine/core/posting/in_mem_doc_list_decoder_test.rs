use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use bytes::Bytes;

use crate::engine::core::memory::MemoryPool;
use crate::engine::core::posting::{
    DocBufferInfo, DocListDump, InMemDocListDecoder, PostingOptions, PostingWriter,
};
use crate::engine::errors::PostingError;
use crate::logging::init_for_tests;
use crate::shared::config::{MemoryConfig, PostingConfig};
use crate::test_helpers::factories::{ExpectedDoc, PostingFactory};

const FULL: PostingOptions = PostingOptions::TERM_FREQUENCY
    .union(PostingOptions::DOC_PAYLOAD)
    .union(PostingOptions::FIELD_MAP);

fn small_blocks() -> PostingConfig {
    PostingConfig {
        doc_block_size: 4,
        skip_block_size: 3,
        ..PostingConfig::default()
    }
}

#[derive(Debug, Default)]
struct Decoded {
    infos: Vec<DocBufferInfo>,
    ids: Vec<u32>,
    tfs: Vec<u32>,
    payloads: Vec<u16>,
    field_maps: Vec<u8>,
}

fn decode_all(decoder: &mut InMemDocListDecoder) -> Decoded {
    let mut decoded = Decoded::default();
    let (mut ids, mut tfs, mut payloads, mut maps) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    let mut start = 0;
    while let Some(info) = decoder.decode_doc_buffer(start, &mut ids).unwrap() {
        assert_eq!(info.len, ids.len());
        assert_eq!(info.first, ids[0]);
        assert_eq!(info.last, ids[ids.len() - 1]);
        decoded.infos.push(info);
        decoded.ids.extend_from_slice(&ids);
        if decoder.decode_current_tf_buffer(&mut tfs) {
            decoded.tfs.extend_from_slice(&tfs);
        }
        if decoder.decode_current_doc_payload_buffer(&mut payloads) {
            decoded.payloads.extend_from_slice(&payloads);
        }
        if decoder.decode_current_field_map_buffer(&mut maps) {
            decoded.field_maps.extend_from_slice(&maps);
        }
        start = info.last + 1;
    }
    decoded
}

fn check_against(decoded: &Decoded, docs: &[ExpectedDoc]) {
    assert_eq!(decoded.ids, docs.iter().map(|d| d.doc_id).collect::<Vec<_>>());
    assert_eq!(decoded.tfs, docs.iter().map(|d| d.tf()).collect::<Vec<_>>());
    assert_eq!(decoded.payloads, docs.iter().map(|d| d.payload).collect::<Vec<_>>());
    assert_eq!(decoded.field_maps, docs.iter().map(|d| d.field_map).collect::<Vec<_>>());

    let mut seen = 0;
    for info in &decoded.infos {
        let ttf: u32 = docs[..seen].iter().map(|d| d.tf()).sum();
        assert_eq!(info.ttf, ttf, "block starting at doc {seen}");
        assert!(info.len <= 4);
        seen += info.len;
    }
}

#[test]
fn walks_live_and_finished_lists() {
    let session = MemoryPool::unbounded("session");
    for count in [0, 1, 3, 4, 5, 9, 40, 101] {
        let factory = PostingFactory::new()
            .with_options(FULL)
            .with_config(small_blocks())
            .with_doc_count(count);
        let pool = MemoryPool::unbounded("writer");
        let (mut writer, docs) = factory.create(&pool);

        let live = decode_all(&mut writer.in_mem_doc_decoder(&session).unwrap());
        check_against(&live, &docs);

        writer.end_segment().unwrap();
        let finished = decode_all(&mut writer.in_mem_doc_decoder(&session).unwrap());
        check_against(&finished, &docs);
    }
    assert_eq!(session.used(), 0);
}

#[test]
fn seeks_to_the_block_covering_a_doc_id() {
    let factory = PostingFactory::new()
        .with_options(FULL)
        .with_config(small_blocks())
        .with_doc_count(60);
    let pool = MemoryPool::unbounded("writer");
    let (mut writer, docs) = factory.create(&pool);
    writer.end_segment().unwrap();
    let max = docs.last().unwrap().doc_id;

    let mut ids = Vec::new();
    for target in 0..=max + 3 {
        let mut decoder = writer.in_mem_doc_decoder(&pool).unwrap();
        let result = decoder.decode_doc_buffer(target, &mut ids).unwrap();
        match docs.iter().position(|d| d.doc_id >= target) {
            None => assert!(result.is_none(), "target {target}"),
            Some(k) => {
                let info = result.unwrap();
                let block = k / 4 * 4;
                let end = (block + 4).min(docs.len());
                let expected: Vec<u32> = docs[block..end].iter().map(|d| d.doc_id).collect();
                assert_eq!(ids, expected, "target {target}");
                assert_eq!(info.ttf, docs[..block].iter().map(|d| d.tf()).sum::<u32>());
            }
        }
    }
}

#[test]
fn forward_seeks_reuse_one_decoder() {
    let factory = PostingFactory::new()
        .with_options(PostingOptions::TERM_FREQUENCY)
        .with_config(small_blocks())
        .with_doc_count(80);
    let pool = MemoryPool::unbounded("writer");
    let (mut writer, docs) = factory.create(&pool);
    writer.end_segment().unwrap();

    let mut decoder = writer.in_mem_doc_decoder(&pool).unwrap();
    let mut ids = Vec::new();
    let mut tfs = Vec::new();
    for k in [2usize, 9, 33, 70, 79] {
        let info = decoder
            .decode_doc_buffer(docs[k].doc_id, &mut ids)
            .unwrap()
            .unwrap();
        assert_eq!(info.first, docs[k / 4 * 4].doc_id, "doc {k}");
        assert!(ids.contains(&docs[k].doc_id));
        assert!(decoder.decode_current_tf_buffer(&mut tfs));
        assert_eq!(tfs.len(), ids.len());
    }
    assert!(decoder.decode_doc_buffer(docs[79].doc_id + 1, &mut ids).unwrap().is_none());
}

#[test]
fn reference_compressed_equal_ids() {
    let posting = PostingConfig {
        doc_block_size: 2,
        ..PostingConfig::default()
    };
    let pool = MemoryPool::unbounded("writer");
    let mut writer = PostingWriter::new(
        PostingOptions::REFERENCE_COMPRESS,
        &posting,
        &MemoryConfig::default(),
        &pool,
    )
    .unwrap();
    for _ in 0..3 {
        writer.end_document(5, 0).unwrap();
    }

    let mut decoder = writer.in_mem_doc_decoder(&pool).unwrap();
    let mut ids = Vec::new();
    let first = decoder.decode_doc_buffer(5, &mut ids).unwrap().unwrap();
    assert_eq!((first.first, first.last, first.len), (5, 5, 2));
    assert_eq!(ids, vec![5, 5]);

    let tail = decoder.decode_doc_buffer(5, &mut ids).unwrap().unwrap();
    assert_eq!(tail.len, 1);
    assert_eq!(ids, vec![5]);

    assert!(decoder.decode_doc_buffer(5, &mut ids).unwrap().is_none());
}

#[test]
fn bitmap_lists_report_no_tf_buffer() {
    let factory = PostingFactory::new()
        .with_options(PostingOptions::TF_BITMAP)
        .with_config(small_blocks())
        .with_doc_count(10);
    let pool = MemoryPool::unbounded("writer");
    let (writer, _) = factory.create_finished(&pool);

    let mut decoder = writer.in_mem_doc_decoder(&pool).unwrap();
    let mut ids = Vec::new();
    let mut tfs = Vec::new();
    let info = decoder.decode_doc_buffer(0, &mut ids).unwrap().unwrap();
    assert_eq!(info.ttf, 0);
    assert!(!decoder.decode_current_tf_buffer(&mut tfs));
    assert!(!decoder.decode_current_doc_payload_buffer(&mut Vec::new()));
}

fn bitmap_factory(count: usize) -> PostingFactory {
    PostingFactory::new()
        .with_options(PostingOptions::TF_BITMAP)
        .with_config(PostingConfig {
            tf_bitmap_block_docs: 4,
            ..small_blocks()
        })
        .with_doc_count(count)
}

fn pos_counts(docs: &[ExpectedDoc]) -> Vec<(u32, u32)> {
    docs.iter()
        .scan(0, |ttf, d| {
            let info = (*ttf, d.tf());
            *ttf += d.tf();
            Some(info)
        })
        .collect()
}

#[test]
fn live_bitmap_lists_answer_pos_count_info() {
    let pool = MemoryPool::unbounded("writer");
    // enough occurrences to span several bitmap pages
    let (mut writer, docs) = bitmap_factory(4000).create(&pool);
    let expected = pos_counts(&docs);

    let decoder = writer.in_mem_doc_decoder(&pool).unwrap();
    assert_eq!(decoder.tf_bitmap().unwrap().bit_count(), writer.term_meta().total_tf);
    for (k, info) in expected.iter().enumerate() {
        assert_eq!(decoder.pos_count_info(k as u32).unwrap(), *info, "doc {k}");
    }
    assert!(decoder.pos_count_info(docs.len() as u32).is_err());

    // the copy keeps its prefix while the writer moves on
    writer.add_position(1, 0, 0).unwrap();
    writer.add_position(2, 0, 0).unwrap();
    writer.end_document(1_000_000, 0).unwrap();
    assert!(decoder.pos_count_info(docs.len() as u32).is_err());
    let last = *expected.last().unwrap();
    assert_eq!(decoder.pos_count_info(docs.len() as u32 - 1).unwrap(), last);

    let fresh = writer.in_mem_doc_decoder(&pool).unwrap();
    assert_eq!(
        fresh.pos_count_info(docs.len() as u32).unwrap(),
        (last.0 + last.1, 2)
    );
}

#[test]
fn failed_end_document_leaves_the_bitmap_unchanged() {
    let pool = MemoryPool::new("writer", Some(1 << 20));
    let (mut writer, docs) = bitmap_factory(2).create(&pool);

    // the third row needs a larger hot buffer
    let hog = pool.reserve(pool.limit().unwrap() - pool.used()).unwrap();
    writer.add_position(4, 0, 0).unwrap();
    writer.add_position(9, 0, 0).unwrap();
    assert!(matches!(
        writer.end_document(500, 0),
        Err(PostingError::PoolExhausted { .. })
    ));
    let decoder = writer.in_mem_doc_decoder(&MemoryPool::unbounded("session")).unwrap();
    assert_eq!(decoder.tf_bitmap().unwrap().bit_count(), 3);
    assert!(decoder.pos_count_info(2).is_err());

    drop(hog);
    writer.end_document(500, 0).unwrap();
    let decoder = writer.in_mem_doc_decoder(&MemoryPool::unbounded("session")).unwrap();
    let mut expected = pos_counts(&docs);
    expected.push((3, 2));
    for (k, info) in expected.iter().enumerate() {
        assert_eq!(decoder.pos_count_info(k as u32).unwrap(), *info);
    }
    assert_eq!(writer.term_meta().total_tf, 5);
}

#[test]
fn lists_without_bitmap_reject_pos_count_info() {
    let pool = MemoryPool::unbounded("writer");
    let (writer, _) = PostingFactory::new().with_options(FULL).create(&pool);
    let decoder = writer.in_mem_doc_decoder(&pool).unwrap();
    assert!(decoder.tf_bitmap().is_none());
    assert!(matches!(
        decoder.pos_count_info(0),
        Err(PostingError::InvalidFormat(_))
    ));
}

#[test]
fn bitmap_covers_every_visible_document_while_writing() {
    let factory = bitmap_factory(2500);
    let docs = factory.docs();
    let expected = pos_counts(&docs);
    let pool = MemoryPool::unbounded("writer");
    let mut writer =
        PostingWriter::new(factory.options(), factory.config(), &MemoryConfig::default(), &pool)
            .unwrap();
    let reader = writer.doc_list_reader();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        let expected = &expected;
        let done = &done;
        let reader = reader.clone();
        s.spawn(move || {
            let session = MemoryPool::unbounded("session");
            let mut rounds = 0;
            while !done.load(Ordering::Acquire) || rounds == 0 {
                let mut decoder = reader.in_mem_decoder(&session).unwrap();
                let visible = decode_all(&mut decoder).ids.len();
                for (k, info) in expected[..visible].iter().enumerate() {
                    assert_eq!(decoder.pos_count_info(k as u32).unwrap(), *info);
                }
                rounds += 1;
            }
        });

        for doc in &docs {
            for pos in &doc.positions {
                writer.add_position(*pos, 0, 0).unwrap();
            }
            writer.end_document(doc.doc_id, doc.payload).unwrap();
        }
        writer.end_segment().unwrap();
        done.store(true, Ordering::Release);
    });
}

#[test]
fn buffers_are_invalid_before_the_first_block() {
    let factory = PostingFactory::new().with_options(FULL).with_doc_count(3);
    let pool = MemoryPool::unbounded("writer");
    let (writer, _) = factory.create(&pool);
    let decoder = writer.in_mem_doc_decoder(&pool).unwrap();
    assert!(!decoder.decode_current_tf_buffer(&mut Vec::new()));
    assert!(!decoder.decode_current_field_map_buffer(&mut Vec::new()));
}

#[test]
fn dumped_lists_decode_like_live_ones() {
    let factory = PostingFactory::new()
        .with_options(FULL)
        .with_config(small_blocks())
        .with_doc_count(57);
    let pool = MemoryPool::unbounded("writer");
    let (writer, docs) = factory.create_finished(&pool);

    let mut out = Vec::new();
    writer.dump(&mut out).unwrap();
    let bytes = Bytes::from(out);
    let format = Arc::clone(writer.doc_format());
    let dump = DocListDump::parse(&bytes, &format).unwrap();

    let mut decoder = InMemDocListDecoder::open_dump(&dump, format, &pool).unwrap();
    check_against(&decode_all(&mut decoder), &docs);
}

#[test]
fn decoder_charges_its_session_pool() {
    let factory = PostingFactory::new().with_options(FULL).with_doc_count(3);
    let pool = MemoryPool::unbounded("writer");
    let (writer, _) = factory.create(&pool);

    let session = MemoryPool::unbounded("session");
    let decoder = writer.in_mem_doc_decoder(&session).unwrap();
    assert!(session.used() > 0);
    drop(decoder);
    assert_eq!(session.used(), 0);

    let tiny = MemoryPool::new("tiny", Some(8));
    assert!(writer.in_mem_doc_decoder(&tiny).is_err());
}

#[test]
fn readers_see_consistent_prefixes_while_writing() {
    init_for_tests();
    let factory = PostingFactory::new()
        .with_options(FULL)
        .with_config(small_blocks())
        .with_doc_count(3000);
    let docs = factory.docs();
    let pool = MemoryPool::unbounded("writer");
    let mut writer =
        PostingWriter::new(factory.options(), factory.config(), &MemoryConfig::default(), &pool)
            .unwrap();
    let reader = writer.doc_list_reader();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        for _ in 0..2 {
            let reader = reader.clone();
            let docs = &docs;
            let done = &done;
            s.spawn(move || {
                let session = MemoryPool::unbounded("session");
                let mut rounds = 0;
                while !done.load(Ordering::Acquire) || rounds == 0 {
                    let mut decoder = reader.in_mem_decoder(&session).unwrap();
                    let decoded = decode_all(&mut decoder);
                    let n = decoded.ids.len();
                    check_against(&decoded, &docs[..n]);
                    rounds += 1;
                }
            });
        }

        for doc in &docs {
            for (j, pos) in doc.positions.iter().enumerate() {
                writer.add_position(*pos, 0, (j % 3) as u8).unwrap();
            }
            writer.end_document(doc.doc_id, doc.payload).unwrap();
        }
        writer.end_segment().unwrap();
        done.store(true, Ordering::Release);
    });

    let decoded = decode_all(&mut writer.in_mem_doc_decoder(&pool).unwrap());
    check_against(&decoded, &docs);
}
