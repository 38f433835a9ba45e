use std::sync::Arc;

use bytes::Bytes;

use crate::engine::core::memory::MemoryPool;
use crate::engine::core::posting::{
    PositionListDump, PositionListEncoder, PositionListFormat, PostingOptions,
};
use crate::engine::errors::PostingError;
use crate::shared::config::{MemoryConfig, PostingConfig};

fn encoder(block: usize) -> PositionListEncoder {
    let format = PositionListFormat::from_options(
        PostingOptions::TERM_FREQUENCY | PostingOptions::POSITION_LIST,
    )
    .unwrap()
    .unwrap();
    let posting = PostingConfig {
        pos_block_size: block,
        ..PostingConfig::default()
    };
    PositionListEncoder::new(
        Arc::new(format),
        &posting,
        &MemoryConfig::default(),
        &MemoryPool::unbounded("positions"),
    )
}

fn dump(enc: &PositionListEncoder) -> PositionListDump {
    let mut out = Vec::new();
    enc.dump(&mut out).unwrap();
    assert_eq!(out.len(), enc.dump_length());
    let bytes = Bytes::from(out);
    let dump = PositionListDump::parse(&bytes).unwrap();
    assert_eq!(dump.len, bytes.len());
    dump
}

#[test]
fn positions_must_not_decrease_within_a_document() {
    let mut enc = encoder(128);
    enc.add_position(4, 0).unwrap();
    enc.add_position(4, 0).unwrap();
    assert!(matches!(
        enc.add_position(3, 0),
        Err(PostingError::OutOfOrder {
            previous: 4,
            current: 3
        })
    ));
    assert_eq!(enc.total_positions(), 2);

    enc.end_document();
    enc.add_position(0, 0).unwrap();
    assert_eq!(enc.total_positions(), 3);
}

#[test]
fn short_position_lists_skip_nothing() {
    let mut enc = encoder(128);
    for p in 0..5 {
        enc.add_position(p, 0).unwrap();
    }
    enc.end_document();
    enc.flush().unwrap();

    let dump = dump(&enc);
    assert!(dump.skip.is_empty());
    assert!(!dump.positions.is_empty());
}

#[test]
fn block_flushes_are_indexed() {
    let mut enc = encoder(4);
    for doc in 0..6 {
        for p in 0..3 {
            enc.add_position(doc + p * 10, 0).unwrap();
        }
        enc.end_document();
    }
    enc.flush().unwrap();

    let dump = dump(&enc);
    assert!(!dump.skip.is_empty());
}

#[test]
fn empty_list_dumps_two_zero_lengths() {
    let mut enc = encoder(128);
    enc.flush().unwrap();
    let mut out = Vec::new();
    enc.dump(&mut out).unwrap();
    assert_eq!(out, vec![0, 0]);
}
