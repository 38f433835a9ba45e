use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::engine::core::column::hot_buffer::{CAPACITY_TIERS, HotBuffer, MAX_HOT_CAPACITY};
use crate::engine::core::column::row_schema::RowSchema;
use crate::engine::core::memory::MemoryPool;
use crate::engine::errors::PostingError;

#[test]
fn capacity_moves_through_tiers_only() {
    let mut b = RowSchema::builder();
    let a = b.column::<u32>();
    let schema = b.build().unwrap();
    let pool = MemoryPool::unbounded("hot");
    let mut hot = HotBuffer::new(schema, &pool);

    assert_eq!(hot.capacity(), 0);
    let mut seen = vec![];
    for i in 0..MAX_HOT_CAPACITY as u32 {
        hot.push_back(a, i).unwrap();
        hot.end_push_back().unwrap();
        if seen.last() != Some(&hot.capacity()) {
            seen.push(hot.capacity());
        }
    }
    assert_eq!(seen, CAPACITY_TIERS.to_vec());
    assert_eq!(hot.size(), MAX_HOT_CAPACITY);

    let err = hot.push_back(a, 0).unwrap_err();
    assert!(matches!(err, PostingError::HotBufferFull(128)));
}

#[test]
fn rows_survive_growth_and_clear_keeps_capacity() {
    let mut b = RowSchema::builder();
    let doc = b.column::<u32>();
    let fmap = b.column::<u8>();
    let schema = b.build().unwrap();
    let pool = MemoryPool::unbounded("hot");
    let mut hot = HotBuffer::new(schema, &pool);

    for i in 0..20u32 {
        hot.push_back(doc, i * 3).unwrap();
        hot.push_back(fmap, (i % 4) as u8).unwrap();
        hot.end_push_back().unwrap();
    }
    let snap = hot.snapshot();
    assert_eq!(snap.len(), 20);
    assert_eq!(snap.get(doc, 17), Some(51));
    assert_eq!(snap.get(fmap, 17), Some(1));

    let mut col = Vec::new();
    hot.read_column(doc.index(), &mut col);
    assert_eq!(col, (0..20u64).map(|i| i * 3).collect::<Vec<_>>());

    hot.clear();
    assert!(hot.is_empty());
    assert_eq!(hot.capacity(), 128);
    assert!(hot.snapshot().is_empty());
}

#[test]
fn growth_is_charged_to_the_pool() {
    let mut b = RowSchema::builder();
    let a = b.column::<u64>();
    let _ = b.column::<u64>();
    let schema = b.build().unwrap();
    let pool = MemoryPool::new("tight", Some(2 * 2 * 8 + 16 * 2 * 8));
    let mut hot = HotBuffer::new(schema, &pool);

    for i in 0..16u64 {
        hot.push_back(a, i).unwrap();
        hot.end_push_back().unwrap();
    }
    assert_eq!(pool.used(), pool.limit().unwrap());

    let err = hot.push_back(a, 16).unwrap_err();
    assert!(matches!(err, PostingError::PoolExhausted { .. }));
    assert_eq!(hot.size(), 16);

    drop(hot);
    assert_eq!(pool.used(), 0);
}

#[test]
fn snapshot_is_never_torn_under_concurrent_writer() {
    let mut b = RowSchema::builder();
    let x = b.column::<u32>();
    let y = b.column::<u32>();
    let schema = b.build().unwrap();
    let pool = MemoryPool::unbounded("hot");
    let mut hot = HotBuffer::new(schema, &pool);
    let handle = hot.handle();
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut checked = 0usize;
            while !done.load(Ordering::Acquire) {
                let snap = handle.snapshot();
                let xs = snap.column(x.index());
                let ys = snap.column(y.index());
                for (row, (a, b)) in xs.iter().zip(ys).enumerate() {
                    // Every row is written as (generation * 1000 + row, same).
                    assert_eq!(a, b, "row {row} torn");
                    assert_eq!(*a % 1000, row as u64);
                }
                if let Some(first) = xs.first() {
                    let generation = first / 1000;
                    assert!(xs.iter().all(|v| v / 1000 == generation));
                }
                checked += 1;
            }
            checked
        })
    };

    for generation in 0..300u32 {
        let rows = (generation as usize % MAX_HOT_CAPACITY) + 1;
        for row in 0..rows as u32 {
            let v = generation * 1000 + row;
            hot.push_back(x, v).unwrap();
            hot.push_back(y, v).unwrap();
            hot.end_push_back().unwrap();
        }
        hot.clear();
    }
    done.store(true, Ordering::Release);
    assert!(reader.join().unwrap() > 0);
}
