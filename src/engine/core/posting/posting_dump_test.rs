use bytes::Bytes;

use crate::engine::core::posting::{DocListDump, DocListFormat, PositionListDump, PostingOptions};
use crate::engine::errors::PostingError;

#[test]
fn empty_position_dump_has_empty_sections() {
    let dump = PositionListDump::parse(&Bytes::from_static(&[0, 0])).unwrap();
    assert!(dump.skip.is_empty());
    assert!(dump.positions.is_empty());
    assert_eq!(dump.len, 2);
}

#[test]
fn sections_are_sliced_in_order() {
    let data = Bytes::from_static(&[2, 3, 0xA, 0xB, 0xC, 0xD, 0xE, 0xFF]);
    let format = DocListFormat::new(PostingOptions::empty()).unwrap();
    let dump = DocListDump::parse(&data, &format).unwrap();
    assert_eq!(&dump.skip[..], &[0xA, 0xB]);
    assert_eq!(&dump.doc[..], &[0xC, 0xD, 0xE]);
    assert!(dump.bitmap.is_none());
    // trailing bytes belong to whatever follows
    assert_eq!(dump.len, 7);
}

#[test]
fn overlong_sections_are_corruption() {
    let data = Bytes::from_static(&[2, 9, 0xA, 0xB, 0xC]);
    assert!(matches!(
        PositionListDump::parse(&data),
        Err(PostingError::Corruption(_))
    ));
}

#[test]
fn truncated_bitmap_is_corruption() {
    let format = DocListFormat::new(PostingOptions::TF_BITMAP).unwrap();
    // empty skip and doc, then a bitmap claiming 16 body bytes
    let data = Bytes::from_static(&[0, 0, 16, 0, 0, 0, 1, 2]);
    assert!(matches!(
        DocListDump::parse(&data, &format),
        Err(PostingError::Corruption(_))
    ));
}

#[test]
fn missing_header_is_an_error() {
    assert!(PositionListDump::parse(&Bytes::new()).is_err());
}
