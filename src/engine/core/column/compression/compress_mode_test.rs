use crate::engine::core::column::compression::CompressMode;

#[test]
fn tag_roundtrip() {
    for mode in [
        CompressMode::Block,
        CompressMode::Reference,
        CompressMode::ShortList,
    ] {
        assert_eq!(CompressMode::try_from(u8::from(mode)), Ok(mode));
    }
    assert_eq!(CompressMode::try_from(3), Err(3));
}

#[test]
fn reference_compression_wins_every_policy() {
    assert_eq!(CompressMode::for_inline_flush(true), CompressMode::Reference);
    assert_eq!(
        CompressMode::for_final_flush(true, 1, 5, false),
        CompressMode::Reference
    );
}

#[test]
fn short_list_only_for_small_unflushed_lists() {
    assert_eq!(
        CompressMode::for_final_flush(false, 5, 5, false),
        CompressMode::ShortList
    );
    assert_eq!(
        CompressMode::for_final_flush(false, 6, 5, false),
        CompressMode::Block
    );
    assert_eq!(
        CompressMode::for_final_flush(false, 3, 5, true),
        CompressMode::Block
    );
    assert_eq!(CompressMode::for_inline_flush(false), CompressMode::Block);
}
