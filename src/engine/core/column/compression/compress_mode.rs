/// Per-block compression mode. Stored in the flush metadata (2 bits) and as
/// the tag byte of every column block.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CompressMode {
    /// Bit-packed block codec over delta-coded input.
    #[default]
    Block = 0,
    /// Frame-of-reference codec over raw (non-delta) input.
    Reference = 1,
    /// One VInt per value, for very short lists.
    ShortList = 2,
}

impl TryFrom<u8> for CompressMode {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(CompressMode::Block),
            1 => Ok(CompressMode::Reference),
            2 => Ok(CompressMode::ShortList),
            other => Err(other),
        }
    }
}

impl From<CompressMode> for u8 {
    fn from(m: CompressMode) -> u8 {
        m as u8
    }
}

impl CompressMode {
    /// Mode for a flush triggered by a full hot buffer.
    pub fn for_inline_flush(reference: bool) -> Self {
        if reference {
            CompressMode::Reference
        } else {
            CompressMode::Block
        }
    }

    /// Mode for the closing flush of a list holding `item_count` items.
    /// Short lists are only chosen when nothing was flushed before.
    pub fn for_final_flush(
        reference: bool,
        item_count: usize,
        short_list_max: usize,
        flushed_before: bool,
    ) -> Self {
        if reference {
            CompressMode::Reference
        } else if !flushed_before && item_count <= short_list_max {
            CompressMode::ShortList
        } else {
            CompressMode::Block
        }
    }
}
