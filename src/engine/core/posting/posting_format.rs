use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::core::column::{ColumnId, RowSchema};
use crate::engine::core::skiplist::SkipListKind;
use crate::engine::errors::PostingError;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
    pub struct PostingOptions: u8 {
        const TERM_FREQUENCY     = 0b0000_0001;
        const TF_BITMAP          = 0b0000_0010;
        const DOC_PAYLOAD        = 0b0000_0100;
        const FIELD_MAP          = 0b0000_1000;
        const POSITION_LIST      = 0b0001_0000;
        const POSITION_PAYLOAD   = 0b0010_0000;
        const REFERENCE_COMPRESS = 0b0100_0000;
    }
}

/// How per-document occurrence counts are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfEncoding {
    None,
    /// One tf value per document in the doc list.
    List,
    /// One bit per occurrence in a side bitmap, set on first occurrences.
    Bitmap,
}

#[derive(Debug, Clone)]
pub struct DocColumns {
    pub schema: Arc<RowSchema>,
    pub doc_id: ColumnId<u32>,
    pub tf: Option<ColumnId<u32>>,
    pub payload: Option<ColumnId<u16>>,
    pub field_map: Option<ColumnId<u8>>,
}

/// Column layout and encoding switches of a doc list.
#[derive(Debug, Clone)]
pub struct DocListFormat {
    options: PostingOptions,
    tf: TfEncoding,
    columns: DocColumns,
}

impl DocListFormat {
    pub fn new(options: PostingOptions) -> Result<Self, PostingError> {
        if options.contains(PostingOptions::TERM_FREQUENCY | PostingOptions::TF_BITMAP) {
            return Err(PostingError::InvalidFormat(
                "tf list and tf bitmap are mutually exclusive".into(),
            ));
        }
        if options.contains(PostingOptions::POSITION_PAYLOAD)
            && !options.contains(PostingOptions::POSITION_LIST)
        {
            return Err(PostingError::InvalidFormat(
                "position payload needs a position list".into(),
            ));
        }
        if options.contains(PostingOptions::POSITION_LIST)
            && !options.intersects(PostingOptions::TERM_FREQUENCY | PostingOptions::TF_BITMAP)
        {
            return Err(PostingError::InvalidFormat(
                "position list needs term frequencies".into(),
            ));
        }

        let tf = if options.contains(PostingOptions::TERM_FREQUENCY) {
            TfEncoding::List
        } else if options.contains(PostingOptions::TF_BITMAP) {
            TfEncoding::Bitmap
        } else {
            TfEncoding::None
        };

        let mut b = RowSchema::builder();
        let doc_id = b.column::<u32>();
        let tf_column = (tf == TfEncoding::List).then(|| b.column::<u32>());
        let payload = options
            .contains(PostingOptions::DOC_PAYLOAD)
            .then(|| b.column::<u16>());
        let field_map = options
            .contains(PostingOptions::FIELD_MAP)
            .then(|| b.column::<u8>());

        Ok(Self {
            options,
            tf,
            columns: DocColumns {
                schema: b.build()?,
                doc_id,
                tf: tf_column,
                payload,
                field_map,
            },
        })
    }

    #[inline]
    pub fn options(&self) -> PostingOptions {
        self.options
    }

    #[inline]
    pub fn tf_encoding(&self) -> TfEncoding {
        self.tf
    }

    #[inline]
    pub fn has_tf_list(&self) -> bool {
        self.tf == TfEncoding::List
    }

    #[inline]
    pub fn has_tf_bitmap(&self) -> bool {
        self.tf == TfEncoding::Bitmap
    }

    #[inline]
    pub fn has_doc_payload(&self) -> bool {
        self.columns.payload.is_some()
    }

    #[inline]
    pub fn has_field_map(&self) -> bool {
        self.columns.field_map.is_some()
    }

    #[inline]
    pub fn reference_compress(&self) -> bool {
        self.options.contains(PostingOptions::REFERENCE_COMPRESS)
    }

    pub fn columns(&self) -> &DocColumns {
        &self.columns
    }

    /// Skip entries carry the running ttf only when a tf list exists.
    pub fn skip_kind(&self) -> SkipListKind {
        if self.has_tf_list() {
            SkipListKind::Triple
        } else {
            SkipListKind::Pair
        }
    }
}

#[derive(Debug, Clone)]
pub struct PositionColumns {
    pub schema: Arc<RowSchema>,
    pub position: ColumnId<u32>,
    pub payload: Option<ColumnId<u8>>,
}

/// Column layout of a position list.
#[derive(Debug, Clone)]
pub struct PositionListFormat {
    columns: PositionColumns,
}

impl PositionListFormat {
    /// `None` when the options carry no position list.
    pub fn from_options(options: PostingOptions) -> Result<Option<Self>, PostingError> {
        if !options.contains(PostingOptions::POSITION_LIST) {
            return Ok(None);
        }
        let mut b = RowSchema::builder();
        let position = b.column::<u32>();
        let payload = options
            .contains(PostingOptions::POSITION_PAYLOAD)
            .then(|| b.column::<u8>());
        Ok(Some(Self {
            columns: PositionColumns {
                schema: b.build()?,
                position,
                payload,
            },
        }))
    }

    pub fn columns(&self) -> &PositionColumns {
        &self.columns
    }

    #[inline]
    pub fn has_payload(&self) -> bool {
        self.columns.payload.is_some()
    }
}

/// Per-term statistics handed to the term dictionary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermMeta {
    pub df: u32,
    pub total_tf: u32,
    pub payload: u32,
}
