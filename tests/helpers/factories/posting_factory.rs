use std::sync::Arc;

use crate::engine::core::memory::MemoryPool;
use crate::engine::core::posting::{PostingOptions, PostingWriter};
use crate::shared::config::{MemoryConfig, PostingConfig};

/// What a test should read back for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDoc {
    pub doc_id: u32,
    pub payload: u16,
    pub field_map: u8,
    pub positions: Vec<u32>,
    pub pos_payloads: Vec<u8>,
}

impl ExpectedDoc {
    pub fn tf(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// Deterministic term postings: doc `i` gets id `first_doc + i * gap + i % 3`
/// and `1 + i % 4` occurrences spread over fields `0..3`.
pub struct PostingFactory {
    options: PostingOptions,
    posting: PostingConfig,
    memory: MemoryConfig,
    doc_count: usize,
    first_doc: u32,
    gap: u32,
}

impl PostingFactory {
    pub fn new() -> Self {
        Self {
            options: PostingOptions::TERM_FREQUENCY | PostingOptions::POSITION_LIST,
            posting: PostingConfig::default(),
            memory: MemoryConfig::default(),
            doc_count: 10,
            first_doc: 3,
            gap: 5,
        }
    }

    pub fn with_options(mut self, options: PostingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_config(mut self, posting: PostingConfig) -> Self {
        self.posting = posting;
        self
    }

    pub fn with_doc_count(mut self, doc_count: usize) -> Self {
        self.doc_count = doc_count;
        self
    }

    pub fn with_first_doc(mut self, first_doc: u32) -> Self {
        self.first_doc = first_doc;
        self
    }

    pub fn options(&self) -> PostingOptions {
        self.options
    }

    pub fn config(&self) -> &PostingConfig {
        &self.posting
    }

    pub fn docs(&self) -> Vec<ExpectedDoc> {
        (0..self.doc_count)
            .map(|i| {
                let tf = 1 + i % 4;
                let start = (i % 7) as u32;
                let positions: Vec<u32> = (0..tf).map(|j| start + j as u32 * 3).collect();
                let field_map = (0..tf).fold(0u8, |map, j| map | 1 << (j % 3));
                ExpectedDoc {
                    doc_id: self.first_doc + i as u32 * self.gap + (i % 3) as u32,
                    payload: (i as u16).wrapping_mul(11),
                    field_map,
                    pos_payloads: (0..tf).map(|j| (i + j) as u8).collect(),
                    positions,
                }
            })
            .collect()
    }

    /// Writer with every document added; the segment is left open.
    pub fn create(&self, pool: &Arc<MemoryPool>) -> (PostingWriter, Vec<ExpectedDoc>) {
        let mut writer = PostingWriter::new(self.options, &self.posting, &self.memory, pool)
            .expect("valid posting options");
        let docs = self.docs();
        for doc in &docs {
            for (j, pos) in doc.positions.iter().enumerate() {
                writer
                    .add_position(*pos, doc.pos_payloads[j], (j % 3) as u8)
                    .expect("add position");
            }
            writer
                .end_document(doc.doc_id, doc.payload)
                .expect("end document");
        }
        (writer, docs)
    }

    pub fn create_finished(&self, pool: &Arc<MemoryPool>) -> (PostingWriter, Vec<ExpectedDoc>) {
        let (mut writer, docs) = self.create(pool);
        writer.end_segment().expect("end segment");
        (writer, docs)
    }
}
