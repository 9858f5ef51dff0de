//! In-memory index accumulation and the sharded parallel build.
//!
//! Each build thread owns a private [`Arena`] and a private term map; there
//! is no cross-thread mutation. A single-threaded reduction phase then reads
//! the shard outputs in docid order and produces one [`CollectedIndex`] whose
//! term map is sorted by raw term bytes, ready for serialization.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use rustc_hash::FxHashMap;

use crate::memory::Arena;
use crate::postings::PostingsAccumulator;

/// One document ready for ingestion: an external identifier plus its tokens
/// in order. Token positions count from 1.
#[derive(Debug, Clone)]
pub struct Document {
    pub primary_key: Vec<u8>,
    pub terms: Vec<Vec<u8>>,
}

/// Per-term postings materialized out of the arena, positions dropped.
#[derive(Debug, Clone, Default)]
pub struct TermPostings {
    pub document_ids: Vec<u32>,
    pub term_frequencies: Vec<u16>,
}

/// One shard's owned output, safe to move across threads.
pub struct ExtractedShard {
    pub terms: FxHashMap<Vec<u8>, TermPostings>,
    pub primary_keys: Vec<Vec<u8>>,
}

/// The merged, build-complete index: vocabulary in raw-byte order plus the
/// primary-key table in docid order (docids count from 1).
pub struct CollectedIndex {
    pub terms: BTreeMap<Vec<u8>, TermPostings>,
    pub primary_keys: Vec<Vec<u8>>,
}

impl CollectedIndex {
    pub fn document_count(&self) -> u32 {
        self.primary_keys.len() as u32
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }
}

/// Accumulates one ingestion shard. Thread-unsafe by design: the arena and
/// every accumulator in the map belong to exactly one thread.
pub struct MemoryIndex<'a> {
    arena: &'a Arena,
    postings: FxHashMap<Vec<u8>, PostingsAccumulator<'a>>,
    primary_keys: Vec<Vec<u8>>,
    highest_document_id: u32,
}

impl<'a> MemoryIndex<'a> {
    pub fn new(arena: &'a Arena) -> Self {
        Self::with_base(arena, 0)
    }

    /// Start docids after `base`: shard `i` of a parallel build owns the
    /// contiguous range following shard `i - 1`.
    pub fn with_base(arena: &'a Arena, base: u32) -> Self {
        MemoryIndex {
            arena,
            postings: FxHashMap::default(),
            primary_keys: Vec::new(),
            highest_document_id: base,
        }
    }

    /// Register a document and return its internal docid (counting from 1).
    pub fn add_document(&mut self, primary_key: &[u8]) -> u32 {
        self.highest_document_id += 1;
        self.primary_keys.push(primary_key.to_vec());
        self.highest_document_id
    }

    /// Record one occurrence of `term` at `position` in `document_id`.
    pub fn add_term(&mut self, term: &[u8], document_id: u32, position: u32) {
        match self.postings.get_mut(term) {
            Some(accumulator) => accumulator.push_back(document_id, position),
            None => {
                let mut accumulator = PostingsAccumulator::new(self.arena);
                accumulator.push_back(document_id, position);
                self.postings.insert(term.to_vec(), accumulator);
            }
        }
    }

    /// Ingest a whole document: assigns the docid and indexes every token.
    pub fn index_document(&mut self, document: &Document) -> u32 {
        let document_id = self.add_document(&document.primary_key);
        for (index, term) in document.terms.iter().enumerate() {
            self.add_term(term, document_id, index as u32 + 1);
        }
        document_id
    }

    pub fn document_count(&self) -> usize {
        self.primary_keys.len()
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Access an accumulator, e.g. for rendering.
    pub fn postings(&self, term: &[u8]) -> Option<&PostingsAccumulator<'a>> {
        self.postings.get(term)
    }

    /// Materialize every accumulator into owned vectors so the arena can be
    /// released. Positions are ingestion-side only and are dropped here.
    pub fn extract(self) -> ExtractedShard {
        let mut terms =
            FxHashMap::with_capacity_and_hasher(self.postings.len(), Default::default());
        for (term, accumulator) in self.postings {
            terms.insert(
                term,
                TermPostings {
                    document_ids: accumulator.documents().collect(),
                    term_frequencies: accumulator.frequencies().collect(),
                },
            );
        }
        ExtractedShard {
            terms,
            primary_keys: self.primary_keys,
        }
    }
}

/// Build an index from `documents` across `num_shards` parallel ingestion
/// shards.
///
/// Documents are split into contiguous chunks, so shard docid ranges are
/// disjoint and ascending; the reduction concatenates per-term lists in
/// shard order, which preserves the strictly-increasing docid invariant.
pub fn build_index(documents: &[Document], num_shards: usize) -> CollectedIndex {
    use rayon::prelude::*;

    let chunk_size = documents.len().div_ceil(num_shards.max(1)).max(1);
    let shards: Vec<ExtractedShard> = documents
        .par_chunks(chunk_size)
        .enumerate()
        .map(|(shard, chunk)| {
            let arena = Arena::new();
            let mut index = MemoryIndex::with_base(&arena, (shard * chunk_size) as u32);
            for document in chunk {
                index.index_document(document);
            }
            log::debug!(
                "shard {}: {} documents, {} terms, {} arena bytes",
                shard,
                index.document_count(),
                index.term_count(),
                arena.allocated_bytes(),
            );
            index.extract()
        })
        .collect();

    // Single-threaded reduction in shard (and therefore docid) order.
    let mut terms: BTreeMap<Vec<u8>, TermPostings> = BTreeMap::new();
    let mut primary_keys = Vec::with_capacity(documents.len());
    for shard in shards {
        primary_keys.extend(shard.primary_keys);
        for (term, postings) in shard.terms {
            match terms.entry(term) {
                Entry::Occupied(mut entry) => {
                    let merged = entry.get_mut();
                    merged.document_ids.extend(postings.document_ids);
                    merged.term_frequencies.extend(postings.term_frequencies);
                }
                Entry::Vacant(entry) => {
                    entry.insert(postings);
                }
            }
        }
    }

    log::info!(
        "built index: {} documents, {} terms",
        primary_keys.len(),
        terms.len()
    );
    CollectedIndex {
        terms,
        primary_keys,
    }
}
