//! In-memory accumulation of a single postings list during ingestion.

use std::fmt;

use crate::memory::{Arena, ChunkedVec, ChunkedVecIter};

/// First chunk of each per-term array holds this many elements.
const INITIAL_CAPACITY: usize = 4;

/// Per-term arrays grow by this factor per chunk.
const GROWTH_FACTOR: f64 = 1.5;

/// Term frequencies saturate here; `0xFFFF` is never stored.
pub const MAX_TERM_FREQUENCY: u16 = 0xFFFE;

/// One posting: a term occurrence at an absolute word offset in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub document_id: u32,
    pub term_frequency: u16,
    pub position: u32,
}

/// Accumulates one term's postings as three arena-backed arrays: document
/// ids (strictly increasing), term frequencies (one per document, saturating
/// at [`MAX_TERM_FREQUENCY`]), and word positions (strictly increasing within
/// a document).
///
/// Not thread-safe; lives entirely in its arena and is released wholesale
/// when the arena resets.
pub struct PostingsAccumulator<'a> {
    /// Highest document id seen so far, counting from 1; 0 before any push.
    highest_document: u32,
    /// Highest position seen so far, counting from 1; 0 before any push.
    highest_position: u32,
    document_ids: ChunkedVec<'a, u32>,
    term_frequencies: ChunkedVec<'a, u16>,
    positions: ChunkedVec<'a, u32>,
}

impl<'a> PostingsAccumulator<'a> {
    pub fn new(arena: &'a Arena) -> Self {
        PostingsAccumulator {
            highest_document: 0,
            highest_position: 0,
            document_ids: ChunkedVec::new(arena, INITIAL_CAPACITY, GROWTH_FACTOR),
            term_frequencies: ChunkedVec::new(arena, INITIAL_CAPACITY, GROWTH_FACTOR),
            positions: ChunkedVec::new(arena, INITIAL_CAPACITY, GROWTH_FACTOR),
        }
    }

    /// Record an occurrence of the term at `position` in `document_id`.
    ///
    /// Precondition (caller invariant, checked only in debug builds):
    /// `document_id >=` the last pushed document id, and `position >` the
    /// last pushed position whenever the document id repeats.
    pub fn push_back(&mut self, document_id: u32, position: u32) {
        debug_assert!(document_id >= 1);
        debug_assert!(document_id >= self.highest_document);
        debug_assert!(position >= 1);
        debug_assert!(document_id > self.highest_document || position > self.highest_position);

        if document_id == self.highest_document {
            // Repeat occurrence in the same document: bump the frequency.
            if let Some(frequency) = self.term_frequencies.back_mut()
                && *frequency < MAX_TERM_FREQUENCY
            {
                *frequency += 1;
            }
        } else {
            self.document_ids.push_back(document_id);
            self.term_frequencies.push_back(1);
            self.highest_document = document_id;
        }

        self.positions.push_back(position);
        self.highest_position = position;
    }

    /// Number of distinct documents (the term's document frequency).
    pub fn document_count(&self) -> usize {
        self.document_ids.len()
    }

    /// Total number of recorded positions.
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn documents(&self) -> ChunkedVecIter<'_, u32> {
        self.document_ids.iter()
    }

    pub fn frequencies(&self) -> ChunkedVecIter<'_, u16> {
        self.term_frequencies.iter()
    }

    pub fn word_positions(&self) -> ChunkedVecIter<'_, u32> {
        self.positions.iter()
    }

    /// Iterate postings in document-then-position order, one item per stored
    /// position with the document's frequency repeated.
    pub fn iter(&self) -> PostingsIter<'_> {
        PostingsIter {
            documents: self.document_ids.iter(),
            frequencies: self.term_frequencies.iter(),
            positions: self.positions.iter(),
            current_document: 0,
            current_frequency: 0,
            remaining: 0,
        }
    }

    /// Human-readable rendering: `<docid,tf,pos,pos…>` runs, one per document.
    pub fn text_render(&self) -> String {
        let mut out = String::new();
        let mut previous = None;
        for posting in self.iter() {
            if previous != Some(posting.document_id) {
                if previous.is_some() {
                    out.push('>');
                }
                out.push_str(&format!(
                    "<{},{},{}",
                    posting.document_id, posting.term_frequency, posting.position
                ));
                previous = Some(posting.document_id);
            } else {
                out.push_str(&format!(",{}", posting.position));
            }
        }
        if previous.is_some() {
            out.push('>');
        }
        out
    }
}

impl fmt::Display for PostingsAccumulator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text_render())
    }
}

/// Iterator returned by [`PostingsAccumulator::iter`].
pub struct PostingsIter<'v> {
    documents: ChunkedVecIter<'v, u32>,
    frequencies: ChunkedVecIter<'v, u16>,
    positions: ChunkedVecIter<'v, u32>,
    current_document: u32,
    current_frequency: u16,
    remaining: u16,
}

impl Iterator for PostingsIter<'_> {
    type Item = Posting;

    fn next(&mut self) -> Option<Posting> {
        if self.remaining == 0 {
            self.current_document = self.documents.next()?;
            self.current_frequency = self.frequencies.next()?;
            self.remaining = self.current_frequency;
        }
        let position = self.positions.next()?;
        self.remaining -= 1;
        Some(Posting {
            document_id: self.current_document,
            term_frequency: self.current_frequency,
            position,
        })
    }
}
