//! Streaming decode of postings segments into a consumer sink.
//!
//! A segment is one `(impact, docid-run)` unit. [`Decoder::decode_and_process`]
//! decompresses the run, reconstructs absolute docids according to the
//! index's d-gap mode, and streams them into a [`Processor`]: the impact is
//! announced once via `set_score`, docids then flow through `push_back` in
//! SIMD-aligned groups of eight with a scalar `add_rsv` tail.

use byteorder::{ByteOrder, LittleEndian};

use crate::codecs::CompressInteger;

/// Extra integers allocated past the document count; decoders may overwrite
/// up to their declared overscan.
pub const DECODE_PADDING: usize = 4096;

/// How docids were transformed before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DGap {
    /// Ascending docids encoded as-is.
    D0,
    /// One delta chain: first docid, then gaps.
    D1,
    /// No codec at all; the payload is the raw little-endian docid array.
    None,
}

impl DGap {
    /// The d-ness value stored in the index descriptor.
    pub fn as_descriptor(self) -> i32 {
        match self {
            DGap::D0 => 0,
            DGap::D1 => 1,
            DGap::None => -1,
        }
    }

    pub fn from_descriptor(value: i32) -> Option<Self> {
        match value {
            0 => Some(DGap::D0),
            1 => Some(DGap::D1),
            -1 => Some(DGap::None),
            _ => None,
        }
    }
}

/// Consumer of decoded postings. How queries, dumpers, and evaluators hook
/// into the decode loop.
///
/// `push_back` receives groups of eight docids straight from the vector
/// path; zero entries are codec padding slots (genuine docids count from 1)
/// and implementations must skip them. `add_rsv` handles the scalar tail and
/// is never called with zero.
pub trait Processor {
    /// Announce the impact for the segment about to be streamed.
    fn set_score(&mut self, impact: u64);

    /// Consume one SIMD-aligned group of eight docids.
    fn push_back(&mut self, document_ids: &[u32; 8]);

    /// Consume a single `(docid, impact)` posting.
    fn add_rsv(&mut self, document_id: u64, impact: u64);
}

/// Reusable decode buffer plus the dispatch loop.
pub struct Decoder {
    buffer: Vec<u32>,
}

impl Decoder {
    /// `document_count` bounds the docids any segment can hold; the buffer
    /// carries [`DECODE_PADDING`] integers of headroom for codec overscan.
    pub fn new(document_count: usize) -> Self {
        Decoder {
            buffer: vec![0u32; document_count + DECODE_PADDING],
        }
    }

    /// Decode one segment and stream it into `sink`.
    pub fn decode_and_process(
        &mut self,
        d_gap: DGap,
        impact: u8,
        sink: &mut impl Processor,
        codec: &dyn CompressInteger,
        document_count: usize,
        payload: &[u8],
    ) {
        if self.buffer.len() < document_count + DECODE_PADDING {
            self.buffer.resize(document_count + DECODE_PADDING, 0);
        }

        match d_gap {
            DGap::None => {
                LittleEndian::read_u32_into(
                    &payload[..document_count * 4],
                    &mut self.buffer[..document_count],
                );
            }
            DGap::D0 => {
                codec.decode(&mut self.buffer, document_count, payload);
            }
            DGap::D1 => {
                codec.decode(&mut self.buffer, document_count, payload);
                let mut document_id = 0u32;
                for gap in self.buffer[..document_count].iter_mut() {
                    document_id = document_id.wrapping_add(*gap);
                    *gap = document_id;
                }
            }
        }

        sink.set_score(impact as u64);

        let mut groups = self.buffer[..document_count].chunks_exact(8);
        for group in &mut groups {
            let group: &[u32; 8] = group.try_into().expect("chunks_exact yields groups of 8");
            sink.push_back(group);
        }
        for &document_id in groups.remainder() {
            sink.add_rsv(document_id as u64, impact as u64);
        }
    }
}
