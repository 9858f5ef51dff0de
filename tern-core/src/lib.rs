//! Tern - an impact-ordered inverted index engine
//!
//! The core pipeline, build side to query side:
//! - Arena-backed postings accumulation during document ingestion
//! - Impact quantization of ranker scores into one byte per posting
//! - A family of integer codecs, including the SIMD Elias-gamma
//!   variable-byte scheme with its 68-byte frame wire format
//! - The serialized index file set (vocabulary, postings blob, primary
//!   keys, codec descriptor) with memory-mapped readback
//! - A streaming decode loop that dispatches `(impact, docid)` postings
//!   into a consumer sink

pub mod codecs;
pub mod decode;
pub mod error;
pub mod index;
pub mod memory;
pub mod postings;
pub mod quantize;
pub mod structures;

// Re-exports from codecs
pub use codecs::{
    BITPACK_BLOCK_SIZE, CompressInteger, CompressIntegerBitpack, CompressIntegerEliasGammaSimd,
    CompressIntegerNone, CompressIntegerVariableByte, FRAME_BYTES,
};

// Re-exports from decode
pub use decode::{DECODE_PADDING, DGap, Decoder, Processor};

// Re-exports from index
pub use index::{
    CollectedIndex, DESCRIPTOR_FILENAME, DESCRIPTOR_MAGIC, DeserialisedIndex, Document,
    IndexWriter, MemoryIndex, POSTINGS_FILENAME, PRIMARY_KEYS_FILENAME, SegmentHeader,
    TermPostings, TermRecord, VOCABULARY_FILENAME, WriteStats, build_index,
};

// Re-exports from the remaining modules
pub use error::{Error, Result};
pub use memory::Arena;
pub use postings::{MAX_TERM_FREQUENCY, Posting, PostingsAccumulator};
pub use quantize::{
    IdfTfRanker, LARGEST_IMPACT, PostingsSink, Quantizer, Ranker, SMALLEST_IMPACT,
};
pub use structures::PointerOrd;

pub type DocId = u32;
pub type TermFreq = u16;
pub type Impact = u8;
