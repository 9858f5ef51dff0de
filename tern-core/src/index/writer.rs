//! Serialization of a quantized index to the on-disk file set.
//!
//! The writer is a [`PostingsSink`]: the quantizer streams each term's
//! quantized postings (and then the primary keys) into it, and it lays the
//! bytes out as the quantizer goes. Layout per term inside the postings
//! blob: the segment-header array first (one packed header per impact,
//! highest impact first), then the encoded docid runs the headers point at.
//! The vocabulary records each term's header-array offset; see the reader
//! for the inverse walk.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::codecs::{self, CompressInteger};
use crate::decode::DGap;
use crate::error::{Error, Result};
use crate::index::memory::CollectedIndex;
use crate::index::{
    DESCRIPTOR_FILENAME, DESCRIPTOR_MAGIC, POSTINGS_FILENAME, PRIMARY_KEYS_FILENAME,
    SEGMENT_HEADER_BYTES, VOCABULARY_FILENAME,
};
use crate::quantize::{PostingsSink, Quantizer, Ranker};

/// Counters reported after a successful write.
#[derive(Debug, Clone)]
pub struct WriteStats {
    pub documents: u32,
    pub terms: usize,
    pub segments: usize,
    pub postings_bytes: usize,
    pub smallest_rsv: f64,
    pub largest_rsv: f64,
}

/// Writes one immutable index snapshot into a directory.
pub struct IndexWriter<'a> {
    directory: &'a Path,
    codec: &'static dyn CompressInteger,
    d_gap: DGap,
}

impl<'a> IndexWriter<'a> {
    /// `codec_name` must resolve through the codec registry. A [`DGap::None`]
    /// index ignores the codec and stores raw docid arrays.
    pub fn new(directory: &'a Path, codec_name: &str, d_gap: DGap) -> Result<Self> {
        let codec = codecs::for_name(codec_name)
            .ok_or_else(|| Error::UnknownCodec(codec_name.to_string()))?;
        Ok(IndexWriter {
            directory,
            codec,
            d_gap,
        })
    }

    /// Quantize `index` with `ranker` and serialize the result.
    pub fn write<R: Ranker>(&self, index: &CollectedIndex, ranker: R) -> Result<WriteStats> {
        let mut quantizer = Quantizer::new(index.document_count(), ranker);
        let mut files = SerialisedFiles::new(self.codec, self.d_gap);
        quantizer.serialise_index(index, &mut files)?;

        let (smallest_rsv, largest_rsv) = quantizer.bounds();
        log::info!(
            "quantizer bounds: smallest rsv {:.4}, largest rsv {:.4}",
            smallest_rsv,
            largest_rsv
        );

        self.write_file(VOCABULARY_FILENAME, &files.vocabulary)?;
        self.write_file(POSTINGS_FILENAME, &files.blob)?;
        self.write_file(PRIMARY_KEYS_FILENAME, &files.primary_keys)?;
        let descriptor = format!(
            "{}\n{}\n{}\n",
            DESCRIPTOR_MAGIC,
            self.codec.name(),
            self.d_gap.as_descriptor()
        );
        self.write_file(DESCRIPTOR_FILENAME, descriptor.as_bytes())?;

        log::info!(
            "wrote index to {}: {} terms, {} segments, {} postings bytes",
            self.directory.display(),
            index.term_count(),
            files.segments,
            files.blob.len()
        );
        Ok(WriteStats {
            documents: index.document_count(),
            terms: index.term_count(),
            segments: files.segments,
            postings_bytes: files.blob.len(),
            smallest_rsv,
            largest_rsv,
        })
    }

    fn write_file(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut file = File::create(self.directory.join(name))?;
        file.write_all(bytes)?;
        Ok(())
    }
}

/// In-memory images of the index files, filled as the quantizer streams
/// postings in.
struct SerialisedFiles {
    codec: &'static dyn CompressInteger,
    d_gap: DGap,
    vocabulary: Vec<u8>,
    blob: Vec<u8>,
    primary_keys: Vec<u8>,
    segments: usize,
    /// Scratch: docids grouped per impact, reused across terms.
    runs: Box<[Vec<u32>; 256]>,
}

impl SerialisedFiles {
    fn new(codec: &'static dyn CompressInteger, d_gap: DGap) -> Self {
        SerialisedFiles {
            codec,
            d_gap,
            vocabulary: Vec::new(),
            blob: Vec::new(),
            primary_keys: Vec::new(),
            segments: 0,
            runs: Box::new(std::array::from_fn(|_| Vec::new())),
        }
    }

    /// Apply the d-gap transform and encode one docid run, growing the
    /// output buffer until the codec stops reporting overflow.
    fn encode_run(&self, document_ids: &[u32]) -> Vec<u8> {
        debug_assert!(!document_ids.is_empty());

        let values: Vec<u32> = match self.d_gap {
            DGap::D0 | DGap::None => document_ids.to_vec(),
            DGap::D1 => {
                let mut previous = 0;
                document_ids
                    .iter()
                    .map(|&document_id| {
                        let gap = document_id - previous;
                        previous = document_id;
                        gap
                    })
                    .collect()
            }
        };

        if self.d_gap == DGap::None {
            let mut raw = Vec::with_capacity(values.len() * 4);
            for value in values {
                raw.extend_from_slice(&value.to_le_bytes());
            }
            return raw;
        }

        let mut buffer = vec![0u8; values.len() * 8 + 128];
        loop {
            let written = self.codec.encode(&mut buffer, &values);
            if written != 0 {
                buffer.truncate(written);
                return buffer;
            }
            // Overflow is recoverable: retry with a larger buffer.
            buffer = vec![0u8; buffer.len() * 2];
        }
    }
}

impl PostingsSink for SerialisedFiles {
    fn on_posting(&mut self, term: &[u8], document_ids: &[u32], impacts: &[u8]) {
        // Group docids per impact; within one impact the original
        // (ascending) order is preserved.
        for run in self.runs.iter_mut() {
            run.clear();
        }
        for (&document_id, &impact) in document_ids.iter().zip(impacts) {
            self.runs[impact as usize].push(document_id);
        }
        let impact_count = self.runs.iter().filter(|run| !run.is_empty()).count();

        // Reserve the header array, then append each run's payload and
        // back-fill its header.
        let header_array_offset = self.blob.len() as u64;
        self.blob
            .resize(self.blob.len() + impact_count * SEGMENT_HEADER_BYTES, 0);

        let mut header_at = header_array_offset as usize;
        for impact in (1..=255u8).rev() {
            if self.runs[impact as usize].is_empty() {
                continue;
            }
            let offset = self.blob.len() as u64;
            let run = std::mem::take(&mut self.runs[impact as usize]);
            let payload = self.encode_run(&run);
            self.blob.extend_from_slice(&payload);
            let end = self.blob.len() as u64;

            let header = &mut self.blob[header_at..header_at + SEGMENT_HEADER_BYTES];
            header[0] = impact;
            header[1..5].copy_from_slice(&(run.len() as u32).to_le_bytes());
            header[5..13].copy_from_slice(&offset.to_le_bytes());
            header[13..21].copy_from_slice(&end.to_le_bytes());
            header_at += SEGMENT_HEADER_BYTES;
            self.segments += 1;
            self.runs[impact as usize] = run;
        }

        self.vocabulary
            .extend_from_slice(&(term.len() as u32).to_le_bytes());
        self.vocabulary.extend_from_slice(term);
        self.vocabulary
            .extend_from_slice(&(impact_count as u32).to_le_bytes());
        self.vocabulary
            .extend_from_slice(&header_array_offset.to_le_bytes());
    }

    fn on_primary_key(&mut self, _document_id: u32, primary_key: &[u8]) {
        self.primary_keys
            .extend_from_slice(&(primary_key.len() as u32).to_le_bytes());
        self.primary_keys.extend_from_slice(primary_key);
    }
}
