//! Readback of a serialized index snapshot.
//!
//! The file set is mapped read-only and validated once at open: descriptor
//! magic, codec name, d-ness, vocabulary and primary-key record framing, and
//! every term's segment-header range. Anything malformed is fatal and
//! surfaces as a single [`Error::Corruption`] carrying a cause tag.

use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;

use crate::codecs::{self, CompressInteger};
use crate::decode::DGap;
use crate::error::{Error, Result};
use crate::index::{
    DESCRIPTOR_FILENAME, DESCRIPTOR_MAGIC, POSTINGS_FILENAME, PRIMARY_KEYS_FILENAME,
    SEGMENT_HEADER_BYTES, VOCABULARY_FILENAME,
};

/// Read-only bytes of one index file. Memory-mapped when non-empty; mapping
/// a zero-length file is not portable, so empty files fall back to an owned
/// buffer.
enum FileBuffer {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl FileBuffer {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(FileBuffer::Owned(Vec::new()));
        }
        // The snapshot is immutable once written; mapping it read-only is
        // the lifecycle the format is built around.
        let map = unsafe { Mmap::map(&file)? };
        Ok(FileBuffer::Mapped(map))
    }
}

impl Deref for FileBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileBuffer::Mapped(map) => map,
            FileBuffer::Owned(bytes) => bytes,
        }
    }
}

/// Offsets of one vocabulary record within the mapped vocabulary file.
struct TermEntry {
    term_start: usize,
    term_len: usize,
    impacts: u32,
    offset: u64,
}

/// One term of the vocabulary, in on-disk order.
#[derive(Debug, Clone, Copy)]
pub struct TermRecord<'a> {
    pub term: &'a [u8],
    /// Number of segments (distinct impacts) for this term.
    pub impacts: u32,
    /// Start of this term's segment-header array within the postings blob.
    pub offset: u64,
}

/// One `(impact, docid-run)` segment of a postings list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub impact: u8,
    /// Number of docids in the run.
    pub segment_frequency: u32,
    /// Payload byte range within the postings blob.
    pub offset: u64,
    pub end: u64,
}

/// A deserialized, immutable index snapshot.
pub struct DeserialisedIndex {
    vocabulary: FileBuffer,
    postings: FileBuffer,
    primary_key_data: FileBuffer,
    term_entries: Vec<TermEntry>,
    /// `(start, len)` of each primary key within `primary_key_data`.
    primary_key_entries: Vec<(usize, usize)>,
    codec: &'static dyn CompressInteger,
    d_gap: DGap,
}

impl DeserialisedIndex {
    /// Open and validate the index file set in `directory`.
    pub fn open(directory: &Path) -> Result<Self> {
        let descriptor = std::fs::read_to_string(directory.join(DESCRIPTOR_FILENAME))?;
        let (codec, d_gap) = parse_descriptor(&descriptor)?;

        let vocabulary = FileBuffer::open(&directory.join(VOCABULARY_FILENAME))?;
        let postings = FileBuffer::open(&directory.join(POSTINGS_FILENAME))?;
        let primary_key_data = FileBuffer::open(&directory.join(PRIMARY_KEYS_FILENAME))?;

        let term_entries = parse_vocabulary(&vocabulary, postings.len())?;
        let primary_key_entries = parse_primary_keys(&primary_key_data)?;

        log::debug!(
            "opened index at {}: {} terms, {} documents, codec {}, d-ness {}",
            directory.display(),
            term_entries.len(),
            primary_key_entries.len(),
            codec.name(),
            d_gap.as_descriptor(),
        );

        Ok(DeserialisedIndex {
            vocabulary,
            postings,
            primary_key_data,
            term_entries,
            primary_key_entries,
            codec,
            d_gap,
        })
    }

    /// The codec this index was built with, and the d-ness that drives
    /// decoder dispatch.
    pub fn codex(&self) -> (&'static dyn CompressInteger, DGap) {
        (self.codec, self.d_gap)
    }

    pub fn term_count(&self) -> usize {
        self.term_entries.len()
    }

    /// Number of documents (equals the primary-key count).
    pub fn document_count(&self) -> u32 {
        self.primary_key_entries.len() as u32
    }

    /// Iterate the vocabulary in on-disk (raw byte) order.
    pub fn terms(&self) -> impl Iterator<Item = TermRecord<'_>> {
        self.term_entries.iter().map(|entry| TermRecord {
            term: &self.vocabulary[entry.term_start..entry.term_start + entry.term_len],
            impacts: entry.impacts,
            offset: entry.offset,
        })
    }

    /// Parse the segment-header array of one term.
    pub fn segment_headers(&self, term: &TermRecord<'_>) -> Result<Vec<SegmentHeader>> {
        let start = term.offset as usize;
        let mut headers = Vec::with_capacity(term.impacts as usize);
        for index in 0..term.impacts as usize {
            let at = start + index * SEGMENT_HEADER_BYTES;
            let bytes = self
                .postings
                .get(at..at + SEGMENT_HEADER_BYTES)
                .ok_or_else(|| corrupt("segment header out of range"))?;
            let header = SegmentHeader {
                impact: bytes[0],
                segment_frequency: u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
                offset: u64::from_le_bytes([
                    bytes[5], bytes[6], bytes[7], bytes[8], bytes[9], bytes[10], bytes[11],
                    bytes[12],
                ]),
                end: u64::from_le_bytes([
                    bytes[13], bytes[14], bytes[15], bytes[16], bytes[17], bytes[18], bytes[19],
                    bytes[20],
                ]),
            };
            if header.offset > header.end || header.end as usize > self.postings.len() {
                return Err(corrupt("segment payload out of range"));
            }
            headers.push(header);
        }
        Ok(headers)
    }

    /// The whole postings blob.
    pub fn postings(&self) -> &[u8] {
        &self.postings
    }

    /// The encoded payload of one segment.
    pub fn payload(&self, header: &SegmentHeader) -> &[u8] {
        // Range validated by segment_headers().
        &self.postings[header.offset as usize..header.end as usize]
    }

    /// Iterate primary keys in internal docid order.
    pub fn primary_keys(&self) -> impl Iterator<Item = &[u8]> {
        self.primary_key_entries
            .iter()
            .map(|&(start, len)| &self.primary_key_data[start..start + len])
    }

    /// Look up one primary key by internal docid (counting from 1).
    pub fn primary_key(&self, document_id: u32) -> Result<&[u8]> {
        let index = (document_id as usize)
            .checked_sub(1)
            .ok_or(Error::DocumentNotFound(document_id))?;
        let &(start, len) = self
            .primary_key_entries
            .get(index)
            .ok_or(Error::DocumentNotFound(document_id))?;
        Ok(&self.primary_key_data[start..start + len])
    }
}

fn corrupt(cause: &str) -> Error {
    Error::Corruption(cause.to_string())
}

fn parse_descriptor(descriptor: &str) -> Result<(&'static dyn CompressInteger, DGap)> {
    let mut lines = descriptor.lines();
    match lines.next() {
        Some(line) if line.trim() == DESCRIPTOR_MAGIC => {}
        _ => return Err(corrupt("descriptor magic mismatch")),
    }
    let codec_name = lines
        .next()
        .map(str::trim)
        .ok_or_else(|| corrupt("descriptor missing codec name"))?;
    let codec = codecs::for_name(codec_name)
        .ok_or_else(|| corrupt(&format!("unknown codec '{codec_name}'")))?;
    let d_ness: i32 = lines
        .next()
        .and_then(|line| line.trim().parse().ok())
        .ok_or_else(|| corrupt("descriptor missing d-ness"))?;
    let d_gap =
        DGap::from_descriptor(d_ness).ok_or_else(|| corrupt("d-ness out of domain"))?;
    Ok((codec, d_gap))
}

fn parse_vocabulary(vocabulary: &[u8], postings_len: usize) -> Result<Vec<TermEntry>> {
    let mut entries = Vec::new();
    let mut at = 0usize;
    while at < vocabulary.len() {
        let len_bytes = vocabulary
            .get(at..at + 4)
            .ok_or_else(|| corrupt("vocabulary truncated"))?;
        let term_len =
            u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
        let term_start = at + 4;

        let trailer = vocabulary
            .get(term_start + term_len..term_start + term_len + 12)
            .ok_or_else(|| corrupt("vocabulary truncated"))?;
        let impacts = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let offset = u64::from_le_bytes([
            trailer[4], trailer[5], trailer[6], trailer[7], trailer[8], trailer[9], trailer[10],
            trailer[11],
        ]);

        // The whole header array must lie inside the blob.
        let header_bytes = impacts as usize * SEGMENT_HEADER_BYTES;
        if (offset as usize).checked_add(header_bytes).is_none_or(|end| end > postings_len) {
            return Err(corrupt("segment header out of range"));
        }

        entries.push(TermEntry {
            term_start,
            term_len,
            impacts,
            offset,
        });
        at = term_start + term_len + 12;
    }
    Ok(entries)
}

fn parse_primary_keys(data: &[u8]) -> Result<Vec<(usize, usize)>> {
    let mut entries = Vec::new();
    let mut at = 0usize;
    while at < data.len() {
        let len_bytes = data
            .get(at..at + 4)
            .ok_or_else(|| corrupt("primary key table truncated"))?;
        let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
            as usize;
        let start = at + 4;
        if start + len > data.len() {
            return Err(corrupt("primary key table truncated"));
        }
        entries.push((start, len));
        at = start + len;
    }
    Ok(entries)
}
