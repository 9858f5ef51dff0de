//! End-to-end build → quantize → write → read → decode tests.

use tempfile::TempDir;

use crate::decode::{DGap, Decoder, Processor};
use crate::index::{DeserialisedIndex, Document, IndexWriter, build_index};
use crate::quantize::{IdfTfRanker, LARGEST_IMPACT, SMALLEST_IMPACT};

fn doc(primary_key: &str, text: &str) -> Document {
    Document {
        primary_key: primary_key.as_bytes().to_vec(),
        terms: text
            .split_whitespace()
            .map(|t| t.as_bytes().to_vec())
            .collect(),
    }
}

fn corpus() -> Vec<Document> {
    vec![
        doc("pk-01", "the albatross the albatross the albatross"),
        doc("pk-02", "the gull gull"),
        doc("pk-03", "the petrel"),
        doc("pk-04", "the petrel petrel"),
        doc("pk-05", "the gull"),
        doc("pk-06", "the shearwater"),
        doc("pk-07", "the petrel"),
        doc("pk-08", "the shearwater shearwater"),
        doc("pk-09", "the petrel"),
        doc("pk-10", "the"),
    ]
}

/// Accumulates `<doc, impact>` pairs per term, filtering padding zeros.
#[derive(Default)]
struct Accumulated {
    impact: u64,
    postings: Vec<(u64, u64)>,
}

impl Processor for Accumulated {
    fn set_score(&mut self, impact: u64) {
        self.impact = impact;
    }

    fn push_back(&mut self, document_ids: &[u32; 8]) {
        for &document_id in document_ids {
            if document_id != 0 {
                self.postings.push((document_id as u64, self.impact));
            }
        }
    }

    fn add_rsv(&mut self, document_id: u64, impact: u64) {
        self.postings.push((document_id, impact));
    }
}

/// Drive the full decode loop over every term of a deserialized index.
fn dump(index: &DeserialisedIndex) -> Vec<(Vec<u8>, Vec<(u64, u64)>)> {
    let (codec, d_gap) = index.codex();
    let mut decoder = Decoder::new(index.document_count() as usize);
    let mut result = Vec::new();
    for term in index.terms() {
        let mut sink = Accumulated::default();
        for header in index.segment_headers(&term).unwrap() {
            decoder.decode_and_process(
                d_gap,
                header.impact,
                &mut sink,
                codec,
                header.segment_frequency as usize,
                index.payload(&header),
            );
        }
        result.push((term.term.to_vec(), sink.postings));
    }
    result
}

fn roundtrip_with(codec_name: &str, d_gap: DGap) {
    let dir = TempDir::new().unwrap();
    let collected = build_index(&corpus(), 2);
    let writer = IndexWriter::new(dir.path(), codec_name, d_gap).unwrap();
    let stats = writer.write(&collected, IdfTfRanker::new()).unwrap();
    assert_eq!(stats.documents, 10);
    assert_eq!(stats.terms, 5);

    let index = DeserialisedIndex::open(dir.path()).unwrap();
    assert_eq!(index.document_count(), 10);
    assert_eq!(index.term_count(), 5);

    let dumped = dump(&index);

    // Vocabulary order is raw byte order.
    let terms: Vec<&[u8]> = dumped.iter().map(|(term, _)| term.as_slice()).collect();
    assert_eq!(
        terms,
        vec![
            b"albatross".as_slice(),
            b"gull",
            b"petrel",
            b"shearwater",
            b"the"
        ]
    );

    for (term, postings) in &dumped {
        let expected = &collected.terms[term];
        // Every document of the term is present exactly once, and every
        // impact is in the quantized domain.
        let mut documents: Vec<u64> = postings.iter().map(|&(document, _)| document).collect();
        documents.sort_unstable();
        assert_eq!(
            documents,
            expected
                .document_ids
                .iter()
                .map(|&d| d as u64)
                .collect::<Vec<u64>>(),
            "term {:?}",
            String::from_utf8_lossy(term)
        );
        for &(_, impact) in postings {
            assert!(impact >= SMALLEST_IMPACT as u64 && impact <= LARGEST_IMPACT as u64);
        }
    }

    // "the" is in every document with identical tf: all scores equal the
    // collection minimum, so every posting lands on the smallest impact.
    let the = &dumped[4].1;
    assert_eq!(the.len(), 10);
    assert!(the.iter().all(|&(_, impact)| impact == SMALLEST_IMPACT as u64));

    // "albatross" has the single highest-scoring posting in the collection.
    let albatross = &dumped[0].1;
    assert_eq!(albatross, &vec![(1, LARGEST_IMPACT as u64)]);

    // Primary keys come back in docid order, 1-based.
    let keys: Vec<&[u8]> = index.primary_keys().collect();
    assert_eq!(keys.len(), 10);
    assert_eq!(keys[0], b"pk-01");
    assert_eq!(keys[9], b"pk-10");
    assert_eq!(index.primary_key(1).unwrap(), b"pk-01");
    assert_eq!(index.primary_key(10).unwrap(), b"pk-10");
    assert!(index.primary_key(0).is_err());
    assert!(index.primary_key(11).is_err());
}

#[test]
fn test_roundtrip_elias_gamma_d1() {
    roundtrip_with("elias-gamma-simd-vb", DGap::D1);
}

#[test]
fn test_roundtrip_vbyte_d1() {
    roundtrip_with("variable-byte", DGap::D1);
}

#[test]
fn test_roundtrip_vbyte_d0() {
    roundtrip_with("variable-byte", DGap::D0);
}

#[test]
fn test_roundtrip_bitpack_d1() {
    roundtrip_with("bitpack-128", DGap::D1);
}

#[test]
fn test_roundtrip_uncompressed() {
    roundtrip_with("none", DGap::None);
}

#[test]
fn test_segments_ordered_by_descending_impact() {
    let dir = TempDir::new().unwrap();
    // Three tf tiers for one term spread over many documents, so the term
    // serializes to several segments.
    let mut documents = Vec::new();
    for i in 0..30 {
        let text = match i % 3 {
            0 => "tern",
            1 => "tern tern",
            _ => "tern tern tern tern",
        };
        documents.push(doc(&format!("pk-{i:02}"), text));
    }
    // A spread of other terms so the quantization range is non-degenerate.
    documents.push(doc("pk-flat", "filler"));

    let collected = build_index(&documents, 1);
    let writer = IndexWriter::new(dir.path(), "elias-gamma-simd-vb", DGap::D1).unwrap();
    writer.write(&collected, IdfTfRanker::new()).unwrap();

    let index = DeserialisedIndex::open(dir.path()).unwrap();
    let term = index.terms().find(|t| t.term == b"tern").unwrap();
    let headers = index.segment_headers(&term).unwrap();
    assert!(headers.len() >= 2);
    for pair in headers.windows(2) {
        assert!(
            pair[0].impact > pair[1].impact,
            "segments must walk high impacts first"
        );
    }
    let total: u32 = headers.iter().map(|h| h.segment_frequency).sum();
    assert_eq!(total, 30);
}

#[test]
fn test_larger_collection_roundtrip() {
    let dir = TempDir::new().unwrap();
    let mut documents = Vec::new();
    for i in 0..500u32 {
        let mut text = String::from("common");
        if i % 2 == 0 {
            text.push_str(" even");
        }
        if i % 31 == 0 {
            text.push_str(" rare rare rare");
        }
        documents.push(doc(&format!("pk-{i:04}"), &text));
    }

    let collected = build_index(&documents, 4);
    let writer = IndexWriter::new(dir.path(), "elias-gamma-simd-vb", DGap::D1).unwrap();
    writer.write(&collected, IdfTfRanker::new()).unwrap();

    let index = DeserialisedIndex::open(dir.path()).unwrap();
    let dumped = dump(&index);
    for (term, postings) in &dumped {
        let expected = &collected.terms[term];
        let mut documents: Vec<u64> = postings.iter().map(|&(document, _)| document).collect();
        documents.sort_unstable();
        assert_eq!(
            documents,
            expected
                .document_ids
                .iter()
                .map(|&d| d as u64)
                .collect::<Vec<u64>>()
        );
    }
}
