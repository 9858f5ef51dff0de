//! Impact quantization: mapping ranker scores onto small-integer impacts.
//!
//! Quantization is a two-pass reduction over the whole index. Pass A observes
//! every `(term, document, tf)` score and tracks the collection-wide
//! `(smallest, largest)` bounds; pass B maps each score into the impact
//! domain. Pass A must fully complete before pass B starts; the observed
//! bounds are frozen at the phase boundary.

use crate::error::{Error, Result};
use crate::index::CollectedIndex;

/// Smallest representable impact. Zero is reserved for SIMD lane padding.
pub const SMALLEST_IMPACT: u8 = 1;

/// Largest representable impact.
pub const LARGEST_IMPACT: u8 = 255;

/// Number of steps in the impact domain.
const IMPACT_RANGE: f64 = (LARGEST_IMPACT - SMALLEST_IMPACT) as f64;

/// The capability set the quantizer needs from a ranking function.
///
/// The ranker is stateful across calls within one term: the idf component is
/// computed once per term, then combined with per-document tf components.
/// Ranking math itself is outside this crate's scope; any scorer that can
/// produce a finite `f64` per `(term, document, tf)` plugs in here.
pub trait Ranker {
    /// Called once per term before any scoring for that term.
    fn compute_idf_component(&mut self, document_frequency: u32, documents_in_collection: u32);

    /// Called once per `(document, tf)` pair, before [`compute_score`].
    ///
    /// [`compute_score`]: Ranker::compute_score
    fn compute_tf_component(&mut self, term_frequency: u16);

    /// The retrieval status value for `(term, document)`. `document_index`
    /// counts from 0.
    fn compute_score(&mut self, document_index: u32, term_frequency: u16) -> f64;
}

/// A minimal idf×tf scorer: `ln(N / df) × tf`.
///
/// Serves as the reference ranker for tests and tools; swap in a real
/// ranking function via the [`Ranker`] trait for production scoring.
#[derive(Debug, Default, Clone)]
pub struct IdfTfRanker {
    idf: f64,
    tf: f64,
}

impl IdfTfRanker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ranker for IdfTfRanker {
    fn compute_idf_component(&mut self, document_frequency: u32, documents_in_collection: u32) {
        self.idf = (documents_in_collection as f64 / document_frequency as f64).ln();
    }

    fn compute_tf_component(&mut self, term_frequency: u16) {
        self.tf = term_frequency as f64;
    }

    fn compute_score(&mut self, _document_index: u32, _term_frequency: u16) -> f64 {
        self.idf * self.tf
    }
}

/// Downstream consumer of a quantized index: serializers, dumpers, and
/// evaluators all receive the same stream of per-term postings (with impacts
/// in place of term frequencies) followed by the primary keys in docid
/// order.
pub trait PostingsSink {
    fn on_posting(&mut self, term: &[u8], document_ids: &[u32], impacts: &[u8]);

    fn on_primary_key(&mut self, document_id: u32, primary_key: &[u8]);
}

/// Two-pass impact quantizer over a [`Ranker`].
pub struct Quantizer<R: Ranker> {
    ranker: R,
    documents_in_collection: u32,
    smallest_rsv: f64,
    largest_rsv: f64,
}

impl<R: Ranker> Quantizer<R> {
    pub fn new(documents_in_collection: u32, ranker: R) -> Self {
        Quantizer {
            ranker,
            documents_in_collection,
            smallest_rsv: f64::MAX,
            largest_rsv: f64::MIN,
        }
    }

    /// Pass A for one term: score every posting and fold the scores into the
    /// collection-wide bounds.
    ///
    /// Fails with [`Error::RankerDomain`] if the ranker produces a NaN or
    /// infinite score; the quantization range would be undefined.
    pub fn observe(&mut self, document_ids: &[u32], term_frequencies: &[u16]) -> Result<()> {
        debug_assert_eq!(document_ids.len(), term_frequencies.len());

        self.ranker
            .compute_idf_component(document_ids.len() as u32, self.documents_in_collection);

        for (&document_id, &term_frequency) in document_ids.iter().zip(term_frequencies) {
            self.ranker.compute_tf_component(term_frequency);
            let score = self.ranker.compute_score(document_id - 1, term_frequency);
            if !score.is_finite() {
                return Err(Error::RankerDomain(score));
            }
            if score < self.smallest_rsv {
                self.smallest_rsv = score;
            }
            if score > self.largest_rsv {
                self.largest_rsv = score;
            }
        }
        Ok(())
    }

    /// The `(smallest, largest)` score bounds observed in pass A.
    pub fn bounds(&self) -> (f64, f64) {
        (self.smallest_rsv, self.largest_rsv)
    }

    /// Pass B for one term: re-score every posting and map it into
    /// `[SMALLEST_IMPACT, LARGEST_IMPACT]` using uniform quantization over
    /// the pass-A bounds. When every observed score was identical the whole
    /// index collapses onto [`SMALLEST_IMPACT`].
    pub fn quantize(&mut self, document_ids: &[u32], term_frequencies: &[u16]) -> Vec<u8> {
        debug_assert_eq!(document_ids.len(), term_frequencies.len());
        // Pass A must have observed at least one posting.
        debug_assert!(self.smallest_rsv <= self.largest_rsv);

        let range = self.largest_rsv - self.smallest_rsv;

        self.ranker
            .compute_idf_component(document_ids.len() as u32, self.documents_in_collection);

        let mut impacts = Vec::with_capacity(document_ids.len());
        for (&document_id, &term_frequency) in document_ids.iter().zip(term_frequencies) {
            self.ranker.compute_tf_component(term_frequency);
            let score = self.ranker.compute_score(document_id - 1, term_frequency);

            let impact = if range == 0.0 {
                SMALLEST_IMPACT
            } else {
                ((score - self.smallest_rsv) / range * IMPACT_RANGE) as u8 + SMALLEST_IMPACT
            };
            impacts.push(impact);
        }
        impacts
    }

    /// Run pass A over the whole index, then stream the quantized postings
    /// and the primary keys into `sink`.
    ///
    /// This is the happens-before barrier between the two passes: the bounds
    /// are finalized over every term before the first impact is emitted.
    pub fn serialise_index(
        &mut self,
        index: &CollectedIndex,
        sink: &mut impl PostingsSink,
    ) -> Result<()> {
        for postings in index.terms.values() {
            self.observe(&postings.document_ids, &postings.term_frequencies)?;
        }

        for (term, postings) in &index.terms {
            let impacts = self.quantize(&postings.document_ids, &postings.term_frequencies);
            sink.on_posting(term, &postings.document_ids, &impacts);
        }
        for (ordinal, primary_key) in index.primary_keys.iter().enumerate() {
            sink.on_primary_key(ordinal as u32 + 1, primary_key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Ten documents, expressed as per-term postings: `(term, docids, tfs)`.
    ///
    /// "the" occurs once in every document, so its idf (and score) is exactly
    /// zero. "albatross" occurs three times in one document, scoring
    /// `3 × ln(10) ≈ 6.91`. Everything else stays strictly between.
    fn ten_documents() -> Vec<(&'static str, Vec<u32>, Vec<u16>)> {
        vec![
            ("albatross", vec![1], vec![3]),
            ("gull", vec![2, 5], vec![2, 1]),
            ("petrel", vec![3, 4, 7, 9], vec![1, 2, 1, 1]),
            ("shearwater", vec![1, 2, 3, 6, 8], vec![1, 1, 1, 1, 2]),
            ("the", (1..=10).collect(), vec![1; 10]),
        ]
    }

    fn observed_quantizer() -> Quantizer<IdfTfRanker> {
        let mut quantizer = Quantizer::new(10, IdfTfRanker::new());
        for (_, documents, frequencies) in ten_documents() {
            quantizer.observe(&documents, &frequencies).unwrap();
        }
        quantizer
    }

    #[test]
    fn test_ten_document_bounds() {
        let quantizer = observed_quantizer();
        let (smallest, largest) = quantizer.bounds();
        assert!(smallest <= largest);
        assert_eq!(smallest.floor() as i64, 0);
        assert_eq!(largest.floor() as i64, 6);
    }

    #[test]
    fn test_impacts_within_domain() {
        let mut quantizer = observed_quantizer();
        for (_, documents, frequencies) in ten_documents() {
            for impact in quantizer.quantize(&documents, &frequencies) {
                assert!((SMALLEST_IMPACT..=LARGEST_IMPACT).contains(&impact));
            }
        }
    }

    #[test]
    fn test_extremes_map_to_extremes() {
        let mut quantizer = observed_quantizer();
        // "the" scores the collection minimum in every document.
        let impacts = quantizer.quantize(&(1..=10).collect::<Vec<u32>>(), &[1; 10]);
        assert!(impacts.iter().all(|&impact| impact == SMALLEST_IMPACT));
        // "albatross" scores the collection maximum.
        let impacts = quantizer.quantize(&[1], &[3]);
        assert_eq!(impacts, vec![LARGEST_IMPACT]);
    }

    #[test]
    fn test_degenerate_range() {
        // A single term in every document with identical tf: all scores are
        // equal, so the range is zero and quantization must not divide by it.
        let mut quantizer = Quantizer::new(4, IdfTfRanker::new());
        let documents: Vec<u32> = (1..=4).collect();
        let frequencies = [2u16; 4];
        quantizer.observe(&documents, &frequencies).unwrap();
        let (smallest, largest) = quantizer.bounds();
        assert_eq!(smallest, largest);

        let impacts = quantizer.quantize(&documents, &frequencies);
        assert!(impacts.iter().all(|&impact| impact == SMALLEST_IMPACT));
    }

    struct BrokenRanker;

    impl Ranker for BrokenRanker {
        fn compute_idf_component(&mut self, _: u32, _: u32) {}
        fn compute_tf_component(&mut self, _: u16) {}
        fn compute_score(&mut self, _: u32, _: u16) -> f64 {
            f64::NAN
        }
    }

    #[test]
    fn test_nan_score_rejected() {
        let mut quantizer = Quantizer::new(1, BrokenRanker);
        let result = quantizer.observe(&[1], &[1]);
        assert!(matches!(result, Err(Error::RankerDomain(_))));
    }

    #[test]
    fn test_serialise_index_streams_sink() {
        use std::collections::BTreeMap;

        use crate::index::{CollectedIndex, TermPostings};

        let mut terms = BTreeMap::new();
        terms.insert(
            b"common".to_vec(),
            TermPostings {
                document_ids: vec![1, 2, 3, 4],
                term_frequencies: vec![1; 4],
            },
        );
        terms.insert(
            b"rare".to_vec(),
            TermPostings {
                document_ids: vec![2],
                term_frequencies: vec![2],
            },
        );
        let index = CollectedIndex {
            terms,
            primary_keys: vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()],
        };

        #[derive(Default)]
        struct Capture {
            postings: Vec<(Vec<u8>, Vec<u32>, Vec<u8>)>,
            keys: Vec<(u32, Vec<u8>)>,
        }

        impl PostingsSink for Capture {
            fn on_posting(&mut self, term: &[u8], document_ids: &[u32], impacts: &[u8]) {
                self.postings
                    .push((term.to_vec(), document_ids.to_vec(), impacts.to_vec()));
            }

            fn on_primary_key(&mut self, document_id: u32, primary_key: &[u8]) {
                self.keys.push((document_id, primary_key.to_vec()));
            }
        }

        let mut quantizer = Quantizer::new(4, IdfTfRanker::new());
        let mut sink = Capture::default();
        quantizer.serialise_index(&index, &mut sink).unwrap();

        // Terms arrive in vocabulary order with impacts in place of
        // frequencies; primary keys follow in docid order.
        assert_eq!(sink.postings.len(), 2);
        assert_eq!(sink.postings[0].0, b"common");
        assert_eq!(sink.postings[0].1, vec![1, 2, 3, 4]);
        assert!(sink.postings[0].2.iter().all(|&i| i == SMALLEST_IMPACT));
        assert_eq!(sink.postings[1].0, b"rare");
        assert_eq!(sink.postings[1].2, vec![LARGEST_IMPACT]);
        assert_eq!(
            sink.keys,
            vec![
                (1, b"a".to_vec()),
                (2, b"b".to_vec()),
                (3, b"c".to_vec()),
                (4, b"d".to_vec())
            ]
        );
    }
}
