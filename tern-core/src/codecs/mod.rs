//! Integer compression codecs for postings payloads.
//!
//! Every codec implements [`CompressInteger`]; the serialized index records
//! the codec by name and the reader resolves it back through [`for_name`].
//! Decoders are allowed to overwrite a bounded number of integers past the
//! requested count ([`CompressInteger::overscan`]); callers must pad their
//! output buffers accordingly.

mod bitpack;
mod elias_gamma_simd;
mod none;
mod vbyte;

pub use bitpack::{BITPACK_BLOCK_SIZE, CompressIntegerBitpack};
pub use elias_gamma_simd::{CompressIntegerEliasGammaSimd, FRAME_BYTES, compute_selector};
pub use none::CompressIntegerNone;
pub use vbyte::CompressIntegerVariableByte;

/// Common contract for integer codecs.
///
/// `encode` writes the compressed form of `src` into `dst` and returns the
/// number of bytes written, or 0 when `dst` is too small (recoverable: retry
/// with a larger buffer). `src` must not be empty, since zero written bytes
/// would be indistinguishable from overflow.
///
/// `decode` reconstructs `n` integers into `dst`. It trusts the encoded
/// stream and has no error return; `dst` must hold at least
/// `n + overscan()` elements.
pub trait CompressInteger: Send + Sync {
    /// Stable name recorded in the index descriptor.
    fn name(&self) -> &'static str;

    fn encode(&self, dst: &mut [u8], src: &[u32]) -> usize;

    fn decode(&self, dst: &mut [u32], n: usize, src: &[u8]);

    /// Maximum number of integers the decoder may write past `n`.
    fn overscan(&self) -> usize {
        0
    }
}

static NONE: CompressIntegerNone = CompressIntegerNone;
static VBYTE: CompressIntegerVariableByte = CompressIntegerVariableByte;
static BITPACK: CompressIntegerBitpack = CompressIntegerBitpack;
static ELIAS_GAMMA_SIMD: CompressIntegerEliasGammaSimd = CompressIntegerEliasGammaSimd;

/// Resolve a codec by the name stored in the index descriptor.
pub fn for_name(name: &str) -> Option<&'static dyn CompressInteger> {
    match name {
        "none" => Some(&NONE),
        "variable-byte" => Some(&VBYTE),
        "bitpack-128" => Some(&BITPACK),
        "elias-gamma-simd-vb" => Some(&ELIAS_GAMMA_SIMD),
        _ => None,
    }
}
