mod arena;
mod chunked_vec;

pub use arena::{Arena, INITIAL_SLAB_SIZE};
pub use chunked_vec::{ChunkedVec, ChunkedVecIter};
