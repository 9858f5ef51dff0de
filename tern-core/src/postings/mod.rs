mod accumulator;

pub use accumulator::{MAX_TERM_FREQUENCY, Posting, PostingsAccumulator, PostingsIter};
