mod pointer_ord;

pub use pointer_ord::PointerOrd;
