//! Error types for tern

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Index corruption: {0}")]
    Corruption(String),

    #[error("Unknown codec: {0}")]
    UnknownCodec(String),

    #[error("Ranker produced a non-finite score: {0}")]
    RankerDomain(f64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(u32),
}

pub type Result<T> = std::result::Result<T, Error>;
