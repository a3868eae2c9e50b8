pub mod bio;
pub mod cli;
pub mod core;
pub mod index;
pub mod report;
pub mod search;

pub use crate::core::pipeline::{pipeline_for, Pipeline};
pub use crate::core::resolver::{resolve, Specialization};

use thiserror::Error;

/// Generation of the on-disk index layout. Bumped whenever a persisted file changes shape.
pub const INDEX_GENERATION: u64 = 1;

#[derive(Error, Debug)]
pub enum LambdaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cannot handle the specified alphabet reduction ({0}); supported values are 0 (none) and 2 (Murphy10)")]
    UnsupportedReduction(u8),

    #[error(
        "Your sequences are too long for the index: {length} symbols exceed the {width}-bit position width. \
         Reduce the input or choose a different index type / alphabet reduction"
    )]
    IndexTooLarge { length: u64, width: u32 },

    #[error("Index is incompatible with this run: {0}")]
    IncompatibleIndex(String),

    #[error("Lambda ran out of memory while {0}. You need to split your file into smaller segments or search against a smaller database")]
    OutOfMemory(String),

    #[error("Not enough memory available: {0}")]
    InsufficientMemory(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Taxonomy error: {0}")]
    Taxonomy(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("{0}")]
    Other(String),
}

impl From<bincode::Error> for LambdaError {
    fn from(err: bincode::Error) -> Self {
        LambdaError::Parse(format!("corrupt index file: {}", err))
    }
}

impl From<std::collections::TryReserveError> for LambdaError {
    fn from(_: std::collections::TryReserveError) -> Self {
        LambdaError::OutOfMemory("allocating sequence storage".to_string())
    }
}

pub type Result<T> = std::result::Result<T, LambdaError>;
