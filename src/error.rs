use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corruption: {0}")]
    Corrupt(String),

    #[error("Error: Duplicate key.")]
    DuplicateKey,

    #[error("Tried to fetch page number out of bounds. {0} >= {1}")]
    PageOutOfBounds(u32, u32),

    #[error("Need to implement splitting internal node.")]
    InternalNodeSplit,
}

pub type Result<T> = std::result::Result<T, DbError>;
