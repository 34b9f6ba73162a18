use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid analysed text: {0}")]
    Document(String),

    /// The backing index could not answer a lookup. Distinct from an
    /// empty result.
    #[error("lookup failed: {message}")]
    Lookup { message: String },

    #[error(
        "linking of document '{document}' aborted at '{selected_text}' [{start},{end}): {source}"
    )]
    Linking {
        document: String,
        selected_text: String,
        start: usize,
        end: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}

impl Error {
    pub fn lookup(message: impl std::fmt::Display) -> Self {
        Error::Lookup {
            message: message.to_string(),
        }
    }

    /// Whether this error (or the error it wraps) is a lookup failure.
    pub fn is_lookup_failure(&self) -> bool {
        match self {
            Error::Lookup { .. } => true,
            Error::Linking { source, .. } => source.is_lookup_failure(),
            _ => false,
        }
    }
}
