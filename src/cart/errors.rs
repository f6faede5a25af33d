use thiserror::Error;

use crate::cart::types::UserId;

/// Failures while building a cart's stock.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StockError {
    /// Asked for zero offers.
    #[error("stock request must be for at least one offer")]
    EmptyRequest,

    /// Every outcome the band can roll is already in the stock (or its table is empty).
    #[error("stock exhausted: wanted {requested} offers, generated {generated}")]
    Exhausted { requested: usize, generated: usize },
}

/// Errors raised by the messaging surface.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("message not found: {0}")]
    NotFound(u64),

    #[error("channel unavailable: {0}")]
    ChannelUnavailable(u64),

    #[error("surface error: {0}")]
    Other(String),
}

/// Errors raised by the currency ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Withdrawal larger than the balance.
    #[error("insufficient funds for {user}: need {needed}, have {available}")]
    InsufficientFunds {
        user: UserId,
        needed: u64,
        available: u64,
    },

    /// Deposit would overflow the balance.
    #[error("balance too high for {0}")]
    BalanceTooHigh(UserId),

    #[error("ledger backend error: {0}")]
    Backend(String),
}

/// Errors that can arise while interacting with the character and balance store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Stored bytes could not be interpreted (wrong length, truncated record).
    #[error("corrupt record for {0}")]
    Corrupt(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        LedgerError::Backend(err.to_string())
    }
}

/// Top-level error for cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Stock(#[from] StockError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Catalog file could not be read or parsed.
    #[error("catalog error: {0}")]
    Catalog(String),
}
