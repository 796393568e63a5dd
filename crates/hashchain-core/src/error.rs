use std::time::Duration;
use thiserror::Error;

/// Reasons `Chain::append` refuses a candidate block. The chain is left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainLinkageError {
    #[error("block {index} links to {found} but the chain tail hash is {expected}")]
    PreviousHashMismatch {
        index: u64,
        expected: String,
        found: String,
    },
    #[error("block index {found} does not follow tail index {tail}")]
    IndexMismatch { tail: u64, found: u64 },
    #[error("block {index} is timestamped {found}, before the tail at {tail}")]
    TimestampRegression { index: u64, tail: f64, found: f64 },
    #[error("block {index} carries a stale hash {stored} (fields hash to {computed})")]
    StaleHash {
        index: u64,
        stored: String,
        computed: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiningError {
    #[error("mining timed out after {attempts} attempts ({elapsed:?})")]
    Timeout { attempts: u64, elapsed: Duration },
    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
    #[error("nonce space exhausted without meeting difficulty {difficulty}")]
    NonceSpaceExhausted { difficulty: u32 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlockError {
    #[error("block timestamp must be finite, got {0}")]
    NonFiniteTimestamp(f64),
}

/// Errors from the fault-injection helpers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FaultError {
    #[error("no block at index {0}")]
    NoSuchBlock(u64),
    #[error("block {block} has no transaction {transaction}")]
    NoSuchTransaction { block: u64, transaction: usize },
}
