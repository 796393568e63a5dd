pub mod chain;
pub mod constants;
pub mod difficulty;
pub mod error;
pub mod mine;
pub mod pow;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub use chain::{Chain, SharedChain, Violation, ViolationKind};
pub use constants::*;
pub use difficulty::DifficultyController;
pub use error::{BlockError, ChainLinkageError, FaultError, MiningError};

/// Seconds since the Unix epoch with sub-second precision.
pub fn now_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash input for a block. Keys are declared in lexicographic order so the
/// JSON object is emitted with a stable key order.
#[derive(Serialize)]
struct CanonicalBlock<'a> {
    index: u64,
    nonce: u64,
    previous_hash: &'a str,
    timestamp: f64,
    transactions: &'a [String],
}

pub fn canonical_bytes(
    index: u64,
    timestamp: f64,
    transactions: &[String],
    previous_hash: &str,
    nonce: u64,
) -> Vec<u8> {
    let canonical = CanonicalBlock {
        index,
        nonce,
        previous_hash,
        timestamp,
        transactions,
    };
    serde_json::to_vec(&canonical).expect("canonical block fields always serialize")
}

/// SHA-256 over the canonical JSON form of the block fields, as lowercase hex.
pub fn block_hash(
    index: u64,
    timestamp: f64,
    transactions: &[String],
    previous_hash: &str,
    nonce: u64,
) -> String {
    sha256_hex(&canonical_bytes(
        index,
        timestamp,
        transactions,
        previous_hash,
        nonce,
    ))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    timestamp: f64,
    transactions: Vec<String>,
    previous_hash: String,
    nonce: u64,
    hash: String,
}

impl Block {
    /// Builds an unmined block. `timestamp` must be finite: the canonical
    /// form cannot tell NaN and the infinities apart. Use [`Block::try_new`]
    /// for timestamps that come from outside the process.
    pub fn new(
        index: u64,
        timestamp: f64,
        transactions: Vec<String>,
        previous_hash: impl Into<String>,
    ) -> Self {
        debug_assert!(timestamp.is_finite(), "non-finite block timestamp");
        let previous_hash = previous_hash.into();
        let hash = block_hash(index, timestamp, &transactions, &previous_hash, 0);
        Self {
            index,
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash,
        }
    }

    pub fn try_new(
        index: u64,
        timestamp: f64,
        transactions: Vec<String>,
        previous_hash: impl Into<String>,
    ) -> Result<Self, BlockError> {
        if !timestamp.is_finite() {
            return Err(BlockError::NonFiniteTimestamp(timestamp));
        }
        Ok(Self::new(index, timestamp, transactions, previous_hash))
    }

    pub fn genesis(timestamp: f64) -> Self {
        Self::new(
            0,
            timestamp,
            vec![GENESIS_TRANSACTION.to_string()],
            GENESIS_PREVIOUS_HASH,
        )
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[String] {
        &self.transactions
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// The stored hash. May be stale if the block was tampered with.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Hash of the current fields. Never touches the stored hash.
    pub fn recompute_hash(&self) -> String {
        self.hash_with_nonce(self.nonce)
    }

    pub fn hash_with_nonce(&self, nonce: u64) -> String {
        block_hash(
            self.index,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
            nonce,
        )
    }

    pub fn is_intact(&self) -> bool {
        self.hash == self.recompute_hash()
    }

    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        pow::meets_difficulty(&self.hash, difficulty)
    }

    // Nonce and hash always move together on the mining path.
    pub(crate) fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.hash = self.recompute_hash();
    }

    /// Puts back a nonce/hash pair saved before an aborted search, as is.
    pub(crate) fn restore(&mut self, nonce: u64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }

    /// Overwrites one transaction and leaves the stored hash stale.
    /// Returns the record that was replaced.
    #[cfg(any(test, feature = "fault-injection"))]
    pub fn tamper(
        &mut self,
        transaction_index: usize,
        new_value: impl Into<String>,
    ) -> Result<String, FaultError> {
        let slot = self
            .transactions
            .get_mut(transaction_index)
            .ok_or(FaultError::NoSuchTransaction {
                block: self.index,
                transaction: transaction_index,
            })?;
        Ok(std::mem::replace(slot, new_value.into()))
    }

    /// Refreshes the stored hash from the current fields without mining.
    #[cfg(any(test, feature = "fault-injection"))]
    pub fn rehash(&mut self) {
        self.hash = self.recompute_hash();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block::new(
            1,
            1_600_000_000.5,
            vec!["Alice pays Bob 10".to_string()],
            GENESIS_PREVIOUS_HASH,
        )
    }

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn canonical_bytes_have_sorted_keys() {
        let bytes = canonical_bytes(
            1,
            1_600_000_000.5,
            &["Alice pays Bob 10".to_string()],
            GENESIS_PREVIOUS_HASH,
            0,
        );
        let expected = format!(
            r#"{{"index":1,"nonce":0,"previous_hash":"{GENESIS_PREVIOUS_HASH}","timestamp":1600000000.5,"transactions":["Alice pays Bob 10"]}}"#
        );
        assert_eq!(String::from_utf8(bytes).unwrap(), expected);
    }

    #[test]
    fn block_hash_example() {
        let block = sample_block();
        let expected_hex = "4dbc76448f76bd1935be2d1ad5dc09abad01ba7c17e37dff4e51e21b3d41fc6b";
        assert_eq!(block.hash(), expected_hex);
        assert_eq!(block.hash().len(), HASH_HEX_SIZE);
    }

    #[test]
    fn block_hash_consistency() {
        let block = sample_block();
        assert_eq!(block.recompute_hash(), block.recompute_hash());
        assert_eq!(block.recompute_hash(), sample_block().recompute_hash());
    }

    #[test]
    fn block_new_example() {
        let block = sample_block();
        assert_eq!(block.index(), 1);
        assert_eq!(block.nonce(), 0);
        assert_eq!(block.previous_hash(), GENESIS_PREVIOUS_HASH);
        assert_eq!(block.transactions(), ["Alice pays Bob 10"]);
        assert!(block.is_intact());
    }

    #[test]
    fn hash_changes_with_every_field() {
        let base = sample_block();
        let txs = base.transactions().to_vec();
        let variants = [
            block_hash(2, base.timestamp(), &txs, base.previous_hash(), 0),
            block_hash(1, base.timestamp() + 1.0, &txs, base.previous_hash(), 0),
            block_hash(
                1,
                base.timestamp(),
                &["Alice pays Bob 11".to_string()],
                base.previous_hash(),
                0,
            ),
            block_hash(1, base.timestamp(), &txs, &"1".repeat(HASH_HEX_SIZE), 0),
            block_hash(1, base.timestamp(), &txs, base.previous_hash(), 1),
        ];
        for hash in variants {
            assert_ne!(hash, base.hash());
        }
    }

    #[test]
    fn transaction_order_is_significant() {
        let a = vec!["first".to_string(), "second".to_string()];
        let b = vec!["second".to_string(), "first".to_string()];
        assert_ne!(
            block_hash(1, 0.0, &a, GENESIS_PREVIOUS_HASH, 0),
            block_hash(1, 0.0, &b, GENESIS_PREVIOUS_HASH, 0)
        );
    }

    #[test]
    fn block_hash_changes_with_nonce() {
        let mut block = sample_block();
        let hash1 = block.hash().to_string();
        block.set_nonce(block.nonce() + 1);
        assert_ne!(hash1, block.hash());
        assert!(block.is_intact());
    }

    #[test]
    fn genesis_block_example() {
        let genesis = Block::genesis(now_timestamp());
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.previous_hash(), GENESIS_PREVIOUS_HASH);
        assert_eq!(
            genesis.transactions(),
            ["Genesis Transaction: Blockchain Network Initialized on March 31, 2025 at 10:00 AM UTC"]
        );
        assert!(genesis.is_intact());
    }

    #[test]
    fn try_new_rejects_non_finite_timestamps() {
        for timestamp in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = Block::try_new(1, timestamp, vec![], GENESIS_PREVIOUS_HASH);
            assert!(matches!(result, Err(BlockError::NonFiniteTimestamp(_))));
        }
        let block = Block::try_new(1, 1_600_000_000.5, vec![], GENESIS_PREVIOUS_HASH).unwrap();
        assert!(block.is_intact());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "non-finite block timestamp")]
    fn new_panics_on_nan_timestamp_in_debug() {
        Block::new(1, f64::NAN, vec![], GENESIS_PREVIOUS_HASH);
    }

    #[test]
    fn tamper_leaves_hash_stale() {
        let mut block = sample_block();
        let before = block.hash().to_string();
        let original = block.tamper(0, "Alice pays Mallory 1000").unwrap();
        assert_eq!(original, "Alice pays Bob 10");
        assert_eq!(block.hash(), before);
        assert!(!block.is_intact());

        block.rehash();
        assert!(block.is_intact());
        assert_ne!(block.hash(), before);
    }

    #[test]
    fn tamper_out_of_range() {
        let mut block = sample_block();
        assert_eq!(
            block.tamper(3, "nope"),
            Err(FaultError::NoSuchTransaction {
                block: 1,
                transaction: 3
            })
        );
        assert!(block.is_intact());
    }

    #[test]
    fn block_serialization_example() {
        let block = sample_block();
        let json = serde_json::to_string(&block).unwrap();
        let deserialized: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(block, deserialized);
        assert!(deserialized.is_intact());
    }
}
