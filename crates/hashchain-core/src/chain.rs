use crate::{now_timestamp, Block, ChainLinkageError, GENESIS_PREVIOUS_HASH};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

#[cfg(any(test, feature = "fault-injection"))]
use crate::FaultError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Stored hash no longer matches the block's fields.
    StaleHash { stored: String, computed: String },
    /// `previous_hash` does not match the predecessor's stored hash.
    BrokenLink { expected: String, found: String },
    IndexMismatch { expected: u64, found: u64 },
    /// Block is timestamped before its predecessor.
    TimestampRegression { previous: f64, found: f64 },
    /// Block 0 does not carry the all-zero previous hash.
    GenesisPreviousHash { found: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub block_index: u64,
    pub kind: ViolationKind,
}

/// In-memory, append-only sequence of blocks starting at a genesis block.
#[derive(Clone, Debug, Serialize)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// A chain holding only a freshly timestamped genesis block.
    pub fn init() -> Self {
        Self::with_genesis(Block::genesis(now_timestamp()))
    }

    pub fn with_genesis(genesis: Block) -> Self {
        Self {
            blocks: vec![genesis],
        }
    }

    pub fn tail(&self) -> &Block {
        // Constructors always seed a genesis block and nothing removes blocks.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    /// Appends a mined block. Rejects it, leaving the chain untouched, unless it
    /// follows the tail by index and time, links to the tail's hash and carries
    /// a fresh hash.
    pub fn append(&mut self, block: Block) -> Result<(), ChainLinkageError> {
        let tail = self.tail();
        if block.previous_hash() != tail.hash() {
            let err = ChainLinkageError::PreviousHashMismatch {
                index: block.index(),
                expected: tail.hash().to_string(),
                found: block.previous_hash().to_string(),
            };
            warn!(%err, "append rejected");
            return Err(err);
        }
        if block.index() != tail.index() + 1 {
            let err = ChainLinkageError::IndexMismatch {
                tail: tail.index(),
                found: block.index(),
            };
            warn!(%err, "append rejected");
            return Err(err);
        }
        if !follows_in_time(tail, &block) {
            let err = ChainLinkageError::TimestampRegression {
                index: block.index(),
                tail: tail.timestamp(),
                found: block.timestamp(),
            };
            warn!(%err, "append rejected");
            return Err(err);
        }
        let computed = block.recompute_hash();
        if block.hash() != computed {
            let err = ChainLinkageError::StaleHash {
                index: block.index(),
                stored: block.hash().to_string(),
                computed,
            };
            warn!(%err, "append rejected");
            return Err(err);
        }

        info!(index = block.index(), hash = block.hash(), "block appended");
        self.blocks.push(block);
        Ok(())
    }

    /// Walks the whole chain and reports every fault found, in block order.
    /// An empty report means the chain is intact.
    pub fn verify(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (position, block) in self.blocks.iter().enumerate() {
            let block_index = block.index();

            match position.checked_sub(1).map(|p| &self.blocks[p]) {
                None => {
                    if block.previous_hash() != GENESIS_PREVIOUS_HASH {
                        violations.push(Violation {
                            block_index,
                            kind: ViolationKind::GenesisPreviousHash {
                                found: block.previous_hash().to_string(),
                            },
                        });
                    }
                }
                Some(prev) => {
                    if block_index != prev.index() + 1 {
                        violations.push(Violation {
                            block_index,
                            kind: ViolationKind::IndexMismatch {
                                expected: prev.index() + 1,
                                found: block_index,
                            },
                        });
                    }
                    if !follows_in_time(prev, block) {
                        violations.push(Violation {
                            block_index,
                            kind: ViolationKind::TimestampRegression {
                                previous: prev.timestamp(),
                                found: block.timestamp(),
                            },
                        });
                    }
                    if block.previous_hash() != prev.hash() {
                        violations.push(Violation {
                            block_index,
                            kind: ViolationKind::BrokenLink {
                                expected: prev.hash().to_string(),
                                found: block.previous_hash().to_string(),
                            },
                        });
                    }
                }
            }

            let computed = block.recompute_hash();
            if block.hash() != computed {
                violations.push(Violation {
                    block_index,
                    kind: ViolationKind::StaleHash {
                        stored: block.hash().to_string(),
                        computed,
                    },
                });
            }
        }
        violations
    }

    pub fn is_valid(&self) -> bool {
        self.verify().is_empty()
    }

    /// Mutable access to a historical block, for tamper experiments.
    #[cfg(any(test, feature = "fault-injection"))]
    pub fn block_mut(&mut self, index: u64) -> Result<&mut Block, FaultError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.blocks.get_mut(i))
            .ok_or(FaultError::NoSuchBlock(index))
    }
}

/// Timestamps never go backwards; a non-finite one never follows anything.
fn follows_in_time(prev: &Block, block: &Block) -> bool {
    block.timestamp().is_finite() && block.timestamp() >= prev.timestamp()
}

impl Default for Chain {
    fn default() -> Self {
        Self::init()
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Thread-safe handle for several miners racing on the same chain.
/// Appends are serialized; only the first block built on a given tail wins.
#[derive(Clone, Debug)]
pub struct SharedChain {
    inner: Arc<Mutex<Chain>>,
}

impl SharedChain {
    pub fn new(chain: Chain) -> Self {
        Self {
            inner: Arc::new(Mutex::new(chain)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Chain> {
        // A panic while holding the lock cannot leave a half-appended block.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// (index, hash) of the current tail.
    pub fn tip(&self) -> (u64, String) {
        let chain = self.lock();
        let tail = chain.tail();
        (tail.index(), tail.hash().to_string())
    }

    /// Compare-and-swap append: succeeds only if the block still builds on
    /// the current tail. Losers get a linkage error and must re-target.
    pub fn append_if_tip(&self, block: Block) -> Result<(), ChainLinkageError> {
        self.lock().append(block)
    }

    pub fn verify(&self) -> Vec<Violation> {
        self.lock().verify()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> Chain {
        self.lock().clone()
    }
}

impl From<Chain> for SharedChain {
    fn from(chain: Chain) -> Self {
        Self::new(chain)
    }
}
