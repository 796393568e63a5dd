//! Proof-of-work search over a block's nonce.
//!
//! A hash satisfies difficulty `d` when its first `d` hex digits are all `'0'`.

use crate::{Block, MiningError, MAX_DIFFICULTY, PROGRESS_INTERVAL};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub fn count_leading_zero_digits(hash: &str) -> u32 {
    hash.bytes().take_while(|b| *b == b'0').count() as u32
}

pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    count_leading_zero_digits(hash) >= difficulty
}

/// Shared flag used to abort a running search from another thread or task.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Number of hashes evaluated so far by a search, readable while it runs.
#[derive(Clone, Debug, Default)]
pub struct ProgressCounter(Arc<AtomicU64>);

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn record(&self, attempts: u64) {
        self.0.fetch_max(attempts, Ordering::Relaxed);
    }
}

#[derive(Clone, Debug, Default)]
pub struct MiningOptions {
    pub deadline: Option<Instant>,
    pub cancel: Option<CancelToken>,
    pub progress: Option<ProgressCounter>,
}

impl MiningOptions {
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress(mut self, counter: ProgressCounter) -> Self {
        self.progress = Some(counter);
        self
    }

    /// Records progress, then fails if the search was cancelled or ran past its deadline.
    pub(crate) fn checkpoint(&self, start: Instant, attempts: u64) -> Result<(), MiningError> {
        if let Some(progress) = &self.progress {
            progress.record(attempts);
        }
        if attempts > 0 {
            debug!(attempts, elapsed = ?start.elapsed(), "mining in progress");
        }
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(MiningError::Cancelled { attempts });
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(MiningError::Timeout {
                attempts,
                elapsed: start.elapsed(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct MiningStats {
    pub nonce: u64,
    pub hash: String,
    pub attempts: u64,
    pub elapsed: Duration,
    /// Hashes per second.
    pub hash_rate: f64,
}

impl MiningStats {
    pub(crate) fn new(block: &Block, attempts: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let hash_rate = if secs > 0.0 {
            attempts as f64 / secs
        } else {
            attempts as f64
        };
        Self {
            nonce: block.nonce(),
            hash: block.hash().to_string(),
            attempts,
            elapsed,
            hash_rate,
        }
    }
}

/// Mine the block by incrementing its nonce until the hash has at least
/// `difficulty` leading zero hex digits. Blocks until found and returns the
/// wall-clock time spent.
pub fn mine(block: &mut Block, difficulty: u32) -> Duration {
    let difficulty = difficulty.min(MAX_DIFFICULTY);
    let start = Instant::now();
    while !block.meets_difficulty(difficulty) {
        block.set_nonce(block.nonce().wrapping_add(1));
    }
    let elapsed = start.elapsed();
    info!(
        index = block.index(),
        nonce = block.nonce(),
        hash = block.hash(),
        elapsed = ?elapsed,
        "block mined"
    );
    elapsed
}

/// Like [`mine`], but stops on cancellation or deadline. A failed search
/// puts the block's original nonce and stored hash back untouched, even if
/// that hash was stale.
pub fn mine_with(
    block: &mut Block,
    difficulty: u32,
    options: &MiningOptions,
) -> Result<MiningStats, MiningError> {
    let difficulty = difficulty.min(MAX_DIFFICULTY);
    let start = Instant::now();
    let original_nonce = block.nonce();
    let original_hash = block.hash().to_string();
    let mut attempts = 0u64;

    loop {
        if attempts % PROGRESS_INTERVAL == 0 {
            if let Err(err) = options.checkpoint(start, attempts) {
                block.restore(original_nonce, original_hash);
                warn!(index = block.index(), %err, "mining aborted");
                return Err(err);
            }
        }
        attempts += 1;
        if block.meets_difficulty(difficulty) {
            break;
        }
        match block.nonce().checked_add(1) {
            Some(next) => block.set_nonce(next),
            None => {
                block.restore(original_nonce, original_hash);
                return Err(MiningError::NonceSpaceExhausted { difficulty });
            }
        }
    }

    if let Some(progress) = &options.progress {
        progress.record(attempts);
    }
    let stats = MiningStats::new(block, attempts, start.elapsed());
    info!(
        index = block.index(),
        nonce = stats.nonce,
        hash = %stats.hash,
        attempts,
        elapsed = ?stats.elapsed,
        hash_rate = stats.hash_rate,
        "block mined"
    );
    Ok(stats)
}
