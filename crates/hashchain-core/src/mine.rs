use crate::{
    pow::{meets_difficulty, MiningOptions, MiningStats},
    Block, MiningError, MAX_DIFFICULTY, PROGRESS_INTERVAL,
};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{info, warn};

/// Mines a block by searching nonces in parallel, starting at the block's
/// current nonce, until a hash has at least `difficulty` leading zero hex digits.
/// The winning nonce is written back into the block. Honours the deadline,
/// cancel token and progress counter in `options`; on failure the block is
/// left as it was.
pub fn mine_parallel(
    block: &mut Block,
    difficulty: u32,
    options: &MiningOptions,
) -> Result<MiningStats, MiningError> {
    let difficulty = difficulty.min(MAX_DIFFICULTY);
    let start = Instant::now();
    let evaluated = AtomicU64::new(0);
    let template: &Block = block;

    if let Err(err) = options.checkpoint(start, 0) {
        warn!(index = template.index(), %err, "mining aborted");
        return Err(err);
    }

    // Rayon splits the remaining nonce range across its worker threads.
    let found = (template.nonce()..=u64::MAX)
        .into_par_iter()
        .find_map_any(|nonce| {
            let done = evaluated.fetch_add(1, Ordering::Relaxed) + 1;
            if done % PROGRESS_INTERVAL == 0 {
                if let Err(err) = options.checkpoint(start, done) {
                    return Some(Err(err));
                }
            }
            let hash = template.hash_with_nonce(nonce);
            meets_difficulty(&hash, difficulty).then_some(Ok(nonce))
        });

    let nonce = match found {
        Some(Ok(nonce)) => nonce,
        Some(Err(err)) => {
            warn!(index = template.index(), %err, "mining aborted");
            return Err(err);
        }
        None => return Err(MiningError::NonceSpaceExhausted { difficulty }),
    };

    block.set_nonce(nonce);
    let attempts = evaluated.load(Ordering::Relaxed);
    if let Some(progress) = &options.progress {
        progress.record(attempts);
    }
    let stats = MiningStats::new(block, attempts, start.elapsed());
    info!(
        index = block.index(),
        nonce,
        hash = %stats.hash,
        attempts,
        elapsed = ?stats.elapsed,
        "block mined in parallel"
    );
    Ok(stats)
}
