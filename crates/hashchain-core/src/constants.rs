pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";
pub const GENESIS_TRANSACTION: &str =
    "Genesis Transaction: Blockchain Network Initialized on March 31, 2025 at 10:00 AM UTC";
pub const DEFAULT_DIFFICULTY: u32 = 4;
pub const DEFAULT_TARGET_TIME_SECS: f64 = 0.5;
/// A digest only has this many hex digits to be zero.
pub const MAX_DIFFICULTY: u32 = HASH_HEX_SIZE as u32;
/// Attempts between progress updates and deadline/cancel checks.
pub const PROGRESS_INTERVAL: u64 = 4_096;
