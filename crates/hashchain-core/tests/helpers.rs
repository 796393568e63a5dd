#![allow(dead_code)]

use hashchain_core::{pow, Block, Chain};
use rand::{distributions::Alphanumeric, rngs::StdRng, Rng, SeedableRng};

pub const GENESIS_TIMESTAMP: f64 = 1_743_415_200.0;

pub fn fixed_chain() -> Chain {
    Chain::with_genesis(Block::genesis(GENESIS_TIMESTAMP))
}

/// Candidate block on top of the chain's tail, one second after it.
pub fn candidate(chain: &Chain, transactions: Vec<String>) -> Block {
    let tail = chain.tail();
    Block::new(
        tail.index() + 1,
        tail.timestamp() + 1.0,
        transactions,
        tail.hash(),
    )
}

pub fn transfer(i: u64) -> String {
    let from = char::from(b'A' + (i as u8 - 1) % 26);
    let to = char::from(b'A' + (i as u8) % 26);
    format!(
        "Transaction {i}: User {from} transfers {} BTC to User {to} on March 31, 2025 at {}:00 AM UTC",
        i * 10,
        10 + i
    )
}

pub fn random_transactions(seed: u64, count: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let memo: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(12)
                .map(char::from)
                .collect();
            format!("{memo} pays {}", rng.gen_range(1..1_000))
        })
        .collect()
}

/// Chain of `extra` mined blocks after genesis.
pub fn build_chain(extra: u64, difficulty: u32) -> Chain {
    let mut chain = fixed_chain();
    for i in 1..=extra {
        let mut block = candidate(&chain, vec![transfer(i)]);
        pow::mine(&mut block, difficulty);
        chain.append(block).expect("freshly mined block links to tail");
    }
    chain
}
