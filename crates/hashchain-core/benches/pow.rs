use criterion::{criterion_group, criterion_main, Criterion};
use hashchain_core::{
    block_hash, mine::mine_parallel, pow, pow::MiningOptions, Block, GENESIS_PREVIOUS_HASH,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::hint::black_box;

fn sample_block() -> Block {
    let mut rng = StdRng::seed_from_u64(42);
    let txs: Vec<String> = (0..10)
        .map(|i| format!("alice-{i} pays bob {}", rng.gen_range(1..10)))
        .collect();
    Block::new(1, 1_700_000_000.0, txs, GENESIS_PREVIOUS_HASH)
}

fn bench_pow(c: &mut Criterion) {
    let block = sample_block();

    c.bench_function("block_hash", |b| {
        b.iter(|| {
            block_hash(
                black_box(block.index()),
                block.timestamp(),
                block.transactions(),
                block.previous_hash(),
                black_box(7),
            )
        });
    });

    c.bench_function("mine_difficulty_3", |b| {
        b.iter(|| {
            let mut candidate = block.clone();
            pow::mine(&mut candidate, 3)
        });
    });

    c.bench_function("mine_parallel_difficulty_3", |b| {
        b.iter(|| {
            let mut candidate = block.clone();
            mine_parallel(&mut candidate, 3, &MiningOptions::default())
        });
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
