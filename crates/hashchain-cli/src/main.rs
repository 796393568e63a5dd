use anyhow::{Context, Result};
use clap::Parser;
use hashchain_core::{
    mine::mine_parallel,
    now_timestamp,
    pow::{self, CancelToken, MiningOptions, MiningStats},
    Block, Chain, DifficultyController, MiningError, Violation,
};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "hashchain")]
#[command(about = "Mine a short proof-of-work chain, tamper with one block and verify it")]
struct Cli {
    /// Blocks to mine after genesis
    #[arg(long, default_value_t = 3)]
    blocks: u64,
    /// Starting difficulty (leading zero hex digits)
    #[arg(long, default_value_t = hashchain_core::DEFAULT_DIFFICULTY)]
    difficulty: u32,
    /// Target mining time per block, in seconds
    #[arg(long, default_value = "0.5", value_parser = parse_seconds)]
    target_time: Duration,
    /// Upper bound for the difficulty controller
    #[arg(long)]
    max_difficulty: Option<u32>,
    /// Give up on a block after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Search nonces on all cores
    #[arg(long)]
    parallel: bool,
    /// Block whose first transaction gets overwritten
    #[arg(long, default_value_t = 2)]
    tamper_block: u64,
    /// Skip the tampering step
    #[arg(long)]
    no_tamper: bool,
    /// Print the chain and verification reports as JSON
    #[arg(long)]
    json: bool,
}

const TAMPERED_TRANSACTION: &str = "Tampered Transaction: User B fraudulently transfers 1,000 BTC to User C on March 31, 2025 at 12:00 PM UTC";

/// Non-negative, finite seconds.
fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value.parse().map_err(|err| format!("{err}"))?;
    Duration::try_from_secs_f64(secs).map_err(|err| format!("{err}"))
}

fn transfer(i: u64) -> String {
    let from = char::from(b'A' + ((i - 1) % 26) as u8);
    let to = char::from(b'A' + (i % 26) as u8);
    format!(
        "Transaction {i}: User {from} transfers {} BTC to User {to} on March 31, 2025 at {}:00 AM UTC",
        i * 10,
        10 + i
    )
}

async fn mine_block(
    mut block: Block,
    difficulty: u32,
    options: MiningOptions,
    parallel: bool,
) -> Result<(Block, MiningStats)> {
    let (block, result) = tokio::task::spawn_blocking(move || {
        let result = if parallel {
            mine_parallel(&mut block, difficulty, &options)
        } else {
            pow::mine_with(&mut block, difficulty, &options)
        };
        (block, result)
    })
    .await?;
    let index = block.index();
    let stats = result.with_context(|| format!("mining block {index}"))?;
    Ok((block, stats))
}

fn print_chain(chain: &Chain) {
    for block in chain {
        println!("Block {}:", block.index());
        println!(" Timestamp: {:.6}", block.timestamp());
        println!(" Transactions: {:?}", block.transactions());
        println!(" Nonce: {}", block.nonce());
        println!(" Current Hash: {}", block.hash());
        println!(" Previous Hash: {}", block.previous_hash());
    }
}

fn print_report(title: &str, violations: &[Violation]) {
    println!("{title}:");
    if violations.is_empty() {
        println!(" none, chain is intact");
    }
    for violation in violations {
        println!(" block {}: {:?}", violation.block_index, violation.kind);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut controller = DifficultyController::new(cli.difficulty, cli.target_time);
    if let Some(max) = cli.max_difficulty {
        controller = controller.with_ceiling(max);
    }

    let cancel = CancelToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling mining");
                cancel.cancel();
            }
        }
    });

    let mut chain = Chain::init();
    for i in 1..=cli.blocks {
        let block = Block::try_new(i, now_timestamp(), vec![transfer(i)], chain.tail().hash())?;
        let mut options = MiningOptions::default().with_cancel(cancel.clone());
        if let Some(ms) = cli.timeout_ms {
            options = options.with_timeout(Duration::from_millis(ms));
        }

        let difficulty = controller.difficulty();
        let (block, stats) = match mine_block(block, difficulty, options, cli.parallel).await {
            Ok(mined) => mined,
            Err(err) => {
                if let Some(MiningError::Timeout { .. }) = err.downcast_ref::<MiningError>() {
                    warn!(difficulty, "giving up on block {i}");
                }
                return Err(err);
            }
        };
        if !cli.json {
            println!(
                "Block mined! Hash: {}, Time: {:.2}s",
                stats.hash,
                stats.elapsed.as_secs_f64()
            );
        }
        chain
            .append(block)
            .with_context(|| format!("appending block {i}"))?;

        let next = controller.observe(stats.elapsed);
        if !cli.json && next != difficulty {
            let direction = if next > difficulty { "Increasing" } else { "Decreasing" };
            println!("{direction} difficulty to {next}");
        }
    }

    if !cli.json {
        println!("Initial Blockchain Structure (Before Tampering):");
        print_chain(&chain);
    }
    let before = chain.verify();

    let (after_tamper, after_rehash, original) = if cli.no_tamper {
        (Vec::new(), Vec::new(), None)
    } else {
        let target = chain
            .block_mut(cli.tamper_block)
            .with_context(|| format!("tampering with block {}", cli.tamper_block))?;
        let original = target.tamper(0, TAMPERED_TRANSACTION)?;
        info!(block = cli.tamper_block, "transaction overwritten");
        let after_tamper = chain.verify();

        chain.block_mut(cli.tamper_block)?.rehash();
        info!(block = cli.tamper_block, "stored hash refreshed");
        (after_tamper, chain.verify(), Some(original))
    };

    if cli.json {
        let report = serde_json::json!({
            "chain": &chain,
            "difficulty": controller.difficulty(),
            "violations_before_tamper": before,
            "violations_after_tamper": after_tamper,
            "violations_after_rehash": after_rehash,
            "original_transaction": original,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report("Violations before tampering", &before);
    if let Some(original) = original {
        println!(
            "Original Transaction in Block {} (Before Tampering): {original}",
            cli.tamper_block
        );
        print_report("Violations after tampering", &after_tamper);
        print_report("Violations after rehashing the tampered block", &after_rehash);
        println!("Blockchain Structure After Tampering Block {}:", cli.tamper_block);
        print_chain(&chain);
    }
    Ok(())
}
