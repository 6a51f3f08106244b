//! Randomized stress testing against the standard library sort.
//!
//! Each round draws a fresh `(count, block size, distribution, storage
//! shape)` combination from a per-round seed, sorts it, and checks the
//! output against `sort_unstable` as the oracle. Shapes carrying values are
//! run twice to confirm duplicate-key assignment is deterministic. The
//! first failing round reports its seed for reproduction.

use anyhow::{bail, Context, Result};
use clap::Parser;
use copsort_lib::logging::OperationTimer;
use copsort_lib::progress::ProgressTracker;
use copsort_lib::sort::PartitionSorter;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::commands::command::Command;
use crate::commands::common::{generate_keys, values_in_lockstep, KeyDistribution};

/// Storage shapes under test.
#[derive(Debug, Clone, Copy)]
enum Shape {
    Keys,
    Pairs,
    ChunkedKeys,
    ChunkedPairs,
}

const SHAPES: [Shape; 4] = [Shape::Keys, Shape::Pairs, Shape::ChunkedKeys, Shape::ChunkedPairs];

/// Stress the sorter with randomized workloads.
#[derive(Debug, Parser)]
#[command(
    name = "stress",
    about = "Run randomized sort rounds against the standard library as oracle"
)]
pub struct Stress {
    /// Number of randomized rounds.
    #[arg(short = 'r', long = "rounds", default_value = "200")]
    pub rounds: u64,

    /// Maximum element count per round.
    #[arg(long = "max-count", default_value = "4096")]
    pub max_count: usize,

    /// Base seed; round `i` derives its workload from `seed + i`.
    #[arg(long = "seed", default_value = "0")]
    pub seed: u64,

    /// Number of threads for per-block parallel work.
    #[arg(short = '@', short_alias = 't', long = "threads", default_value = "1")]
    pub threads: usize,
}

impl Command for Stress {
    fn execute(&self) -> Result<()> {
        info!("Starting Stress");
        info!("Rounds: {}", self.rounds);
        info!("Max count: {}", self.max_count);
        info!("Base seed: {}", self.seed);
        info!("Threads: {}", self.threads);

        let tracker =
            ProgressTracker::new("Completed rounds").with_interval((self.rounds / 10).max(1));
        let timer = OperationTimer::new("Stress testing");

        for round in 0..self.rounds {
            let seed = self.seed.wrapping_add(round);
            self.run_round(seed)
                .with_context(|| format!("round {round} failed (reproduce with --seed {seed})"))?;
            tracker.log_if_needed(1);
        }

        tracker.log_final();
        timer.log_completion(self.rounds);
        info!("Result: PASS - all rounds matched the oracle");
        Ok(())
    }
}

impl Stress {
    fn run_round(&self, seed: u64) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = rng.random_range(0..=self.max_count);
        let block_size = rng.random_range(1..=self.max_count.max(1));
        let dist = KeyDistribution::ALL[rng.random_range(0..KeyDistribution::ALL.len())];
        let shape = SHAPES[rng.random_range(0..SHAPES.len())];

        let original = generate_keys(dist, n, &mut rng);
        let mut expected = original.clone();
        expected.sort_unstable();

        let sorter = PartitionSorter::new(block_size).threads(self.threads);

        match shape {
            Shape::Keys => {
                let keys = run_keys(&sorter, &original)?;
                if keys != expected {
                    bail!("{dist:?}/keys: output disagrees with oracle (n {n}, block {block_size})");
                }
            }
            Shape::Pairs => {
                let (keys, values) = run_pairs(&sorter, &original)?;
                if keys != expected {
                    bail!("{dist:?}/pairs: output disagrees with oracle (n {n}, block {block_size})");
                }
                if !values_in_lockstep(&original, &keys, &values) {
                    bail!("{dist:?}/pairs: values separated from keys (n {n}, block {block_size})");
                }
                let rerun = run_pairs(&sorter, &original)?;
                if rerun.1 != values {
                    bail!("{dist:?}/pairs: duplicate assignment not deterministic (n {n}, block {block_size})");
                }
            }
            Shape::ChunkedKeys => {
                let keys = run_chunked_keys(&sorter, &original, block_size)?;
                if keys != expected {
                    bail!("{dist:?}/chunked: output disagrees with oracle (n {n}, block {block_size})");
                }
            }
            Shape::ChunkedPairs => {
                let (keys, values) = run_chunked_pairs(&sorter, &original, block_size)?;
                if keys != expected {
                    bail!("{dist:?}/chunked-pairs: output disagrees with oracle (n {n}, block {block_size})");
                }
                if !values_in_lockstep(&original, &keys, &values) {
                    bail!("{dist:?}/chunked-pairs: values separated from keys (n {n}, block {block_size})");
                }
                let rerun = run_chunked_pairs(&sorter, &original, block_size)?;
                if rerun.1 != values {
                    bail!("{dist:?}/chunked-pairs: duplicate assignment not deterministic (n {n}, block {block_size})");
                }
            }
        }
        Ok(())
    }
}

fn run_keys(sorter: &PartitionSorter, original: &[u64]) -> Result<Vec<u64>> {
    let mut keys = original.to_vec();
    let request = sorter.storage_required_keys::<u64>(keys.len())?;
    let mut storage = vec![0u8; request.bytes()];
    sorter.sort_keys(&mut keys, &mut storage)?;
    Ok(keys)
}

fn run_pairs(sorter: &PartitionSorter, original: &[u64]) -> Result<(Vec<u64>, Vec<u64>)> {
    let mut keys = original.to_vec();
    let mut values: Vec<u64> = (0..keys.len() as u64).collect();
    let request = sorter.storage_required_pairs::<u64, u64>(keys.len())?;
    let mut storage = vec![0u8; request.bytes()];
    sorter.sort_pairs(&mut keys, &mut values, &mut storage)?;
    Ok((keys, values))
}

fn run_chunked_keys(
    sorter: &PartitionSorter,
    original: &[u64],
    block_size: usize,
) -> Result<Vec<u64>> {
    let mut chunk_storage = chunk_up(original, block_size);
    let request = sorter.storage_required_keys::<u64>(original.len())?;
    let mut storage = vec![0u8; request.bytes()];
    {
        let mut chunks: Vec<&mut [u64]> =
            chunk_storage.iter_mut().map(Vec::as_mut_slice).collect();
        sorter.sort_chunked_keys(&mut chunks, &mut storage)?;
    }
    Ok(chunk_storage.concat())
}

fn run_chunked_pairs(
    sorter: &PartitionSorter,
    original: &[u64],
    block_size: usize,
) -> Result<(Vec<u64>, Vec<u64>)> {
    let values: Vec<u64> = (0..original.len() as u64).collect();
    let mut key_storage = chunk_up(original, block_size);
    let mut value_storage = chunk_up(&values, block_size);
    let request = sorter.storage_required_pairs::<u64, u64>(original.len())?;
    let mut storage = vec![0u8; request.bytes()];
    {
        let mut key_chunks: Vec<&mut [u64]> =
            key_storage.iter_mut().map(Vec::as_mut_slice).collect();
        let mut value_chunks: Vec<&mut [u64]> =
            value_storage.iter_mut().map(Vec::as_mut_slice).collect();
        sorter.sort_chunked_pairs(&mut key_chunks, &mut value_chunks, &mut storage)?;
    }
    Ok((key_storage.concat(), value_storage.concat()))
}

fn chunk_up(data: &[u64], block_size: usize) -> Vec<Vec<u64>> {
    data.chunks(block_size).map(<[u64]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_stress_run() {
        let cmd = Stress { rounds: 25, max_count: 256, seed: 1234, threads: 1 };
        cmd.execute().unwrap();
    }

    #[test]
    fn test_chunk_up_geometry() {
        let data: Vec<u64> = (0..10).collect();
        let chunks = chunk_up(&data, 4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 4);
        assert_eq!(chunks[2].len(), 2);
        assert!(chunk_up(&[], 4).is_empty());
    }
}
