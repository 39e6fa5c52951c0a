//! Sort command - time the depth sort algorithms on one scene

use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Args;
use splatstorm_core::sort::is_back_to_front;
use splatstorm_core::{DepthSorter, SortAlgorithm, sort_indices};

use crate::scene;

/// Arguments for the sort command
#[derive(Args)]
pub struct SortArgs {
    /// Number of splats to sort
    #[arg(short, long, default_value = "50000")]
    pub splats: usize,

    /// Only run this algorithm (bucket, radix, quick)
    #[arg(short, long)]
    pub algorithm: Option<SortAlgorithm>,

    /// Scene seed
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

/// Execute the sort command
pub fn execute(args: SortArgs) -> Result<()> {
    let scene = scene::generate(args.splats, args.seed);
    let algorithms = match args.algorithm {
        Some(algorithm) => vec![algorithm],
        None => SortAlgorithm::ALL.to_vec(),
    };

    println!("Sorting {} splats", args.splats);
    for algorithm in algorithms {
        let start = Instant::now();
        let ordered = match algorithm {
            SortAlgorithm::Bucket => {
                let mut splats = scene.clone();
                let mut sorter = DepthSorter::new(splats.len(), algorithm)
                    .with_context(|| format!("Failed to allocate {algorithm} sorter"))?;
                sorter.run(&mut splats)?;
                let identity: Vec<u32> = (0..splats.len() as u32).collect();
                is_back_to_front(&splats, &identity)
            }
            SortAlgorithm::Radix | SortAlgorithm::Quick => {
                let indices = sort_indices(&scene, algorithm);
                is_back_to_front(&scene, &indices)
            }
        };
        let elapsed = start.elapsed();

        if !ordered {
            bail!("{algorithm} sort did not produce back-to-front order");
        }
        println!(
            "  {:<8} {:>9.3} ms",
            algorithm.name(),
            elapsed.as_secs_f64() * 1000.0
        );
    }
    Ok(())
}
