//! Luts command - generate lookup tables and print a summary

use std::f32::consts::PI;

use anyhow::Result;
use clap::Args;
use splatstorm_core::LookupTables;
use splatstorm_core::stats::math_debug_stats;
use splatstorm_shared::FixedMath;

/// Arguments for the luts command
#[derive(Args)]
pub struct LutsArgs {
    /// Also print sample lookups
    #[arg(long)]
    pub samples: bool,
}

/// Execute the luts command
pub fn execute(args: LutsArgs) -> Result<()> {
    let math = FixedMath::new();
    let mut tables = LookupTables::new();
    tables.generate_all(&math);

    println!("Lookup tables");
    for row in tables.memory_usage().debug_stats() {
        println!("  {row}");
    }
    for row in math_debug_stats(&math.stats()) {
        println!("  {row}");
    }

    if args.samples {
        println!("Samples");
        for angle in [0.0, PI / 6.0, PI / 2.0, PI, 3.0 * PI] {
            let a = math.from_f32(angle);
            println!(
                "  sin({angle:>6.3}) = {:>8.4}   cos({angle:>6.3}) = {:>8.4}",
                tables.sin(a).to_f32(),
                tables.cos(a).to_f32()
            );
        }
        for value in [0.25, 1.0, 4.0, 9.0] {
            let v = math.from_f32(value);
            println!(
                "  sqrt({value:>5.2}) = {:>8.4}   exp(-{value:>5.2}) = {:>8.4}",
                tables.sqrt(v).to_f32(),
                tables.exp_neg(v).to_f32()
            );
        }
    }
    Ok(())
}
