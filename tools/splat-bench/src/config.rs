//! Config command - print or write the pipeline configuration

use anyhow::{Context, Result};
use clap::Args;
use splatstorm_core::PipelineConfig;
use splatstorm_core::config::default_path;

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Write the default config to the platform config directory
    #[arg(long)]
    pub write: bool,
}

/// Execute the config command
pub fn execute(args: ConfigArgs) -> Result<()> {
    if args.write {
        let path = default_path().context("Could not determine config directory")?;
        PipelineConfig::default()
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let config = PipelineConfig::load_default().context("Failed to load config")?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}
