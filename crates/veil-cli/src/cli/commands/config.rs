//! `veil config` – where the config lives and what it resolves to.

use anyhow::Result;
use veil_core::config::{self, VeilConfig};

pub fn run_config(cfg: &VeilConfig) -> Result<()> {
    println!("# {}", config::config_path()?.display());
    print!("{}", cfg.to_toml()?);
    Ok(())
}
