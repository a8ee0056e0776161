//! `veil decode <token>`.

use anyhow::{Context, Result};
use veil_core::codec::CodecId;

pub fn run_decode(token: &str, codec: CodecId) -> Result<()> {
    let url = codec
        .decode(token)
        .with_context(|| format!("decoding with the {} codec", codec))?;
    println!("{}", url);
    Ok(())
}
