//! `veil encode <url>`.

use veil_core::codec::CodecId;

pub fn run_encode(url: &str, codec: CodecId) {
    println!("{}", codec.encode(url));
}
