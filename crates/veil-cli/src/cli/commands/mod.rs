//! CLI command handlers, one per file.

mod config;
mod decode;
mod encode;
mod fetch;
mod rewrite;
mod source;

pub use config::run_config;
pub use decode::run_decode;
pub use encode::run_encode;
pub use fetch::run_fetch;
pub use rewrite::run_rewrite;
pub use source::run_source;
