pub mod codec;
pub mod config;
pub mod context;
pub mod cookie;
pub mod edge;
pub mod intercept;
pub mod logging;
pub mod rewrite;
pub mod session;
