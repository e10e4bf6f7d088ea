pub mod config;
pub mod fallback;
pub mod handler;
pub mod inject;
pub mod normalize;
pub mod parse;
pub mod plan;
pub mod redact;
pub mod repo;
pub mod tool;
pub mod types;
