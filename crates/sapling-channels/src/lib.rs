//! # sapling-channels
//!
//! Event sources and outbound sinks for Sapling.

pub mod jsonl;

pub use jsonl::JsonLinesChannel;
