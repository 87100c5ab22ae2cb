//! # Post History
//!
//! Keeps track of recently published announcement texts so that the
//! generation pipeline can reject repeats and near-repeats before they
//! reach a network.
//!
//! The history lives in memory only and is rebuilt from nothing on every
//! process start.

mod history;
mod similarity;

pub use history::memory::DedupCache;
pub use history::PostHistory;
pub use similarity::{token_overlap, tokenize, DUPLICATE_THRESHOLD};
