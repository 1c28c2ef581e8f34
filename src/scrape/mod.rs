//! Refresh pipeline: fetch listing pages, parse them, merge departments.
//!
//! The coordinator fans department workers out over a bounded pool; each worker
//! composes the page fetcher with the record parser and absorbs its own failures.

mod coordinator;
mod fetcher;
pub mod parser;
mod worker;

pub use coordinator::*;
pub use fetcher::*;
pub use worker::*;
