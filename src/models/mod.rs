//! Data models for the faculty directory.
//!
//! Record JSON keeps the snake_case field names existing clients already read.

mod department;
mod faculty;
mod snapshot;

pub use department::*;
pub use faculty::*;
pub use snapshot::*;
