//! Small macro helpers reused across the pipeline crates.

mod ops;

pub use ops::*;
