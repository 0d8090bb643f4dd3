// Shared helpers for paths and timestamps

pub mod paths;
pub mod timestamps;

pub use paths::{canonical_or_self, relative_unix_path, to_relative_unix_style};
pub use timestamps::cutoff_before;
