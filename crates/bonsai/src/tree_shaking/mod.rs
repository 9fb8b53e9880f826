pub mod collect;
pub mod collectors;
pub mod commonjs;
pub mod marker;
pub mod prune;
pub mod remove_unused;

pub use prune::{shake, PruneMode};
