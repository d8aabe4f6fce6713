/// HockeyHarvest — Traversal
/// AJAX filter classification and the year → group roster walk

pub mod classifier;
pub mod walker;

pub use classifier::{classify, FilterKind};
pub use walker::{Walk, WalkStats, Walker};
