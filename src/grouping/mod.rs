//! Pure group-formation logic: partitioning signups and classifying
//! channel members by participation.

pub mod classifier;
pub mod partitioner;
