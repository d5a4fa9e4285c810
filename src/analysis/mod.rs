//! Flakiness classification, root-cause clustering, lifecycle tracking,
//! and the analysis pipeline tying them together.

pub mod clustering;
pub mod flakiness;
pub mod lifecycle;
pub mod runner;
