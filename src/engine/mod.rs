// src/engine/mod.rs

pub mod attempts;
pub mod clock;
pub mod curation;
pub mod gate;
pub mod leaderboard;
pub mod normalize;
pub mod notify;
pub mod provisioner;
pub mod questions;
pub mod scoring;
