// src/models/mod.rs

pub mod attempt;
pub mod daily_quiz;
pub mod leaderboard;
pub mod question;
