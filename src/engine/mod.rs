// src/engine/mod.rs
//
// Pure gamification logic. Nothing in this module touches the database;
// handlers feed it row data and persist the results.

pub mod achievement;
pub mod leveling;
pub mod scoring;
pub mod selector;
pub mod streak;
