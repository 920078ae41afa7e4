// src/models/mod.rs

pub mod achievement;
pub mod attempt;
pub mod quiz;
pub mod user;
