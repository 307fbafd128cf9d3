// src/handlers/mod.rs

pub mod analytics;
pub mod attempt;
pub mod quiz;
