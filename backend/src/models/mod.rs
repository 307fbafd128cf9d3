// src/models/mod.rs

pub mod analytics;
pub mod attempt;
pub mod catalog;
pub mod quiz;
