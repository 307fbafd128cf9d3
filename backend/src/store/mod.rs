// src/store/mod.rs

pub mod ledger;
pub mod quiz_store;

pub use ledger::AttemptLedger;
pub use quiz_store::QuizStore;
