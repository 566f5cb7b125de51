//! Matching module pairing statement transactions with ledger line items

pub mod engine;

pub use engine::*;
