//! # Reconciliation Core
//!
//! A bank reconciliation and matching engine: imports statement
//! transactions, pairs them against internal ledger line items, tracks
//! running balances and differences, manages manual adjustments, and
//! enforces the lifecycle that gates when a reconciliation may be closed.
//!
//! ## Features
//!
//! - **Transaction import**: per-row parsing, deduplication, and a
//!   structured outcome log; bad rows never abort a batch
//! - **Automatic matching**: tolerance search over amount (exact within
//!   0.01), date window, and optional description similarity; greedy,
//!   idempotent, and one-to-one
//! - **Manual matching and unmatching**: explicit pairing with conflict
//!   detection on both sides
//! - **Adjustments**: bank fees, interest, and corrections scoped to one
//!   reconciliation and frozen once it completes
//! - **Close gate**: `difference = statement - (book + adjustments)` must
//!   fall below 0.01 unless explicitly overridden
//! - **Storage abstraction**: database-agnostic design with trait-based
//!   storage and a read-only ledger gateway boundary
//!
//! ## Quick Start
//!
//! ```rust
//! use reconciliation_core::{MemoryLedgerGateway, MemoryStorage, ReconciliationEngine};
//!
//! let storage = MemoryStorage::new();
//! let gateway = MemoryLedgerGateway::new();
//! let mut engine = ReconciliationEngine::new(storage, gateway);
//! ```

pub mod matching;
pub mod reconciliation;
pub mod statement;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use matching::*;
pub use reconciliation::*;
pub use statement::*;
pub use traits::*;
pub use types::*;
pub use utils::memory_storage::{MemoryLedgerGateway, MemoryStorage, UnavailableLedgerGateway};
