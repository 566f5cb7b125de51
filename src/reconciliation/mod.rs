//! Reconciliation module containing the session manager, balance
//! calculator, and the orchestrating engine

pub mod balance;
pub mod core;
pub mod session;

pub use balance::*;
pub use core::*;
pub use session::*;
