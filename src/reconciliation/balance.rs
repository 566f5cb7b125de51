//! Balance calculator: pure functions behind the close gate and reporting
//!
//! Nothing here touches storage; callers pass in the reconciliation's
//! recorded balances and its adjustments and get back a read model,
//! recomputed on demand and never persisted.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::{amount_tolerance, Adjustment, Reconciliation};

/// Read model of a reconciliation's balance position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// Statement balance as entered on the reconciliation
    pub statement_balance: BigDecimal,
    /// Book balance as entered on the reconciliation
    pub book_balance: BigDecimal,
    /// Sum of all adjustment amounts
    pub adjustment_total: BigDecimal,
    /// `statement_balance - (book_balance + adjustment_total)`
    pub difference: BigDecimal,
    /// Whether `|difference|` is below the 0.01 close tolerance
    pub within_tolerance: bool,
}

/// Sum of all adjustment amounts
pub fn adjustment_total(adjustments: &[Adjustment]) -> BigDecimal {
    adjustments.iter().map(|a| &a.amount).sum()
}

/// The outstanding difference the close gate evaluates:
/// `statement_balance - (book_balance + adjustments)`
pub fn difference(
    statement_balance: &BigDecimal,
    book_balance: &BigDecimal,
    adjustment_total: &BigDecimal,
) -> BigDecimal {
    statement_balance - (book_balance + adjustment_total)
}

/// Compute the balance summary for a reconciliation and its adjustments
pub fn summarize(reconciliation: &Reconciliation, adjustments: &[Adjustment]) -> BalanceSummary {
    let adjustment_total = adjustment_total(adjustments);
    let difference = difference(
        &reconciliation.statement_balance,
        &reconciliation.book_balance,
        &adjustment_total,
    );
    let within_tolerance = difference.abs() < amount_tolerance();
    BalanceSummary {
        statement_balance: reconciliation.statement_balance.clone(),
        book_balance: reconciliation.book_balance.clone(),
        adjustment_total,
        difference,
        within_tolerance,
    }
}
