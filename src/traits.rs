//! Traits for storage abstraction and the ledger collaborator boundary

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::types::*;

/// Filter for listing bank statements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementFilter {
    /// Restrict to one bank account
    pub account_id: Option<String>,
    /// Restrict to one lifecycle state
    pub status: Option<StatementStatus>,
    /// Earliest statement date, inclusive
    pub from: Option<NaiveDate>,
    /// Latest statement date, inclusive
    pub to: Option<NaiveDate>,
}

/// Filter for listing reconciliations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationFilter {
    /// Restrict to one bank account
    pub account_id: Option<String>,
    /// Restrict to one lifecycle state
    pub status: Option<ReconciliationStatus>,
}

/// Read-only boundary to the organization's internal ledger
///
/// The engine never creates or deletes ledger data. The only mutation it
/// may request is setting or clearing a line item's matched flag, and the
/// set is a test-and-set: `claim_line_item` fails with
/// [`ReconError::Conflict`] if the item is already matched, which is the
/// ledger half of the one-to-one matching invariant.
///
/// Implementations that cannot reach the ledger must return
/// [`ReconError::Dependency`]; callers abort with no partial state change.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// List unmatched journal line items for an account within a date range
    async fn unmatched_line_items(
        &self,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ReconResult<Vec<JournalLineItem>>;

    /// Look up a single line item by id
    async fn line_item(&self, line_item_id: &str) -> ReconResult<Option<JournalLineItem>>;

    /// Atomically mark a line item matched; `Conflict` if it already is
    async fn claim_line_item(&mut self, line_item_id: &str) -> ReconResult<()>;

    /// Clear a line item's matched flag
    async fn release_line_item(&mut self, line_item_id: &str) -> ReconResult<()>;
}

/// Storage abstraction for the reconciliation engine
///
/// This trait allows the engine to work with any storage backend
/// (PostgreSQL, MySQL, SQLite, in-memory, etc.) by implementing these
/// methods. The two match mutations carry a transactional contract:
/// [`commit_match`](ReconStorage::commit_match) must verify the statement
/// transaction is unmatched, set its flag, and insert the match row within
/// one transaction/lock scope, and
/// [`remove_match`](ReconStorage::remove_match) must delete the row and
/// clear the flag the same way.
#[async_trait]
pub trait ReconStorage: Send + Sync {
    // Statements

    /// Save a new bank statement
    async fn save_statement(&mut self, statement: &BankStatement) -> ReconResult<()>;

    /// Get a statement by id
    async fn get_statement(&self, statement_id: &str) -> ReconResult<Option<BankStatement>>;

    /// List statements matching a filter
    async fn list_statements(&self, filter: &StatementFilter) -> ReconResult<Vec<BankStatement>>;

    /// Update an existing statement
    async fn update_statement(&mut self, statement: &BankStatement) -> ReconResult<()>;

    /// Delete a statement and its transactions
    async fn delete_statement(&mut self, statement_id: &str) -> ReconResult<()>;

    // Statement transactions

    /// Save a new statement transaction
    async fn save_transaction(&mut self, transaction: &StatementTransaction) -> ReconResult<()>;

    /// Get a statement transaction by id
    async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> ReconResult<Option<StatementTransaction>>;

    /// List all transactions of one statement
    async fn list_transactions(
        &self,
        statement_id: &str,
    ) -> ReconResult<Vec<StatementTransaction>>;

    /// Whether an identical transaction was already imported into the
    /// statement (same date, amount, and description)
    async fn transaction_exists(
        &self,
        statement_id: &str,
        date: NaiveDate,
        amount: &BigDecimal,
        description: &str,
    ) -> ReconResult<bool>;

    // Reconciliations

    /// Save a new reconciliation
    async fn save_reconciliation(&mut self, reconciliation: &Reconciliation) -> ReconResult<()>;

    /// Get a reconciliation by id
    async fn get_reconciliation(
        &self,
        reconciliation_id: &str,
    ) -> ReconResult<Option<Reconciliation>>;

    /// List reconciliations matching a filter
    async fn list_reconciliations(
        &self,
        filter: &ReconciliationFilter,
    ) -> ReconResult<Vec<Reconciliation>>;

    /// Update an existing reconciliation
    async fn update_reconciliation(&mut self, reconciliation: &Reconciliation) -> ReconResult<()>;

    // Matches

    /// Atomically verify the statement transaction is unmatched, mark it
    /// matched, and insert the match row; `Conflict` if it is already
    /// matched, `NotFound` if it does not exist
    async fn commit_match(&mut self, record: &MatchRecord) -> ReconResult<()>;

    /// Get a match by id
    async fn get_match(&self, match_id: &str) -> ReconResult<Option<MatchRecord>>;

    /// List all matches of one reconciliation
    async fn list_matches(&self, reconciliation_id: &str) -> ReconResult<Vec<MatchRecord>>;

    /// Atomically delete a match and clear the statement transaction's
    /// matched flag, returning the removed record
    async fn remove_match(&mut self, match_id: &str) -> ReconResult<MatchRecord>;

    // Adjustments

    /// Save a new adjustment
    async fn save_adjustment(&mut self, adjustment: &Adjustment) -> ReconResult<()>;

    /// Get an adjustment by id
    async fn get_adjustment(&self, adjustment_id: &str) -> ReconResult<Option<Adjustment>>;

    /// List all adjustments of one reconciliation
    async fn list_adjustments(&self, reconciliation_id: &str) -> ReconResult<Vec<Adjustment>>;

    /// Update an existing adjustment
    async fn update_adjustment(&mut self, adjustment: &Adjustment) -> ReconResult<()>;

    /// Delete an adjustment
    async fn delete_adjustment(&mut self, adjustment_id: &str) -> ReconResult<()>;
}
