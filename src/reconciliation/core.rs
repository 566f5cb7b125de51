//! Main reconciliation engine that coordinates the statement store,
//! importer, match engine, and reconciliation sessions

use chrono::NaiveDate;

use crate::matching::engine::{AutoMatchOptions, MatchEngine, UnmatchedSet};
use crate::reconciliation::balance::BalanceSummary;
use crate::reconciliation::session::{
    AdjustmentUpdate, CompleteOptions, NewAdjustment, NewReconciliation, ReconciliationManager,
    ReconciliationUpdate,
};
use crate::statement::importer::{ImportOutcome, ImportPolicy, RawRow, TransactionImporter};
use crate::statement::store::{NewStatement, StatementManager, StatementUpdate};
use crate::traits::*;
use crate::types::*;

/// Reconciliation engine orchestrating all statement, import, matching,
/// and session operations over one storage backend and one ledger gateway
///
/// Every operation reports its outcome through its return value; the
/// engine never broadcasts events.
pub struct ReconciliationEngine<S: ReconStorage, G: LedgerGateway> {
    statements: StatementManager<S>,
    importer: TransactionImporter<S>,
    matcher: MatchEngine<S, G>,
    sessions: ReconciliationManager<S>,
}

impl<S: ReconStorage + Clone, G: LedgerGateway + Clone> ReconciliationEngine<S, G> {
    /// Create a new engine with the given storage backend and gateway
    pub fn new(storage: S, gateway: G) -> Self {
        Self {
            statements: StatementManager::new(storage.clone()),
            importer: TransactionImporter::new(storage.clone()),
            matcher: MatchEngine::new(storage.clone(), gateway),
            sessions: ReconciliationManager::new(storage),
        }
    }

    /// Create a new engine with an explicit import processing policy
    pub fn with_import_policy(storage: S, gateway: G, policy: ImportPolicy) -> Self {
        Self {
            statements: StatementManager::new(storage.clone()),
            importer: TransactionImporter::with_policy(storage.clone(), policy),
            matcher: MatchEngine::new(storage.clone(), gateway),
            sessions: ReconciliationManager::new(storage),
        }
    }

    // Statement operations

    /// Create a new statement in the `Uploaded` state
    pub async fn create_statement(&mut self, params: NewStatement) -> ReconResult<BankStatement> {
        self.statements.create_statement(params).await
    }

    /// Get a statement by id
    pub async fn get_statement(&self, statement_id: &str) -> ReconResult<Option<BankStatement>> {
        self.statements.get_statement(statement_id).await
    }

    /// List statements matching a filter
    pub async fn list_statements(
        &self,
        filter: &StatementFilter,
        page: &PageRequest,
    ) -> ReconResult<PageResponse<BankStatement>> {
        self.statements.list_statements(filter, page).await
    }

    /// Update a statement's editable fields
    pub async fn update_statement(
        &mut self,
        statement_id: &str,
        update: StatementUpdate,
    ) -> ReconResult<BankStatement> {
        self.statements.update_statement(statement_id, update).await
    }

    /// Delete a statement not referenced by any reconciliation
    pub async fn delete_statement(&mut self, statement_id: &str) -> ReconResult<()> {
        self.statements.delete_statement(statement_id).await
    }

    /// List a statement's transactions
    pub async fn list_statement_transactions(
        &self,
        statement_id: &str,
    ) -> ReconResult<Vec<StatementTransaction>> {
        self.statements.list_transactions(statement_id).await
    }

    // Import operations

    /// Import a batch of raw rows into a statement
    pub async fn import_transactions(
        &mut self,
        statement_id: &str,
        rows: &[RawRow],
    ) -> ReconResult<ImportOutcome> {
        self.importer.import(statement_id, rows).await
    }

    /// Parse a delimited statement export and import it
    pub async fn import_delimited(
        &mut self,
        statement_id: &str,
        text: &str,
        has_headers: bool,
    ) -> ReconResult<ImportOutcome> {
        self.importer
            .import_delimited(statement_id, text, has_headers)
            .await
    }

    // Matching operations

    /// Run one automatic matching pass, returning the matches created
    pub async fn auto_match(
        &mut self,
        reconciliation_id: &str,
        options: AutoMatchOptions,
    ) -> ReconResult<usize> {
        self.matcher.auto_match(reconciliation_id, options).await
    }

    /// Pair one statement transaction with one journal line item
    pub async fn manual_match(
        &mut self,
        reconciliation_id: &str,
        statement_transaction_id: &str,
        journal_line_item_id: &str,
        notes: Option<String>,
    ) -> ReconResult<MatchRecord> {
        self.matcher
            .manual_match(
                reconciliation_id,
                statement_transaction_id,
                journal_line_item_id,
                notes,
            )
            .await
    }

    /// Delete a match and clear both sides' matched flags
    pub async fn unmatch(&mut self, match_id: &str) -> ReconResult<()> {
        self.matcher.unmatch(match_id).await
    }

    /// Unmatched items on both sides of an account over a date range
    pub async fn unmatched(
        &self,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ReconResult<UnmatchedSet> {
        self.matcher.unmatched(account_id, start, end).await
    }

    /// List a reconciliation's matches
    pub async fn list_matches(&self, reconciliation_id: &str) -> ReconResult<Vec<MatchRecord>> {
        self.sessions.get_required(reconciliation_id).await?;
        self.sessions.storage.list_matches(reconciliation_id).await
    }

    // Reconciliation operations

    /// Begin reconciling a processed statement
    pub async fn create_reconciliation(
        &mut self,
        params: NewReconciliation,
    ) -> ReconResult<Reconciliation> {
        self.sessions.create(params).await
    }

    /// Get a reconciliation by id
    pub async fn get_reconciliation(
        &self,
        reconciliation_id: &str,
    ) -> ReconResult<Option<Reconciliation>> {
        self.sessions.get(reconciliation_id).await
    }

    /// List reconciliations matching a filter
    pub async fn list_reconciliations(
        &self,
        filter: &ReconciliationFilter,
        page: &PageRequest,
    ) -> ReconResult<PageResponse<Reconciliation>> {
        self.sessions.list(filter, page).await
    }

    /// Update a reconciliation's editable fields
    pub async fn update_reconciliation(
        &mut self,
        reconciliation_id: &str,
        update: ReconciliationUpdate,
    ) -> ReconResult<Reconciliation> {
        self.sessions.update(reconciliation_id, update).await
    }

    /// Close a reconciliation, freezing its matches and adjustments
    pub async fn complete_reconciliation(
        &mut self,
        reconciliation_id: &str,
        options: CompleteOptions,
    ) -> ReconResult<Reconciliation> {
        self.sessions.complete(reconciliation_id, options).await
    }

    /// Compute a reconciliation's balance summary on demand
    pub async fn balance(&self, reconciliation_id: &str) -> ReconResult<BalanceSummary> {
        self.sessions.balance(reconciliation_id).await
    }

    // Adjustment operations

    /// Add an adjustment to an in-progress reconciliation
    pub async fn add_adjustment(
        &mut self,
        reconciliation_id: &str,
        params: NewAdjustment,
    ) -> ReconResult<Adjustment> {
        self.sessions.add_adjustment(reconciliation_id, params).await
    }

    /// Edit an adjustment of an in-progress reconciliation
    pub async fn update_adjustment(
        &mut self,
        adjustment_id: &str,
        update: AdjustmentUpdate,
    ) -> ReconResult<Adjustment> {
        self.sessions.update_adjustment(adjustment_id, update).await
    }

    /// Remove an adjustment from an in-progress reconciliation
    pub async fn remove_adjustment(&mut self, adjustment_id: &str) -> ReconResult<()> {
        self.sessions.remove_adjustment(adjustment_id).await
    }

    /// List a reconciliation's adjustments
    pub async fn list_adjustments(&self, reconciliation_id: &str) -> ReconResult<Vec<Adjustment>> {
        self.sessions.list_adjustments(reconciliation_id).await
    }
}
