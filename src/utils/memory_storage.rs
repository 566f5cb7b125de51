//! In-memory storage and ledger gateway implementations for testing

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

/// In-memory storage implementation for testing and development
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    statements: Arc<RwLock<HashMap<String, BankStatement>>>,
    transactions: Arc<RwLock<HashMap<String, StatementTransaction>>>,
    reconciliations: Arc<RwLock<HashMap<String, Reconciliation>>>,
    matches: Arc<RwLock<HashMap<String, MatchRecord>>>,
    adjustments: Arc<RwLock<HashMap<String, Adjustment>>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.statements.write().unwrap().clear();
        self.transactions.write().unwrap().clear();
        self.reconciliations.write().unwrap().clear();
        self.matches.write().unwrap().clear();
        self.adjustments.write().unwrap().clear();
    }
}

#[async_trait]
impl ReconStorage for MemoryStorage {
    async fn save_statement(&mut self, statement: &BankStatement) -> ReconResult<()> {
        self.statements
            .write()
            .unwrap()
            .insert(statement.id.clone(), statement.clone());
        Ok(())
    }

    async fn get_statement(&self, statement_id: &str) -> ReconResult<Option<BankStatement>> {
        Ok(self.statements.read().unwrap().get(statement_id).cloned())
    }

    async fn list_statements(&self, filter: &StatementFilter) -> ReconResult<Vec<BankStatement>> {
        let statements = self.statements.read().unwrap();
        let filtered: Vec<BankStatement> = statements
            .values()
            .filter(|statement| {
                filter
                    .account_id
                    .as_ref()
                    .is_none_or(|a| &statement.account_id == a)
                    && filter.status.is_none_or(|s| statement.status == s)
                    && filter.from.is_none_or(|d| statement.statement_date >= d)
                    && filter.to.is_none_or(|d| statement.statement_date <= d)
            })
            .cloned()
            .collect();
        Ok(filtered)
    }

    async fn update_statement(&mut self, statement: &BankStatement) -> ReconResult<()> {
        let mut statements = self.statements.write().unwrap();
        if statements.contains_key(&statement.id) {
            statements.insert(statement.id.clone(), statement.clone());
            Ok(())
        } else {
            Err(ReconError::not_found("Statement", statement.id.clone()))
        }
    }

    async fn delete_statement(&mut self, statement_id: &str) -> ReconResult<()> {
        if self
            .statements
            .write()
            .unwrap()
            .remove(statement_id)
            .is_some()
        {
            self.transactions
                .write()
                .unwrap()
                .retain(|_, txn| txn.statement_id != statement_id);
            Ok(())
        } else {
            Err(ReconError::not_found("Statement", statement_id))
        }
    }

    async fn save_transaction(&mut self, transaction: &StatementTransaction) -> ReconResult<()> {
        self.transactions
            .write()
            .unwrap()
            .insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> ReconResult<Option<StatementTransaction>> {
        Ok(self
            .transactions
            .read()
            .unwrap()
            .get(transaction_id)
            .cloned())
    }

    async fn list_transactions(
        &self,
        statement_id: &str,
    ) -> ReconResult<Vec<StatementTransaction>> {
        let transactions = self.transactions.read().unwrap();
        let filtered: Vec<StatementTransaction> = transactions
            .values()
            .filter(|txn| txn.statement_id == statement_id)
            .cloned()
            .collect();
        Ok(filtered)
    }

    async fn transaction_exists(
        &self,
        statement_id: &str,
        date: NaiveDate,
        amount: &BigDecimal,
        description: &str,
    ) -> ReconResult<bool> {
        let transactions = self.transactions.read().unwrap();
        Ok(transactions.values().any(|txn| {
            txn.statement_id == statement_id
                && txn.date == date
                && &txn.amount == amount
                && txn.description == description
        }))
    }

    async fn save_reconciliation(&mut self, reconciliation: &Reconciliation) -> ReconResult<()> {
        self.reconciliations
            .write()
            .unwrap()
            .insert(reconciliation.id.clone(), reconciliation.clone());
        Ok(())
    }

    async fn get_reconciliation(
        &self,
        reconciliation_id: &str,
    ) -> ReconResult<Option<Reconciliation>> {
        Ok(self
            .reconciliations
            .read()
            .unwrap()
            .get(reconciliation_id)
            .cloned())
    }

    async fn list_reconciliations(
        &self,
        filter: &ReconciliationFilter,
    ) -> ReconResult<Vec<Reconciliation>> {
        let reconciliations = self.reconciliations.read().unwrap();
        let filtered: Vec<Reconciliation> = reconciliations
            .values()
            .filter(|recon| {
                filter
                    .account_id
                    .as_ref()
                    .is_none_or(|a| &recon.account_id == a)
                    && filter.status.is_none_or(|s| recon.status == s)
            })
            .cloned()
            .collect();
        Ok(filtered)
    }

    async fn update_reconciliation(&mut self, reconciliation: &Reconciliation) -> ReconResult<()> {
        let mut reconciliations = self.reconciliations.write().unwrap();
        if reconciliations.contains_key(&reconciliation.id) {
            reconciliations.insert(reconciliation.id.clone(), reconciliation.clone());
            Ok(())
        } else {
            Err(ReconError::not_found(
                "Reconciliation",
                reconciliation.id.clone(),
            ))
        }
    }

    async fn commit_match(&mut self, record: &MatchRecord) -> ReconResult<()> {
        // Flag check, flag set, and row insert all under the one write lock
        let mut transactions = self.transactions.write().unwrap();
        let txn = transactions
            .get_mut(&record.statement_transaction_id)
            .ok_or_else(|| {
                ReconError::not_found(
                    "StatementTransaction",
                    record.statement_transaction_id.clone(),
                )
            })?;
        if txn.matched {
            return Err(ReconError::Conflict(format!(
                "statement transaction '{}' is already matched",
                txn.id
            )));
        }
        txn.matched = true;
        self.matches
            .write()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_match(&self, match_id: &str) -> ReconResult<Option<MatchRecord>> {
        Ok(self.matches.read().unwrap().get(match_id).cloned())
    }

    async fn list_matches(&self, reconciliation_id: &str) -> ReconResult<Vec<MatchRecord>> {
        let matches = self.matches.read().unwrap();
        let filtered: Vec<MatchRecord> = matches
            .values()
            .filter(|m| m.reconciliation_id == reconciliation_id)
            .cloned()
            .collect();
        Ok(filtered)
    }

    async fn remove_match(&mut self, match_id: &str) -> ReconResult<MatchRecord> {
        let removed = self
            .matches
            .write()
            .unwrap()
            .remove(match_id)
            .ok_or_else(|| ReconError::not_found("Match", match_id))?;
        if let Some(txn) = self
            .transactions
            .write()
            .unwrap()
            .get_mut(&removed.statement_transaction_id)
        {
            txn.matched = false;
        }
        Ok(removed)
    }

    async fn save_adjustment(&mut self, adjustment: &Adjustment) -> ReconResult<()> {
        self.adjustments
            .write()
            .unwrap()
            .insert(adjustment.id.clone(), adjustment.clone());
        Ok(())
    }

    async fn get_adjustment(&self, adjustment_id: &str) -> ReconResult<Option<Adjustment>> {
        Ok(self.adjustments.read().unwrap().get(adjustment_id).cloned())
    }

    async fn list_adjustments(&self, reconciliation_id: &str) -> ReconResult<Vec<Adjustment>> {
        let adjustments = self.adjustments.read().unwrap();
        let filtered: Vec<Adjustment> = adjustments
            .values()
            .filter(|a| a.reconciliation_id == reconciliation_id)
            .cloned()
            .collect();
        Ok(filtered)
    }

    async fn update_adjustment(&mut self, adjustment: &Adjustment) -> ReconResult<()> {
        let mut adjustments = self.adjustments.write().unwrap();
        if adjustments.contains_key(&adjustment.id) {
            adjustments.insert(adjustment.id.clone(), adjustment.clone());
            Ok(())
        } else {
            Err(ReconError::not_found("Adjustment", adjustment.id.clone()))
        }
    }

    async fn delete_adjustment(&mut self, adjustment_id: &str) -> ReconResult<()> {
        if self
            .adjustments
            .write()
            .unwrap()
            .remove(adjustment_id)
            .is_some()
        {
            Ok(())
        } else {
            Err(ReconError::not_found("Adjustment", adjustment_id))
        }
    }
}

/// In-memory ledger gateway for testing and development
///
/// Holds journal line items seeded by the embedding test and honors the
/// test-and-set contract of [`LedgerGateway::claim_line_item`].
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerGateway {
    line_items: Arc<RwLock<HashMap<String, JournalLineItem>>>,
}

impl MemoryLedgerGateway {
    /// Create a new empty gateway
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a line item into the gateway
    pub fn insert_line_item(&self, item: JournalLineItem) {
        self.line_items.write().unwrap().insert(item.id.clone(), item);
    }

    /// Snapshot of every line item, for test assertions
    pub fn all_line_items(&self) -> Vec<JournalLineItem> {
        self.line_items.read().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl LedgerGateway for MemoryLedgerGateway {
    async fn unmatched_line_items(
        &self,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ReconResult<Vec<JournalLineItem>> {
        let line_items = self.line_items.read().unwrap();
        let mut filtered: Vec<JournalLineItem> = line_items
            .values()
            .filter(|item| {
                item.account_id == account_id
                    && !item.matched
                    && item.date >= start
                    && item.date <= end
            })
            .cloned()
            .collect();
        filtered.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(filtered)
    }

    async fn line_item(&self, line_item_id: &str) -> ReconResult<Option<JournalLineItem>> {
        Ok(self.line_items.read().unwrap().get(line_item_id).cloned())
    }

    async fn claim_line_item(&mut self, line_item_id: &str) -> ReconResult<()> {
        let mut line_items = self.line_items.write().unwrap();
        let item = line_items
            .get_mut(line_item_id)
            .ok_or_else(|| ReconError::not_found("JournalLineItem", line_item_id))?;
        if item.matched {
            return Err(ReconError::Conflict(format!(
                "journal line item '{}' is already matched",
                item.id
            )));
        }
        item.matched = true;
        Ok(())
    }

    async fn release_line_item(&mut self, line_item_id: &str) -> ReconResult<()> {
        let mut line_items = self.line_items.write().unwrap();
        let item = line_items
            .get_mut(line_item_id)
            .ok_or_else(|| ReconError::not_found("JournalLineItem", line_item_id))?;
        item.matched = false;
        Ok(())
    }
}

/// Gateway double whose every call fails, for exercising dependency errors
#[derive(Debug, Clone, Default)]
pub struct UnavailableLedgerGateway;

#[async_trait]
impl LedgerGateway for UnavailableLedgerGateway {
    async fn unmatched_line_items(
        &self,
        _account_id: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> ReconResult<Vec<JournalLineItem>> {
        Err(ReconError::Dependency("ledger offline".to_string()))
    }

    async fn line_item(&self, _line_item_id: &str) -> ReconResult<Option<JournalLineItem>> {
        Err(ReconError::Dependency("ledger offline".to_string()))
    }

    async fn claim_line_item(&mut self, _line_item_id: &str) -> ReconResult<()> {
        Err(ReconError::Dependency("ledger offline".to_string()))
    }

    async fn release_line_item(&mut self, _line_item_id: &str) -> ReconResult<()> {
        Err(ReconError::Dependency("ledger offline".to_string()))
    }
}
