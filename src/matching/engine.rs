//! Match engine: automatic tolerance search, manual pairing, and unmatching
//!
//! The one-to-one pairing invariant is enforced with test-and-set on both
//! sides of every pair: the ledger claim through the gateway and the
//! statement flag inside [`ReconStorage::commit_match`]. A failed commit
//! releases the ledger claim, so a crash or race never leaves a
//! half-matched pair behind.

use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::traits::*;
use crate::types::*;

/// Options controlling one automatic matching pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoMatchOptions {
    /// Require descriptions to be similar as well as amounts and dates
    pub description_match: bool,
    /// Maximum days a statement date may differ from a ledger date
    pub date_tolerance_days: i64,
}

impl AutoMatchOptions {
    /// Create options with the given tolerance and description rule
    pub fn new(description_match: bool, date_tolerance_days: i64) -> Self {
        Self {
            description_match,
            date_tolerance_days,
        }
    }
}

/// Unmatched items on both sides of an account over a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedSet {
    /// Statement transactions not yet matched
    pub bank_transactions: Vec<StatementTransaction>,
    /// Journal line items not yet matched
    pub journal_items: Vec<JournalLineItem>,
}

/// Engine pairing statement transactions with journal line items
pub struct MatchEngine<S: ReconStorage, G: LedgerGateway> {
    storage: S,
    gateway: G,
}

impl<S: ReconStorage, G: LedgerGateway> MatchEngine<S, G> {
    /// Create a new match engine
    pub fn new(storage: S, gateway: G) -> Self {
        Self { storage, gateway }
    }

    /// Run one automatic matching pass over a reconciliation
    ///
    /// Greedy single pass in ascending statement-date order, no
    /// backtracking. Committed pairs leave both candidate pools, so
    /// re-running with no intervening changes creates zero new matches.
    /// Returns the number of matches created.
    pub async fn auto_match(
        &mut self,
        reconciliation_id: &str,
        options: AutoMatchOptions,
    ) -> ReconResult<usize> {
        if options.date_tolerance_days < 0 {
            return Err(ReconError::Validation(
                "date tolerance must be non-negative".to_string(),
            ));
        }

        let reconciliation = self.get_open_reconciliation(reconciliation_id).await?;
        let statement = self
            .storage
            .get_statement(&reconciliation.statement_id)
            .await?
            .ok_or_else(|| {
                ReconError::not_found("Statement", reconciliation.statement_id.clone())
            })?;

        let mut transactions: Vec<StatementTransaction> = self
            .storage
            .list_transactions(&statement.id)
            .await?
            .into_iter()
            .filter(|t| !t.matched)
            .collect();
        transactions.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

        // Widen the ledger window by the tolerance so near-boundary pairs
        // are still visible
        let tolerance = Duration::days(options.date_tolerance_days);
        let mut pool = self
            .gateway
            .unmatched_line_items(
                &reconciliation.account_id,
                statement.period_start - tolerance,
                statement.period_end + tolerance,
            )
            .await?;

        let mut created = 0;
        for transaction in &transactions {
            let Some(index) = best_candidate(transaction, &pool, &options) else {
                continue;
            };
            let item = pool.remove(index);

            self.commit_pair(
                MatchRecord::new(
                    reconciliation.id.clone(),
                    transaction.id.clone(),
                    item.id.clone(),
                    MatchMode::Auto,
                    None,
                ),
                &item.id,
            )
            .await?;
            debug!(
                transaction_id = %transaction.id,
                line_item_id = %item.id,
                amount = %transaction.amount,
                "auto-matched pair"
            );
            created += 1;
        }

        info!(
            reconciliation_id,
            created,
            remaining = transactions.len() - created,
            "auto-match pass finished"
        );

        Ok(created)
    }

    /// Pair one statement transaction with one journal line item explicitly
    pub async fn manual_match(
        &mut self,
        reconciliation_id: &str,
        statement_transaction_id: &str,
        journal_line_item_id: &str,
        notes: Option<String>,
    ) -> ReconResult<MatchRecord> {
        let reconciliation = self.get_open_reconciliation(reconciliation_id).await?;

        let transaction = self
            .storage
            .get_transaction(statement_transaction_id)
            .await?
            .ok_or_else(|| {
                ReconError::not_found("StatementTransaction", statement_transaction_id)
            })?;
        if transaction.statement_id != reconciliation.statement_id {
            return Err(ReconError::Validation(format!(
                "transaction '{}' belongs to a different statement than reconciliation '{}'",
                statement_transaction_id, reconciliation_id
            )));
        }
        if transaction.matched {
            return Err(ReconError::Conflict(format!(
                "statement transaction '{}' is already matched",
                statement_transaction_id
            )));
        }

        let item = self
            .gateway
            .line_item(journal_line_item_id)
            .await?
            .ok_or_else(|| ReconError::not_found("JournalLineItem", journal_line_item_id))?;
        if item.account_id != reconciliation.account_id {
            return Err(ReconError::Validation(format!(
                "journal line item '{}' belongs to a different account than reconciliation '{}'",
                journal_line_item_id, reconciliation_id
            )));
        }
        if item.matched {
            return Err(ReconError::Conflict(format!(
                "journal line item '{}' is already matched",
                journal_line_item_id
            )));
        }

        let record = MatchRecord::new(
            reconciliation.id,
            transaction.id,
            item.id,
            MatchMode::Manual,
            notes,
        );
        self.commit_pair(record.clone(), journal_line_item_id)
            .await?;

        Ok(record)
    }

    /// Delete a match and clear both sides' matched flags
    pub async fn unmatch(&mut self, match_id: &str) -> ReconResult<()> {
        let record = self
            .storage
            .get_match(match_id)
            .await?
            .ok_or_else(|| ReconError::not_found("Match", match_id))?;

        let reconciliation = self
            .storage
            .get_reconciliation(&record.reconciliation_id)
            .await?
            .ok_or_else(|| {
                ReconError::not_found("Reconciliation", record.reconciliation_id.clone())
            })?;
        if !reconciliation.is_open() {
            return Err(ReconError::Conflict(
                "reconciliation is closed".to_string(),
            ));
        }

        // Inverse of commit_pair: gateway first, storage second. A failed
        // release leaves the match intact; a failed removal re-claims the
        // item, so no half-unmatched pair survives either way.
        self.gateway
            .release_line_item(&record.journal_line_item_id)
            .await?;
        if let Err(e) = self.storage.remove_match(match_id).await {
            self.gateway
                .claim_line_item(&record.journal_line_item_id)
                .await?;
            return Err(e);
        }

        Ok(())
    }

    /// Unmatched items on both sides of an account over a date range
    pub async fn unmatched(
        &self,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ReconResult<UnmatchedSet> {
        let journal_items = self
            .gateway
            .unmatched_line_items(account_id, start, end)
            .await?;

        let statements = self
            .storage
            .list_statements(&StatementFilter {
                account_id: Some(account_id.to_string()),
                ..Default::default()
            })
            .await?;

        let mut bank_transactions = Vec::new();
        for statement in statements {
            if statement.period_end < start || statement.period_start > end {
                continue;
            }
            let transactions = self.storage.list_transactions(&statement.id).await?;
            bank_transactions.extend(
                transactions
                    .into_iter()
                    .filter(|t| !t.matched && t.date >= start && t.date <= end),
            );
        }
        bank_transactions.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

        Ok(UnmatchedSet {
            bank_transactions,
            journal_items,
        })
    }

    async fn get_open_reconciliation(
        &self,
        reconciliation_id: &str,
    ) -> ReconResult<Reconciliation> {
        let reconciliation = self
            .storage
            .get_reconciliation(reconciliation_id)
            .await?
            .ok_or_else(|| ReconError::not_found("Reconciliation", reconciliation_id))?;
        if !reconciliation.is_open() {
            return Err(ReconError::Conflict(
                "reconciliation is closed".to_string(),
            ));
        }
        Ok(reconciliation)
    }

    /// Claim the ledger side, then atomically flag-and-insert the statement
    /// side; a failed commit releases the claim so no half-match survives
    async fn commit_pair(&mut self, record: MatchRecord, line_item_id: &str) -> ReconResult<()> {
        self.gateway.claim_line_item(line_item_id).await?;
        if let Err(e) = self.storage.commit_match(&record).await {
            self.gateway.release_line_item(line_item_id).await?;
            return Err(e);
        }
        Ok(())
    }
}

/// Index of the best candidate line item for a statement transaction,
/// or `None` when nothing qualifies
///
/// Tie-break: smallest absolute date difference, then first encountered.
fn best_candidate(
    transaction: &StatementTransaction,
    pool: &[JournalLineItem],
    options: &AutoMatchOptions,
) -> Option<usize> {
    let mut best: Option<(usize, i64)> = None;
    for (index, item) in pool.iter().enumerate() {
        if !amount_matches(transaction, item) {
            continue;
        }
        let date_distance = (transaction.date - item.date).num_days().abs();
        if date_distance > options.date_tolerance_days {
            continue;
        }
        if options.description_match
            && !descriptions_similar(&transaction.description, &item.description)
        {
            continue;
        }
        // Strict < keeps the first-encountered winner on equal distance
        if best.is_none_or(|(_, d)| date_distance < d) {
            best = Some((index, date_distance));
        }
    }
    best.map(|(index, _)| index)
}

/// Sign convention: deposits (positive amounts) settle against ledger
/// debits, withdrawals (negative amounts) against ledger credits.
/// Zero-amount rows never auto-match.
fn amount_matches(transaction: &StatementTransaction, item: &JournalLineItem) -> bool {
    let zero = BigDecimal::from(0);
    if transaction.amount > zero {
        amounts_equal(&transaction.amount, &item.debit) && item.debit > zero
    } else if transaction.amount < zero {
        amounts_equal(&transaction.amount.abs(), &item.credit) && item.credit > zero
    } else {
        false
    }
}

/// Case-insensitive similarity: equal after normalization, or one
/// description contains the other
fn descriptions_similar(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}
