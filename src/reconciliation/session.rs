//! Reconciliation session: the aggregate root for one statement's
//! reconciliation, its adjustments, and the close gate

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::info;

use crate::reconciliation::balance::{self, BalanceSummary};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{validate_description, validate_non_empty};

/// Parameters for beginning a reconciliation
#[derive(Debug, Clone)]
pub struct NewReconciliation {
    /// Bank account being reconciled
    pub account_id: String,
    /// Processed statement to reconcile against
    pub statement_id: String,
    /// Date the reconciliation is performed as of
    pub reconciliation_date: NaiveDate,
    /// Book balance entered by the user
    pub book_balance: BigDecimal,
    /// Statement balance entered by the user
    pub statement_balance: BigDecimal,
    /// Free-form notes
    pub notes: Option<String>,
}

/// Fields of a reconciliation that may be changed while in progress
#[derive(Debug, Clone, Default)]
pub struct ReconciliationUpdate {
    /// Replacement reconciliation date
    pub reconciliation_date: Option<NaiveDate>,
    /// Replacement book balance
    pub book_balance: Option<BigDecimal>,
    /// Replacement statement balance
    pub statement_balance: Option<BigDecimal>,
    /// Replacement notes
    pub notes: Option<String>,
}

/// Options for completing a reconciliation
#[derive(Debug, Clone, Copy, Default)]
pub struct CompleteOptions {
    /// Close even when the difference exceeds the tolerance
    pub force: bool,
}

/// Parameters for adding an adjustment
#[derive(Debug, Clone)]
pub struct NewAdjustment {
    /// Date the adjustment applies to
    pub date: NaiveDate,
    /// What the adjustment accounts for
    pub description: String,
    /// Category of adjustment
    pub kind: AdjustmentKind,
    /// Signed amount
    pub amount: BigDecimal,
}

/// Fields of an adjustment that may be changed while the reconciliation
/// is in progress
#[derive(Debug, Clone, Default)]
pub struct AdjustmentUpdate {
    /// Replacement date
    pub date: Option<NaiveDate>,
    /// Replacement description
    pub description: Option<String>,
    /// Replacement category
    pub kind: Option<AdjustmentKind>,
    /// Replacement amount
    pub amount: Option<BigDecimal>,
}

/// Manager for reconciliation lifecycle, adjustments, and the close gate
pub struct ReconciliationManager<S: ReconStorage> {
    pub(crate) storage: S,
}

impl<S: ReconStorage> ReconciliationManager<S> {
    /// Create a new reconciliation manager
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Begin reconciling a processed statement
    ///
    /// Seeds the start and end balances from the statement's opening and
    /// closing balances.
    pub async fn create(&mut self, params: NewReconciliation) -> ReconResult<Reconciliation> {
        validate_non_empty("Account ID", &params.account_id)?;

        let statement = self
            .storage
            .get_statement(&params.statement_id)
            .await?
            .ok_or_else(|| ReconError::not_found("Statement", params.statement_id.clone()))?;
        if statement.status != StatementStatus::Processed {
            return Err(ReconError::Conflict(format!(
                "statement '{}' has no imported transactions yet",
                statement.id
            )));
        }
        if statement.account_id != params.account_id {
            return Err(ReconError::Validation(format!(
                "statement '{}' belongs to account '{}', not '{}'",
                statement.id, statement.account_id, params.account_id
            )));
        }

        let existing = self
            .storage
            .list_reconciliations(&ReconciliationFilter {
                account_id: Some(params.account_id.clone()),
                status: Some(ReconciliationStatus::InProgress),
            })
            .await?;
        if existing.iter().any(|r| r.statement_id == statement.id) {
            return Err(ReconError::Conflict(format!(
                "statement '{}' already has a reconciliation in progress",
                statement.id
            )));
        }

        let now = chrono::Utc::now().naive_utc();
        let reconciliation = Reconciliation {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: params.account_id,
            statement_id: params.statement_id,
            reconciliation_date: params.reconciliation_date,
            start_balance: statement.opening_balance.clone(),
            end_balance: statement.closing_balance.clone(),
            book_balance: params.book_balance,
            statement_balance: params.statement_balance,
            status: ReconciliationStatus::InProgress,
            notes: params.notes,
            created_at: now,
            updated_at: now,
        };
        self.storage.save_reconciliation(&reconciliation).await?;

        Ok(reconciliation)
    }

    /// Get a reconciliation by id
    pub async fn get(&self, reconciliation_id: &str) -> ReconResult<Option<Reconciliation>> {
        self.storage.get_reconciliation(reconciliation_id).await
    }

    /// Get a reconciliation by id, returning an error if not found
    pub async fn get_required(&self, reconciliation_id: &str) -> ReconResult<Reconciliation> {
        self.storage
            .get_reconciliation(reconciliation_id)
            .await?
            .ok_or_else(|| ReconError::not_found("Reconciliation", reconciliation_id))
    }

    /// List reconciliations matching a filter, newest first
    pub async fn list(
        &self,
        filter: &ReconciliationFilter,
        page: &PageRequest,
    ) -> ReconResult<PageResponse<Reconciliation>> {
        let mut reconciliations = self.storage.list_reconciliations(filter).await?;
        reconciliations.sort_by(|a, b| {
            b.reconciliation_date
                .cmp(&a.reconciliation_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(PageResponse::paginate(reconciliations, page))
    }

    /// Update a reconciliation's editable fields; only while in progress
    pub async fn update(
        &mut self,
        reconciliation_id: &str,
        update: ReconciliationUpdate,
    ) -> ReconResult<Reconciliation> {
        let mut reconciliation = self.get_open(reconciliation_id).await?;

        if let Some(date) = update.reconciliation_date {
            reconciliation.reconciliation_date = date;
        }
        if let Some(book_balance) = update.book_balance {
            reconciliation.book_balance = book_balance;
        }
        if let Some(statement_balance) = update.statement_balance {
            reconciliation.statement_balance = statement_balance;
        }
        if let Some(notes) = update.notes {
            reconciliation.notes = Some(notes);
        }
        reconciliation.updated_at = chrono::Utc::now().naive_utc();

        self.storage.update_reconciliation(&reconciliation).await?;

        Ok(reconciliation)
    }

    /// Close the reconciliation, freezing its matches and adjustments
    ///
    /// Refused while the outstanding difference is at or above the 0.01
    /// tolerance, unless `force` overrides the gate. `Completed` is
    /// terminal; there is no reopen transition.
    pub async fn complete(
        &mut self,
        reconciliation_id: &str,
        options: CompleteOptions,
    ) -> ReconResult<Reconciliation> {
        let mut reconciliation = self.get_open(reconciliation_id).await?;

        let summary = self.balance_of(&reconciliation).await?;
        if !summary.within_tolerance && !options.force {
            return Err(ReconError::Conflict(format!(
                "cannot complete reconciliation: difference is {}",
                summary.difference
            )));
        }

        reconciliation.status = ReconciliationStatus::Completed;
        reconciliation.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_reconciliation(&reconciliation).await?;

        info!(
            reconciliation_id,
            difference = %summary.difference,
            forced = options.force,
            "reconciliation completed"
        );

        Ok(reconciliation)
    }

    /// Compute the balance summary read model on demand
    pub async fn balance(&self, reconciliation_id: &str) -> ReconResult<BalanceSummary> {
        let reconciliation = self.get_required(reconciliation_id).await?;
        self.balance_of(&reconciliation).await
    }

    /// Add an adjustment; only while the reconciliation is in progress
    pub async fn add_adjustment(
        &mut self,
        reconciliation_id: &str,
        params: NewAdjustment,
    ) -> ReconResult<Adjustment> {
        let reconciliation = self.get_open(reconciliation_id).await?;
        validate_description(&params.description)?;

        let adjustment = Adjustment::new(
            reconciliation.id,
            params.date,
            params.description,
            params.kind,
            params.amount,
        );
        self.storage.save_adjustment(&adjustment).await?;

        Ok(adjustment)
    }

    /// Edit an adjustment; only while the reconciliation is in progress
    pub async fn update_adjustment(
        &mut self,
        adjustment_id: &str,
        update: AdjustmentUpdate,
    ) -> ReconResult<Adjustment> {
        let mut adjustment = self.get_adjustment_required(adjustment_id).await?;
        self.get_open(&adjustment.reconciliation_id).await?;

        if let Some(date) = update.date {
            adjustment.date = date;
        }
        if let Some(description) = update.description {
            validate_description(&description)?;
            adjustment.description = description;
        }
        if let Some(kind) = update.kind {
            adjustment.kind = kind;
        }
        if let Some(amount) = update.amount {
            adjustment.amount = amount;
        }
        adjustment.updated_at = chrono::Utc::now().naive_utc();

        self.storage.update_adjustment(&adjustment).await?;

        Ok(adjustment)
    }

    /// Remove an adjustment; only while the reconciliation is in progress
    pub async fn remove_adjustment(&mut self, adjustment_id: &str) -> ReconResult<()> {
        let adjustment = self.get_adjustment_required(adjustment_id).await?;
        self.get_open(&adjustment.reconciliation_id).await?;

        self.storage.delete_adjustment(adjustment_id).await
    }

    /// List a reconciliation's adjustments ordered by date, then id
    pub async fn list_adjustments(&self, reconciliation_id: &str) -> ReconResult<Vec<Adjustment>> {
        self.get_required(reconciliation_id).await?;

        let mut adjustments = self.storage.list_adjustments(reconciliation_id).await?;
        adjustments.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(adjustments)
    }

    async fn balance_of(&self, reconciliation: &Reconciliation) -> ReconResult<BalanceSummary> {
        let adjustments = self
            .storage
            .list_adjustments(&reconciliation.id)
            .await?;
        Ok(balance::summarize(reconciliation, &adjustments))
    }

    async fn get_open(&self, reconciliation_id: &str) -> ReconResult<Reconciliation> {
        let reconciliation = self.get_required(reconciliation_id).await?;
        if !reconciliation.is_open() {
            return Err(ReconError::Conflict(
                "reconciliation is closed".to_string(),
            ));
        }
        Ok(reconciliation)
    }

    async fn get_adjustment_required(&self, adjustment_id: &str) -> ReconResult<Adjustment> {
        self.storage
            .get_adjustment(adjustment_id)
            .await?
            .ok_or_else(|| ReconError::not_found("Adjustment", adjustment_id))
    }
}
