//! Bank statement store: lifecycle owner for statements and their
//! transactions, independent of any reconciliation attempt

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{validate_non_empty, validate_period};

/// Parameters for creating a bank statement
#[derive(Debug, Clone)]
pub struct NewStatement {
    /// Bank account the statement belongs to
    pub account_id: String,
    /// Date printed on the statement
    pub statement_date: NaiveDate,
    /// First day of the statement period
    pub period_start: NaiveDate,
    /// Last day of the statement period
    pub period_end: NaiveDate,
    /// Balance at the start of the period
    pub opening_balance: BigDecimal,
    /// Balance at the end of the period
    pub closing_balance: BigDecimal,
    /// Optional reference to the uploaded source file
    pub source_file: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
}

/// Fields of a statement that may be changed after creation
#[derive(Debug, Clone, Default)]
pub struct StatementUpdate {
    /// Replacement statement date
    pub statement_date: Option<NaiveDate>,
    /// Replacement opening balance
    pub opening_balance: Option<BigDecimal>,
    /// Replacement closing balance
    pub closing_balance: Option<BigDecimal>,
    /// Replacement source-file reference
    pub source_file: Option<String>,
    /// Replacement notes
    pub notes: Option<String>,
}

/// Statement manager for statement and transaction lifecycle operations
pub struct StatementManager<S: ReconStorage> {
    pub(crate) storage: S,
}

impl<S: ReconStorage> StatementManager<S> {
    /// Create a new statement manager
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Create a new statement in the `Uploaded` state
    pub async fn create_statement(&mut self, params: NewStatement) -> ReconResult<BankStatement> {
        validate_non_empty("Account ID", &params.account_id)?;
        validate_period(params.period_start, params.period_end)?;

        let mut statement = BankStatement::new(
            uuid::Uuid::new_v4().to_string(),
            params.account_id,
            params.statement_date,
            params.period_start,
            params.period_end,
            params.opening_balance,
            params.closing_balance,
        );
        statement.source_file = params.source_file;
        statement.notes = params.notes;

        self.storage.save_statement(&statement).await?;

        Ok(statement)
    }

    /// Get a statement by id
    pub async fn get_statement(&self, statement_id: &str) -> ReconResult<Option<BankStatement>> {
        self.storage.get_statement(statement_id).await
    }

    /// Get a statement by id, returning an error if not found
    pub async fn get_statement_required(&self, statement_id: &str) -> ReconResult<BankStatement> {
        self.storage
            .get_statement(statement_id)
            .await?
            .ok_or_else(|| ReconError::not_found("Statement", statement_id))
    }

    /// List statements matching a filter, newest statement date first
    pub async fn list_statements(
        &self,
        filter: &StatementFilter,
        page: &PageRequest,
    ) -> ReconResult<PageResponse<BankStatement>> {
        let mut statements = self.storage.list_statements(filter).await?;
        statements.sort_by(|a, b| {
            b.statement_date
                .cmp(&a.statement_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(PageResponse::paginate(statements, page))
    }

    /// Update a statement's editable fields
    pub async fn update_statement(
        &mut self,
        statement_id: &str,
        update: StatementUpdate,
    ) -> ReconResult<BankStatement> {
        let mut statement = self.get_statement_required(statement_id).await?;

        if let Some(date) = update.statement_date {
            statement.statement_date = date;
        }
        if let Some(opening) = update.opening_balance {
            statement.opening_balance = opening;
        }
        if let Some(closing) = update.closing_balance {
            statement.closing_balance = closing;
        }
        if let Some(source_file) = update.source_file {
            statement.source_file = Some(source_file);
        }
        if let Some(notes) = update.notes {
            statement.notes = Some(notes);
        }
        statement.updated_at = chrono::Utc::now().naive_utc();

        self.storage.update_statement(&statement).await?;

        Ok(statement)
    }

    /// Delete a statement and its transactions
    ///
    /// Refused while any reconciliation still references the statement.
    pub async fn delete_statement(&mut self, statement_id: &str) -> ReconResult<()> {
        let statement = self.get_statement_required(statement_id).await?;

        let reconciliations = self
            .storage
            .list_reconciliations(&ReconciliationFilter {
                account_id: Some(statement.account_id.clone()),
                status: None,
            })
            .await?;
        if reconciliations
            .iter()
            .any(|r| r.statement_id == statement_id)
        {
            return Err(ReconError::Conflict(format!(
                "statement '{}' is referenced by a reconciliation",
                statement_id
            )));
        }

        self.storage.delete_statement(statement_id).await
    }

    /// List a statement's transactions ordered by date, then id
    pub async fn list_transactions(
        &self,
        statement_id: &str,
    ) -> ReconResult<Vec<StatementTransaction>> {
        // Surface NotFound for unknown statements rather than an empty list
        self.get_statement_required(statement_id).await?;

        let mut transactions = self.storage.list_transactions(statement_id).await?;
        transactions.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(transactions)
    }
}
