//! Transaction importer: turns raw statement batches into persisted
//! statement transactions with a per-row outcome log

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_description;

/// Date formats accepted for statement rows, tried in order
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// One unparsed row of a statement batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    /// Transaction date as text
    pub date: String,
    /// Bank-supplied description
    pub description: String,
    /// Signed amount as text: deposits positive, withdrawals negative
    pub amount: String,
    /// Optional bank reference
    pub reference: Option<String>,
}

/// Outcome of one row of an import batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    /// Row parsed and persisted
    Inserted,
    /// Row duplicates an already-imported transaction
    Skipped,
    /// Row could not be parsed
    Error,
}

/// Log entry describing one row's outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportLogEntry {
    /// 1-based position of the row within the batch
    pub line: usize,
    /// Outcome of the row
    pub status: RowStatus,
    /// Human-readable detail
    pub message: String,
}

/// Result of importing a batch into a statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    /// Number of transactions persisted
    pub inserted: usize,
    /// Per-row outcome log, one entry per batch row
    pub log: Vec<ImportLogEntry>,
}

impl ImportOutcome {
    /// Number of rows whose status is `Error`
    pub fn error_count(&self) -> usize {
        self.log
            .iter()
            .filter(|e| e.status == RowStatus::Error)
            .count()
    }

    /// Number of rows whose status is `Skipped`
    pub fn skipped_count(&self) -> usize {
        self.log
            .iter()
            .filter(|e| e.status == RowStatus::Skipped)
            .count()
    }
}

/// When an import transitions the owning statement to `Processed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImportPolicy {
    /// Any inserted row is enough; error rows can be retried later using
    /// the returned log
    #[default]
    ProcessOnAnyInsert,
    /// Every row must parse; a single error row leaves the statement
    /// `Uploaded`. Duplicate skips do not count against the batch since
    /// their data is already present.
    ProcessOnFullSuccess,
}

/// Importer for statement transaction batches
pub struct TransactionImporter<S: ReconStorage> {
    storage: S,
    policy: ImportPolicy,
}

impl<S: ReconStorage> TransactionImporter<S> {
    /// Create a new importer with the default processing policy
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            policy: ImportPolicy::default(),
        }
    }

    /// Create a new importer with an explicit processing policy
    pub fn with_policy(storage: S, policy: ImportPolicy) -> Self {
        Self { storage, policy }
    }

    /// Import a batch of raw rows into a statement
    ///
    /// Individual bad rows never abort the batch; each row's outcome is
    /// reported in the returned log. The whole operation only fails when
    /// the statement does not exist or storage fails.
    pub async fn import(
        &mut self,
        statement_id: &str,
        rows: &[RawRow],
    ) -> ReconResult<ImportOutcome> {
        let mut statement = self
            .storage
            .get_statement(statement_id)
            .await?
            .ok_or_else(|| ReconError::not_found("Statement", statement_id))?;

        let mut inserted = 0;
        let mut log = Vec::with_capacity(rows.len());

        for (index, row) in rows.iter().enumerate() {
            let line = index + 1;
            match self.import_row(statement_id, row).await? {
                RowOutcome::Inserted => {
                    inserted += 1;
                    log.push(ImportLogEntry {
                        line,
                        status: RowStatus::Inserted,
                        message: "imported".to_string(),
                    });
                }
                RowOutcome::Duplicate => {
                    log.push(ImportLogEntry {
                        line,
                        status: RowStatus::Skipped,
                        message: "duplicate of an already-imported transaction".to_string(),
                    });
                }
                RowOutcome::Invalid(message) => {
                    log.push(ImportLogEntry {
                        line,
                        status: RowStatus::Error,
                        message,
                    });
                }
            }
        }

        let outcome = ImportOutcome { inserted, log };

        let processed = match self.policy {
            ImportPolicy::ProcessOnAnyInsert => outcome.inserted > 0,
            ImportPolicy::ProcessOnFullSuccess => {
                outcome.inserted > 0 && outcome.error_count() == 0
            }
        };
        if processed && statement.status != StatementStatus::Processed {
            statement.status = StatementStatus::Processed;
            statement.updated_at = chrono::Utc::now().naive_utc();
            self.storage.update_statement(&statement).await?;
        }

        info!(
            statement_id,
            inserted = outcome.inserted,
            skipped = outcome.skipped_count(),
            errors = outcome.error_count(),
            "imported statement batch"
        );

        Ok(outcome)
    }

    /// Parse a delimited (CSV) statement export and import it
    ///
    /// Each record must resolve to date, description, amount, with an
    /// optional fourth reference column. Fails wholesale only when the
    /// document itself cannot be read.
    pub async fn import_delimited(
        &mut self,
        statement_id: &str,
        text: &str,
        has_headers: bool,
    ) -> ReconResult<ImportOutcome> {
        let rows = parse_delimited(text, has_headers)?;
        self.import(statement_id, &rows).await
    }

    async fn import_row(&mut self, statement_id: &str, row: &RawRow) -> ReconResult<RowOutcome> {
        let date = match parse_row_date(&row.date) {
            Some(date) => date,
            None => {
                return Ok(RowOutcome::Invalid(format!(
                    "unparsable date '{}'",
                    row.date
                )))
            }
        };
        let amount = match BigDecimal::from_str(row.amount.trim()) {
            Ok(amount) => amount,
            Err(_) => {
                return Ok(RowOutcome::Invalid(format!(
                    "unparsable amount '{}'",
                    row.amount
                )))
            }
        };
        let description = row.description.trim();
        if let Err(e) = validate_description(description) {
            return Ok(RowOutcome::Invalid(e.to_string()));
        }

        if self
            .storage
            .transaction_exists(statement_id, date, &amount, description)
            .await?
        {
            return Ok(RowOutcome::Duplicate);
        }

        let transaction = StatementTransaction::new(
            uuid::Uuid::new_v4().to_string(),
            statement_id.to_string(),
            date,
            description.to_string(),
            amount,
            row.reference.clone(),
        );
        self.storage.save_transaction(&transaction).await?;

        Ok(RowOutcome::Inserted)
    }
}

enum RowOutcome {
    Inserted,
    Duplicate,
    Invalid(String),
}

fn parse_row_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Parse delimited text into raw rows
///
/// Short records are kept with empty fields so they surface as per-row
/// errors during import rather than aborting the batch.
pub fn parse_delimited(text: &str, has_headers: bool) -> ReconResult<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            ReconError::Validation(format!("statement batch cannot be read: {}", e))
        })?;
        rows.push(RawRow {
            date: record.get(0).unwrap_or_default().to_string(),
            description: record.get(1).unwrap_or_default().to_string(),
            amount: record.get(2).unwrap_or_default().to_string(),
            reference: record.get(3).map(str::to_string).filter(|r| !r.is_empty()),
        });
    }
    Ok(rows)
}
