//! Core types and data structures for the reconciliation engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Lifecycle states of a bank statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementStatus {
    /// Statement record created, transactions not yet imported
    Uploaded,
    /// Statement transactions have been imported
    Processed,
}

/// An external bank statement for one account over one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankStatement {
    /// Unique identifier for the statement
    pub id: String,
    /// Bank account this statement belongs to (referenced, never owned)
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
    /// Current lifecycle state
    pub status: StatementStatus,
    /// Optional reference to the uploaded source file
    pub source_file: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// When the statement was created
    pub created_at: NaiveDateTime,
    /// When the statement was last updated
    pub updated_at: NaiveDateTime,
}

impl BankStatement {
    /// Create a new statement in the `Uploaded` state
    pub fn new(
        id: String,
        account_id: String,
        statement_date: NaiveDate,
        period_start: NaiveDate,
        period_end: NaiveDate,
        opening_balance: BigDecimal,
        closing_balance: BigDecimal,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            account_id,
            statement_date,
            period_start,
            period_end,
            opening_balance,
            closing_balance,
            status: StatementStatus::Uploaded,
            source_file: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One line of activity within a bank statement
///
/// Immutable after import except for the matched flag, which is owned
/// exclusively by the match engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementTransaction {
    /// Unique identifier for the transaction
    pub id: String,
    /// Statement this transaction belongs to
    pub statement_id: String,
    /// Date the transaction occurred
    pub date: NaiveDate,
    /// Bank-supplied description
    pub description: String,
    /// Signed amount: deposits positive, withdrawals negative
    pub amount: BigDecimal,
    /// Optional bank reference (check number, trace id, etc.)
    pub reference: Option<String>,
    /// Whether this transaction participates in an active match
    pub matched: bool,
}

impl StatementTransaction {
    /// Create a new unmatched transaction
    pub fn new(
        id: String,
        statement_id: String,
        date: NaiveDate,
        description: String,
        amount: BigDecimal,
        reference: Option<String>,
    ) -> Self {
        Self {
            id,
            statement_id,
            date,
            description,
            amount,
            reference,
            matched: false,
        }
    }
}

/// One debit/credit line from the internal ledger
///
/// External to this engine: supplied read-only by the ledger gateway,
/// except for the matched flag which the gateway sets and clears on the
/// engine's behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLineItem {
    /// Unique identifier within the ledger
    pub id: String,
    /// Bank account the ledger entry posts against
    pub account_id: String,
    /// Posting date
    pub date: NaiveDate,
    /// Ledger description
    pub description: String,
    /// Debit amount (zero if this is a credit line)
    pub debit: BigDecimal,
    /// Credit amount (zero if this is a debit line)
    pub credit: BigDecimal,
    /// Whether this line participates in an active match
    pub matched: bool,
}

impl JournalLineItem {
    /// Create a debit line
    pub fn debit(
        id: String,
        account_id: String,
        date: NaiveDate,
        description: String,
        amount: BigDecimal,
    ) -> Self {
        Self {
            id,
            account_id,
            date,
            description,
            debit: amount,
            credit: BigDecimal::from(0),
            matched: false,
        }
    }

    /// Create a credit line
    pub fn credit(
        id: String,
        account_id: String,
        date: NaiveDate,
        description: String,
        amount: BigDecimal,
    ) -> Self {
        Self {
            id,
            account_id,
            date,
            description,
            debit: BigDecimal::from(0),
            credit: amount,
            matched: false,
        }
    }
}

/// Lifecycle states of a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReconciliationStatus {
    /// Open for matching and adjustments
    InProgress,
    /// Closed; matches and adjustments are frozen. Terminal.
    Completed,
}

/// A bounded session comparing one statement's balance to the book balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Unique identifier for the reconciliation
    pub id: String,
    /// Bank account being reconciled
    pub account_id: String,
    /// Statement this reconciliation is working against
    pub statement_id: String,
    /// Date the reconciliation is performed as of
    pub reconciliation_date: NaiveDate,
    /// Opening balance carried from the statement
    pub start_balance: BigDecimal,
    /// Closing balance carried from the statement
    pub end_balance: BigDecimal,
    /// Book balance entered by the user
    pub book_balance: BigDecimal,
    /// Statement balance entered by the user
    pub statement_balance: BigDecimal,
    /// Current lifecycle state
    pub status: ReconciliationStatus,
    /// Free-form notes
    pub notes: Option<String>,
    /// When the reconciliation was created
    pub created_at: NaiveDateTime,
    /// When the reconciliation was last updated
    pub updated_at: NaiveDateTime,
}

impl Reconciliation {
    /// Whether matches and adjustments may still be mutated
    pub fn is_open(&self) -> bool {
        self.status == ReconciliationStatus::InProgress
    }
}

/// How a match was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchMode {
    /// Created by the tolerance search
    Auto,
    /// Created by an explicit pairing request
    Manual,
}

/// A committed pairing between one statement transaction and one
/// journal line item, scoped to one reconciliation
///
/// Invariant: each side appears in at most one active match at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Unique identifier for the match
    pub id: String,
    /// Reconciliation this match belongs to
    pub reconciliation_id: String,
    /// Statement side of the pair
    pub statement_transaction_id: String,
    /// Ledger side of the pair
    pub journal_line_item_id: String,
    /// How the match was created
    pub mode: MatchMode,
    /// When the match was committed
    pub matched_at: NaiveDateTime,
    /// Optional notes, typically set on manual matches
    pub notes: Option<String>,
}

impl MatchRecord {
    /// Create a new match record with a generated id
    pub fn new(
        reconciliation_id: String,
        statement_transaction_id: String,
        journal_line_item_id: String,
        mode: MatchMode,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            reconciliation_id,
            statement_transaction_id,
            journal_line_item_id,
            mode,
            matched_at: chrono::Utc::now().naive_utc(),
            notes,
        }
    }
}

/// Categories of manual reconciling adjustments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdjustmentKind {
    /// Bank service charge
    BankFee,
    /// Interest earned or charged
    Interest,
    /// Correction of a recording error
    Correction,
    /// Anything else
    Other,
}

/// A manually entered reconciling amount not backed by a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Unique identifier for the adjustment
    pub id: String,
    /// Reconciliation this adjustment belongs to
    pub reconciliation_id: String,
    /// Date the adjustment applies to
    pub date: NaiveDate,
    /// What the adjustment accounts for
    pub description: String,
    /// Category of adjustment
    pub kind: AdjustmentKind,
    /// Signed amount participating in the difference calculation
    pub amount: BigDecimal,
    /// When the adjustment was created
    pub created_at: NaiveDateTime,
    /// When the adjustment was last updated
    pub updated_at: NaiveDateTime,
}

impl Adjustment {
    /// Create a new adjustment with a generated id
    pub fn new(
        reconciliation_id: String,
        date: NaiveDate,
        description: String,
        kind: AdjustmentKind,
        amount: BigDecimal,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            reconciliation_id,
            date,
            description,
            kind,
            amount,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request parameters for paginated list operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number, 1-indexed
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageRequest {
    /// Zero-based offset of the first item on this page
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.per_page as usize
    }

    /// Maximum number of items on this page
    pub fn limit(&self) -> usize {
        self.per_page as usize
    }
}

/// One page of results plus pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResponse<T> {
    /// Items on this page
    pub data: Vec<T>,
    /// Pagination metadata
    pub meta: PageMeta,
}

/// Pagination metadata accompanying a page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Current page number, 1-indexed
    pub page: u32,
    /// Items per page requested
    pub per_page: u32,
    /// Total items across all pages
    pub total: usize,
}

impl<T> PageResponse<T> {
    /// Slice a fully-filtered result set down to one page
    pub fn paginate(items: Vec<T>, request: &PageRequest) -> Self {
        let total = items.len();
        let data = items
            .into_iter()
            .skip(request.offset())
            .take(request.limit())
            .collect();
        Self {
            data,
            meta: PageMeta {
                page: request.page,
                per_page: request.per_page,
                total,
            },
        }
    }
}

/// The amount tolerance used for matching and the close gate: 0.01
/// currency units, held exactly in decimal
pub fn amount_tolerance() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

/// Whether two amounts are equal within [`amount_tolerance`]
pub fn amounts_equal(a: &BigDecimal, b: &BigDecimal) -> bool {
    (a - b).abs() < amount_tolerance()
}

/// Errors that can occur in the reconciliation engine
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up
        entity: &'static str,
        /// Identifier that failed to resolve
        id: String,
    },
    #[error("Ledger gateway unavailable: {0}")]
    Dependency(String),
}

impl ReconError {
    /// Construct a `NotFound` error for the given entity kind and id
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Result type for reconciliation operations
pub type ReconResult<T> = Result<T, ReconError>;
