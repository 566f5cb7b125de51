//! Integration tests for reconciliation-core

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;

use reconciliation_core::{
    AdjustmentKind, AutoMatchOptions, CompleteOptions, ImportPolicy, JournalLineItem,
    LedgerGateway, MatchMode, MemoryLedgerGateway, MemoryStorage, NewAdjustment,
    NewReconciliation, NewStatement, RawRow, ReconError, ReconResult, ReconciliationEngine,
    ReconciliationStatus, RowStatus, StatementStatus, UnavailableLedgerGateway,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn row(date: &str, description: &str, amount: &str) -> RawRow {
    RawRow {
        date: date.to_string(),
        description: description.to_string(),
        amount: amount.to_string(),
        reference: None,
    }
}

fn january_statement() -> NewStatement {
    NewStatement {
        account_id: "acct-1".to_string(),
        statement_date: date(2024, 1, 31),
        period_start: date(2024, 1, 1),
        period_end: date(2024, 1, 31),
        opening_balance: dec("1000.00"),
        closing_balance: dec("1250.00"),
        source_file: None,
        notes: None,
    }
}

/// Statement imported with the given rows, reconciliation opened against it
async fn workspace(
    rows: &[RawRow],
) -> (
    ReconciliationEngine<MemoryStorage, MemoryLedgerGateway>,
    MemoryLedgerGateway,
    String,
    String,
) {
    let storage = MemoryStorage::new();
    let gateway = MemoryLedgerGateway::new();
    let mut engine = ReconciliationEngine::new(storage, gateway.clone());

    let statement = engine.create_statement(january_statement()).await.unwrap();
    engine.import_transactions(&statement.id, rows).await.unwrap();

    let reconciliation = engine
        .create_reconciliation(NewReconciliation {
            account_id: "acct-1".to_string(),
            statement_id: statement.id.clone(),
            reconciliation_date: date(2024, 1, 31),
            book_balance: dec("1250.00"),
            statement_balance: dec("1250.00"),
            notes: None,
        })
        .await
        .unwrap();

    (engine, gateway, statement.id, reconciliation.id)
}

fn ledger_debit(id: &str, day: u32, amount: &str, description: &str) -> JournalLineItem {
    JournalLineItem::debit(
        id.to_string(),
        "acct-1".to_string(),
        date(2024, 1, day),
        description.to_string(),
        dec(amount),
    )
}

fn ledger_credit(id: &str, day: u32, amount: &str, description: &str) -> JournalLineItem {
    JournalLineItem::credit(
        id.to_string(),
        "acct-1".to_string(),
        date(2024, 1, day),
        description.to_string(),
        dec(amount),
    )
}

/// Gateway that reads and claims normally but cannot clear matched flags,
/// as if the ledger went down mid-operation
#[derive(Debug, Clone, Default)]
struct ReleaseFailingGateway {
    inner: MemoryLedgerGateway,
}

#[async_trait]
impl LedgerGateway for ReleaseFailingGateway {
    async fn unmatched_line_items(
        &self,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ReconResult<Vec<JournalLineItem>> {
        self.inner.unmatched_line_items(account_id, start, end).await
    }

    async fn line_item(&self, line_item_id: &str) -> ReconResult<Option<JournalLineItem>> {
        self.inner.line_item(line_item_id).await
    }

    async fn claim_line_item(&mut self, line_item_id: &str) -> ReconResult<()> {
        self.inner.claim_line_item(line_item_id).await
    }

    async fn release_line_item(&mut self, _line_item_id: &str) -> ReconResult<()> {
        Err(ReconError::Dependency("ledger offline".to_string()))
    }
}

#[tokio::test]
async fn scenario_a_tolerant_date_and_description_match() {
    let (mut engine, gateway, _, reconciliation_id) =
        workspace(&[row("2024-01-05", "Deposit", "250.00")]).await;
    gateway.insert_line_item(ledger_debit("j1", 6, "250.00", "Deposit"));

    let created = engine
        .auto_match(&reconciliation_id, AutoMatchOptions::new(true, 3))
        .await
        .unwrap();
    assert_eq!(created, 1);

    let matches = engine.list_matches(&reconciliation_id).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].mode, MatchMode::Auto);
    assert_eq!(matches[0].journal_line_item_id, "j1");
}

#[tokio::test]
async fn scenario_b_equal_amounts_are_never_double_assigned() {
    let (mut engine, gateway, statement_id, reconciliation_id) = workspace(&[
        row("2024-01-10", "Deposit A", "100.00"),
        row("2024-01-10", "Deposit B", "100.00"),
    ])
    .await;
    gateway.insert_line_item(ledger_debit("j1", 10, "100.00", "Deposit A"));
    gateway.insert_line_item(ledger_debit("j2", 10, "100.00", "Deposit B"));

    let created = engine
        .auto_match(&reconciliation_id, AutoMatchOptions::new(false, 3))
        .await
        .unwrap();
    assert_eq!(created, 2);

    // Bijection: both sides matched exactly once
    let matches = engine.list_matches(&reconciliation_id).await.unwrap();
    let mut txn_ids: Vec<_> = matches
        .iter()
        .map(|m| m.statement_transaction_id.clone())
        .collect();
    let mut item_ids: Vec<_> = matches
        .iter()
        .map(|m| m.journal_line_item_id.clone())
        .collect();
    txn_ids.sort();
    txn_ids.dedup();
    item_ids.sort();
    item_ids.dedup();
    assert_eq!(txn_ids.len(), 2);
    assert_eq!(item_ids.len(), 2);

    let transactions = engine
        .list_statement_transactions(&statement_id)
        .await
        .unwrap();
    assert!(transactions.iter().all(|t| t.matched));
    assert!(gateway.all_line_items().iter().all(|i| i.matched));
}

#[tokio::test]
async fn auto_match_is_idempotent() {
    let (mut engine, gateway, _, reconciliation_id) = workspace(&[
        row("2024-01-05", "Deposit", "250.00"),
        row("2024-01-12", "Card payment", "-42.50"),
    ])
    .await;
    gateway.insert_line_item(ledger_debit("j1", 5, "250.00", "Deposit"));
    gateway.insert_line_item(ledger_credit("j2", 12, "42.50", "Card payment"));

    let options = AutoMatchOptions::new(true, 2);
    let first = engine.auto_match(&reconciliation_id, options).await.unwrap();
    assert_eq!(first, 2);

    let second = engine.auto_match(&reconciliation_id, options).await.unwrap();
    assert_eq!(second, 0);
}

#[tokio::test]
async fn deposits_only_match_ledger_debits() {
    let (mut engine, gateway, _, reconciliation_id) =
        workspace(&[row("2024-01-05", "Deposit", "100.00")]).await;
    // Same amount and date, but on the credit side
    gateway.insert_line_item(ledger_credit("j1", 5, "100.00", "Deposit"));

    let created = engine
        .auto_match(&reconciliation_id, AutoMatchOptions::new(false, 3))
        .await
        .unwrap();
    assert_eq!(created, 0);
}

#[tokio::test]
async fn unmatch_restores_both_sides_for_rematching() {
    let (mut engine, gateway, statement_id, reconciliation_id) =
        workspace(&[row("2024-01-05", "Deposit", "250.00")]).await;
    gateway.insert_line_item(ledger_debit("j1", 5, "250.00", "Deposit"));

    let options = AutoMatchOptions::new(true, 3);
    engine.auto_match(&reconciliation_id, options).await.unwrap();
    let matches = engine.list_matches(&reconciliation_id).await.unwrap();
    engine.unmatch(&matches[0].id).await.unwrap();

    let transactions = engine
        .list_statement_transactions(&statement_id)
        .await
        .unwrap();
    assert!(transactions.iter().all(|t| !t.matched));
    assert!(gateway.all_line_items().iter().all(|i| !i.matched));

    // An eligible pair matches again with the same tolerance
    let recreated = engine.auto_match(&reconciliation_id, options).await.unwrap();
    assert_eq!(recreated, 1);
}

#[tokio::test]
async fn unmatch_keeps_the_match_when_the_release_fails() {
    let storage = MemoryStorage::new();
    let gateway = ReleaseFailingGateway::default();
    let mut engine = ReconciliationEngine::new(storage, gateway.clone());

    let statement = engine.create_statement(january_statement()).await.unwrap();
    engine
        .import_transactions(&statement.id, &[row("2024-01-05", "Deposit", "250.00")])
        .await
        .unwrap();
    let reconciliation = engine
        .create_reconciliation(NewReconciliation {
            account_id: "acct-1".to_string(),
            statement_id: statement.id.clone(),
            reconciliation_date: date(2024, 1, 31),
            book_balance: dec("1250.00"),
            statement_balance: dec("1250.00"),
            notes: None,
        })
        .await
        .unwrap();
    gateway
        .inner
        .insert_line_item(ledger_debit("j1", 5, "250.00", "Deposit"));

    let created = engine
        .auto_match(&reconciliation.id, AutoMatchOptions::new(true, 3))
        .await
        .unwrap();
    assert_eq!(created, 1);
    let matches = engine.list_matches(&reconciliation.id).await.unwrap();

    let result = engine.unmatch(&matches[0].id).await;
    assert!(matches!(result, Err(ReconError::Dependency(_))));

    // No partial state change: the match row survives and both sides
    // stay flagged
    assert_eq!(engine.list_matches(&reconciliation.id).await.unwrap().len(), 1);
    let transactions = engine
        .list_statement_transactions(&statement.id)
        .await
        .unwrap();
    assert!(transactions.iter().all(|t| t.matched));
    assert!(gateway.inner.all_line_items().iter().all(|i| i.matched));
}

#[tokio::test]
async fn unmatch_unknown_match_is_not_found() {
    let (mut engine, _, _, _) = workspace(&[row("2024-01-05", "Deposit", "250.00")]).await;
    let result = engine.unmatch("missing").await;
    assert!(matches!(result, Err(ReconError::NotFound { .. })));
}

#[tokio::test]
async fn manual_match_rejects_already_matched_sides() {
    let (mut engine, gateway, statement_id, reconciliation_id) = workspace(&[
        row("2024-01-05", "Deposit", "250.00"),
        row("2024-01-06", "Other deposit", "250.00"),
    ])
    .await;
    gateway.insert_line_item(ledger_debit("j1", 5, "250.00", "Deposit"));
    gateway.insert_line_item(ledger_debit("j2", 6, "250.00", "Other deposit"));

    let transactions = engine
        .list_statement_transactions(&statement_id)
        .await
        .unwrap();

    engine
        .manual_match(
            &reconciliation_id,
            &transactions[0].id,
            "j1",
            Some("checked by hand".to_string()),
        )
        .await
        .unwrap();

    // Claimed ledger side refuses a second pairing
    let double_item = engine
        .manual_match(&reconciliation_id, &transactions[1].id, "j1", None)
        .await;
    assert!(matches!(double_item, Err(ReconError::Conflict(_))));

    // Claimed statement side refuses a second pairing
    let double_txn = engine
        .manual_match(&reconciliation_id, &transactions[0].id, "j2", None)
        .await;
    assert!(matches!(double_txn, Err(ReconError::Conflict(_))));
}

#[tokio::test]
async fn manual_match_rejects_line_items_from_another_account() {
    let (mut engine, gateway, statement_id, reconciliation_id) =
        workspace(&[row("2024-01-05", "Deposit", "250.00")]).await;
    gateway.insert_line_item(JournalLineItem::debit(
        "j-other".to_string(),
        "acct-2".to_string(),
        date(2024, 1, 5),
        "Deposit".to_string(),
        dec("250.00"),
    ));

    let transactions = engine
        .list_statement_transactions(&statement_id)
        .await
        .unwrap();
    let result = engine
        .manual_match(&reconciliation_id, &transactions[0].id, "j-other", None)
        .await;
    assert!(matches!(result, Err(ReconError::Validation(_))));
}

#[tokio::test]
async fn negative_date_tolerance_is_rejected() {
    let (mut engine, gateway, _, reconciliation_id) =
        workspace(&[row("2024-01-05", "Deposit", "250.00")]).await;
    gateway.insert_line_item(ledger_debit("j1", 5, "250.00", "Deposit"));

    let result = engine
        .auto_match(&reconciliation_id, AutoMatchOptions::new(false, -1))
        .await;
    assert!(matches!(result, Err(ReconError::Validation(_))));
    assert!(engine
        .list_matches(&reconciliation_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unmatched_view_reports_both_sides() {
    let (mut engine, gateway, _, reconciliation_id) = workspace(&[
        row("2024-01-05", "Deposit", "250.00"),
        row("2024-01-20", "Card payment", "-10.00"),
    ])
    .await;
    gateway.insert_line_item(ledger_debit("j1", 5, "250.00", "Deposit"));
    gateway.insert_line_item(ledger_credit("j2", 25, "99.00", "Unposted payment"));

    engine
        .auto_match(&reconciliation_id, AutoMatchOptions::new(true, 2))
        .await
        .unwrap();

    let unmatched = engine
        .unmatched("acct-1", date(2024, 1, 1), date(2024, 1, 31))
        .await
        .unwrap();
    assert_eq!(unmatched.bank_transactions.len(), 1);
    assert_eq!(unmatched.bank_transactions[0].amount, dec("-10.00"));
    assert_eq!(unmatched.journal_items.len(), 1);
    assert_eq!(unmatched.journal_items[0].id, "j2");
}

#[tokio::test]
async fn scenario_c_adjustment_closes_the_gap() {
    let storage = MemoryStorage::new();
    let gateway = MemoryLedgerGateway::new();
    let mut engine = ReconciliationEngine::new(storage, gateway);

    let statement = engine.create_statement(january_statement()).await.unwrap();
    engine
        .import_transactions(&statement.id, &[row("2024-01-05", "Deposit", "250.00")])
        .await
        .unwrap();

    let reconciliation = engine
        .create_reconciliation(NewReconciliation {
            account_id: "acct-1".to_string(),
            statement_id: statement.id,
            reconciliation_date: date(2024, 1, 31),
            book_balance: dec("4950.00"),
            statement_balance: dec("5000.00"),
            notes: None,
        })
        .await
        .unwrap();

    // Gate refuses while the 50.00 gap is unexplained
    let blocked = engine
        .complete_reconciliation(&reconciliation.id, CompleteOptions::default())
        .await;
    assert!(matches!(blocked, Err(ReconError::Conflict(_))));

    engine
        .add_adjustment(
            &reconciliation.id,
            NewAdjustment {
                date: date(2024, 1, 31),
                description: "Bank fee".to_string(),
                kind: AdjustmentKind::BankFee,
                amount: dec("-50.00"),
            },
        )
        .await
        .unwrap();

    let summary = engine.balance(&reconciliation.id).await.unwrap();
    assert_eq!(summary.difference, dec("0.00"));

    let completed = engine
        .complete_reconciliation(&reconciliation.id, CompleteOptions::default())
        .await
        .unwrap();
    assert_eq!(completed.status, ReconciliationStatus::Completed);
}

#[tokio::test]
async fn completed_reconciliation_freezes_matching() {
    let (mut engine, gateway, statement_id, reconciliation_id) =
        workspace(&[row("2024-01-05", "Deposit", "250.00")]).await;
    gateway.insert_line_item(ledger_debit("j1", 5, "250.00", "Deposit"));

    engine
        .auto_match(&reconciliation_id, AutoMatchOptions::new(true, 3))
        .await
        .unwrap();
    let matches = engine.list_matches(&reconciliation_id).await.unwrap();

    engine
        .complete_reconciliation(&reconciliation_id, CompleteOptions::default())
        .await
        .unwrap();

    let rerun = engine
        .auto_match(&reconciliation_id, AutoMatchOptions::new(true, 3))
        .await;
    assert!(matches!(rerun, Err(ReconError::Conflict(_))));

    let transactions = engine
        .list_statement_transactions(&statement_id)
        .await
        .unwrap();
    let manual = engine
        .manual_match(&reconciliation_id, &transactions[0].id, "j1", None)
        .await;
    assert!(matches!(manual, Err(ReconError::Conflict(_))));

    let unmatch = engine.unmatch(&matches[0].id).await;
    assert!(matches!(unmatch, Err(ReconError::Conflict(_))));
}

#[tokio::test]
async fn scenario_d_row_errors_are_logged_and_policy_decides_processing() {
    let batch = [
        row("2024-01-02", "Deposit", "100.00"),
        row("2024-01-03", "Fee", "-5.00"),
        row("January 4th", "Transfer", "20.00"),
        row("2024-01-05", "Card payment", "-42.50"),
        row("2024-01-06", "Interest", "1.25"),
    ];

    // Default policy: partial success still processes the statement
    let storage = MemoryStorage::new();
    let mut engine = ReconciliationEngine::new(storage, MemoryLedgerGateway::new());
    let statement = engine.create_statement(january_statement()).await.unwrap();
    let outcome = engine
        .import_transactions(&statement.id, &batch)
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 4);
    let inserted = outcome
        .log
        .iter()
        .filter(|e| e.status == RowStatus::Inserted)
        .count();
    assert_eq!(inserted, 4);
    assert_eq!(outcome.log[2].status, RowStatus::Error);
    assert_eq!(outcome.log[2].line, 3);

    let refreshed = engine.get_statement(&statement.id).await.unwrap().unwrap();
    assert_eq!(refreshed.status, StatementStatus::Processed);

    // Strict policy: the error row holds the statement back
    let storage = MemoryStorage::new();
    let mut strict = ReconciliationEngine::with_import_policy(
        storage,
        MemoryLedgerGateway::new(),
        ImportPolicy::ProcessOnFullSuccess,
    );
    let statement = strict.create_statement(january_statement()).await.unwrap();
    strict
        .import_transactions(&statement.id, &batch)
        .await
        .unwrap();
    let refreshed = strict.get_statement(&statement.id).await.unwrap().unwrap();
    assert_eq!(refreshed.status, StatementStatus::Uploaded);
}

#[tokio::test]
async fn gateway_outage_aborts_matching_cleanly() {
    let storage = MemoryStorage::new();
    let mut engine = ReconciliationEngine::new(storage.clone(), UnavailableLedgerGateway);

    let statement = engine.create_statement(january_statement()).await.unwrap();
    engine
        .import_transactions(&statement.id, &[row("2024-01-05", "Deposit", "250.00")])
        .await
        .unwrap();
    let reconciliation = engine
        .create_reconciliation(NewReconciliation {
            account_id: "acct-1".to_string(),
            statement_id: statement.id.clone(),
            reconciliation_date: date(2024, 1, 31),
            book_balance: dec("1250.00"),
            statement_balance: dec("1250.00"),
            notes: None,
        })
        .await
        .unwrap();

    let result = engine
        .auto_match(&reconciliation.id, AutoMatchOptions::new(true, 3))
        .await;
    assert!(matches!(result, Err(ReconError::Dependency(_))));

    // No partial state change: nothing matched, no matches recorded
    let transactions = engine
        .list_statement_transactions(&statement.id)
        .await
        .unwrap();
    assert!(transactions.iter().all(|t| !t.matched));
    assert!(engine
        .list_matches(&reconciliation.id)
        .await
        .unwrap()
        .is_empty());
}
