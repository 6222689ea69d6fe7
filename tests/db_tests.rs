// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use cashbook::db;
use cashbook::error::EngineError;
use cashbook::models::{
    BudgetGoal, BudgetStatus, CashTransactionType, Category, CurrencyAmount, CustomBudget,
    CustomBudgetAllocation, ExchangeRate, FinancialPriority, SystemBudget, Transaction,
    TransactionPatch, TransactionType,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

fn setup() -> Connection {
    let conn = db::open_in_memory().unwrap();
    db::set_base_currency(&conn, "JPY").unwrap();
    conn
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn cash_tx(kind: CashTransactionType, ccy: &str, amount: i64) -> Transaction {
    Transaction {
        id: 0,
        r#type: TransactionType::Expense,
        amount: Decimal::from(amount * 190),
        original_amount: Decimal::from(amount),
        original_currency: ccy.to_string(),
        exchange_rate_used: Some(Decimal::from(190)),
        description: "cash movement".to_string(),
        category_id: None,
        financial_priority: None,
        date: date(2025, 6, 5),
        is_paid: true,
        paid_date: Some(date(2025, 6, 5)),
        custom_budget_id: None,
        is_cash_transaction: true,
        cash_transaction_type: Some(kind),
        cash_amount: Some(Decimal::from(amount)),
        cash_currency: Some(ccy.to_string()),
    }
}

#[test]
fn wallet_get_or_create_is_idempotent() {
    let conn = setup();
    let first = db::get_or_create_wallet(&conn).unwrap();
    let second = db::get_or_create_wallet(&conn).unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.version, second.version);
    assert!(first.balances.is_empty());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM wallets", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn stale_wallet_write_is_rejected() {
    let conn = setup();
    let mut a = db::get_or_create_wallet(&conn).unwrap();
    let mut b = db::get_or_create_wallet(&conn).unwrap();

    a.balances.push(CurrencyAmount::new("USD", Decimal::from(10)));
    let saved = db::save_wallet(&conn, &a).unwrap();
    assert_eq!(saved.version, a.version + 1);

    // b still holds the pre-update version; its write must lose.
    b.balances.push(CurrencyAmount::new("USD", Decimal::from(99)));
    let err = db::save_wallet(&conn, &b).unwrap_err();
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::WalletConflict { .. }) => {}
        other => panic!("expected WalletConflict, got {other:?}"),
    }

    let current = db::get_or_create_wallet(&conn).unwrap();
    assert_eq!(current.balance("USD"), Decimal::from(10));
}

#[test]
fn withdraw_spend_delete_restores_the_wallet() {
    let mut conn = setup();

    // Withdraw 100 GBP from bank to wallet: 0 -> 100.
    db::record_transaction(
        &mut conn,
        &cash_tx(CashTransactionType::WithdrawalToWallet, "GBP", 100),
    )
    .unwrap();
    let wallet = db::get_or_create_wallet(&conn).unwrap();
    assert_eq!(wallet.balance("GBP"), Decimal::from(100));

    // Spend 40 GBP from the wallet: 100 -> 60.
    let expense_id = db::record_transaction(
        &mut conn,
        &cash_tx(CashTransactionType::ExpenseFromWallet, "GBP", 40),
    )
    .unwrap();
    let wallet = db::get_or_create_wallet(&conn).unwrap();
    assert_eq!(wallet.balance("GBP"), Decimal::from(60));

    let stored = db::load_transaction(&conn, expense_id).unwrap();
    assert!(stored.is_paid, "cash expenses are paid by construction");
    assert_eq!(stored.cash_amount, Some(Decimal::from(40)));

    // Delete the expense: 60 -> 100, via cash_amount, not the base amount.
    db::delete_transaction(&mut conn, expense_id).unwrap();
    let wallet = db::get_or_create_wallet(&conn).unwrap();
    assert_eq!(wallet.balance("GBP"), Decimal::from(100));
}

#[test]
fn insufficient_cash_aborts_before_any_write() {
    let mut conn = setup();
    db::record_transaction(
        &mut conn,
        &cash_tx(CashTransactionType::WithdrawalToWallet, "GBP", 30),
    )
    .unwrap();

    let err = db::record_transaction(
        &mut conn,
        &cash_tx(CashTransactionType::ExpenseFromWallet, "GBP", 40),
    )
    .unwrap_err();
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::InsufficientBalance { available, .. }) => {
            assert_eq!(*available, Decimal::from(30));
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }

    // Neither the wallet nor the ledger moved.
    let wallet = db::get_or_create_wallet(&conn).unwrap();
    assert_eq!(wallet.balance("GBP"), Decimal::from(30));
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM transactions WHERE cash_transaction_type='expense_from_wallet'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn deposit_back_to_bank_decrements_the_wallet() {
    let mut conn = setup();
    db::record_transaction(
        &mut conn,
        &cash_tx(CashTransactionType::WithdrawalToWallet, "EUR", 80),
    )
    .unwrap();
    db::record_transaction(
        &mut conn,
        &cash_tx(CashTransactionType::DepositFromWalletToBank, "EUR", 30),
    )
    .unwrap();
    let wallet = db::get_or_create_wallet(&conn).unwrap();
    assert_eq!(wallet.balance("EUR"), Decimal::from(50));
}

#[test]
fn transaction_round_trips_through_storage() {
    let mut conn = setup();
    let tx = cash_tx(CashTransactionType::ExpenseFromWallet, "GBP", 40);
    db::record_transaction(
        &mut conn,
        &cash_tx(CashTransactionType::WithdrawalToWallet, "GBP", 100),
    )
    .unwrap();
    let id = db::record_transaction(&mut conn, &tx).unwrap();

    let loaded = db::load_transaction(&conn, id).unwrap();
    assert_eq!(loaded.r#type, TransactionType::Expense);
    assert_eq!(loaded.amount, tx.amount);
    assert_eq!(loaded.cash_transaction_type, tx.cash_transaction_type);
    assert_eq!(loaded.cash_currency, tx.cash_currency);
    assert_eq!(loaded.date, tx.date);
    assert_eq!(loaded.paid_date, tx.paid_date);
}

#[test]
fn patch_marks_paid_and_stamps_paid_date() {
    let mut conn = setup();
    let mut tx = cash_tx(CashTransactionType::WithdrawalToWallet, "GBP", 10);
    tx.is_cash_transaction = false;
    tx.cash_transaction_type = None;
    tx.cash_amount = None;
    tx.cash_currency = None;
    tx.is_paid = false;
    tx.paid_date = None;
    let id = db::record_transaction(&mut conn, &tx).unwrap();

    let patch = TransactionPatch {
        is_paid: Some(true),
        ..Default::default()
    };
    let updated = db::update_transaction(&mut conn, id, &patch).unwrap();
    assert!(updated.is_paid);
    assert_eq!(updated.paid_date, Some(tx.date));

    let reloaded = db::load_transaction(&conn, id).unwrap();
    assert!(reloaded.is_paid);
    assert_eq!(reloaded.paid_date, Some(tx.date));
}

#[test]
fn wallet_expense_cannot_be_patched_unpaid() {
    let mut conn = setup();
    db::record_transaction(
        &mut conn,
        &cash_tx(CashTransactionType::WithdrawalToWallet, "GBP", 100),
    )
    .unwrap();
    let id = db::record_transaction(
        &mut conn,
        &cash_tx(CashTransactionType::ExpenseFromWallet, "GBP", 40),
    )
    .unwrap();

    let patch = TransactionPatch {
        is_paid: Some(false),
        paid_date: Some(None),
        ..Default::default()
    };
    let updated = db::update_transaction(&mut conn, id, &patch).unwrap();
    assert!(updated.is_paid, "cash is paid by construction");
    assert_eq!(updated.paid_date, Some(date(2025, 6, 5)));

    let reloaded = db::load_transaction(&conn, id).unwrap();
    assert!(reloaded.is_paid);
    assert_eq!(reloaded.paid_date, Some(date(2025, 6, 5)));

    // The wallet still reflects the spend; nothing was half-reverted.
    let wallet = db::get_or_create_wallet(&conn).unwrap();
    assert_eq!(wallet.balance("GBP"), Decimal::from(60));

    // Other fields of the same patch still apply.
    let rename = TransactionPatch {
        description: Some("market stall".to_string()),
        is_paid: Some(false),
        ..Default::default()
    };
    let renamed = db::update_transaction(&mut conn, id, &rename).unwrap();
    assert_eq!(renamed.description, "market stall");
    assert!(renamed.is_paid);
}

#[test]
fn deleting_a_missing_transaction_errors() {
    let mut conn = setup();
    let err = db::delete_transaction(&mut conn, 404).unwrap_err();
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::TransactionNotFound(404)) => {}
        other => panic!("expected TransactionNotFound, got {other:?}"),
    }
}

#[test]
fn allocation_against_missing_budget_is_rejected() {
    let conn = setup();
    let alloc = cashbook::models::CustomBudgetAllocation {
        id: 0,
        custom_budget_id: 123,
        category_id: 1,
        allocated_amount: Decimal::from(50),
    };
    let err = db::insert_allocation(&conn, &alloc).unwrap_err();
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::BudgetNotFound(123)) => {}
        other => panic!("expected BudgetNotFound, got {other:?}"),
    }
}

#[test]
fn custom_budget_round_trips_with_cash_allocations() {
    let conn = setup();
    let budget = CustomBudget {
        id: 0,
        name: "Lisbon trip".to_string(),
        allocated_amount: "500.50".parse().unwrap(),
        cash_allocations: vec![
            CurrencyAmount::new("GBP", Decimal::from(100)),
            CurrencyAmount::new("EUR", "75.25".parse().unwrap()),
        ],
        start_date: date(2025, 7, 1),
        end_date: date(2025, 7, 15),
        status: BudgetStatus::Planned,
        original_allocated_amount: None,
        is_system: false,
    };
    let id = db::insert_custom_budget(&conn, &budget).unwrap();

    let loaded = db::load_custom_budgets(&conn).unwrap();
    assert_eq!(loaded.len(), 1);
    let got = &loaded[0];
    assert_eq!(got.id, id);
    assert_eq!(got.name, "Lisbon trip");
    assert_eq!(got.allocated_amount, "500.50".parse::<Decimal>().unwrap());
    assert_eq!(got.cash_allocations, budget.cash_allocations);
    assert_eq!(got.status, BudgetStatus::Planned);
    assert_eq!(got.original_allocated_amount, None);
    assert!(!got.is_system);

    // Completing freezes the allocation; the update must persist both the
    // frozen amount and the snapshot.
    let mut completed = got.clone();
    completed.complete(Decimal::from(320));
    db::update_custom_budget(&conn, &completed).unwrap();

    let reloaded = db::load_custom_budgets(&conn).unwrap();
    assert_eq!(reloaded[0].status, BudgetStatus::Completed);
    assert_eq!(reloaded[0].allocated_amount, Decimal::from(320));
    assert_eq!(
        reloaded[0].original_allocated_amount,
        Some("500.50".parse().unwrap())
    );
}

#[test]
fn updating_a_missing_custom_budget_errors() {
    let conn = setup();
    let mut budget = CustomBudget {
        id: 77,
        name: "ghost".to_string(),
        allocated_amount: Decimal::from(10),
        cash_allocations: Vec::new(),
        start_date: date(2025, 7, 1),
        end_date: date(2025, 7, 15),
        status: BudgetStatus::Active,
        original_allocated_amount: None,
        is_system: false,
    };
    budget.allocated_amount = Decimal::from(20);
    let err = db::update_custom_budget(&conn, &budget).unwrap_err();
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::BudgetNotFound(77)) => {}
        other => panic!("expected BudgetNotFound, got {other:?}"),
    }
}

#[test]
fn system_budget_upsert_overwrites_the_same_period() {
    let conn = setup();
    let mut budget = SystemBudget {
        id: 0,
        priority: FinancialPriority::Needs,
        budget_amount: Decimal::from(1500),
        start_date: date(2025, 6, 1),
        end_date: date(2025, 6, 30),
    };
    db::upsert_system_budget(&conn, &budget).unwrap();
    // Income changed mid-month: same (priority, start) resizes in place.
    budget.budget_amount = Decimal::from(1800);
    db::upsert_system_budget(&conn, &budget).unwrap();

    let loaded = db::load_system_budgets(&conn).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].priority, FinancialPriority::Needs);
    assert_eq!(loaded[0].budget_amount, Decimal::from(1800));
    assert_eq!(loaded[0].start_date, date(2025, 6, 1));
    assert_eq!(loaded[0].end_date, date(2025, 6, 30));
}

#[test]
fn budget_goal_upsert_round_trips() {
    let conn = setup();
    let mut goal = BudgetGoal {
        id: 0,
        priority: FinancialPriority::Savings,
        target_percentage: Decimal::from(20),
        target_amount: None,
        is_absolute: false,
    };
    db::upsert_budget_goal(&conn, &goal).unwrap();
    // Switching the same priority to an absolute target updates in place.
    goal.target_amount = Some("250.75".parse().unwrap());
    goal.is_absolute = true;
    db::upsert_budget_goal(&conn, &goal).unwrap();

    let loaded = db::load_budget_goals(&conn).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].priority, FinancialPriority::Savings);
    assert_eq!(loaded[0].target_percentage, Decimal::from(20));
    assert_eq!(loaded[0].target_amount, Some("250.75".parse().unwrap()));
    assert!(loaded[0].is_absolute);
}

#[test]
fn exchange_rate_upsert_round_trips() {
    let conn = setup();
    let mut snapshot = ExchangeRate {
        id: 0,
        date: date(2025, 6, 1),
        from_currency: "USD".to_string(),
        to_currency: "JPY".to_string(),
        rate: "149.50".parse().unwrap(),
    };
    db::insert_rate(&conn, &snapshot).unwrap();
    // A re-fetch for the same (date, pair) replaces the rate.
    snapshot.rate = "150.25".parse().unwrap();
    db::insert_rate(&conn, &snapshot).unwrap();
    db::insert_rate(
        &conn,
        &ExchangeRate {
            id: 0,
            date: date(2025, 6, 2),
            from_currency: "USD".to_string(),
            to_currency: "JPY".to_string(),
            rate: "151".parse().unwrap(),
        },
    )
    .unwrap();

    let loaded = db::load_rates(&conn).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].date, date(2025, 6, 1));
    assert_eq!(loaded[0].rate, "150.25".parse::<Decimal>().unwrap());
    assert_eq!(loaded[0].from_currency, "USD");
    assert_eq!(loaded[0].to_currency, "JPY");
    assert_eq!(loaded[1].rate, Decimal::from(151));
}

#[test]
fn categories_round_trip_with_priority() {
    let conn = setup();
    db::insert_category(
        &conn,
        &Category {
            id: 0,
            name: "Groceries".to_string(),
            priority: FinancialPriority::Needs,
            color: "#00aa00".to_string(),
            icon: "cart".to_string(),
        },
    )
    .unwrap();
    db::insert_category(
        &conn,
        &Category {
            id: 0,
            name: "Dining".to_string(),
            priority: FinancialPriority::Wants,
            color: String::new(),
            icon: String::new(),
        },
    )
    .unwrap();

    let loaded = db::load_categories(&conn).unwrap();
    assert_eq!(loaded.len(), 2);
    // Ordered by name.
    assert_eq!(loaded[0].name, "Dining");
    assert_eq!(loaded[0].priority, FinancialPriority::Wants);
    assert_eq!(loaded[1].name, "Groceries");
    assert_eq!(loaded[1].priority, FinancialPriority::Needs);
    assert_eq!(loaded[1].color, "#00aa00");
    assert_eq!(loaded[1].icon, "cart");
}

#[test]
fn allocations_round_trip_against_an_existing_budget() {
    let conn = setup();
    db::insert_category(
        &conn,
        &Category {
            id: 0,
            name: "Dining".to_string(),
            priority: FinancialPriority::Wants,
            color: String::new(),
            icon: String::new(),
        },
    )
    .unwrap();
    let budget_id = db::insert_custom_budget(
        &conn,
        &CustomBudget {
            id: 0,
            name: "trip".to_string(),
            allocated_amount: Decimal::from(500),
            cash_allocations: Vec::new(),
            start_date: date(2025, 7, 1),
            end_date: date(2025, 7, 15),
            status: BudgetStatus::Active,
            original_allocated_amount: None,
            is_system: false,
        },
    )
    .unwrap();

    let id = db::insert_allocation(
        &conn,
        &CustomBudgetAllocation {
            id: 0,
            custom_budget_id: budget_id,
            category_id: 1,
            allocated_amount: "200.50".parse().unwrap(),
        },
    )
    .unwrap();

    let loaded = db::load_allocations(&conn).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].custom_budget_id, budget_id);
    assert_eq!(loaded[0].allocated_amount, "200.50".parse::<Decimal>().unwrap());

    db::delete_allocation(&conn, id).unwrap();
    assert!(db::load_allocations(&conn).unwrap().is_empty());

    let err = db::delete_allocation(&conn, id).unwrap_err();
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::AllocationNotFound(_)) => {}
        other => panic!("expected AllocationNotFound, got {other:?}"),
    }
}

#[test]
fn rule_with_invalid_regex_is_rejected_at_creation() {
    let conn = setup();
    db::insert_category(
        &conn,
        &cashbook::models::Category {
            id: 0,
            name: "Shopping".to_string(),
            priority: cashbook::models::FinancialPriority::Wants,
            color: String::new(),
            icon: String::new(),
        },
    )
    .unwrap();
    let rule = cashbook::models::CategoryRule {
        id: 0,
        pattern: "(?P<".to_string(),
        is_regex: true,
        priority: 0,
        category_id: 1,
    };
    let err = db::insert_rule(&conn, &rule).unwrap_err();
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::InvalidRule { pattern, .. }) => assert_eq!(pattern, "(?P<"),
        other => panic!("expected InvalidRule, got {other:?}"),
    }

    // A literal pattern never needs regex validation.
    let literal = cashbook::models::CategoryRule {
        id: 0,
        pattern: "(?P<".to_string(),
        is_regex: false,
        priority: 0,
        category_id: 1,
    };
    db::insert_rule(&conn, &literal).unwrap();
    assert_eq!(db::load_rules(&conn).unwrap().len(), 1);
}

#[test]
fn base_currency_setting_round_trips() {
    let conn = db::open_in_memory().unwrap();
    assert_eq!(db::get_base_currency(&conn).unwrap(), "JPY");
    db::set_base_currency(&conn, "USD").unwrap();
    db::set_base_currency(&conn, "EUR").unwrap();
    assert_eq!(db::get_base_currency(&conn).unwrap(), "EUR");
    let ctx = db::load_user_context(&conn).unwrap();
    assert_eq!(ctx.base_currency, "EUR");
}
