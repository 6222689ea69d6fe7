// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use std::fs;
use std::path::PathBuf;

use crate::error::EngineError;
use crate::models::{
    BudgetGoal, BudgetStatus, CashTransactionType, CashWallet, Category, CategoryRule,
    CurrencyAmount, CustomBudget, CustomBudgetAllocation, ExchangeRate, FinancialPriority,
    SystemBudget, Transaction, TransactionPatch, TransactionType, UserContext,
};
use crate::wallet::{CashWalletLedger, reversal_delta, wallet_delta};

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("com.alphavelocity", "Cashbook", "cashbook"));

pub fn db_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("cashbook.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let mut conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&mut conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("Open in-memory DB")?;
    init_schema(&mut conn)?;
    Ok(conn)
}

fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS categories(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        priority TEXT NOT NULL CHECK(priority IN ('needs','wants','savings')),
        color TEXT NOT NULL DEFAULT '',
        icon TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS custom_budgets(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        allocated_amount TEXT NOT NULL,
        cash_allocations TEXT NOT NULL DEFAULT '[]', -- JSON [{currency_code, amount}]
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        status TEXT NOT NULL CHECK(status IN ('planned','active','completed')),
        original_allocated_amount TEXT,
        is_system INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS system_budgets(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        priority TEXT NOT NULL CHECK(priority IN ('needs','wants','savings')),
        budget_amount TEXT NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        UNIQUE(priority, start_date)
    );

    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        type TEXT NOT NULL CHECK(type IN ('income','expense')),
        amount TEXT NOT NULL,
        original_amount TEXT NOT NULL,
        original_currency TEXT NOT NULL,
        exchange_rate_used TEXT,
        description TEXT NOT NULL DEFAULT '',
        category_id INTEGER,
        financial_priority TEXT,
        date TEXT NOT NULL,
        is_paid INTEGER NOT NULL DEFAULT 0,
        paid_date TEXT,
        custom_budget_id INTEGER,
        is_cash_transaction INTEGER NOT NULL DEFAULT 0,
        cash_transaction_type TEXT,
        cash_amount TEXT,
        cash_currency TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(category_id) REFERENCES categories(id) ON DELETE SET NULL,
        FOREIGN KEY(custom_budget_id) REFERENCES custom_budgets(id) ON DELETE SET NULL
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
    CREATE INDEX IF NOT EXISTS idx_transactions_budget ON transactions(custom_budget_id);

    CREATE TABLE IF NOT EXISTS budget_allocations(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        custom_budget_id INTEGER NOT NULL,
        category_id INTEGER NOT NULL,
        allocated_amount TEXT NOT NULL,
        UNIQUE(custom_budget_id, category_id),
        FOREIGN KEY(custom_budget_id) REFERENCES custom_budgets(id) ON DELETE CASCADE,
        FOREIGN KEY(category_id) REFERENCES categories(id) ON DELETE CASCADE
    );

    -- One wallet per user; balances is the full JSON map, version guards
    -- the read-modify-write cycle.
    CREATE TABLE IF NOT EXISTS wallets(
        id INTEGER PRIMARY KEY CHECK(id = 1),
        balances TEXT NOT NULL DEFAULT '[]',
        version INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS budget_goals(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        priority TEXT NOT NULL UNIQUE CHECK(priority IN ('needs','wants','savings')),
        target_percentage TEXT NOT NULL DEFAULT '0',
        target_amount TEXT,
        is_absolute INTEGER NOT NULL DEFAULT 0
    );

    -- Rate snapshots: to_currency is always the reference currency.
    CREATE TABLE IF NOT EXISTS exchange_rates(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        from_currency TEXT NOT NULL,
        to_currency TEXT NOT NULL,
        rate TEXT NOT NULL,
        UNIQUE(date, from_currency, to_currency)
    );

    CREATE TABLE IF NOT EXISTS category_rules(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        pattern TEXT NOT NULL,
        is_regex INTEGER NOT NULL DEFAULT 0,
        priority INTEGER NOT NULL DEFAULT 0,
        category_id INTEGER NOT NULL,
        FOREIGN KEY(category_id) REFERENCES categories(id) ON DELETE CASCADE
    );
    "#,
    )?;
    Ok(())
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    s.parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

fn opt_decimal(s: Option<String>) -> Result<Option<Decimal>> {
    s.as_deref().map(parse_decimal).transpose()
}

fn opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
    s.as_deref().map(parse_date).transpose()
}

// Settings: idempotent get-or-create, the second concurrent creator
// resolves to an update of the existing row.

pub fn get_base_currency(conn: &Connection) -> Result<String> {
    let v: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key='base_currency'",
            [],
            |r| r.get(0),
        )
        .optional()?;
    Ok(v.unwrap_or_else(|| "JPY".to_string()))
}

pub fn set_base_currency(conn: &Connection, ccy: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES('base_currency', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![ccy],
    )?;
    Ok(())
}

pub fn load_user_context(conn: &Connection) -> Result<UserContext> {
    Ok(UserContext::new(get_base_currency(conn)?))
}

// Categories

pub fn insert_category(conn: &Connection, cat: &Category) -> Result<i64> {
    conn.execute(
        "INSERT INTO categories(name, priority, color, icon) VALUES (?1,?2,?3,?4)",
        params![cat.name, cat.priority.as_str(), cat.color, cat.icon],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn load_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt =
        conn.prepare("SELECT id, name, priority, color, icon FROM categories ORDER BY name")?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, name, priority, color, icon) = row?;
        let priority = FinancialPriority::parse(&priority)
            .with_context(|| format!("Invalid priority '{}' for category {}", priority, id))?;
        out.push(Category {
            id,
            name,
            priority,
            color,
            icon,
        });
    }
    Ok(out)
}

// Custom budgets

pub fn insert_custom_budget(conn: &Connection, b: &CustomBudget) -> Result<i64> {
    conn.execute(
        "INSERT INTO custom_budgets(name, allocated_amount, cash_allocations, start_date, end_date, status, original_allocated_amount, is_system)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
        params![
            b.name,
            b.allocated_amount.to_string(),
            serde_json::to_string(&b.cash_allocations)?,
            b.start_date.to_string(),
            b.end_date.to_string(),
            status_str(b.status),
            b.original_allocated_amount.map(|d| d.to_string()),
            b.is_system as i64,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_custom_budget(conn: &Connection, b: &CustomBudget) -> Result<()> {
    let n = conn.execute(
        "UPDATE custom_budgets SET name=?2, allocated_amount=?3, cash_allocations=?4, start_date=?5, end_date=?6, status=?7, original_allocated_amount=?8 WHERE id=?1",
        params![
            b.id,
            b.name,
            b.allocated_amount.to_string(),
            serde_json::to_string(&b.cash_allocations)?,
            b.start_date.to_string(),
            b.end_date.to_string(),
            status_str(b.status),
            b.original_allocated_amount.map(|d| d.to_string()),
        ],
    )?;
    if n == 0 {
        return Err(EngineError::BudgetNotFound(b.id).into());
    }
    Ok(())
}

pub fn load_custom_budgets(conn: &Connection) -> Result<Vec<CustomBudget>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, allocated_amount, cash_allocations, start_date, end_date, status, original_allocated_amount, is_system FROM custom_budgets ORDER BY start_date",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
            r.get::<_, String>(6)?,
            r.get::<_, Option<String>>(7)?,
            r.get::<_, i64>(8)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, name, allocated, cash, start, end, status, original, is_system) = row?;
        let cash_allocations: Vec<CurrencyAmount> = serde_json::from_str(&cash)
            .with_context(|| format!("Invalid cash allocations for budget {}", id))?;
        out.push(CustomBudget {
            id,
            name,
            allocated_amount: parse_decimal(&allocated)?,
            cash_allocations,
            start_date: parse_date(&start)?,
            end_date: parse_date(&end)?,
            status: parse_status(&status)
                .with_context(|| format!("Invalid status '{}' for budget {}", status, id))?,
            original_allocated_amount: opt_decimal(original)?,
            is_system: is_system != 0,
        });
    }
    Ok(out)
}

fn status_str(s: BudgetStatus) -> &'static str {
    match s {
        BudgetStatus::Planned => "planned",
        BudgetStatus::Active => "active",
        BudgetStatus::Completed => "completed",
    }
}

fn parse_status(s: &str) -> Option<BudgetStatus> {
    match s {
        "planned" => Some(BudgetStatus::Planned),
        "active" => Some(BudgetStatus::Active),
        "completed" => Some(BudgetStatus::Completed),
        _ => None,
    }
}

// System budgets

pub fn upsert_system_budget(conn: &Connection, b: &SystemBudget) -> Result<i64> {
    conn.execute(
        "INSERT INTO system_budgets(priority, budget_amount, start_date, end_date) VALUES (?1,?2,?3,?4)
         ON CONFLICT(priority, start_date) DO UPDATE SET budget_amount=excluded.budget_amount, end_date=excluded.end_date",
        params![
            b.priority.as_str(),
            b.budget_amount.to_string(),
            b.start_date.to_string(),
            b.end_date.to_string(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn load_system_budgets(conn: &Connection) -> Result<Vec<SystemBudget>> {
    let mut stmt = conn.prepare(
        "SELECT id, priority, budget_amount, start_date, end_date FROM system_budgets ORDER BY start_date",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, priority, amount, start, end) = row?;
        out.push(SystemBudget {
            id,
            priority: FinancialPriority::parse(&priority)
                .with_context(|| format!("Invalid priority '{}' for system budget {}", priority, id))?,
            budget_amount: parse_decimal(&amount)?,
            start_date: parse_date(&start)?,
            end_date: parse_date(&end)?,
        });
    }
    Ok(out)
}

// Allocations

pub fn insert_allocation(conn: &Connection, a: &CustomBudgetAllocation) -> Result<i64> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT id FROM custom_budgets WHERE id=?1",
            params![a.custom_budget_id],
            |r| r.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(EngineError::BudgetNotFound(a.custom_budget_id).into());
    }
    conn.execute(
        "INSERT INTO budget_allocations(custom_budget_id, category_id, allocated_amount) VALUES (?1,?2,?3)
         ON CONFLICT(custom_budget_id, category_id) DO UPDATE SET allocated_amount=excluded.allocated_amount",
        params![a.custom_budget_id, a.category_id, a.allocated_amount.to_string()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_allocation(conn: &Connection, id: i64) -> Result<()> {
    let n = conn.execute("DELETE FROM budget_allocations WHERE id=?1", params![id])?;
    if n == 0 {
        return Err(EngineError::AllocationNotFound(id).into());
    }
    Ok(())
}

pub fn load_allocations(conn: &Connection) -> Result<Vec<CustomBudgetAllocation>> {
    let mut stmt = conn.prepare(
        "SELECT id, custom_budget_id, category_id, allocated_amount FROM budget_allocations",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, i64>(1)?,
            r.get::<_, i64>(2)?,
            r.get::<_, String>(3)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, custom_budget_id, category_id, amount) = row?;
        out.push(CustomBudgetAllocation {
            id,
            custom_budget_id,
            category_id,
            allocated_amount: parse_decimal(&amount)?,
        });
    }
    Ok(out)
}

// Budget goals

pub fn upsert_budget_goal(conn: &Connection, g: &BudgetGoal) -> Result<()> {
    conn.execute(
        "INSERT INTO budget_goals(priority, target_percentage, target_amount, is_absolute) VALUES (?1,?2,?3,?4)
         ON CONFLICT(priority) DO UPDATE SET target_percentage=excluded.target_percentage, target_amount=excluded.target_amount, is_absolute=excluded.is_absolute",
        params![
            g.priority.as_str(),
            g.target_percentage.to_string(),
            g.target_amount.map(|d| d.to_string()),
            g.is_absolute as i64,
        ],
    )?;
    Ok(())
}

pub fn load_budget_goals(conn: &Connection) -> Result<Vec<BudgetGoal>> {
    let mut stmt = conn.prepare(
        "SELECT id, priority, target_percentage, target_amount, is_absolute FROM budget_goals",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, Option<String>>(3)?,
            r.get::<_, i64>(4)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, priority, pct, amount, is_absolute) = row?;
        out.push(BudgetGoal {
            id,
            priority: FinancialPriority::parse(&priority)
                .with_context(|| format!("Invalid priority '{}' for goal {}", priority, id))?,
            target_percentage: parse_decimal(&pct)?,
            target_amount: opt_decimal(amount)?,
            is_absolute: is_absolute != 0,
        });
    }
    Ok(out)
}

// Exchange rates

pub fn insert_rate(conn: &Connection, rate: &ExchangeRate) -> Result<()> {
    conn.execute(
        "INSERT INTO exchange_rates(date, from_currency, to_currency, rate) VALUES (?1,?2,?3,?4)
         ON CONFLICT(date, from_currency, to_currency) DO UPDATE SET rate=excluded.rate",
        params![
            rate.date.to_string(),
            rate.from_currency,
            rate.to_currency,
            rate.rate.to_string(),
        ],
    )?;
    Ok(())
}

pub fn load_rates(conn: &Connection) -> Result<Vec<ExchangeRate>> {
    let mut stmt = conn
        .prepare("SELECT id, date, from_currency, to_currency, rate FROM exchange_rates ORDER BY date")?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, date, from_currency, to_currency, rate) = row?;
        out.push(ExchangeRate {
            id,
            date: parse_date(&date)?,
            from_currency,
            to_currency,
            rate: parse_decimal(&rate)?,
        });
    }
    Ok(out)
}

// Category rules

pub fn insert_rule(conn: &Connection, rule: &CategoryRule) -> Result<i64> {
    crate::categorize::validate_rule_pattern(&rule.pattern, rule.is_regex)?;
    conn.execute(
        "INSERT INTO category_rules(pattern, is_regex, priority, category_id) VALUES (?1,?2,?3,?4)",
        params![
            rule.pattern,
            rule.is_regex as i64,
            rule.priority,
            rule.category_id
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn load_rules(conn: &Connection) -> Result<Vec<CategoryRule>> {
    let mut stmt = conn.prepare(
        "SELECT id, pattern, is_regex, priority, category_id FROM category_rules ORDER BY priority, id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(CategoryRule {
            id: r.get(0)?,
            pattern: r.get(1)?,
            is_regex: r.get::<_, i64>(2)? != 0,
            priority: r.get(3)?,
            category_id: r.get(4)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// Wallet: idempotent get-or-create plus a versioned full-map write.

pub fn get_or_create_wallet(conn: &Connection) -> Result<CashWallet> {
    conn.execute("INSERT OR IGNORE INTO wallets(id) VALUES (1)", [])?;
    let (balances, version): (String, i64) =
        conn.query_row("SELECT balances, version FROM wallets WHERE id=1", [], |r| {
            Ok((r.get(0)?, r.get(1)?))
        })?;
    let balances: Vec<CurrencyAmount> =
        serde_json::from_str(&balances).context("Invalid wallet balances JSON")?;
    Ok(CashWallet {
        id: 1,
        balances,
        version,
    })
}

/// Write the full balance map back, guarded by the version read earlier.
/// A concurrent writer bumps the version first, so at most one writer
/// observes the pre-update balances; the loser gets `WalletConflict` and
/// must re-read and retry.
pub fn save_wallet(conn: &Connection, wallet: &CashWallet) -> Result<CashWallet> {
    let balances = serde_json::to_string(&wallet.balances)?;
    let n = conn.execute(
        "UPDATE wallets SET balances=?2, version=version+1 WHERE id=?1 AND version=?3",
        params![wallet.id, balances, wallet.version],
    )?;
    if n == 0 {
        return Err(EngineError::WalletConflict {
            expected: wallet.version,
        }
        .into());
    }
    Ok(CashWallet {
        id: wallet.id,
        balances: wallet.balances.clone(),
        version: wallet.version + 1,
    })
}

// Transactions. Cash transactions pair the row mutation with the matching
// wallet adjustment inside one SQL transaction: all-or-nothing.

pub fn insert_transaction_row(conn: &Connection, tx: &Transaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions(type, amount, original_amount, original_currency, exchange_rate_used, description, category_id, financial_priority, date, is_paid, paid_date, custom_budget_id, is_cash_transaction, cash_transaction_type, cash_amount, cash_currency)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
        params![
            type_str(tx.r#type),
            tx.amount.to_string(),
            tx.original_amount.to_string(),
            tx.original_currency,
            tx.exchange_rate_used.map(|d| d.to_string()),
            tx.description,
            tx.category_id,
            tx.financial_priority.map(|p| p.as_str()),
            tx.date.to_string(),
            tx.is_paid as i64,
            tx.paid_date.map(|d| d.to_string()),
            tx.custom_budget_id,
            tx.is_cash_transaction as i64,
            tx.cash_transaction_type.map(cash_type_str),
            tx.cash_amount.map(|d| d.to_string()),
            tx.cash_currency,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Record a transaction. For cash transactions the wallet adjustment is
/// applied first (inside the same SQL transaction), so an insufficient
/// balance aborts before the row exists and the wallet is left untouched.
pub fn record_transaction(conn: &mut Connection, tx: &Transaction) -> Result<i64> {
    let sql_tx = conn.transaction()?;
    if let Some((currency, delta)) = wallet_delta(tx) {
        let wallet = get_or_create_wallet(&sql_tx)?;
        let mut ledger = CashWalletLedger::new(wallet);
        ledger.adjust(&currency, delta)?;
        save_wallet(&sql_tx, &ledger.into_wallet())?;
    }
    let id = insert_transaction_row(&sql_tx, tx)?;
    sql_tx.commit()?;
    Ok(id)
}

/// Delete a transaction, incrementing the wallet back by `cash_amount` in
/// `cash_currency` for cash transactions (never by the base-currency
/// amount).
pub fn delete_transaction(conn: &mut Connection, id: i64) -> Result<Transaction> {
    let sql_tx = conn.transaction()?;
    let tx = load_transaction(&sql_tx, id)?;
    if let Some((currency, delta)) = reversal_delta(&tx) {
        let wallet = get_or_create_wallet(&sql_tx)?;
        let mut ledger = CashWalletLedger::new(wallet);
        ledger.adjust(&currency, delta)?;
        save_wallet(&sql_tx, &ledger.into_wallet())?;
    }
    sql_tx.execute("DELETE FROM transactions WHERE id=?1", params![id])?;
    sql_tx.commit()?;
    Ok(tx)
}

/// Apply a validated patch to a non-cash field set. Cash fields are not
/// patchable: changing how a transaction touches the wallet is a delete
/// plus re-record so the ledger pairing stays intact. The same exclusion
/// covers the paid flags of a wallet expense: cash is paid by
/// construction and can never be flipped back to unpaid.
pub fn update_transaction(
    conn: &mut Connection,
    id: i64,
    patch: &TransactionPatch,
) -> Result<Transaction> {
    let sql_tx = conn.transaction()?;
    let current = load_transaction(&sql_tx, id)?;
    let mut patch = patch.clone();
    if current.is_wallet_expense() {
        patch.is_paid = None;
        patch.paid_date = None;
    }
    let merged = patch.apply(&current);
    sql_tx.execute(
        "UPDATE transactions SET amount=?2, description=?3, category_id=?4, financial_priority=?5, date=?6, is_paid=?7, paid_date=?8, custom_budget_id=?9 WHERE id=?1",
        params![
            id,
            merged.amount.to_string(),
            merged.description,
            merged.category_id,
            merged.financial_priority.map(|p| p.as_str()),
            merged.date.to_string(),
            merged.is_paid as i64,
            merged.paid_date.map(|d| d.to_string()),
            merged.custom_budget_id,
        ],
    )?;
    sql_tx.commit()?;
    Ok(merged)
}

pub fn load_transaction(conn: &Connection, id: i64) -> Result<Transaction> {
    let tx = query_transactions(conn, Some(id))?.into_iter().next();
    tx.ok_or_else(|| EngineError::TransactionNotFound(id).into())
}

pub fn load_transactions(conn: &Connection) -> Result<Vec<Transaction>> {
    query_transactions(conn, None)
}

fn query_transactions(conn: &Connection, id: Option<i64>) -> Result<Vec<Transaction>> {
    let base = "SELECT id, type, amount, original_amount, original_currency, exchange_rate_used, description, category_id, financial_priority, date, is_paid, paid_date, custom_budget_id, is_cash_transaction, cash_transaction_type, cash_amount, cash_currency FROM transactions";
    let sql = match id {
        Some(_) => format!("{base} WHERE id=?1"),
        None => format!("{base} ORDER BY date, id"),
    };
    let mut stmt = conn.prepare(&sql)?;

    let map_row = |r: &rusqlite::Row<'_>| -> rusqlite::Result<RawTransaction> {
        Ok(RawTransaction {
            id: r.get(0)?,
            r#type: r.get(1)?,
            amount: r.get(2)?,
            original_amount: r.get(3)?,
            original_currency: r.get(4)?,
            exchange_rate_used: r.get(5)?,
            description: r.get(6)?,
            category_id: r.get(7)?,
            financial_priority: r.get(8)?,
            date: r.get(9)?,
            is_paid: r.get(10)?,
            paid_date: r.get(11)?,
            custom_budget_id: r.get(12)?,
            is_cash_transaction: r.get(13)?,
            cash_transaction_type: r.get(14)?,
            cash_amount: r.get(15)?,
            cash_currency: r.get(16)?,
        })
    };

    let mut raws = Vec::new();
    match id {
        Some(id) => {
            let rows = stmt.query_map(params![id], map_row)?;
            for row in rows {
                raws.push(row?);
            }
        }
        None => {
            let rows = stmt.query_map([], map_row)?;
            for row in rows {
                raws.push(row?);
            }
        }
    }
    raws.into_iter().map(RawTransaction::into_model).collect()
}

struct RawTransaction {
    id: i64,
    r#type: String,
    amount: String,
    original_amount: String,
    original_currency: String,
    exchange_rate_used: Option<String>,
    description: String,
    category_id: Option<i64>,
    financial_priority: Option<String>,
    date: String,
    is_paid: i64,
    paid_date: Option<String>,
    custom_budget_id: Option<i64>,
    is_cash_transaction: i64,
    cash_transaction_type: Option<String>,
    cash_amount: Option<String>,
    cash_currency: Option<String>,
}

impl RawTransaction {
    fn into_model(self) -> Result<Transaction> {
        Ok(Transaction {
            id: self.id,
            r#type: parse_type(&self.r#type)
                .with_context(|| format!("Invalid type '{}' for transaction {}", self.r#type, self.id))?,
            amount: parse_decimal(&self.amount)?,
            original_amount: parse_decimal(&self.original_amount)?,
            original_currency: self.original_currency,
            exchange_rate_used: opt_decimal(self.exchange_rate_used)?,
            description: self.description,
            category_id: self.category_id,
            financial_priority: self
                .financial_priority
                .as_deref()
                .and_then(FinancialPriority::parse),
            date: parse_date(&self.date)?,
            is_paid: self.is_paid != 0,
            paid_date: opt_date(self.paid_date)?,
            custom_budget_id: self.custom_budget_id,
            is_cash_transaction: self.is_cash_transaction != 0,
            cash_transaction_type: self
                .cash_transaction_type
                .as_deref()
                .and_then(parse_cash_type),
            cash_amount: opt_decimal(self.cash_amount)?,
            cash_currency: self.cash_currency,
        })
    }
}

fn type_str(t: TransactionType) -> &'static str {
    match t {
        TransactionType::Income => "income",
        TransactionType::Expense => "expense",
    }
}

fn parse_type(s: &str) -> Option<TransactionType> {
    match s {
        "income" => Some(TransactionType::Income),
        "expense" => Some(TransactionType::Expense),
        _ => None,
    }
}

fn cash_type_str(t: CashTransactionType) -> &'static str {
    match t {
        CashTransactionType::WithdrawalToWallet => "withdrawal_to_wallet",
        CashTransactionType::DepositFromWalletToBank => "deposit_from_wallet_to_bank",
        CashTransactionType::ExpenseFromWallet => "expense_from_wallet",
    }
}

fn parse_cash_type(s: &str) -> Option<CashTransactionType> {
    match s {
        "withdrawal_to_wallet" => Some(CashTransactionType::WithdrawalToWallet),
        "deposit_from_wallet_to_bank" => Some(CashTransactionType::DepositFromWalletToBank),
        "expense_from_wallet" => Some(CashTransactionType::ExpenseFromWallet),
        _ => None,
    }
}
