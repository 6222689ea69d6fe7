// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
}

/// The needs/wants/savings bucket a category (or transaction) is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinancialPriority {
    Needs,
    Wants,
    Savings,
}

impl FinancialPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinancialPriority::Needs => "needs",
            FinancialPriority::Wants => "wants",
            FinancialPriority::Savings => "savings",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "needs" => Some(FinancialPriority::Needs),
            "wants" => Some(FinancialPriority::Wants),
            "savings" => Some(FinancialPriority::Savings),
            _ => None,
        }
    }
}

/// The bucket a transaction is actually counted against, after the
/// custom-budget override has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectivePriority {
    Needs,
    Wants,
    Savings,
    Income,
    Uncategorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashTransactionType {
    /// Bank -> physical wallet. Increases the wallet balance.
    WithdrawalToWallet,
    /// Physical wallet -> bank. Decreases the wallet balance.
    DepositFromWalletToBank,
    /// An expense paid from the wallet. Decreases the wallet balance and is
    /// paid by construction; it never counts as digital spend.
    ExpenseFromWallet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    Planned,
    Active,
    Completed,
}

/// One (currency, amount) pair, used for wallet balances and for a custom
/// budget's per-currency cash allocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyAmount {
    pub currency_code: String,
    pub amount: Decimal,
}

impl CurrencyAmount {
    pub fn new(currency_code: impl Into<String>, amount: Decimal) -> Self {
        Self {
            currency_code: currency_code.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub r#type: TransactionType,
    /// Amount in the base/reference currency.
    pub amount: Decimal,
    pub original_amount: Decimal,
    pub original_currency: String,
    pub exchange_rate_used: Option<Decimal>,
    pub description: String,
    pub category_id: Option<i64>,
    pub financial_priority: Option<FinancialPriority>,
    pub date: NaiveDate,
    pub is_paid: bool,
    pub paid_date: Option<NaiveDate>,
    pub custom_budget_id: Option<i64>,
    pub is_cash_transaction: bool,
    pub cash_transaction_type: Option<CashTransactionType>,
    pub cash_amount: Option<Decimal>,
    pub cash_currency: Option<String>,
}

impl Transaction {
    pub fn is_expense(&self) -> bool {
        self.r#type == TransactionType::Expense
    }

    /// A cash expense paid straight out of the physical wallet. Counted once,
    /// against the wallet, never as digital spend.
    pub fn is_wallet_expense(&self) -> bool {
        self.is_cash_transaction
            && self.cash_transaction_type == Some(CashTransactionType::ExpenseFromWallet)
    }
}

/// A partial update to a transaction. Fields left as `None` keep the current
/// value; the merged result is what gets validated and written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub category_id: Option<Option<i64>>,
    pub financial_priority: Option<Option<FinancialPriority>>,
    pub date: Option<NaiveDate>,
    pub is_paid: Option<bool>,
    pub paid_date: Option<Option<NaiveDate>>,
    pub custom_budget_id: Option<Option<i64>>,
}

impl TransactionPatch {
    /// Merge the patch into a copy of `tx`. Marking a transaction paid
    /// without a paid date stamps it with the transaction date; marking it
    /// unpaid clears the paid date.
    pub fn apply(&self, tx: &Transaction) -> Transaction {
        let mut out = tx.clone();
        if let Some(v) = self.amount {
            out.amount = v;
        }
        if let Some(ref v) = self.description {
            out.description = v.clone();
        }
        if let Some(v) = self.category_id {
            out.category_id = v;
        }
        if let Some(v) = self.financial_priority {
            out.financial_priority = v;
        }
        if let Some(v) = self.date {
            out.date = v;
        }
        if let Some(v) = self.is_paid {
            out.is_paid = v;
            if !v {
                out.paid_date = None;
            }
        }
        if let Some(v) = self.paid_date {
            out.paid_date = v;
        }
        if out.is_paid && out.paid_date.is_none() {
            out.paid_date = Some(out.date);
        }
        if let Some(v) = self.custom_budget_id {
            out.custom_budget_id = v;
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub priority: FinancialPriority,
    pub color: String,
    pub icon: String,
}

/// A user-defined categorization rule, evaluated in ascending `priority`
/// order ahead of the builtin tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: i64,
    pub pattern: String,
    pub is_regex: bool,
    pub priority: i64,
    pub category_id: i64,
}

/// One of the three always-present Needs/Wants/Savings budgets for a period,
/// sized from the user's budget goals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemBudget {
    pub id: i64,
    pub priority: FinancialPriority,
    pub budget_amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// A user-created, time-boxed budget (e.g. a trip), with a digital
/// allocation in the base currency and optional per-currency cash
/// allocations drawn from the wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomBudget {
    pub id: i64,
    pub name: String,
    pub allocated_amount: Decimal,
    pub cash_allocations: Vec<CurrencyAmount>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BudgetStatus,
    /// Pre-completion plan, snapshotted when the budget is completed so a
    /// reactivation can restore it.
    pub original_allocated_amount: Option<Decimal>,
    /// System budgets live in the same collection in the backing store;
    /// the override in `priority` ignores them.
    pub is_system: bool,
}

impl CustomBudget {
    /// Status with the planned->active date transition applied. Completion
    /// is a manual transition and is never undone here.
    pub fn effective_status(&self, today: NaiveDate) -> BudgetStatus {
        match self.status {
            BudgetStatus::Planned if self.start_date <= today => BudgetStatus::Active,
            s => s,
        }
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && self.end_date >= start
    }

    /// Freeze the budget to what was actually spent, keeping the plan
    /// around for reactivation.
    pub fn complete(&mut self, actual_spent: Decimal) {
        self.original_allocated_amount = Some(self.allocated_amount);
        self.allocated_amount = actual_spent;
        self.status = BudgetStatus::Completed;
    }

    pub fn reactivate(&mut self) {
        if let Some(planned) = self.original_allocated_amount.take() {
            self.allocated_amount = planned;
        }
        self.status = BudgetStatus::Active;
    }

    /// The cash allocation for one currency; zero when the budget has no
    /// entry for it.
    pub fn cash_allocation(&self, currency: &str) -> Decimal {
        self.cash_allocations
            .iter()
            .find(|a| a.currency_code == currency)
            .map(|a| a.amount)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Category sub-split of a custom budget's digital allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomBudgetAllocation {
    pub id: i64,
    pub custom_budget_id: i64,
    pub category_id: i64,
    pub allocated_amount: Decimal,
}

/// The physical cash wallet: one per user, holding balances in several
/// currencies at once. `version` backs the optimistic write in `db`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashWallet {
    pub id: i64,
    pub balances: Vec<CurrencyAmount>,
    pub version: i64,
}

impl CashWallet {
    pub fn balance(&self, currency: &str) -> Decimal {
        self.balances
            .iter()
            .find(|b| b.currency_code == currency)
            .map(|b| b.amount)
            .unwrap_or(Decimal::ZERO)
    }
}

/// A 50/30/20-style target that sizes one system budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetGoal {
    pub id: i64,
    pub priority: FinancialPriority,
    pub target_percentage: Decimal,
    pub target_amount: Option<Decimal>,
    pub is_absolute: bool,
}

impl BudgetGoal {
    /// The budget amount this goal produces for a month with the given
    /// income: the absolute target, or a percentage of income.
    pub fn sized_amount(&self, monthly_income: Decimal) -> Decimal {
        if self.is_absolute {
            self.target_amount.unwrap_or(Decimal::ZERO)
        } else {
            (monthly_income * self.target_percentage / Decimal::ONE_HUNDRED).round_dp(2)
        }
    }
}

/// A dated snapshot of one currency's rate against the reference currency.
/// `to_currency` is always the reference; cross rates are triangulated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub id: i64,
    pub date: NaiveDate,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: Decimal,
}

/// Explicit per-call configuration. Every calculator takes this by
/// reference instead of reading ambient settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    pub base_currency: String,
    /// Decimal places for converted amounts at the money boundary.
    pub amount_dp: u32,
    /// Decimal places for derived direct rates.
    pub rate_dp: u32,
    /// Maximum day-distance for a rate snapshot to be reused.
    pub rate_window_days: i64,
}

impl UserContext {
    pub fn new(base_currency: impl Into<String>) -> Self {
        Self {
            base_currency: base_currency.into(),
            amount_dp: 2,
            rate_dp: 6,
            rate_window_days: 14,
        }
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::new("JPY")
    }
}
