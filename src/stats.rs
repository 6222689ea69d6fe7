// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::models::{
    BudgetGoal, BudgetStatus, Category, CustomBudget, EffectivePriority, FinancialPriority,
    SystemBudget, Transaction,
};
use crate::priority::effective_priority;

/// Inclusive reporting window: a month, or a budget's own span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The calendar month containing `day`.
    pub fn month_of(day: NaiveDate) -> Self {
        let start = day.with_day(1).unwrap_or(day);
        let end = start
            .checked_add_months(chrono::Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or(day);
        Self { start, end }
    }

    pub fn span_of(budget: &CustomBudget) -> Self {
        Self {
            start: budget.start_date,
            end: budget.end_date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Allocated/paid/unpaid/remaining for one channel (digital, or one cash
/// currency). `remaining` is never clamped: callers render "over by
/// |remaining|" when it goes negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStats {
    pub allocated: Decimal,
    pub paid: Decimal,
    pub unpaid: Decimal,
    pub remaining: Decimal,
    pub percentage_used: Decimal,
}

impl ChannelStats {
    fn compute(allocated: Decimal, paid: Decimal, unpaid: Decimal) -> Self {
        Self {
            allocated,
            paid,
            unpaid,
            remaining: allocated - (paid + unpaid),
            percentage_used: percentage(paid + unpaid, allocated),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashCurrencyStats {
    pub currency_code: String,
    #[serde(flatten)]
    pub stats: ChannelStats,
}

/// Stats for one custom budget over a reporting window: the digital channel
/// against `allocated_amount`, and each cash currency against its own
/// `cash_allocations` entry. There is no cross-currency netting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomBudgetStats {
    pub custom_budget_id: i64,
    pub digital: ChannelStats,
    pub cash: Vec<CashCurrencyStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemBudgetStats {
    pub priority: FinancialPriority,
    pub budget_amount: Decimal,
    pub paid: Decimal,
    pub unpaid: Decimal,
    pub remaining: Decimal,
    pub percentage_used: Decimal,
}

fn percentage(used: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        Decimal::ZERO
    } else {
        (used / total * Decimal::ONE_HUNDRED).round_dp(2)
    }
}

/// Paid spend counts by `paid_date` (falling back to the transaction date
/// for legacy rows without one); unpaid spend has no paid date and counts
/// by transaction date.
fn paid_in_window(tx: &Transaction, window: DateWindow) -> bool {
    tx.is_paid && window.contains(tx.paid_date.unwrap_or(tx.date))
}

fn unpaid_in_window(tx: &Transaction, window: DateWindow) -> bool {
    !tx.is_paid && window.contains(tx.date)
}

pub fn find_custom_budget(budgets: &[CustomBudget], id: i64) -> Result<&CustomBudget> {
    budgets
        .iter()
        .find(|b| b.id == id)
        .ok_or(EngineError::BudgetNotFound(id))
}

/// Stats for the custom budget with `budget_id` over `window`.
///
/// Digital and cash are fully independent: a wallet expense is counted once
/// against its cash currency and never inflates digital spend.
pub fn custom_budget_stats(
    budgets: &[CustomBudget],
    budget_id: i64,
    transactions: &[Transaction],
    window: DateWindow,
) -> Result<CustomBudgetStats> {
    let budget = find_custom_budget(budgets, budget_id)?;

    let mine: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.custom_budget_id == Some(budget.id))
        .collect();

    let mut digital_paid = Decimal::ZERO;
    let mut digital_unpaid = Decimal::ZERO;
    for tx in mine.iter().filter(|t| t.is_expense() && !t.is_wallet_expense()) {
        if paid_in_window(tx, window) {
            digital_paid += tx.amount;
        } else if unpaid_in_window(tx, window) {
            digital_unpaid += tx.amount;
        }
    }
    let digital = ChannelStats::compute(budget.allocated_amount, digital_paid, digital_unpaid);

    // Cash is tracked per currency. Currencies come from the allocation
    // list plus any currency actually spent in, so spend against a currency
    // with no allocation shows up as zero-allocated rather than vanishing.
    let mut currencies: Vec<String> = budget
        .cash_allocations
        .iter()
        .map(|a| a.currency_code.clone())
        .collect();
    for tx in mine.iter().filter(|t| t.is_wallet_expense()) {
        if let Some(ccy) = &tx.cash_currency {
            if !currencies.contains(ccy) {
                currencies.push(ccy.clone());
            }
        }
    }

    let mut cash = Vec::new();
    for ccy in currencies {
        let allocated = budget.cash_allocation(&ccy);
        let mut spent = Decimal::ZERO;
        for tx in mine
            .iter()
            .filter(|t| t.is_wallet_expense() && t.cash_currency.as_deref() == Some(ccy.as_str()))
        {
            // Cash is paid by construction; window by paid date.
            if paid_in_window(tx, window) {
                spent += tx.cash_amount.unwrap_or(Decimal::ZERO);
            }
        }
        cash.push(CashCurrencyStats {
            currency_code: ccy,
            stats: ChannelStats::compute(allocated, spent, Decimal::ZERO),
        });
    }

    Ok(CustomBudgetStats {
        custom_budget_id: budget.id,
        digital,
        cash,
    })
}

/// Lifetime digital figures for one custom budget: paid spend, unpaid
/// spend, both unwindowed. Used by the system-wants projection.
fn lifetime_digital(budget: &CustomBudget, transactions: &[Transaction]) -> (Decimal, Decimal) {
    let mut paid = Decimal::ZERO;
    let mut unpaid = Decimal::ZERO;
    for tx in transactions.iter().filter(|t| {
        t.custom_budget_id == Some(budget.id) && t.is_expense() && !t.is_wallet_expense()
    }) {
        if tx.is_paid {
            paid += tx.amount;
        } else {
            unpaid += tx.amount;
        }
    }
    (paid, unpaid)
}

/// Stats for one system budget over a date window.
///
/// Needs and savings sum direct, non-custom-budget expenses resolving to
/// that bucket (savings counts paid spend only; unpaid savings is
/// deliberately not projected forward). Wants additionally folds in every
/// overlapping custom budget: active budgets contribute their unspent
/// allocation plus unpaid digital spend, completed budgets only the unpaid
/// residual, their allocation having been frozen to actual spend. The
/// projection intentionally includes budgets whose range extends past the
/// window.
pub fn system_budget_stats(
    budget: &SystemBudget,
    transactions: &[Transaction],
    categories: &[Category],
    custom_budgets: &[CustomBudget],
    window: DateWindow,
) -> SystemBudgetStats {
    let target = match budget.priority {
        FinancialPriority::Needs => EffectivePriority::Needs,
        FinancialPriority::Wants => EffectivePriority::Wants,
        FinancialPriority::Savings => EffectivePriority::Savings,
    };

    let mut paid = Decimal::ZERO;
    let mut unpaid = Decimal::ZERO;

    for tx in transactions
        .iter()
        .filter(|t| t.is_expense() && t.custom_budget_id.is_none() && !t.is_wallet_expense())
    {
        if effective_priority(tx, categories, custom_budgets) != target {
            continue;
        }
        if paid_in_window(tx, window) {
            paid += tx.amount;
        } else if unpaid_in_window(tx, window) {
            if budget.priority != FinancialPriority::Savings {
                unpaid += tx.amount;
            }
        }
    }

    if budget.priority == FinancialPriority::Wants {
        for cb in custom_budgets
            .iter()
            .filter(|b| !b.is_system && b.overlaps(window.start, window.end))
        {
            let (cb_paid, cb_unpaid) = lifetime_digital(cb, transactions);
            match cb.effective_status(window.end) {
                BudgetStatus::Completed => {
                    unpaid += cb_unpaid;
                }
                BudgetStatus::Active | BudgetStatus::Planned => {
                    unpaid += (cb.allocated_amount - cb_paid) + cb_unpaid;
                }
            }
        }
    }

    SystemBudgetStats {
        priority: budget.priority,
        budget_amount: budget.budget_amount,
        paid,
        unpaid,
        remaining: budget.budget_amount - (paid + unpaid),
        percentage_used: percentage(paid + unpaid, budget.budget_amount),
    }
}

/// Size the three system budgets for a period from the user's goals.
/// Regenerated whenever goal percentages or monthly income change.
pub fn size_system_budgets(
    goals: &[BudgetGoal],
    monthly_income: Decimal,
    window: DateWindow,
) -> Vec<SystemBudget> {
    [
        FinancialPriority::Needs,
        FinancialPriority::Wants,
        FinancialPriority::Savings,
    ]
    .into_iter()
    .map(|priority| {
        let amount = goals
            .iter()
            .find(|g| g.priority == priority)
            .map(|g| g.sized_amount(monthly_income))
            .unwrap_or(Decimal::ZERO);
        SystemBudget {
            id: 0,
            priority,
            budget_amount: amount,
            start_date: window.start,
            end_date: window.end,
        }
    })
    .collect()
}
