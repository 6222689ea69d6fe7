// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::Result;
use crate::models::{CustomBudget, CustomBudgetAllocation, Transaction};
use crate::stats::find_custom_budget;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAllocationStats {
    pub category_id: i64,
    pub allocated: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub percentage_used: Decimal,
}

/// Consumption of a custom budget's digital allocation, per category
/// sub-split. Spend against a category with no allocation record, or with
/// no category at all, lands in `unallocated_spent` instead of being
/// dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationStats {
    pub custom_budget_id: i64,
    /// Sum of all sub-allocations.
    pub total_allocated: Decimal,
    /// Digital budget not covered by any sub-allocation.
    pub unallocated: Decimal,
    pub unallocated_spent: Decimal,
    pub unallocated_remaining: Decimal,
    pub categories: Vec<CategoryAllocationStats>,
}

/// Per-category consumption against one custom budget's sub-allocations.
///
/// Only digital spend participates: wallet expenses are tracked against
/// the budget's cash allocations, not its category splits.
pub fn allocation_stats(
    budgets: &[CustomBudget],
    budget_id: i64,
    allocations: &[CustomBudgetAllocation],
    transactions: &[Transaction],
) -> Result<AllocationStats> {
    let budget = find_custom_budget(budgets, budget_id)?;

    let mine: Vec<&CustomBudgetAllocation> = allocations
        .iter()
        .filter(|a| a.custom_budget_id == budget.id)
        .collect();
    let total_allocated: Decimal = mine.iter().map(|a| a.allocated_amount).sum();
    let unallocated = budget.allocated_amount - total_allocated;

    let spend: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| {
            t.custom_budget_id == Some(budget.id) && t.is_expense() && !t.is_wallet_expense()
        })
        .collect();

    let mut categories = Vec::with_capacity(mine.len());
    let mut unallocated_spent = Decimal::ZERO;

    for alloc in &mine {
        let spent: Decimal = spend
            .iter()
            .filter(|t| t.category_id == Some(alloc.category_id))
            .map(|t| t.amount)
            .sum();
        let percentage_used = if alloc.allocated_amount.is_zero() {
            Decimal::ZERO
        } else {
            (spent / alloc.allocated_amount * Decimal::ONE_HUNDRED).round_dp(2)
        };
        categories.push(CategoryAllocationStats {
            category_id: alloc.category_id,
            allocated: alloc.allocated_amount,
            spent,
            remaining: alloc.allocated_amount - spent,
            percentage_used,
        });
    }

    for tx in &spend {
        let covered = tx
            .category_id
            .is_some_and(|cid| mine.iter().any(|a| a.category_id == cid));
        if !covered {
            unallocated_spent += tx.amount;
        }
    }

    Ok(AllocationStats {
        custom_budget_id: budget.id,
        total_allocated,
        unallocated,
        unallocated_spent,
        unallocated_remaining: unallocated - unallocated_spent,
        categories,
    })
}
