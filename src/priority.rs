// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{
    Category, CustomBudget, EffectivePriority, FinancialPriority, Transaction, TransactionType,
};

/// The bucket a transaction is actually counted against.
///
/// A "Needs"-categorized purchase made inside a discretionary trip budget
/// counts against Wants, not Needs: the budget context dominates the
/// category tag. System budgets kept in the same collection do not trigger
/// the override.
pub fn effective_priority(
    tx: &Transaction,
    categories: &[Category],
    custom_budgets: &[CustomBudget],
) -> EffectivePriority {
    if tx.r#type == TransactionType::Income {
        return EffectivePriority::Income;
    }

    if let Some(budget_id) = tx.custom_budget_id {
        let linked = custom_budgets.iter().find(|b| b.id == budget_id);
        if let Some(budget) = linked {
            if !budget.is_system {
                return EffectivePriority::Wants;
            }
        }
    }

    let category_priority = tx
        .category_id
        .and_then(|id| categories.iter().find(|c| c.id == id))
        .map(|c| c.priority)
        .or(tx.financial_priority);

    match category_priority {
        Some(FinancialPriority::Needs) => EffectivePriority::Needs,
        Some(FinancialPriority::Wants) => EffectivePriority::Wants,
        Some(FinancialPriority::Savings) => EffectivePriority::Savings,
        None => EffectivePriority::Uncategorized,
    }
}
