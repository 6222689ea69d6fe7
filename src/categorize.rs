// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::models::{Category, CategoryRule, FinancialPriority};

/// Reject a malformed regex at rule-creation time, so the skip-and-log
/// path during categorization only ever sees rules that were valid once.
pub fn validate_rule_pattern(pattern: &str, is_regex: bool) -> Result<()> {
    if is_regex {
        Regex::new(pattern).map_err(|source| EngineError::InvalidRule {
            pattern: pattern.to_string(),
            source,
        })?;
    }
    Ok(())
}

/// Result of categorizing a description. `category_id` is `None` when the
/// match only produced a name the user has no category for, or when nothing
/// matched at all (priority then defaults to wants).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryMatch {
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub priority: FinancialPriority,
}

/// Builtin merchant-name keywords -> (category name, priority).
static MERCHANT_KEYWORDS: Lazy<Vec<(&[&str], &str, FinancialPriority)>> = Lazy::new(|| {
    vec![
        (
            &["NETFLIX", "SPOTIFY", "DISNEY+", "HULU", "PRIME VIDEO"][..],
            "Entertainment",
            FinancialPriority::Wants,
        ),
        (
            &["AMAZON", "AMZN", "EBAY", "ALIEXPRESS"][..],
            "Shopping",
            FinancialPriority::Wants,
        ),
        (
            &["STARBUCKS", "MCDONALD", "BURGER KING", "KFC", "DOMINO"][..],
            "Dining",
            FinancialPriority::Wants,
        ),
        (
            &["UBER", "LYFT", "TAXI", "METRO", "TRANSIT"][..],
            "Transport",
            FinancialPriority::Needs,
        ),
        (
            &["WALMART", "TESCO", "CARREFOUR", "ALDI", "LIDL", "COSTCO"][..],
            "Groceries",
            FinancialPriority::Needs,
        ),
        (
            &["SHELL", "ESSO", "CHEVRON", "TEXACO", "PETROL"][..],
            "Fuel",
            FinancialPriority::Needs,
        ),
        (
            &["AIRBNB", "BOOKING.COM", "EXPEDIA", "HOTEL"][..],
            "Travel",
            FinancialPriority::Wants,
        ),
    ]
});

/// Fallback patterns for recurring utility/insurance/connectivity/health
/// bills that rarely carry a recognizable merchant name.
static BILL_PATTERNS: Lazy<Vec<(Regex, &str, FinancialPriority)>> = Lazy::new(|| {
    [
        (
            r"(ELECTRIC|POWER CO|GAS BILL|WATER BILL|UTILIT)",
            "Utilities",
            FinancialPriority::Needs,
        ),
        (
            r"(INSURANCE|ASSURANCE|MUTUAL)",
            "Insurance",
            FinancialPriority::Needs,
        ),
        (
            r"(INTERNET|BROADBAND|MOBILE PLAN|TELECOM|WIRELESS)",
            "Internet & Phone",
            FinancialPriority::Needs,
        ),
        (
            r"(PHARMAC|CLINIC|HOSPITAL|DENTAL|MEDICAL)",
            "Health",
            FinancialPriority::Needs,
        ),
    ]
    .into_iter()
    .filter_map(|(pat, name, prio)| match Regex::new(pat) {
        Ok(re) => Some((re, name, prio)),
        Err(_) => None,
    })
    .collect()
});

/// Assign a category to a transaction description.
///
/// Tiers, first match wins: user rules in ascending rule priority, the
/// builtin merchant table, the builtin bill patterns, then a direct
/// substring match of an existing category's own name. Matching is done
/// against the uppercased description throughout.
pub fn categorize(
    description: &str,
    user_rules: &[CategoryRule],
    categories: &[Category],
) -> CategoryMatch {
    let haystack = description.to_uppercase();

    if let Some(m) = match_user_rules(&haystack, user_rules, categories) {
        return m;
    }

    for (keywords, name, priority) in MERCHANT_KEYWORDS.iter() {
        if keywords.iter().any(|k| haystack.contains(k)) {
            return resolve_by_name(name, *priority, categories);
        }
    }

    for (re, name, priority) in BILL_PATTERNS.iter() {
        if re.is_match(&haystack) {
            return resolve_by_name(name, *priority, categories);
        }
    }

    for cat in categories {
        if !cat.name.is_empty() && haystack.contains(&cat.name.to_uppercase()) {
            return CategoryMatch {
                category_id: Some(cat.id),
                category_name: Some(cat.name.clone()),
                priority: cat.priority,
            };
        }
    }

    CategoryMatch {
        category_id: None,
        category_name: None,
        priority: FinancialPriority::Wants,
    }
}

fn match_user_rules(
    haystack: &str,
    user_rules: &[CategoryRule],
    categories: &[Category],
) -> Option<CategoryMatch> {
    let mut rules: Vec<&CategoryRule> = user_rules.iter().collect();
    rules.sort_by_key(|r| r.priority);

    for rule in rules {
        let hit = if rule.is_regex {
            match Regex::new(&rule.pattern) {
                Ok(re) => re.is_match(haystack),
                Err(err) => {
                    // One bad rule must never block categorization of
                    // unrelated transactions.
                    tracing::warn!(
                        rule_id = rule.id,
                        pattern = %rule.pattern,
                        "skipping invalid rule regex: {err}"
                    );
                    false
                }
            }
        } else {
            haystack.contains(&rule.pattern.to_uppercase())
        };
        if hit {
            // A rule whose category has been deleted is skipped like an
            // invalid one; later rules still get their chance.
            match categories.iter().find(|c| c.id == rule.category_id) {
                Some(cat) => {
                    return Some(CategoryMatch {
                        category_id: Some(cat.id),
                        category_name: Some(cat.name.clone()),
                        priority: cat.priority,
                    });
                }
                None => {
                    tracing::warn!(
                        rule_id = rule.id,
                        category_id = rule.category_id,
                        "rule matched but its category no longer exists"
                    );
                }
            }
        }
    }
    None
}

fn resolve_by_name(
    name: &str,
    fallback_priority: FinancialPriority,
    categories: &[Category],
) -> CategoryMatch {
    match categories
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
    {
        Some(cat) => CategoryMatch {
            category_id: Some(cat.id),
            category_name: Some(cat.name.clone()),
            priority: cat.priority,
        },
        None => CategoryMatch {
            category_id: None,
            category_name: Some(name.to_string()),
            priority: fallback_priority,
        },
    }
}
