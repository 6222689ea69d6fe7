// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors the reconciliation engine can surface to its callers.
///
/// Everything here is detected before any write happens: a failing
/// operation leaves the wallet and the ledger untouched.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("insufficient {currency} balance: requested {requested}, available {available}")]
    InsufficientBalance {
        currency: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("no exchange rate for {currency} within {window_days} days of {date}")]
    RateUnavailable {
        currency: String,
        date: NaiveDate,
        window_days: i64,
    },

    #[error("custom budget {0} not found")]
    BudgetNotFound(i64),

    #[error("allocation {0} not found")]
    AllocationNotFound(i64),

    #[error("transaction {0} not found")]
    TransactionNotFound(i64),

    /// The wallet row changed under us between read and write. Retryable.
    #[error("cash wallet was modified concurrently (version {expected})")]
    WalletConflict { expected: i64 },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Rejected at rule creation. During categorization a bad pattern is
    /// logged and skipped instead.
    #[error("invalid rule pattern '{pattern}': {source}")]
    InvalidRule {
        pattern: String,
        source: regex::Error,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
