// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::models::{CashTransactionType, CashWallet, CurrencyAmount, Transaction};

/// Entries at or below this are pruned from the balance map on write
/// instead of being kept as near-zero noise.
fn prune_threshold() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

/// In-memory view of one wallet's per-currency balances. All mutations go
/// through this type so the sufficiency check always runs against the map
/// that is about to be written; persistence of the full map is a single
/// versioned write in `db`.
#[derive(Debug, Clone)]
pub struct CashWalletLedger {
    wallet: CashWallet,
}

impl CashWalletLedger {
    pub fn new(wallet: CashWallet) -> Self {
        Self { wallet }
    }

    pub fn balance(&self, currency: &str) -> Decimal {
        self.wallet.balance(currency)
    }

    pub fn balances(&self) -> &[CurrencyAmount] {
        &self.wallet.balances
    }

    /// The wallet with pruning applied, ready for a full-map write.
    pub fn into_wallet(mut self) -> CashWallet {
        self.prune();
        self.wallet
    }

    pub fn deposit(&mut self, currency: &str, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "deposit amount must be positive, got {amount}"
            )));
        }
        self.apply(currency, amount);
        Ok(())
    }

    /// Fails before mutating anything when the requested amount exceeds the
    /// available balance for that currency.
    pub fn withdraw(&mut self, currency: &str, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "withdraw amount must be positive, got {amount}"
            )));
        }
        let available = self.balance(currency);
        if amount > available {
            return Err(EngineError::InsufficientBalance {
                currency: currency.to_string(),
                requested: amount,
                available,
            });
        }
        self.apply(currency, -amount);
        Ok(())
    }

    /// Signed adjustment; negative deltas run the same sufficiency check as
    /// `withdraw` so a balance can never go negative.
    pub fn adjust(&mut self, currency: &str, delta: Decimal) -> Result<()> {
        if delta < Decimal::ZERO {
            self.withdraw(currency, -delta)
        } else if delta > Decimal::ZERO {
            self.deposit(currency, delta)
        } else {
            Ok(())
        }
    }

    fn apply(&mut self, currency: &str, delta: Decimal) {
        match self
            .wallet
            .balances
            .iter_mut()
            .find(|b| b.currency_code == currency)
        {
            Some(entry) => entry.amount += delta,
            None => self
                .wallet
                .balances
                .push(CurrencyAmount::new(currency, delta)),
        }
        self.prune();
    }

    fn prune(&mut self) {
        let threshold = prune_threshold();
        self.wallet.balances.retain(|b| b.amount > threshold);
    }
}

/// The wallet delta a cash transaction applies when it is recorded.
/// Reverting or deleting the transaction applies the negation, always in
/// `cash_currency` for `cash_amount`, never the base-currency amount.
pub fn wallet_delta(tx: &Transaction) -> Option<(String, Decimal)> {
    if !tx.is_cash_transaction {
        return None;
    }
    let kind = tx.cash_transaction_type?;
    let currency = tx.cash_currency.clone()?;
    let amount = tx.cash_amount?;
    let delta = match kind {
        CashTransactionType::WithdrawalToWallet => amount,
        CashTransactionType::DepositFromWalletToBank => -amount,
        CashTransactionType::ExpenseFromWallet => -amount,
    };
    Some((currency, delta))
}

/// Delta to apply when a previously recorded cash transaction is deleted or
/// refunded: the exact reversal of `wallet_delta`.
pub fn reversal_delta(tx: &Transaction) -> Option<(String, Decimal)> {
    wallet_delta(tx).map(|(ccy, delta)| (ccy, -delta))
}

#[derive(Debug, Clone, Serialize)]
pub struct CashAllocationError {
    pub currency: String,
    pub requested: Decimal,
    pub available: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashAllocationCheck {
    pub valid: bool,
    pub errors: Vec<CashAllocationError>,
}

/// Check a new custom budget's requested cash allocations against what the
/// wallet actually holds, before anything is committed. Requests for the
/// same currency are summed first.
pub fn validate_cash_allocations(
    wallet: &CashWallet,
    requested: &[CurrencyAmount],
) -> CashAllocationCheck {
    let mut totals: Vec<CurrencyAmount> = Vec::new();
    for req in requested {
        match totals
            .iter_mut()
            .find(|t| t.currency_code == req.currency_code)
        {
            Some(t) => t.amount += req.amount,
            None => totals.push(req.clone()),
        }
    }

    let mut errors = Vec::new();
    for total in &totals {
        let available = wallet.balance(&total.currency_code);
        if total.amount > available {
            errors.push(CashAllocationError {
                currency: total.currency_code.clone(),
                requested: total.amount,
                available,
            });
        }
    }
    CashAllocationCheck {
        valid: errors.is_empty(),
        errors,
    }
}
