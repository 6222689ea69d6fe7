// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::models::{ExchangeRate, UserContext};

/// Dated rate snapshots (currency -> reference currency), answering
/// "closest rate within N days" queries.
///
/// Snapshots are whatever the external rate-fetch integration produced;
/// the store only selects among them, it never fetches.
#[derive(Debug, Default)]
pub struct RateStore {
    snapshots: Vec<ExchangeRate>,
}

/// Outcome of a rate lookup for `(currency, date)`.
#[derive(Debug, Clone, PartialEq)]
pub enum RateLookup {
    /// Nearest snapshot is within the freshness window.
    Fresh { rate: Decimal, age_days: i64 },
    /// A snapshot exists but the nearest one is too far from the requested
    /// date to reuse; the caller should fetch a new one.
    Stale { rate: Decimal, age_days: i64 },
    /// No snapshot at all for this currency.
    Missing,
}

impl RateStore {
    pub fn new(snapshots: Vec<ExchangeRate>) -> Self {
        Self { snapshots }
    }

    pub fn insert(&mut self, snapshot: ExchangeRate) {
        self.snapshots.push(snapshot);
    }

    /// Resolve the rate for `(currency, date)` by nearest absolute
    /// day-distance over all snapshots for that currency. "Most recent
    /// before date" is deliberately not the rule: a snapshot three days
    /// after the date beats one ten days before it.
    pub fn rate_for(&self, ctx: &UserContext, currency: &str, date: NaiveDate) -> RateLookup {
        if currency == ctx.base_currency {
            return RateLookup::Fresh {
                rate: Decimal::ONE,
                age_days: 0,
            };
        }
        let mut best: Option<(Decimal, i64)> = None;
        for snap in self
            .snapshots
            .iter()
            .filter(|s| s.from_currency == currency)
        {
            let dist = (snap.date.signed_duration_since(date)).num_days().abs();
            match best {
                Some((_, d)) if d <= dist => {}
                _ => best = Some((snap.rate, dist)),
            }
        }
        match best {
            Some((rate, age_days)) if age_days <= ctx.rate_window_days => {
                RateLookup::Fresh { rate, age_days }
            }
            Some((rate, age_days)) => RateLookup::Stale { rate, age_days },
            None => RateLookup::Missing,
        }
    }
}

/// A completed conversion at the canonical money boundary: the amount is
/// rounded to `amount_dp`, the derived direct rate to `rate_dp`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub converted_amount: Decimal,
    pub exchange_rate_used: Decimal,
}

/// Soft result for conversions that are allowed to defer: when a rate is
/// stale or missing the UI tier can trigger a refresh and resubmit.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    Converted(Conversion),
    NeedsRefresh { currency: String },
}

/// Triangulates between any two currencies through the reference currency.
/// Direct cross rates are never looked up.
pub struct Converter<'a> {
    store: &'a RateStore,
    ctx: &'a UserContext,
}

impl<'a> Converter<'a> {
    pub fn new(store: &'a RateStore, ctx: &'a UserContext) -> Self {
        Self { store, ctx }
    }

    /// Mandatory conversion: the transaction is being finalized, so a stale
    /// or missing rate is a hard `RateUnavailable`.
    pub fn convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        date: NaiveDate,
    ) -> Result<Conversion> {
        match self.try_convert(amount, from, to, date) {
            ConversionOutcome::Converted(c) => Ok(c),
            ConversionOutcome::NeedsRefresh { currency } => Err(EngineError::RateUnavailable {
                currency,
                date,
                window_days: self.ctx.rate_window_days,
            }),
        }
    }

    /// Deferred conversion: stale or missing rates come back as a
    /// `NeedsRefresh` signal instead of an error.
    pub fn try_convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        date: NaiveDate,
    ) -> ConversionOutcome {
        if from == to {
            return ConversionOutcome::Converted(Conversion {
                converted_amount: amount,
                exchange_rate_used: Decimal::ONE,
            });
        }
        let from_rate = match self.fresh_rate(from, date) {
            Ok(r) => r,
            Err(currency) => return ConversionOutcome::NeedsRefresh { currency },
        };
        let to_rate = match self.fresh_rate(to, date) {
            Ok(r) => r,
            Err(currency) => return ConversionOutcome::NeedsRefresh { currency },
        };

        // amount x rate(from->REF) x (1 / rate(to->REF)), full precision
        // until the final rounding.
        let direct_rate = from_rate / to_rate;
        let converted = (amount * direct_rate).round_dp(self.ctx.amount_dp);
        ConversionOutcome::Converted(Conversion {
            converted_amount: converted,
            exchange_rate_used: direct_rate.round_dp(self.ctx.rate_dp),
        })
    }

    fn fresh_rate(&self, currency: &str, date: NaiveDate) -> std::result::Result<Decimal, String> {
        match self.store.rate_for(self.ctx, currency, date) {
            RateLookup::Fresh { rate, .. } => Ok(rate),
            RateLookup::Stale { .. } | RateLookup::Missing => Err(currency.to_string()),
        }
    }
}
