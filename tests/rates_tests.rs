// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use cashbook::error::EngineError;
use cashbook::models::{ExchangeRate, UserContext};
use cashbook::rates::{ConversionOutcome, Converter, RateLookup, RateStore};
use chrono::NaiveDate;
use rust_decimal::Decimal;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn snapshot(id: i64, d: NaiveDate, ccy: &str, rate: &str) -> ExchangeRate {
    ExchangeRate {
        id,
        date: d,
        from_currency: ccy.to_string(),
        to_currency: "JPY".to_string(),
        rate: rate.parse().unwrap(),
    }
}

fn setup() -> (RateStore, UserContext) {
    let ctx = UserContext::new("JPY");
    let store = RateStore::new(vec![
        snapshot(1, date(2025, 6, 1), "USD", "150"),
        snapshot(2, date(2025, 6, 1), "EUR", "160"),
        snapshot(3, date(2025, 6, 1), "GBP", "190"),
    ]);
    (store, ctx)
}

#[test]
fn same_currency_is_identity() {
    let (store, ctx) = setup();
    let conv = Converter::new(&store, &ctx);
    let res = conv
        .convert(Decimal::new(12345, 2), "USD", "USD", date(2025, 6, 3))
        .unwrap();
    assert_eq!(res.converted_amount, Decimal::new(12345, 2));
    assert_eq!(res.exchange_rate_used, Decimal::ONE);
}

#[test]
fn triangulates_through_reference_currency() {
    let (store, ctx) = setup();
    let conv = Converter::new(&store, &ctx);
    // 100 USD -> JPY = 15000 -> EUR = 15000 / 160 = 93.75
    let res = conv
        .convert(Decimal::from(100), "USD", "EUR", date(2025, 6, 3))
        .unwrap();
    assert_eq!(res.converted_amount, Decimal::new(9375, 2));
    assert_eq!(res.exchange_rate_used, Decimal::new(937500, 6));
}

#[test]
fn converts_to_and_from_reference() {
    let (store, ctx) = setup();
    let conv = Converter::new(&store, &ctx);
    let to_ref = conv
        .convert(Decimal::from(2), "USD", "JPY", date(2025, 6, 3))
        .unwrap();
    assert_eq!(to_ref.converted_amount, Decimal::from(300));

    let from_ref = conv
        .convert(Decimal::from(300), "JPY", "USD", date(2025, 6, 3))
        .unwrap();
    assert_eq!(from_ref.converted_amount, Decimal::from(2));
}

#[test]
fn round_trip_within_rounding_tolerance() {
    let (store, ctx) = setup();
    let conv = Converter::new(&store, &ctx);
    let x = Decimal::new(47711, 2); // 477.11
    let there = conv
        .convert(x, "USD", "GBP", date(2025, 6, 3))
        .unwrap()
        .converted_amount;
    let back = conv
        .convert(there, "GBP", "USD", date(2025, 6, 3))
        .unwrap()
        .converted_amount;
    assert!((back - x).abs() <= Decimal::new(1, 2), "got {back}");
}

#[test]
fn derived_rate_rounds_to_six_places() {
    let ctx = UserContext::new("JPY");
    let store = RateStore::new(vec![
        snapshot(1, date(2025, 6, 1), "USD", "151"),
        snapshot(2, date(2025, 6, 1), "EUR", "163"),
    ]);
    let conv = Converter::new(&store, &ctx);
    let res = conv
        .convert(Decimal::from(100), "USD", "EUR", date(2025, 6, 1))
        .unwrap();
    // 151/163 = 0.92638036..., kept at full precision for the amount but
    // reported rounded to 6 places.
    assert_eq!(res.exchange_rate_used, Decimal::new(926380, 6));
    assert_eq!(res.converted_amount, Decimal::new(9264, 2));
}

#[test]
fn nearest_absolute_distance_wins() {
    let ctx = UserContext::new("JPY");
    let target = date(2025, 6, 15);
    let store = RateStore::new(vec![
        snapshot(1, date(2025, 5, 26), "USD", "140"), // -20 days
        snapshot(2, date(2025, 6, 5), "USD", "145"),  // -10 days
        snapshot(3, date(2025, 6, 18), "USD", "150"), // +3 days
    ]);
    match store.rate_for(&ctx, "USD", target) {
        RateLookup::Fresh { rate, age_days } => {
            assert_eq!(rate, Decimal::from(150));
            assert_eq!(age_days, 3);
        }
        other => panic!("expected fresh lookup, got {other:?}"),
    }
}

#[test]
fn freshness_boundary_is_fourteen_days() {
    let ctx = UserContext::new("JPY");
    let target = date(2025, 6, 15);

    let at_boundary = RateStore::new(vec![snapshot(1, date(2025, 6, 1), "USD", "150")]);
    assert!(matches!(
        at_boundary.rate_for(&ctx, "USD", target),
        RateLookup::Fresh { age_days: 14, .. }
    ));

    let past_boundary = RateStore::new(vec![snapshot(1, date(2025, 5, 31), "USD", "150")]);
    assert!(matches!(
        past_boundary.rate_for(&ctx, "USD", target),
        RateLookup::Stale { age_days: 15, .. }
    ));
}

#[test]
fn reference_currency_rate_is_one() {
    let ctx = UserContext::new("JPY");
    let store = RateStore::default();
    match store.rate_for(&ctx, "JPY", date(2025, 6, 15)) {
        RateLookup::Fresh { rate, age_days } => {
            assert_eq!(rate, Decimal::ONE);
            assert_eq!(age_days, 0);
        }
        other => panic!("expected fresh unit rate, got {other:?}"),
    }
}

#[test]
fn mandatory_conversion_fails_without_rate() {
    let (store, ctx) = setup();
    let conv = Converter::new(&store, &ctx);
    let err = conv
        .convert(Decimal::from(10), "CHF", "JPY", date(2025, 6, 3))
        .unwrap_err();
    match err {
        EngineError::RateUnavailable { currency, .. } => assert_eq!(currency, "CHF"),
        other => panic!("expected RateUnavailable, got {other:?}"),
    }
}

#[test]
fn deferred_conversion_signals_refresh() {
    let ctx = UserContext::new("JPY");
    let store = RateStore::new(vec![snapshot(1, date(2025, 1, 1), "USD", "150")]);
    let conv = Converter::new(&store, &ctx);
    match conv.try_convert(Decimal::from(10), "USD", "JPY", date(2025, 6, 15)) {
        ConversionOutcome::NeedsRefresh { currency } => assert_eq!(currency, "USD"),
        other => panic!("expected refresh signal, got {other:?}"),
    }
}
