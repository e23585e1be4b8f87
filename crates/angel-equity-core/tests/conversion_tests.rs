use angel_equity_core::conversion::batch::{self, OutstandingSafe, RoundConversionRequest};
use angel_equity_core::conversion::safe::{
    self, ConversionInput, ConversionMethod, SafeConversionRequest, SafeTerms, SafeType,
};
use angel_equity_core::{ConversionOptions, EquityError};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn terms(cap: Option<Decimal>, discount: Option<Decimal>) -> SafeTerms {
    SafeTerms {
        investment_amount: dec!(100_000),
        safe_type: SafeType::PreMoney,
        valuation_cap: cap,
        discount_rate: discount,
        pro_rata_right: true,
        mfn_provision: false,
        qualified_financing_threshold: None,
    }
}

fn round() -> ConversionInput {
    ConversionInput {
        round_valuation: dec!(10_000_000),
        price_per_share: dec!(2.00),
        round_amount: dec!(2_500_000),
    }
}

fn opts() -> ConversionOptions {
    ConversionOptions::default()
}

// ===========================================================================
// Known-answer scenarios
// ===========================================================================

#[test]
fn test_cap_at_half_round_valuation_halves_price() {
    let out = safe::convert(&terms(Some(dec!(5_000_000)), None), &round(), &opts()).unwrap();
    assert_eq!(out.conversion_price, dec!(1.00));
    assert_eq!(out.shares, dec!(100_000));
    assert_eq!(out.method, ConversionMethod::ValuationCap);
}

#[test]
fn test_round_price_conversion_preserves_investment() {
    let out = safe::convert(&terms(None, None), &round(), &opts()).unwrap();
    assert_eq!(out.conversion_price, round().price_per_share);
    assert_eq!(out.shares * out.conversion_price, dec!(100_000));
}

#[test]
fn test_binding_mechanism_is_strictly_below_round_price() {
    for (cap, discount) in [
        (Some(dec!(5_000_000)), None),
        (None, Some(dec!(0.15))),
        (Some(dec!(9_000_000)), Some(dec!(0.05))),
    ] {
        let out = safe::convert(&terms(cap, discount), &round(), &opts()).unwrap();
        assert!(out.method != ConversionMethod::RoundPrice);
        assert!(out.conversion_price < round().price_per_share);
    }
}

// ===========================================================================
// Best-price selection
// ===========================================================================

#[test]
fn test_cap_and_discount_picks_lower_and_other_is_irrelevant() {
    // cap price = 6M * 2 / 10M = 1.20; discount price = 2 * 0.8 = 1.60
    let both = safe::convert(&terms(Some(dec!(6_000_000)), Some(dec!(0.20))), &round(), &opts())
        .unwrap();
    assert_eq!(both.conversion_price, dec!(1.20));

    let cap_only = safe::convert(&terms(Some(dec!(6_000_000)), None), &round(), &opts()).unwrap();
    assert_eq!(cap_only.conversion_price, both.conversion_price);
    assert_eq!(cap_only.shares, both.shares);

    // cap price = 9M * 2 / 10M = 1.80; discount wins at 1.60
    let both = safe::convert(&terms(Some(dec!(9_000_000)), Some(dec!(0.20))), &round(), &opts())
        .unwrap();
    assert_eq!(both.conversion_price, dec!(1.60));
    assert_eq!(both.method, ConversionMethod::Discount);

    let discount_only = safe::convert(&terms(None, Some(dec!(0.20))), &round(), &opts()).unwrap();
    assert_eq!(discount_only.conversion_price, both.conversion_price);
}

#[test]
fn test_cap_price_scales_with_cap_and_inversely_with_valuation() {
    let base = safe::convert(&terms(Some(dec!(4_000_000)), None), &round(), &opts()).unwrap();
    let double_cap = safe::convert(&terms(Some(dec!(8_000_000)), None), &round(), &opts()).unwrap();
    assert_eq!(double_cap.cap_price.unwrap(), base.cap_price.unwrap() * dec!(2));

    let mut richer = round();
    richer.round_valuation = dec!(20_000_000);
    let half = safe::convert(&terms(Some(dec!(4_000_000)), None), &richer, &opts()).unwrap();
    assert_eq!(half.cap_price.unwrap() * dec!(2), base.cap_price.unwrap());
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn test_threshold_gates_conversion() {
    let mut t = terms(Some(dec!(5_000_000)), None);
    t.qualified_financing_threshold = Some(dec!(3_000_000));
    match safe::convert(&t, &round(), &opts()) {
        Err(EquityError::IneligibleRound { threshold, .. }) => {
            assert_eq!(threshold, dec!(3_000_000))
        }
        other => panic!("expected IneligibleRound, got {other:?}"),
    }
}

#[test]
fn test_missing_cap_and_round_price_is_invalid() {
    let bad_round = ConversionInput {
        round_valuation: dec!(-1),
        price_per_share: dec!(-1),
        round_amount: dec!(1_000_000),
    };
    assert!(matches!(
        safe::convert(&terms(Some(dec!(5_000_000)), None), &bad_round, &opts()),
        Err(EquityError::InvalidTerms { .. })
    ));
}

// ===========================================================================
// Determinism and envelope
// ===========================================================================

#[test]
fn test_repeated_conversion_is_identical() {
    let t = terms(Some(dec!(7_000_000)), Some(dec!(0.175)));
    let opts = ConversionOptions {
        share_quantum: Some(dec!(1)),
    };
    let first = safe::convert(&t, &round(), &opts).unwrap();
    for _ in 0..10 {
        assert_eq!(safe::convert(&t, &round(), &opts).unwrap(), first);
    }
}

#[test]
fn test_envelope_from_json_request() {
    let request: SafeConversionRequest = serde_json::from_value(serde_json::json!({
        "terms": {
            "investment_amount": "250000",
            "type": "POST_MONEY",
            "valuation_cap": "5000000",
            "mfn_provision": true
        },
        "round": {
            "round_valuation": "10000000",
            "price_per_share": "2.00",
            "round_amount": "2000000"
        },
        "mfn_reference_price": "0.50"
    }))
    .unwrap();
    let out = safe::convert_safe(&request).unwrap();
    assert_eq!(out.result.conversion_price, dec!(0.50));
    assert_eq!(out.result.method, ConversionMethod::Mfn);
    assert_eq!(out.result.shares, dec!(500_000));
    assert!(out.warnings.is_empty());
}

#[test]
fn test_round_batch_totals() {
    let request = RoundConversionRequest {
        round: round(),
        safes: vec![
            OutstandingSafe {
                safe_id: "s1".into(),
                terms: terms(Some(dec!(5_000_000)), None),
            },
            OutstandingSafe {
                safe_id: "s2".into(),
                terms: terms(None, Some(dec!(0.20))),
            },
        ],
        options: opts(),
    };
    let out = batch::convert_round(&request).unwrap().result;
    // s1: 100_000 / 1.00 = 100_000; s2: 100_000 / 1.60 = 62_500
    assert_eq!(out.total_shares, dec!(162_500));
    assert_eq!(out.total_converted_investment, dec!(200_000));
    assert_eq!(out.skipped_count, 0);
    assert!(out.aggregate_ownership_percent > Decimal::ZERO);
}
