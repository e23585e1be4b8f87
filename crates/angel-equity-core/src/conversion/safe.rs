use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EquityError;
use crate::types::{with_metadata, ComputationOutput, ConversionOptions, Money, Percent, Rate};
use crate::EquityResult;

// ---------------------------------------------------------------------------
// Terms and round inputs
// ---------------------------------------------------------------------------

/// Pre-money vs post-money SAFE type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafeType {
    /// Traditional pre-money SAFE.
    #[serde(alias = "PRE_MONEY")]
    PreMoney,
    /// YC-style post-money SAFE (cap is the post-money valuation).
    #[serde(alias = "POST_MONEY")]
    PostMoney,
}

/// Terms of a signed SAFE. Read-only input to conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeTerms {
    /// Amount invested via the SAFE.
    pub investment_amount: Money,
    /// Type of SAFE.
    #[serde(alias = "type")]
    pub safe_type: SafeType,
    /// Valuation cap.
    #[serde(default)]
    pub valuation_cap: Option<Money>,
    /// Discount rate (e.g. 0.20 = 20%). Must lie strictly between 0 and 1.
    #[serde(default)]
    pub discount_rate: Option<Rate>,
    /// Holder may take part in later rounds pro-rata.
    #[serde(default)]
    pub pro_rata_right: bool,
    /// Most Favoured Nation provision.
    #[serde(default)]
    pub mfn_provision: bool,
    /// Minimum round size that triggers mandatory conversion.
    #[serde(default)]
    pub qualified_financing_threshold: Option<Money>,
}

/// Terms of the priced round that triggers conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionInput {
    /// Pre-money valuation of the triggering round.
    pub round_valuation: Money,
    /// Price per share from the round's term sheet.
    pub price_per_share: Money,
    /// Total new money raised in the round.
    pub round_amount: Money,
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Which mechanism set the conversion price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionMethod {
    RoundPrice,
    ValuationCap,
    Discount,
    Mfn,
}

impl std::fmt::Display for ConversionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionMethod::RoundPrice => write!(f, "round_price"),
            ConversionMethod::ValuationCap => write!(f, "valuation_cap"),
            ConversionMethod::Discount => write!(f, "discount"),
            ConversionMethod::Mfn => write!(f, "mfn"),
        }
    }
}

/// Output of a single SAFE conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Price per share used for this SAFE. Never above the round price.
    pub conversion_price: Money,
    /// Shares issued on conversion.
    pub shares: Decimal,
    /// shares / (implied pre-money shares + new-money shares + shares), as a percent.
    pub effective_ownership_percent: Percent,
    /// Which mechanism drove the conversion price.
    pub method: ConversionMethod,
    /// The round's own price per share.
    pub round_price: Money,
    /// Price derived from the valuation cap, if usable.
    pub cap_price: Option<Money>,
    /// Price derived from the discount, if usable.
    pub discount_price: Option<Money>,
    /// conversion_price * implied pre-money shares.
    pub effective_valuation: Money,
    /// investment / cap for post-money SAFEs, as a percent.
    pub post_money_cap_ownership_percent: Option<Percent>,
}

/// A single conversion request: terms, round, config and optional MFN reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeConversionRequest {
    pub terms: SafeTerms,
    pub round: ConversionInput,
    #[serde(default)]
    pub options: ConversionOptions,
    /// Best price granted to any later SAFE holder, sourced by the caller.
    #[serde(default)]
    pub mfn_reference_price: Option<Money>,
}

// ---------------------------------------------------------------------------
// Pure calculator
// ---------------------------------------------------------------------------

/// Convert a SAFE at a priced round.
///
/// The holder converts at the lowest strictly positive price among the round
/// price, the cap price and the discount price. Shares are rounded once, at
/// the end, to `options.share_quantum` if one is configured.
pub fn convert(
    terms: &SafeTerms,
    input: &ConversionInput,
    options: &ConversionOptions,
) -> EquityResult<ConversionResult> {
    validate_terms(terms)?;

    if let Some(threshold) = terms.qualified_financing_threshold {
        if input.round_amount < threshold {
            return Err(EquityError::IneligibleRound {
                round_amount: input.round_amount,
                threshold,
            });
        }
    }

    let cap_price = cap_price(terms, input)?;
    let discount_price = discount_price(terms, input);

    tracing::debug!(
        round_price = %input.price_per_share,
        cap_price = ?cap_price,
        discount_price = ?discount_price,
        "SAFE conversion candidates"
    );

    let (conversion_price, method) =
        select_price(input.price_per_share, cap_price, discount_price).ok_or_else(|| {
            EquityError::invalid_terms(
                "valuation_cap",
                "No positive conversion price: cap, discount and round price are all unusable",
            )
        })?;

    build_result(
        terms,
        input,
        options,
        conversion_price,
        method,
        cap_price,
        discount_price,
    )
}

/// Most-favoured-nation adjustment: the lower of the two prices.
///
/// A non-positive `best_known_price` carries no usable terms and is ignored.
pub fn apply_mfn(current_price: Money, best_known_price: Money) -> Money {
    if best_known_price > Decimal::ZERO && best_known_price < current_price {
        best_known_price
    } else {
        current_price
    }
}

/// Convert, then apply the MFN provision against `mfn_reference_price` when
/// the terms carry one. Shares are recomputed at the final price.
pub fn convert_with_mfn(
    terms: &SafeTerms,
    input: &ConversionInput,
    options: &ConversionOptions,
    mfn_reference_price: Option<Money>,
) -> EquityResult<ConversionResult> {
    let result = convert(terms, input, options)?;
    match mfn_reference_price {
        Some(reference) if terms.mfn_provision => {
            let price = apply_mfn(result.conversion_price, reference);
            if price < result.conversion_price {
                tracing::debug!(
                    from = %result.conversion_price,
                    to = %price,
                    "MFN provision lowered conversion price"
                );
                build_result(
                    terms,
                    input,
                    options,
                    price,
                    ConversionMethod::Mfn,
                    result.cap_price,
                    result.discount_price,
                )
            } else {
                Ok(result)
            }
        }
        _ => Ok(result),
    }
}

/// Convert a SAFE and wrap the result in the standard output envelope.
pub fn convert_safe(
    request: &SafeConversionRequest,
) -> EquityResult<ComputationOutput<ConversionResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let terms = &request.terms;

    let result = convert_with_mfn(
        terms,
        &request.round,
        &request.options,
        request.mfn_reference_price,
    )?;

    if terms.valuation_cap.is_none() && terms.discount_rate.is_none() {
        warnings.push("No valuation cap or discount; converting at round price".into());
    }
    if terms.valuation_cap.is_some() && result.cap_price.is_none() {
        warnings.push("Valuation cap yields no positive price; cap ignored".into());
    }
    match (terms.mfn_provision, request.mfn_reference_price) {
        (true, None) => warnings.push(
            "MFN provision active: holder may elect better terms from later SAFEs".into(),
        ),
        (false, Some(_)) => {
            warnings.push("mfn_reference_price supplied but SAFE has no MFN provision; ignored".into())
        }
        (true, Some(p)) if p <= Decimal::ZERO => {
            warnings.push("Non-positive mfn_reference_price ignored".into())
        }
        _ => {}
    }
    for w in &warnings {
        tracing::warn!("{w}");
    }

    let methodology = match terms.safe_type {
        SafeType::PreMoney => "SAFE Conversion (Pre-Money)",
        SafeType::PostMoney => "SAFE Conversion (Post-Money)",
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        methodology,
        &serde_json::json!({
            "investment_amount": terms.investment_amount.to_string(),
            "valuation_cap": terms.valuation_cap.map(|c| c.to_string()),
            "discount_rate": terms.discount_rate.map(|d| d.to_string()),
            "mfn_provision": terms.mfn_provision,
            "round_valuation": request.round.round_valuation.to_string(),
            "price_per_share": request.round.price_per_share.to_string(),
            "share_quantum": request.options.share_quantum.map(|q| q.to_string()),
        }),
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_terms(terms: &SafeTerms) -> EquityResult<()> {
    if terms.investment_amount <= Decimal::ZERO {
        return Err(EquityError::invalid_terms(
            "investment_amount",
            "Investment amount must be positive",
        ));
    }
    if let Some(dr) = terms.discount_rate {
        if dr <= Decimal::ZERO || dr >= dec!(1) {
            return Err(EquityError::invalid_terms(
                "discount_rate",
                "Discount rate must be in (0, 1)",
            ));
        }
    }
    Ok(())
}

/// Lift a checked Decimal operation into an error naming the input that
/// pushed it out of range.
pub(crate) fn checked(value: Option<Decimal>, field: &str) -> EquityResult<Decimal> {
    value.ok_or_else(|| EquityError::invalid_terms(field, "Arithmetic overflow"))
}

/// Cap price: valuation_cap * price_per_share / round_valuation.
///
/// Proportional to the cap and inversely proportional to the round
/// valuation. Excluded when it would not be strictly positive.
pub(crate) fn cap_price(terms: &SafeTerms, input: &ConversionInput) -> EquityResult<Option<Money>> {
    let Some(cap) = terms.valuation_cap else {
        return Ok(None);
    };
    if input.round_valuation <= Decimal::ZERO || input.price_per_share <= Decimal::ZERO {
        return Ok(None);
    }
    let price = checked(
        cap.checked_mul(input.price_per_share)
            .and_then(|v| v.checked_div(input.round_valuation)),
        "valuation_cap",
    )?;
    Ok((price > Decimal::ZERO).then_some(price))
}

pub(crate) fn discount_price(terms: &SafeTerms, input: &ConversionInput) -> Option<Money> {
    let dr = terms.discount_rate?;
    let price = input.price_per_share * (dec!(1) - dr);
    (price > Decimal::ZERO).then_some(price)
}

/// Lowest strictly positive candidate. A mechanism only wins when it is
/// strictly below the price already selected.
fn select_price(
    round_price: Money,
    cap_price: Option<Money>,
    discount_price: Option<Money>,
) -> Option<(Money, ConversionMethod)> {
    let mut best = (round_price > Decimal::ZERO).then_some((round_price, ConversionMethod::RoundPrice));
    for (candidate, method) in [
        (cap_price, ConversionMethod::ValuationCap),
        (discount_price, ConversionMethod::Discount),
    ] {
        if let Some(price) = candidate.filter(|p| *p > Decimal::ZERO) {
            match best {
                Some((current, _)) if current <= price => {}
                _ => best = Some((price, method)),
            }
        }
    }
    best
}

/// Round half-up to a multiple of `quantum`. A non-positive quantum is a no-op.
pub(crate) fn round_to_quantum(value: Decimal, quantum: Option<Decimal>) -> EquityResult<Decimal> {
    match quantum {
        Some(q) if q > Decimal::ZERO => checked(
            value
                .checked_div(q)
                .map(|steps| steps.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
                .and_then(|steps| steps.checked_mul(q)),
            "share_quantum",
        ),
        _ => Ok(value),
    }
}

/// Share count the round itself implies before conversion and new money:
/// (round_valuation / price, round_amount / price).
pub(crate) fn implied_round_shares(
    input: &ConversionInput,
) -> EquityResult<Option<(Decimal, Decimal)>> {
    if input.price_per_share <= Decimal::ZERO || input.round_valuation <= Decimal::ZERO {
        return Ok(None);
    }
    let pre_money = checked(
        input.round_valuation.checked_div(input.price_per_share),
        "round_valuation",
    )?;
    let new_money = checked(
        input
            .round_amount
            .max(Decimal::ZERO)
            .checked_div(input.price_per_share),
        "round_amount",
    )?;
    Ok(Some((pre_money, new_money)))
}

/// Ownership after the round for `shares` converted shares, as a percent.
pub(crate) fn ownership_percent(input: &ConversionInput, shares: Decimal) -> EquityResult<Percent> {
    let Some((pre_money, new_money)) = implied_round_shares(input)? else {
        return Ok(Decimal::ZERO);
    };
    let total = checked(
        pre_money
            .checked_add(new_money)
            .and_then(|v| v.checked_add(shares)),
        "round_valuation",
    )?;
    if total.is_zero() {
        return Ok(Decimal::ZERO);
    }
    // shares <= total, so the ratio stays in [0, 1]
    Ok(shares / total * dec!(100))
}

fn build_result(
    terms: &SafeTerms,
    input: &ConversionInput,
    options: &ConversionOptions,
    conversion_price: Money,
    method: ConversionMethod,
    cap_price: Option<Money>,
    discount_price: Option<Money>,
) -> EquityResult<ConversionResult> {
    let raw_shares = checked(
        terms.investment_amount.checked_div(conversion_price),
        "investment_amount",
    )?;
    let shares = round_to_quantum(raw_shares, options.share_quantum)?;

    let effective_valuation = match implied_round_shares(input)? {
        Some((pre_money, _)) => checked(
            conversion_price.checked_mul(pre_money),
            "round_valuation",
        )?,
        None => Decimal::ZERO,
    };

    let post_money_cap_ownership_percent = match (terms.safe_type, terms.valuation_cap) {
        (SafeType::PostMoney, Some(cap)) if cap > Decimal::ZERO => Some(checked(
            terms
                .investment_amount
                .checked_div(cap)
                .and_then(|v| v.checked_mul(dec!(100))),
            "valuation_cap",
        )?),
        _ => None,
    };

    Ok(ConversionResult {
        conversion_price,
        shares,
        effective_ownership_percent: ownership_percent(input, shares)?,
        method,
        round_price: input.price_per_share,
        cap_price,
        discount_price,
        effective_valuation,
        post_money_cap_ownership_percent,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
