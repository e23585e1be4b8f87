use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;

use super::safe::{self, ConversionInput, ConversionResult, SafeTerms};
use crate::error::EquityError;
use crate::types::*;
use crate::EquityResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// A SAFE on the cap table, identified by the calling service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutstandingSafe {
    pub safe_id: String,
    #[serde(flatten)]
    pub terms: SafeTerms,
}

/// Convert every outstanding SAFE at one priced round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundConversionRequest {
    pub round: ConversionInput,
    /// SAFEs in issuance order (earliest first).
    pub safes: Vec<OutstandingSafe>,
    #[serde(default)]
    pub options: ConversionOptions,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineStatus {
    Converted,
    /// Round is below this SAFE's qualified financing threshold.
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeConversionLine {
    pub safe_id: String,
    pub status: LineStatus,
    /// Price this SAFE gets on its own terms, before MFN.
    pub standalone_price: Option<Money>,
    /// Lowest standalone price of any later SAFE, offered to MFN holders.
    pub mfn_reference_price: Option<Money>,
    pub conversion: Option<ConversionResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundConversionOutput {
    pub lines: Vec<SafeConversionLine>,
    pub total_converted_investment: Money,
    pub total_shares: Shares,
    /// All converted shares / post-round shares, as a percent.
    pub aggregate_ownership_percent: Percent,
    pub skipped_count: usize,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Convert all SAFEs at a priced round, applying MFN provisions against the
/// best standalone price of any SAFE issued after the MFN holder.
///
/// A SAFE whose threshold the round misses is reported as skipped. Malformed
/// terms on any SAFE abort the whole batch.
pub fn convert_round(
    request: &RoundConversionRequest,
) -> EquityResult<ComputationOutput<RoundConversionOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let mut seen = BTreeSet::new();
    for s in &request.safes {
        if !seen.insert(s.safe_id.as_str()) {
            return Err(EquityError::invalid_terms(
                "safe_id",
                format!("Duplicate SAFE id '{}'", s.safe_id),
            ));
        }
    }

    // Pass 1: standalone conversions.
    let mut standalone: Vec<Option<ConversionResult>> = Vec::with_capacity(request.safes.len());
    for s in &request.safes {
        match safe::convert(&s.terms, &request.round, &request.options) {
            Ok(result) => standalone.push(Some(result)),
            Err(EquityError::IneligibleRound {
                round_amount,
                threshold,
            }) => {
                warnings.push(format!(
                    "SAFE '{}' skipped: round amount {} below qualified financing threshold {}",
                    s.safe_id, round_amount, threshold
                ));
                standalone.push(None);
            }
            Err(e) => return Err(e),
        }
    }

    // Pass 2: best price among later SAFEs, walking backwards.
    let mut best_later: Vec<Option<Money>> = vec![None; request.safes.len()];
    let mut running: Option<Money> = None;
    for (i, result) in standalone.iter().enumerate().rev() {
        best_later[i] = running;
        if let Some(r) = result {
            running = Some(match running {
                Some(p) => p.min(r.conversion_price),
                None => r.conversion_price,
            });
        }
    }

    let mut lines = Vec::with_capacity(request.safes.len());
    let mut total_converted_investment = Decimal::ZERO;
    let mut total_shares = Decimal::ZERO;
    let mut skipped_count = 0usize;

    for ((s, result), reference) in request.safes.iter().zip(standalone).zip(best_later) {
        let Some(standalone_result) = result else {
            skipped_count += 1;
            lines.push(SafeConversionLine {
                safe_id: s.safe_id.clone(),
                status: LineStatus::Skipped,
                standalone_price: None,
                mfn_reference_price: None,
                conversion: None,
            });
            continue;
        };

        let standalone_price = standalone_result.conversion_price;
        let (conversion, mfn_reference_price) = if s.terms.mfn_provision {
            let converted = safe::convert_with_mfn(
                &s.terms,
                &request.round,
                &request.options,
                reference,
            )?;
            (converted, reference)
        } else {
            (standalone_result, None)
        };

        total_converted_investment = safe::checked(
            total_converted_investment.checked_add(s.terms.investment_amount),
            "investment_amount",
        )?;
        total_shares = safe::checked(total_shares.checked_add(conversion.shares), "investment_amount")?;
        lines.push(SafeConversionLine {
            safe_id: s.safe_id.clone(),
            status: LineStatus::Converted,
            standalone_price: Some(standalone_price),
            mfn_reference_price,
            conversion: Some(conversion),
        });
    }

    if request.safes.is_empty() {
        warnings.push("No SAFEs supplied".into());
    }

    let aggregate_ownership_percent = safe::ownership_percent(&request.round, total_shares)?;

    tracing::debug!(
        converted = lines.len() - skipped_count,
        skipped = skipped_count,
        total_shares = %total_shares,
        "round conversion complete"
    );

    let output = RoundConversionOutput {
        lines,
        total_converted_investment,
        total_shares,
        aggregate_ownership_percent,
        skipped_count,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "SAFE Round Conversion with MFN sweep",
        &serde_json::json!({
            "round_valuation": request.round.round_valuation.to_string(),
            "price_per_share": request.round.price_per_share.to_string(),
            "round_amount": request.round.round_amount.to_string(),
            "safe_count": request.safes.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
