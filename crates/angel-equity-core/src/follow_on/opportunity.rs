use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;

use super::allocation::{FollowOnOpportunity, RightsHolder};
use crate::error::EquityError;
use crate::types::*;
use crate::EquityResult;

/// An existing investor's stake going into a new round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub holder_id: HolderId,
    /// Fully diluted ownership before the round, 0-100.
    pub ownership_percent: Percent,
    #[serde(default = "default_true")]
    pub pro_rata_right: bool,
    #[serde(default)]
    pub max_exercise: Option<Money>,
}

fn default_true() -> bool {
    true
}

fn default_pool() -> Percent {
    dec!(100)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityInput {
    /// Total new money the round is raising.
    pub round_size: Money,
    /// Share of the round offered to pro-rata holders, 0-100.
    #[serde(default = "default_pool")]
    pub pro_rata_pool_percent: Percent,
    pub holdings: Vec<Holding>,
}

/// Derive the follow-on opportunity for a new round from historical
/// ownership. Each holder with a pro-rata right is entitled to their
/// ownership share of the pro-rata pool.
pub fn opportunity_from_holdings(input: &OpportunityInput) -> EquityResult<FollowOnOpportunity> {
    if input.round_size < Decimal::ZERO {
        return Err(EquityError::invalid_opportunity(
            "round_size",
            "Round size cannot be negative",
        ));
    }
    if input.pro_rata_pool_percent < Decimal::ZERO || input.pro_rata_pool_percent > dec!(100) {
        return Err(EquityError::invalid_opportunity(
            "pro_rata_pool_percent",
            "Pool percent must be in [0, 100]",
        ));
    }
    let mut seen = BTreeSet::new();
    for h in &input.holdings {
        if !seen.insert(h.holder_id.as_str()) {
            return Err(EquityError::invalid_opportunity(
                "holdings",
                format!("Duplicate holder id '{}'", h.holder_id),
            ));
        }
    }

    let rights_holders = input
        .holdings
        .iter()
        .filter(|h| h.pro_rata_right)
        .map(|h| RightsHolder {
            holder_id: h.holder_id.clone(),
            pro_rata_percent: h.ownership_percent,
            max_exercise: h.max_exercise,
        })
        .collect();

    let total_capacity = input
        .round_size
        .checked_mul(input.pro_rata_pool_percent)
        .map(|v| v / dec!(100))
        .ok_or_else(|| EquityError::invalid_opportunity("round_size", "Arithmetic overflow"))?;

    Ok(FollowOnOpportunity {
        total_capacity,
        rights_holders,
    })
}

pub fn build_opportunity(
    input: &OpportunityInput,
) -> EquityResult<ComputationOutput<FollowOnOpportunity>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let opportunity = opportunity_from_holdings(input)?;

    let total_ownership: Decimal = input.holdings.iter().map(|h| h.ownership_percent).sum();
    if total_ownership > dec!(100) {
        warnings.push(format!(
            "Holdings sum to {total_ownership}% ownership, above 100%"
        ));
    }
    let excluded = input.holdings.len() - opportunity.rights_holders.len();
    if excluded > 0 {
        warnings.push(format!(
            "{excluded} holder(s) without a pro-rata right excluded"
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Follow-on Opportunity from Historical Ownership",
        &serde_json::json!({
            "round_size": input.round_size.to_string(),
            "pro_rata_pool_percent": input.pro_rata_pool_percent.to_string(),
            "holdings": input.holdings.len(),
        }),
        warnings,
        elapsed,
        opportunity,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(id: &str, pct: Decimal, right: bool) -> Holding {
        Holding {
            holder_id: id.into(),
            ownership_percent: pct,
            pro_rata_right: right,
            max_exercise: None,
        }
    }

    #[test]
    fn test_capacity_is_pool_share_of_round() {
        let input = OpportunityInput {
            round_size: dec!(2_000_000),
            pro_rata_pool_percent: dec!(25),
            holdings: vec![holding("a", dec!(10), true), holding("b", dec!(5), false)],
        };
        let out = build_opportunity(&input).unwrap();
        assert_eq!(out.result.total_capacity, dec!(500_000));
        assert_eq!(out.result.rights_holders.len(), 1);
        assert_eq!(out.result.rights_holders[0].pro_rata_percent, dec!(10));
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_pool_defaults_to_whole_round() {
        let input: OpportunityInput = serde_json::from_str(
            r#"{"round_size":"1000000","holdings":[{"holder_id":"a","ownership_percent":"8"}]}"#,
        )
        .unwrap();
        let opp = opportunity_from_holdings(&input).unwrap();
        assert_eq!(opp.total_capacity, dec!(1_000_000));
        assert_eq!(opp.rights_holders.len(), 1);
    }

    #[test]
    fn test_overflowing_round_size_is_an_error() {
        let input = OpportunityInput {
            round_size: Decimal::MAX,
            pro_rata_pool_percent: dec!(50),
            holdings: vec![holding("a", dec!(10), true)],
        };
        let err = opportunity_from_holdings(&input).unwrap_err();
        assert!(matches!(err, EquityError::InvalidOpportunity { ref field, .. } if field == "round_size"));
    }

    #[test]
    fn test_negative_round_rejected() {
        let input = OpportunityInput {
            round_size: dec!(-1),
            pro_rata_pool_percent: dec!(100),
            holdings: vec![],
        };
        assert!(matches!(
            opportunity_from_holdings(&input),
            Err(EquityError::InvalidOpportunity { .. })
        ));
    }
}
