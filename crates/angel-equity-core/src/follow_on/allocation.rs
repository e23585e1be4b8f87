use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::EquityError;
use crate::types::*;
use crate::EquityResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// An existing investor holding a pro-rata right in the new round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RightsHolder {
    pub holder_id: HolderId,
    /// Share of the follow-on capacity, 0-100. Need not sum to 100 across holders.
    pub pro_rata_percent: Percent,
    /// Cap on the dollars this holder may put in.
    #[serde(default)]
    pub max_exercise: Option<Money>,
}

/// Capacity in a new round reserved for pro-rata participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowOnOpportunity {
    pub total_capacity: Money,
    pub rights_holders: Vec<RightsHolder>,
}

/// Allocation request: opportunity, exercised amounts and config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowOnRequest {
    pub opportunity: FollowOnOpportunity,
    /// Requested amount per holder. Holders not listed requested nothing.
    #[serde(default)]
    pub exercised: BTreeMap<HolderId, Money>,
    #[serde(default)]
    pub options: AllocationOptions,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderAllocation {
    /// total_capacity * pro_rata_percent / 100.
    pub entitled_amount: Money,
    /// Final allocation after redistribution.
    pub allocated_amount: Money,
    /// Requested amount after clamping negatives to zero.
    pub requested_amount: Money,
    /// min(requested, entitled, max_exercise). Never above entitlement.
    pub initial_allocation: Money,
    /// Unclaimed capacity absorbed from other holders.
    pub redistributed_amount: Money,
    /// Portion of the request above entitlement.
    pub excess_request: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub allocations: BTreeMap<HolderId, HolderAllocation>,
    pub total_allocated: Money,
    /// Capacity that no holder could absorb.
    pub unclaimed: Money,
    /// Capacity outside every holder's entitlement. Redistributed together
    /// with unexercised entitlement.
    pub unreserved_capacity: Money,
    pub redistribution_rounds: u32,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct Slot<'a> {
    id: &'a str,
    weight: Decimal,
    entitled: Money,
    requested: Money,
    max_exercise: Option<Money>,
    initial: Money,
    allocated: Money,
}

impl Slot<'_> {
    /// Remaining room below max_exercise. `None` means unbounded.
    fn headroom(&self) -> Option<Money> {
        self.max_exercise
            .map(|m| (m - self.allocated).max(Decimal::ZERO))
    }

    fn has_headroom(&self) -> bool {
        self.headroom().map_or(true, |h| h > Decimal::ZERO)
    }

    /// Holders who exercised their full entitlement take part in redistribution.
    fn absorbs(&self) -> bool {
        self.weight > Decimal::ZERO && self.requested >= self.entitled && self.has_headroom()
    }

    fn grant(&mut self, amount: Money) -> Money {
        let granted = match self.headroom() {
            Some(h) => amount.min(h),
            None => amount,
        };
        self.allocated += granted;
        granted
    }
}

/// Allocate follow-on capacity with default options.
pub fn allocate(
    opportunity: &FollowOnOpportunity,
    exercised: &BTreeMap<HolderId, Money>,
) -> EquityResult<AllocationResult> {
    allocate_with(opportunity, exercised, &AllocationOptions::default())
}

/// Allocate follow-on capacity among rights-holders.
///
/// Each holder first receives `min(requested, entitled, max_exercise)`. The
/// capacity left on the table is then redistributed, weighted by
/// `pro_rata_percent`, among holders who exercised in full and are still
/// below their `max_exercise`. Shares of each round are floored to
/// `options.unit`; leftover units go one at a time to eligible holders in
/// ascending `holder_id` order. Rounds repeat until nothing is left or no
/// holder can absorb more.
pub fn allocate_with(
    opportunity: &FollowOnOpportunity,
    exercised: &BTreeMap<HolderId, Money>,
    options: &AllocationOptions,
) -> EquityResult<AllocationResult> {
    if opportunity.total_capacity < Decimal::ZERO {
        return Err(EquityError::invalid_opportunity(
            "total_capacity",
            "Total capacity cannot be negative",
        ));
    }
    if options.unit <= Decimal::ZERO {
        return Err(EquityError::invalid_opportunity(
            "unit",
            "Allocation unit must be positive",
        ));
    }

    let mut holders: Vec<&RightsHolder> = opportunity.rights_holders.iter().collect();
    holders.sort_by(|a, b| a.holder_id.cmp(&b.holder_id));
    if let Some(dup) = holders.windows(2).find(|w| w[0].holder_id == w[1].holder_id) {
        return Err(EquityError::invalid_opportunity(
            "rights_holders",
            format!("Duplicate holder id '{}'", dup[0].holder_id),
        ));
    }

    let capacity = opportunity.total_capacity;
    let weights: Vec<Decimal> = holders
        .iter()
        .map(|h| h.pro_rata_percent.clamp(Decimal::ZERO, dec!(100)))
        .collect();
    let total_percent: Decimal = weights.iter().copied().sum();
    // Percents above 100 in total are scaled so entitlements still fit capacity.
    let denominator = total_percent.max(dec!(100));

    let mut slots: Vec<Slot> = holders
        .iter()
        .zip(&weights)
        .map(|(h, &weight)| {
            let entitled = capacity
                .checked_mul(weight)
                .map(|v| v / denominator)
                .ok_or_else(|| {
                    EquityError::invalid_opportunity("total_capacity", "Arithmetic overflow")
                })?;
            let requested = exercised
                .get(&h.holder_id)
                .copied()
                .unwrap_or(Decimal::ZERO)
                .max(Decimal::ZERO);
            let max_exercise = h.max_exercise.map(|m| m.max(Decimal::ZERO));
            let initial = requested
                .min(entitled)
                .min(max_exercise.unwrap_or(entitled));
            Ok(Slot {
                id: h.holder_id.as_str(),
                weight,
                entitled,
                requested,
                max_exercise,
                initial,
                allocated: initial,
            })
        })
        .collect::<EquityResult<_>>()?;

    let total_entitled: Money = slots.iter().map(|s| s.entitled).sum();
    let total_initial: Money = slots.iter().map(|s| s.initial).sum();
    // Everything not taken up front, including capacity outside every
    // holder's percent, feeds the redistribution waterfall.
    let mut unclaimed = (capacity - total_initial).max(Decimal::ZERO);
    let mut rounds: u32 = 0;

    while unclaimed > Decimal::ZERO {
        let eligible: Vec<usize> = (0..slots.len()).filter(|&i| slots[i].absorbs()).collect();
        if eligible.is_empty() {
            break;
        }
        rounds += 1;

        let pot = unclaimed;
        let total_weight: Decimal = eligible.iter().map(|&i| slots[i].weight).sum();
        let mut remaining = pot;

        for &i in &eligible {
            let share = floor_to_unit(
                pot.checked_mul(slots[i].weight)
                    .map(|v| v / total_weight)
                    .ok_or_else(|| {
                        EquityError::invalid_opportunity("total_capacity", "Arithmetic overflow")
                    })?,
                options.unit,
            )?;
            remaining -= slots[i].grant(share);
        }

        // Leftover from flooring: one unit at a time, ascending holder id.
        for &i in &eligible {
            if remaining <= Decimal::ZERO {
                break;
            }
            if slots[i].has_headroom() {
                remaining -= slots[i].grant(options.unit.min(remaining));
            }
        }

        tracing::debug!(
            round = rounds,
            pot = %pot,
            eligible = eligible.len(),
            remaining = %remaining,
            "follow-on redistribution round"
        );

        if remaining >= pot {
            break;
        }
        unclaimed = remaining;
    }

    let allocations: BTreeMap<HolderId, HolderAllocation> = slots
        .iter()
        .map(|s| {
            (
                s.id.to_string(),
                HolderAllocation {
                    entitled_amount: s.entitled,
                    allocated_amount: s.allocated,
                    requested_amount: s.requested,
                    initial_allocation: s.initial,
                    redistributed_amount: s.allocated - s.initial,
                    excess_request: (s.requested - s.entitled).max(Decimal::ZERO),
                },
            )
        })
        .collect();
    let total_allocated: Money = slots.iter().map(|s| s.allocated).sum();

    Ok(AllocationResult {
        allocations,
        total_allocated,
        unclaimed,
        unreserved_capacity: (capacity - total_entitled).max(Decimal::ZERO),
        redistribution_rounds: rounds,
    })
}

/// Allocate and wrap the result in the standard output envelope, surfacing
/// clamped requests as warnings.
pub fn allocate_follow_on(
    request: &FollowOnRequest,
) -> EquityResult<ComputationOutput<AllocationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let opportunity = &request.opportunity;

    let result = allocate_with(opportunity, &request.exercised, &request.options)?;

    let total_percent: Decimal = opportunity
        .rights_holders
        .iter()
        .map(|h| h.pro_rata_percent.max(Decimal::ZERO))
        .sum();
    if total_percent > dec!(100) {
        warnings.push(format!(
            "Pro-rata percents sum to {total_percent}; entitlements scaled to total capacity"
        ));
    }
    for h in &opportunity.rights_holders {
        if h.pro_rata_percent < Decimal::ZERO || h.pro_rata_percent > dec!(100) {
            warnings.push(format!(
                "Holder '{}' pro_rata_percent {} clamped to [0, 100]",
                h.holder_id, h.pro_rata_percent
            ));
        }
    }
    for (id, alloc) in &result.allocations {
        if alloc.excess_request > Decimal::ZERO {
            warnings.push(format!(
                "Holder '{}' requested {} above entitlement {}; clamped",
                id, alloc.requested_amount, alloc.entitled_amount
            ));
        }
    }
    for (id, amount) in &request.exercised {
        if !result.allocations.contains_key(id) {
            warnings.push(format!(
                "Exercise of {amount} by '{id}' ignored: not a rights-holder"
            ));
        } else if *amount < Decimal::ZERO {
            warnings.push(format!(
                "Holder '{id}' requested a negative amount; treated as declining"
            ));
        }
    }
    for w in &warnings {
        tracing::warn!("{w}");
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Follow-on Pro-Rata Allocation (waterfall with redistribution)",
        &serde_json::json!({
            "total_capacity": opportunity.total_capacity.to_string(),
            "holders": opportunity.rights_holders.len(),
            "unit": request.options.unit.to_string(),
        }),
        warnings,
        elapsed,
        result,
    ))
}

fn floor_to_unit(value: Decimal, unit: Decimal) -> EquityResult<Decimal> {
    value
        .checked_div(unit)
        .map(|steps| steps.round_dp_with_strategy(0, RoundingStrategy::ToZero))
        .and_then(|steps| steps.checked_mul(unit))
        .ok_or_else(|| EquityError::invalid_opportunity("unit", "Arithmetic overflow"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
