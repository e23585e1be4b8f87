use std::collections::BTreeMap;

use angel_equity_core::follow_on::allocation::{
    self, FollowOnOpportunity, FollowOnRequest, RightsHolder,
};
use angel_equity_core::follow_on::opportunity::{self, Holding, OpportunityInput};
use angel_equity_core::{AllocationOptions, HolderId, Money};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn holder(id: &str, pct: Decimal, max: Option<Decimal>) -> RightsHolder {
    RightsHolder {
        holder_id: id.into(),
        pro_rata_percent: pct,
        max_exercise: max,
    }
}

fn requests(pairs: &[(&str, Decimal)]) -> BTreeMap<HolderId, Money> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn three_way() -> FollowOnOpportunity {
    FollowOnOpportunity {
        total_capacity: dec!(1_000_000),
        rights_holders: vec![
            holder("a", dec!(50), None),
            holder("b", dec!(30), Some(dec!(200_000))),
            holder("c", dec!(20), None),
        ],
    }
}

// ===========================================================================
// Known-answer scenario
// ===========================================================================

#[test]
fn test_capped_holder_surplus_redistributed() {
    let opp = FollowOnOpportunity {
        total_capacity: dec!(100_000),
        rights_holders: vec![
            holder("A", dec!(60), None),
            holder("B", dec!(40), Some(dec!(20_000))),
        ],
    };
    let res = allocation::allocate(&opp, &requests(&[("A", dec!(60_000)), ("B", dec!(40_000))]))
        .unwrap();
    assert_eq!(res.allocations["A"].allocated_amount, dec!(80_000));
    assert_eq!(res.allocations["B"].allocated_amount, dec!(20_000));
    assert_eq!(res.total_allocated, dec!(100_000));
}

// ===========================================================================
// Conservation
// ===========================================================================

#[test]
fn test_never_allocates_more_than_capacity() {
    let scenarios = [
        requests(&[("a", dec!(900_000)), ("b", dec!(900_000)), ("c", dec!(900_000))]),
        requests(&[("a", dec!(10)), ("b", dec!(300_000)), ("c", dec!(200_000))]),
        requests(&[]),
        requests(&[("c", dec!(200_000))]),
    ];
    for exercised in scenarios {
        let res = allocation::allocate(&three_way(), &exercised).unwrap();
        assert!(res.total_allocated <= dec!(1_000_000));
        let sum: Decimal = res.allocations.values().map(|a| a.allocated_amount).sum();
        assert_eq!(sum, res.total_allocated);
    }
}

#[test]
fn test_full_demand_with_uncapped_holder_fills_capacity() {
    let res = allocation::allocate(
        &three_way(),
        &requests(&[("a", dec!(500_000)), ("b", dec!(300_000)), ("c", dec!(200_000))]),
    )
    .unwrap();
    // b capped at 200k; its 100k surplus splits 50:20 between a and c
    assert_eq!(res.total_allocated, dec!(1_000_000));
    assert_eq!(res.allocations["b"].allocated_amount, dec!(200_000));
    let a = res.allocations["a"].allocated_amount;
    let c = res.allocations["c"].allocated_amount;
    assert_eq!(a + c, dec!(800_000));
    assert!(a > dec!(571_428) && a < dec!(571_430));
}

#[test]
fn test_awkward_capacity_conserved_to_the_cent() {
    let opp = FollowOnOpportunity {
        total_capacity: dec!(100_000.01),
        rights_holders: vec![
            holder("x", dec!(33.33), None),
            holder("y", dec!(33.33), None),
            holder("z", dec!(33.34), Some(dec!(1_000))),
        ],
    };
    let big = dec!(1_000_000);
    let res = allocation::allocate(&opp, &requests(&[("x", big), ("y", big), ("z", big)])).unwrap();
    assert_eq!(res.total_allocated, dec!(100_000.01));
    assert_eq!(res.unclaimed, Decimal::ZERO);
    assert_eq!(res.allocations["z"].allocated_amount, dec!(1_000));
}

// ===========================================================================
// Monotonicity
// ===========================================================================

#[test]
fn test_raising_one_request_never_hurts_them_or_helps_others() {
    let steps = [
        dec!(0),
        dec!(100_000),
        dec!(250_000),
        dec!(499_999),
        dec!(500_000),
        dec!(750_000),
    ];
    let mut prev: Option<BTreeMap<HolderId, Money>> = None;
    for step in steps {
        let res = allocation::allocate(
            &three_way(),
            &requests(&[("a", step), ("b", dec!(300_000)), ("c", dec!(200_000))]),
        )
        .unwrap();
        let now: BTreeMap<HolderId, Money> = res
            .allocations
            .iter()
            .map(|(k, v)| (k.clone(), v.allocated_amount))
            .collect();
        if let Some(before) = prev {
            assert!(now["a"] >= before["a"], "a decreased at request {step}");
            assert!(now["b"] <= before["b"], "b increased at request {step}");
            assert!(now["c"] <= before["c"], "c increased at request {step}");
        }
        prev = Some(now);
    }
}

// ===========================================================================
// No-waste
// ===========================================================================

#[test]
fn test_exact_entitlement_requests_are_met_exactly() {
    let opp = FollowOnOpportunity {
        total_capacity: dec!(750_000),
        rights_holders: vec![
            holder("a", dec!(45), None),
            holder("b", dec!(35), Some(dec!(500_000))),
            holder("c", dec!(20), None),
        ],
    };
    let res = allocation::allocate(
        &opp,
        &requests(&[("a", dec!(337_500)), ("b", dec!(262_500)), ("c", dec!(150_000))]),
    )
    .unwrap();
    for alloc in res.allocations.values() {
        assert_eq!(alloc.allocated_amount, alloc.entitled_amount);
        assert_eq!(alloc.redistributed_amount, Decimal::ZERO);
    }
    assert_eq!(res.unclaimed, Decimal::ZERO);
    assert_eq!(res.redistribution_rounds, 0);
}

#[test]
fn test_full_demand_fills_capacity_outside_rights() {
    let opp = FollowOnOpportunity {
        total_capacity: dec!(100_000),
        rights_holders: vec![holder("a", dec!(60), None)],
    };
    let res = allocation::allocate(&opp, &requests(&[("a", dec!(200_000))])).unwrap();
    assert_eq!(res.total_allocated, dec!(100_000));
    assert_eq!(res.allocations["a"].initial_allocation, dec!(60_000));
    assert_eq!(res.allocations["a"].allocated_amount, dec!(100_000));
    assert_eq!(res.unclaimed, Decimal::ZERO);
    assert_eq!(res.unreserved_capacity, dec!(40_000));
}

// ===========================================================================
// Determinism and tie-break
// ===========================================================================

#[test]
fn test_holder_order_does_not_change_result() {
    let mut reversed = three_way();
    reversed.rights_holders.reverse();
    let exercised = requests(&[("a", dec!(500_000)), ("b", dec!(300_000)), ("c", dec!(200_000))]);
    let r1 = allocation::allocate(&three_way(), &exercised).unwrap();
    let r2 = allocation::allocate(&reversed, &exercised).unwrap();
    assert_eq!(r1, r2);
}

#[test]
fn test_odd_cent_goes_to_lexically_first_holder() {
    // 0.03 unclaimed from "c" split between equal-weight "a" and "b":
    // 0.015 floors to 0.01 each; the last cent goes to "a".
    let opp = FollowOnOpportunity {
        total_capacity: dec!(300),
        rights_holders: vec![
            holder("b", dec!(25), None),
            holder("a", dec!(25), None),
            holder("c", dec!(50), None),
        ],
    };
    let res = allocation::allocate(
        &opp,
        &requests(&[("a", dec!(75)), ("b", dec!(75)), ("c", dec!(149.97))]),
    )
    .unwrap();
    assert_eq!(res.allocations["a"].redistributed_amount, dec!(0.02));
    assert_eq!(res.allocations["b"].redistributed_amount, dec!(0.01));
    assert_eq!(res.total_allocated, dec!(300));
}

#[test]
fn test_coarser_unit_from_options() {
    let opp = FollowOnOpportunity {
        total_capacity: dec!(300),
        rights_holders: vec![
            holder("a", dec!(25), None),
            holder("b", dec!(25), None),
            holder("c", dec!(50), None),
        ],
    };
    let options = AllocationOptions { unit: dec!(1) };
    let res = allocation::allocate_with(
        &opp,
        &requests(&[("a", dec!(75)), ("b", dec!(75)), ("c", dec!(147))]),
        &options,
    )
    .unwrap();
    // 3 unclaimed: 1.5 floors to 1 each, leftover unit to "a"
    assert_eq!(res.allocations["a"].allocated_amount, dec!(77));
    assert_eq!(res.allocations["b"].allocated_amount, dec!(76));
}

// ===========================================================================
// Opportunity -> allocation pipeline
// ===========================================================================

#[test]
fn test_opportunity_feeds_allocation() {
    let opp = opportunity::opportunity_from_holdings(&OpportunityInput {
        round_size: dec!(5_000_000),
        pro_rata_pool_percent: dec!(100),
        holdings: vec![
            Holding {
                holder_id: "angel".into(),
                ownership_percent: dec!(4),
                pro_rata_right: true,
                max_exercise: None,
            },
            Holding {
                holder_id: "seed-fund".into(),
                ownership_percent: dec!(12),
                pro_rata_right: true,
                max_exercise: Some(dec!(400_000)),
            },
        ],
    })
    .unwrap();

    let request = FollowOnRequest {
        opportunity: opp,
        exercised: requests(&[("angel", dec!(200_000)), ("seed-fund", dec!(600_000))]),
        options: AllocationOptions::default(),
    };
    let out = allocation::allocate_follow_on(&request).unwrap();
    let res = out.result;
    // angel entitled 200k, seed-fund 600k capped at 400k; the rest of the
    // 5M, including the 4.2M outside both percents, goes to the angel
    assert_eq!(res.allocations["angel"].entitled_amount, dec!(200_000));
    assert_eq!(res.allocations["seed-fund"].allocated_amount, dec!(400_000));
    assert_eq!(res.allocations["angel"].allocated_amount, dec!(4_600_000));
    assert_eq!(res.total_allocated, dec!(5_000_000));
    assert_eq!(res.unreserved_capacity, dec!(4_200_000));
}
