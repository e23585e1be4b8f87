//! Follow-on pro-rata rights.
//!
//! Covers:
//! 1. **Opportunity** -- capacity and entitlements derived from historical ownership
//! 2. **Allocation** -- waterfall of exercised amounts with iterative redistribution
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

pub mod allocation;
pub mod opportunity;
