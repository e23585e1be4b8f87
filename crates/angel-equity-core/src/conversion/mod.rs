//! SAFE conversion at a priced round.
//!
//! Covers:
//! 1. **Single SAFE** -- conversion price from round price, valuation cap and discount
//! 2. **MFN** -- most-favoured-nation repricing against a caller-supplied reference
//! 3. **Round batch** -- every outstanding SAFE at one round, MFN swept across later SAFEs
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

pub mod batch;
pub mod safe;
