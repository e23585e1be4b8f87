use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// SAFE conversion
// ---------------------------------------------------------------------------

#[napi]
pub fn convert_safe(input_json: String) -> NapiResult<String> {
    let input: angel_equity_core::conversion::safe::SafeConversionRequest =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        angel_equity_core::conversion::safe::convert_safe(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn convert_round(input_json: String) -> NapiResult<String> {
    let input: angel_equity_core::conversion::batch::RoundConversionRequest =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        angel_equity_core::conversion::batch::convert_round(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Prices cross the boundary as decimal strings to avoid f64 drift.
#[napi]
pub fn apply_mfn(current_price: String, best_known_price: String) -> NapiResult<String> {
    let current: Decimal = current_price.parse().map_err(to_napi_error)?;
    let best: Decimal = best_known_price.parse().map_err(to_napi_error)?;
    Ok(angel_equity_core::conversion::safe::apply_mfn(current, best).to_string())
}

// ---------------------------------------------------------------------------
// Follow-on
// ---------------------------------------------------------------------------

#[napi]
pub fn build_follow_on_opportunity(input_json: String) -> NapiResult<String> {
    let input: angel_equity_core::follow_on::opportunity::OpportunityInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = angel_equity_core::follow_on::opportunity::build_opportunity(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn allocate_follow_on(input_json: String) -> NapiResult<String> {
    let input: angel_equity_core::follow_on::allocation::FollowOnRequest =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = angel_equity_core::follow_on::allocation::allocate_follow_on(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
