use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.20 = 20%). Never as percentages.
pub type Rate = Decimal;

/// Percentages on a 0-100 scale (60 = 60%).
pub type Percent = Decimal;

/// Share counts. Fractional unless a share quantum is configured.
pub type Shares = Decimal;

/// Identifier of a rights-holder or SAFE as known to the calling service.
pub type HolderId = String;

/// Configuration for SAFE conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Shares are rounded half-up to a multiple of this quantum (e.g. 1 for
    /// whole shares). `None` keeps fractional shares.
    pub share_quantum: Option<Decimal>,
}

/// Configuration for follow-on allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationOptions {
    /// Smallest currency unit handed out during redistribution.
    pub unit: Money,
}

impl Default for AllocationOptions {
    fn default() -> Self {
        Self { unit: dec!(0.01) }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
