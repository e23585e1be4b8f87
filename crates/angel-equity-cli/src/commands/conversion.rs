use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use angel_equity_core::conversion::batch::{self, RoundConversionRequest};
use angel_equity_core::conversion::safe::{
    self, ConversionInput, SafeConversionRequest, SafeTerms, SafeType,
};
use angel_equity_core::ConversionOptions;

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SafeTypeArg {
    PreMoney,
    PostMoney,
}

impl From<SafeTypeArg> for SafeType {
    fn from(arg: SafeTypeArg) -> Self {
        match arg {
            SafeTypeArg::PreMoney => SafeType::PreMoney,
            SafeTypeArg::PostMoney => SafeType::PostMoney,
        }
    }
}

/// Arguments for single SAFE conversion
#[derive(Args)]
pub struct ConvertSafeArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Amount invested via the SAFE
    #[arg(long)]
    pub investment: Option<Decimal>,

    /// SAFE type
    #[arg(long, value_enum, default_value = "post-money")]
    pub safe_type: SafeTypeArg,

    /// Valuation cap
    #[arg(long)]
    pub cap: Option<Decimal>,

    /// Discount rate as a decimal (0.20 = 20%)
    #[arg(long)]
    pub discount: Option<Decimal>,

    /// Minimum round size for mandatory conversion
    #[arg(long)]
    pub threshold: Option<Decimal>,

    /// SAFE carries a most-favoured-nation provision
    #[arg(long)]
    pub mfn: bool,

    /// Best price given to any later SAFE holder
    #[arg(long)]
    pub mfn_reference_price: Option<Decimal>,

    /// Pre-money valuation of the triggering round
    #[arg(long)]
    pub round_valuation: Option<Decimal>,

    /// Round price per share
    #[arg(long)]
    pub price_per_share: Option<Decimal>,

    /// New money raised in the round
    #[arg(long, default_value = "0")]
    pub round_amount: Decimal,

    /// Round shares half-up to a multiple of this quantum (e.g. 1)
    #[arg(long)]
    pub share_quantum: Option<Decimal>,
}

pub fn run_convert_safe(args: ConvertSafeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: SafeConversionRequest = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(piped) = input::stdin::read_stdin()? {
        piped
    } else {
        let investment = args
            .investment
            .ok_or("--investment is required (or provide --input)")?;
        let round_valuation = args
            .round_valuation
            .ok_or("--round-valuation is required (or provide --input)")?;
        let price_per_share = args
            .price_per_share
            .ok_or("--price-per-share is required (or provide --input)")?;

        SafeConversionRequest {
            terms: SafeTerms {
                investment_amount: investment,
                safe_type: args.safe_type.into(),
                valuation_cap: args.cap,
                discount_rate: args.discount,
                pro_rata_right: false,
                mfn_provision: args.mfn,
                qualified_financing_threshold: args.threshold,
            },
            round: ConversionInput {
                round_valuation,
                price_per_share,
                round_amount: args.round_amount,
            },
            options: ConversionOptions {
                share_quantum: args.share_quantum,
            },
            mfn_reference_price: args.mfn_reference_price,
        }
    };

    let result = safe::convert_safe(&request)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for converting all SAFEs at a round
#[derive(Args)]
pub struct ConvertRoundArgs {
    /// Path to JSON/YAML input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_convert_round(args: ConvertRoundArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: RoundConversionRequest = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(piped) = input::stdin::read_stdin()? {
        piped
    } else {
        return Err("--input <file.json> or stdin required for round conversion".into());
    };
    let result = batch::convert_round(&request)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for the MFN price adjustment
#[derive(Args)]
pub struct MfnArgs {
    /// Conversion price on the holder's own terms
    #[arg(long)]
    pub current_price: Decimal,

    /// Best price granted to any later SAFE holder
    #[arg(long)]
    pub best_known_price: Decimal,
}

pub fn run_apply_mfn(args: MfnArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let price = safe::apply_mfn(args.current_price, args.best_known_price);
    Ok(serde_json::json!({
        "result": {
            "conversion_price": price,
            "mfn_applied": price < args.current_price,
        }
    }))
}
