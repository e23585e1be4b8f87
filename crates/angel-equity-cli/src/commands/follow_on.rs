use clap::Args;
use serde_json::Value;

use angel_equity_core::follow_on::allocation::{self, FollowOnRequest};
use angel_equity_core::follow_on::opportunity::{self, OpportunityInput};

use crate::input;

/// Arguments for deriving a follow-on opportunity
#[derive(Args)]
pub struct OpportunityArgs {
    /// Path to JSON/YAML input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for follow-on allocation
#[derive(Args)]
pub struct AllocateArgs {
    /// Path to JSON/YAML input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_opportunity(args: OpportunityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let opp_input: OpportunityInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(piped) = input::stdin::read_stdin()? {
        piped
    } else {
        return Err("--input <file.json> or stdin required for follow-on opportunity".into());
    };
    let result = opportunity::build_opportunity(&opp_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_allocate(args: AllocateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: FollowOnRequest = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(piped) = input::stdin::read_stdin()? {
        piped
    } else {
        return Err("--input <file.json> or stdin required for follow-on allocation".into());
    };
    let result = allocation::allocate_follow_on(&request)?;
    Ok(serde_json::to_value(result)?)
}
