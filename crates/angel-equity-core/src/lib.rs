pub mod error;
pub mod types;

#[cfg(feature = "conversion")]
pub mod conversion;

#[cfg(feature = "follow_on")]
pub mod follow_on;

pub use error::EquityError;
pub use types::*;

/// Standard result type for all angel-equity operations
pub type EquityResult<T> = Result<T, EquityError>;
