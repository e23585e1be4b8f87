pub mod conversion;
pub mod follow_on;
