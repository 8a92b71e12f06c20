pub mod bids;
pub mod credits;
pub mod windows;
