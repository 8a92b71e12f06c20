pub mod bids;
pub mod ledger;
pub mod settings;
