pub mod bids;
pub mod ledger;
pub mod settings;

pub use bids::Bids;
pub use ledger::Ledger;
pub use settings::Settings;
