//! The auction engine: window bucketing, settings resolution, bid
//! submission, and window clearing. Everything in here operates on the
//! repositories in `db::handlers`; scheduling lives in `crate::scheduler`.

pub mod clearing;
pub mod settings;
pub mod submit;
pub mod window;
