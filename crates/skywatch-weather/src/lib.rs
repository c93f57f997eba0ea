//! Weather provider access for Skywatch
//!
//! Fetches current conditions from the OpenWeatherMap API and defines the
//! reading and daily summary records the rest of the pipeline stores.

pub mod provider;
pub mod types;

pub use provider::{parse_current, OpenWeatherClient};
pub use types::*;
