//! Valuation Engine
//!
//! Pure, stateless fair value calculations. A company's forward earnings and
//! historical P/E samples give one target price, its current price, revenue
//! growth and historical P/S samples give another. Each target is compared
//! to the market price as an undervaluation percentage.
//!
//! Missing or non-positive inputs never produce an error or a `0`; every
//! calculation degrades to `None` so "no data" stays distinguishable from a
//! legitimate zero.

pub mod calculator;
pub mod models;

pub use calculator::{
    combined_undervaluation, mean_of_positive, target_price_from_pe, target_price_from_ps,
    undervaluation_pct, valuate,
};
pub use models::{ValuationInputs, ValuationResult};
