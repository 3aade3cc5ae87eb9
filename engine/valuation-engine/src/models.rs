use serde::{Deserialize, Serialize};

/// Inputs the engine needs from a tracked company
///
/// Every scalar is optional: `None` means "no data", which the engine keeps
/// apart from a real zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationInputs {
    /// Current market price
    pub current_price: Option<f64>,

    /// Expected earnings per share for next year
    pub earnings_next_year: Option<f64>,

    /// Expected revenue growth this year, in percent
    pub revenue_growth_this_year_pct: Option<f64>,

    /// Expected revenue growth next year, in percent
    pub revenue_growth_next_year_pct: Option<f64>,

    /// Historical P/E samples (non-positive entries mean "no data")
    pub pe_multiples: Vec<f64>,

    /// Historical P/S samples (non-positive entries mean "no data")
    pub ps_multiples: Vec<f64>,
}

/// Derived valuation for one company, computed on demand and never persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    /// Target price from forward earnings and the average historical P/E
    pub target_price_pe: Option<f64>,

    /// Target price from the average historical P/S and revenue growth
    pub target_price_ps: Option<f64>,

    /// Undervaluation against the P/E target, in percent
    pub undervaluation_pe_pct: Option<f64>,

    /// Undervaluation against the P/S target, in percent
    pub undervaluation_ps_pct: Option<f64>,

    /// The larger of the two per-method undervaluations (unclamped)
    pub undervaluation_pct: Option<f64>,
}

impl ValuationResult {
    /// Whether either valuation method produced a target
    pub fn has_target(&self) -> bool {
        self.target_price_pe.is_some() || self.target_price_ps.is_some()
    }

    /// Whether the combined undervaluation reaches `threshold_pct` (inclusive)
    ///
    /// Companies without a combined figure never qualify.
    pub fn meets_threshold(&self, threshold_pct: f64) -> bool {
        self.undervaluation_pct.is_some_and(|pct| pct >= threshold_pct)
    }
}
