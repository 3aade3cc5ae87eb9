//! Target price and undervaluation calculations
//!
//! Nothing here rounds. Rounding is a display concern of whoever renders the
//! numbers.

use crate::models::{ValuationInputs, ValuationResult};

/// Average of the strictly positive, finite samples
///
/// Placeholder entries (`0`, negatives, NaN) are dropped rather than averaged
/// in as zero. Returns `None` when nothing usable remains.
pub fn mean_of_positive(samples: &[f64]) -> Option<f64> {
    let (sum, count) = samples
        .iter()
        .filter(|sample| sample.is_finite() && **sample > 0.0)
        .fold((0.0, 0usize), |(sum, count), sample| (sum + sample, count + 1));

    if count == 0 {
        return None;
    }

    Some(sum / count as f64)
}

/// Target price from next period's earnings and the average historical P/E
///
/// `earnings_next_period` may be zero or negative; the product is returned as
/// is. Absent earnings or no usable P/E sample gives `None`.
pub fn target_price_from_pe(earnings_next_period: Option<f64>, pe_samples: &[f64]) -> Option<f64> {
    let earnings = earnings_next_period.filter(|e| e.is_finite())?;
    let pe_avg = mean_of_positive(pe_samples)?;

    Some(earnings * pe_avg)
}

/// Target price from the average historical P/S, scaled by expected growth
///
/// The two growth percentages are simple-averaged, not compounded. If only one
/// is present it is used alone; if neither is, growth is taken as zero.
pub fn target_price_from_ps(
    current_price: Option<f64>,
    ps_samples: &[f64],
    growth_pct_this_year: Option<f64>,
    growth_pct_next_year: Option<f64>,
) -> Option<f64> {
    let price = current_price.filter(|p| p.is_finite() && *p > 0.0)?;
    let ps_avg = mean_of_positive(ps_samples)?;

    let growth: Vec<f64> = [growth_pct_this_year, growth_pct_next_year]
        .into_iter()
        .flatten()
        .filter(|g| g.is_finite())
        .collect();
    let growth_factor = if growth.is_empty() {
        1.0
    } else {
        1.0 + (growth.iter().sum::<f64>() / growth.len() as f64) / 100.0
    };

    Some(ps_avg * growth_factor * price)
}

/// Percentage by which `target_price` exceeds `current_price`, relative to the target
///
/// Positive means the stock trades below its computed fair value. Negative
/// values are kept; clamping is left to callers.
pub fn undervaluation_pct(current_price: Option<f64>, target_price: Option<f64>) -> Option<f64> {
    let current = current_price.filter(|p| p.is_finite())?;
    let target = target_price.filter(|t| t.is_finite() && *t != 0.0)?;

    Some((target - current) / target * 100.0)
}

/// The more optimistic of the two per-method undervaluations
pub fn combined_undervaluation(inputs: &ValuationInputs) -> Option<f64> {
    valuate(inputs).undervaluation_pct
}

/// Compute every derived valuation field for one company
pub fn valuate(inputs: &ValuationInputs) -> ValuationResult {
    let target_price_pe = target_price_from_pe(inputs.earnings_next_year, &inputs.pe_multiples);
    let target_price_ps = target_price_from_ps(
        inputs.current_price,
        &inputs.ps_multiples,
        inputs.revenue_growth_this_year_pct,
        inputs.revenue_growth_next_year_pct,
    );

    let undervaluation_pe_pct = undervaluation_pct(inputs.current_price, target_price_pe);
    let undervaluation_ps_pct = undervaluation_pct(inputs.current_price, target_price_ps);

    let undervaluation_pct = match (undervaluation_pe_pct, undervaluation_ps_pct) {
        (Some(pe), Some(ps)) => Some(pe.max(ps)),
        (pe, ps) => pe.or(ps),
    };

    ValuationResult {
        target_price_pe,
        target_price_ps,
        undervaluation_pe_pct,
        undervaluation_ps_pct,
        undervaluation_pct,
    }
}
