use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use valuation_engine::ValuationInputs;

/// A tracked company as it is persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    /// Company name (unique, matched case-insensitively)
    pub name: String,

    /// Current market price
    #[serde(default)]
    pub current_price: f64,

    #[serde(default)]
    pub earnings_prior_year: f64,

    #[serde(default)]
    pub earnings_this_year: f64,

    #[serde(default)]
    pub earnings_next_year: f64,

    #[serde(default)]
    pub revenue_prior_year: f64,

    /// Expected revenue growth this year, in percent
    #[serde(default)]
    pub revenue_growth_this_year_pct: f64,

    /// Expected revenue growth next year, in percent
    #[serde(default)]
    pub revenue_growth_next_year_pct: f64,

    /// Historical P/E samples
    #[serde(default)]
    pub pe_multiples: Vec<f64>,

    /// Historical P/S samples
    #[serde(default)]
    pub ps_multiples: Vec<f64>,

    /// Current P/E (informational)
    #[serde(default)]
    pub current_pe: f64,

    /// Current P/S (informational)
    #[serde(default)]
    pub current_ps: f64,

    /// Set at first insert, never changed afterwards
    pub created_at: DateTime<Utc>,

    /// Refreshed on every update
    pub modified_at: DateTime<Utc>,
}

impl CompanyRecord {
    /// Build a record from a validated candidate
    pub fn from_input(
        input: CompanyInput,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: input.name,
            current_price: input.current_price,
            earnings_prior_year: input.earnings_prior_year,
            earnings_this_year: input.earnings_this_year,
            earnings_next_year: input.earnings_next_year,
            revenue_prior_year: input.revenue_prior_year,
            revenue_growth_this_year_pct: input.revenue_growth_this_year_pct,
            revenue_growth_next_year_pct: input.revenue_growth_next_year_pct,
            pe_multiples: input.pe_multiples,
            ps_multiples: input.ps_multiples,
            current_pe: input.current_pe,
            current_ps: input.current_ps,
            created_at,
            modified_at,
        }
    }

    /// Map the record onto the valuation engine's inputs
    ///
    /// A zero price is treated as "not recorded" rather than a real price.
    pub fn valuation_inputs(&self) -> ValuationInputs {
        ValuationInputs {
            current_price: Some(self.current_price).filter(|price| *price > 0.0),
            earnings_next_year: Some(self.earnings_next_year),
            revenue_growth_this_year_pct: Some(self.revenue_growth_this_year_pct),
            revenue_growth_next_year_pct: Some(self.revenue_growth_next_year_pct),
            pe_multiples: self.pe_multiples.clone(),
            ps_multiples: self.ps_multiples.clone(),
        }
    }

    /// Key used for case-insensitive matching
    pub fn key(&self) -> String {
        name_key(&self.name)
    }
}

/// Candidate record passed to [`crate::CompanyStore::upsert`]
///
/// Only `name` and `current_price` are required when deserializing; every
/// other field defaults to zero or empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyInput {
    pub name: String,
    pub current_price: f64,
    #[serde(default)]
    pub earnings_prior_year: f64,
    #[serde(default)]
    pub earnings_this_year: f64,
    #[serde(default)]
    pub earnings_next_year: f64,
    #[serde(default)]
    pub revenue_prior_year: f64,
    #[serde(default)]
    pub revenue_growth_this_year_pct: f64,
    #[serde(default)]
    pub revenue_growth_next_year_pct: f64,
    #[serde(default)]
    pub pe_multiples: Vec<f64>,
    #[serde(default)]
    pub ps_multiples: Vec<f64>,
    #[serde(default)]
    pub current_pe: f64,
    #[serde(default)]
    pub current_ps: f64,
}

impl CompanyInput {
    /// Create a candidate with just a name and a price
    pub fn new(name: impl Into<String>, current_price: f64) -> Self {
        Self {
            name: name.into(),
            current_price,
            ..Default::default()
        }
    }

    /// Check the candidate and return it with its name trimmed
    pub fn validated(mut self) -> Result<Self> {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            return Err(StoreError::InvalidName(self.name));
        }
        self.name = trimmed.to_string();

        for (field, value) in [
            ("current_price", self.current_price),
            ("revenue_prior_year", self.revenue_prior_year),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(StoreError::InvalidField { field, value });
            }
        }

        for (field, value) in [
            ("earnings_prior_year", self.earnings_prior_year),
            ("earnings_this_year", self.earnings_this_year),
            ("earnings_next_year", self.earnings_next_year),
            ("revenue_growth_this_year_pct", self.revenue_growth_this_year_pct),
            ("revenue_growth_next_year_pct", self.revenue_growth_next_year_pct),
            ("current_pe", self.current_pe),
            ("current_ps", self.current_ps),
        ] {
            if !value.is_finite() {
                return Err(StoreError::InvalidField { field, value });
            }
        }

        let multiples = self
            .pe_multiples
            .iter()
            .map(|value| ("pe_multiples", *value))
            .chain(self.ps_multiples.iter().map(|value| ("ps_multiples", *value)));
        for (field, value) in multiples {
            if !value.is_finite() {
                return Err(StoreError::InvalidField { field, value });
            }
        }

        Ok(self)
    }
}

/// Normalize a company name for matching
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
