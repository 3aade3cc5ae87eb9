//! Mapping layer for historical company files
//!
//! Older data files spell the same fields many different ways (`kurs`,
//! `nuvarande_kurs`, `vinst_nastaar`, `pe1`..`pe4`, ...) and come in two
//! shapes: an array of objects that carry their own name, or an object keyed
//! by company name. This module turns either shape into canonical
//! [`CompanyInput`]s so nothing past the store boundary sees the old keys.

use crate::error::PersistenceError;
use crate::types::CompanyInput;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::warn;

const NAME_KEYS: &[&str] = &["name", "bolagsnamn", "namn", "bolag"];
const PRICE_KEYS: &[&str] = &["current_price", "kurs", "nuvarande_kurs", "aktuell_kurs"];
const EARNINGS_PRIOR_KEYS: &[&str] = &[
    "earnings_prior_year",
    "vinst_ifjol",
    "vinst_fjol",
    "vinst_forra_aret",
];
const EARNINGS_THIS_KEYS: &[&str] = &[
    "earnings_this_year",
    "vinst_iar",
    "vinst_igar",
    "vinst_i_ar",
];
const EARNINGS_NEXT_KEYS: &[&str] = &[
    "earnings_next_year",
    "vinst_nasta_ar",
    "vinst_nastaar",
    "förväntad_vinst_nästa_år",
];
const REVENUE_PRIOR_KEYS: &[&str] = &[
    "revenue_prior_year",
    "oms_ifjol",
    "oms_fjol",
    "omsattning_forra_aret",
];
const GROWTH_THIS_KEYS: &[&str] = &[
    "revenue_growth_this_year_pct",
    "oms_tillv_i_ar",
    "oms_tillv_igar",
    "omsattningstillvaxt_ar",
];
const GROWTH_NEXT_KEYS: &[&str] = &[
    "revenue_growth_next_year_pct",
    "oms_tillv_nasta_ar",
    "oms_tillv_nastaar",
    "omsattningstillvaxt_nastaar",
];
const CURRENT_PE_KEYS: &[&str] = &["current_pe", "pe0", "pe_nu", "nuvarande_pe"];
const CURRENT_PS_KEYS: &[&str] = &["current_ps", "ps0", "ps_nu", "nuvarande_ps"];
const CREATED_KEYS: &[&str] = &["created_at", "insatt_datum", "skapad"];
const MODIFIED_KEYS: &[&str] = &["modified_at", "senast_andrad", "senast_uppdaterad"];

/// Highest numbered historical multiple column in old files (`pe1`..`pe4`)
const MAX_LEGACY_SAMPLES: usize = 4;

/// One company recovered from a legacy file
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyCompany {
    pub input: CompanyInput,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Result of parsing a legacy file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyDocument {
    pub companies: Vec<LegacyCompany>,

    /// Entries dropped because they had no usable name or were not objects
    pub skipped: usize,
}

/// Parse a legacy JSON document in either supported shape
pub fn parse_legacy_document(content: &str) -> Result<LegacyDocument, PersistenceError> {
    if content.trim().is_empty() {
        return Ok(LegacyDocument::default());
    }

    let value: Value = serde_json::from_str(content)?;
    let mut document = LegacyDocument::default();

    match value {
        Value::Array(entries) => {
            for entry in entries {
                match entry {
                    Value::Object(fields) => push_company(&mut document, None, &fields),
                    other => {
                        warn!("Skipping non-object legacy entry: {}", other);
                        document.skipped += 1;
                    }
                }
            }
        }
        Value::Object(by_name) => {
            for (name, entry) in by_name {
                match entry {
                    Value::Object(fields) => {
                        push_company(&mut document, Some(name.as_str()), &fields)
                    }
                    _ => {
                        warn!("Skipping legacy entry {:?}: not an object", name);
                        document.skipped += 1;
                    }
                }
            }
        }
        _ => {
            return Err(PersistenceError::corruption(
                "legacy document must be a JSON array or object",
            ))
        }
    }

    Ok(document)
}

fn push_company(
    document: &mut LegacyDocument,
    key_name: Option<&str>,
    fields: &Map<String, Value>,
) {
    match map_company(key_name, fields) {
        Some(company) => document.companies.push(company),
        None => {
            warn!("Skipping legacy entry without a company name");
            document.skipped += 1;
        }
    }
}

/// Map one legacy object onto the canonical schema
///
/// A name inside the object wins over the key it is stored under. Returns
/// `None` if no name can be found.
pub fn map_company(key_name: Option<&str>, fields: &Map<String, Value>) -> Option<LegacyCompany> {
    let name = text(fields, NAME_KEYS)
        .filter(|name| !name.trim().is_empty())
        .or_else(|| key_name.map(str::to_string))
        .filter(|name| !name.trim().is_empty())?;

    let input = CompanyInput {
        current_price: number(fields, PRICE_KEYS),
        earnings_prior_year: number(fields, EARNINGS_PRIOR_KEYS),
        earnings_this_year: number(fields, EARNINGS_THIS_KEYS),
        earnings_next_year: number(fields, EARNINGS_NEXT_KEYS),
        revenue_prior_year: number(fields, REVENUE_PRIOR_KEYS),
        revenue_growth_this_year_pct: number(fields, GROWTH_THIS_KEYS),
        revenue_growth_next_year_pct: number(fields, GROWTH_NEXT_KEYS),
        pe_multiples: samples(fields, "pe_multiples", "pe"),
        ps_multiples: samples(fields, "ps_multiples", "ps"),
        current_pe: number(fields, CURRENT_PE_KEYS),
        current_ps: number(fields, CURRENT_PS_KEYS),
        ..CompanyInput::new(name, 0.0)
    };

    Some(LegacyCompany {
        input,
        created_at: date(fields, CREATED_KEYS),
        modified_at: date(fields, MODIFIED_KEYS),
    })
}

fn lookup<'a, 'k>(
    fields: &'a Map<String, Value>,
    keys: &[&'k str],
) -> Option<(&'k str, &'a Value)> {
    keys.iter().find_map(|key| {
        fields
            .get(*key)
            .filter(|value| !value.is_null())
            .map(|value| (*key, value))
    })
}

fn text(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match lookup(fields, keys)? {
        (_, Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

/// First matching key as a number; missing or unreadable values become 0
fn number(fields: &Map<String, Value>, keys: &[&str]) -> f64 {
    match lookup(fields, keys) {
        Some((key, value)) => parse_number(value).unwrap_or_else(|| {
            warn!("Unreadable number for {}: {}, using 0", key, value);
            0.0
        }),
        None => 0.0,
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            if cleaned.is_empty() {
                Some(0.0)
            } else {
                cleaned.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// Historical multiples from a canonical array or numbered columns
///
/// Numbered columns accept both `pe1` and `pe_1`. Present-but-zero columns are
/// kept as placeholders; the engine ignores them when averaging.
fn samples(fields: &Map<String, Value>, array_key: &str, prefix: &str) -> Vec<f64> {
    if let Some(Value::Array(values)) = fields.get(array_key) {
        return values
            .iter()
            .map(|value| parse_number(value).unwrap_or(0.0))
            .collect();
    }

    (1..=MAX_LEGACY_SAMPLES)
        .filter_map(|i| {
            let plain = format!("{prefix}{i}");
            let underscored = format!("{prefix}_{i}");
            let (key, value) = lookup(fields, &[plain.as_str(), underscored.as_str()])?;
            Some(parse_number(value).unwrap_or_else(|| {
                warn!("Unreadable multiple {}: {}, using 0", key, value);
                0.0
            }))
        })
        .collect()
}

/// RFC 3339 timestamps or plain `YYYY-MM-DD` dates (taken as midnight UTC)
fn date(fields: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    let raw = text(fields, keys)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }

    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(day) => day.and_hms_opt(0, 0, 0).map(|midnight| Utc.from_utc_datetime(&midnight)),
        Err(_) => {
            warn!("Unreadable date {:?}, ignoring", raw);
            None
        }
    }
}
