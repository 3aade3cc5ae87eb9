use crate::backend::{JsonFileStorage, RecordStorage};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::legacy::LegacyCompany;
use crate::types::{name_key, CompanyInput, CompanyRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use valuation_engine::ValuationResult;

/// A stored company paired with its derived valuation
#[derive(Debug, Clone, Serialize)]
pub struct RankedCompany<'a> {
    #[serde(flatten)]
    pub record: &'a CompanyRecord,
    pub valuation: ValuationResult,
}

/// Outcome of a legacy import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
    pub rejected: usize,
}

/// Company Store - the canonical collection of tracked companies
///
/// All mutation goes through [`upsert`](Self::upsert) and
/// [`delete`](Self::delete), each followed by a full write to the backend.
/// If that write fails the in-memory change stays applied and the error is
/// returned; the next successful write catches the backend up.
pub struct CompanyStore {
    backend: Box<dyn RecordStorage>,

    /// Records keyed by normalized name
    companies: HashMap<String, CompanyRecord>,
}

impl CompanyStore {
    /// Load the collection from `backend`
    pub fn open(backend: impl RecordStorage + 'static) -> Result<Self> {
        let backend: Box<dyn RecordStorage> = Box::new(backend);
        let records = backend.load()?;
        let loaded = records.len();

        let mut companies: HashMap<String, CompanyRecord> = HashMap::with_capacity(loaded);
        for record in records {
            let key = record.key();
            if key.is_empty() {
                warn!("Skipping stored entry without a company name");
                continue;
            }

            let stale = companies
                .get(&key)
                .is_some_and(|existing| existing.modified_at >= record.modified_at);
            if stale {
                warn!("Dropping stale duplicate entry for {}", record.name);
                continue;
            }

            let name = record.name.clone();
            if companies.insert(key, record).is_some() {
                warn!("Replacing duplicate entry for {} with newer copy", name);
            }
        }

        info!("Loaded {} companies from {}", companies.len(), backend.describe());
        Ok(Self { backend, companies })
    }

    /// Open the JSON file named in `config`
    pub fn open_json(config: &StoreConfig) -> Result<Self> {
        Self::open(JsonFileStorage::from_config(config)?)
    }

    /// Insert or update a company, matched case-insensitively by name
    pub fn upsert(&mut self, input: CompanyInput) -> Result<&CompanyRecord> {
        self.upsert_at(input, Utc::now())
    }

    /// [`upsert`](Self::upsert) with an explicit timestamp
    pub fn upsert_at(&mut self, input: CompanyInput, now: DateTime<Utc>) -> Result<&CompanyRecord> {
        let input = input.validated()?;
        let key = name_key(&input.name);

        let inserted = self.apply(key.clone(), input, now, now);
        if inserted {
            info!("Added company {}", self.companies[&key].name);
        } else {
            info!("Updated company {}", self.companies[&key].name);
        }

        self.persist()?;
        Ok(&self.companies[&key])
    }

    /// Remove a company by name
    ///
    /// Returns `false` (and writes nothing) when no company matches.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        let Some(removed) = self.companies.remove(&name_key(name)) else {
            debug!("Delete of unknown company {:?} ignored", name);
            return Ok(false);
        };

        info!("Deleted company {}", removed.name);
        self.persist()?;
        Ok(true)
    }

    /// Merge companies recovered from a legacy file, writing once at the end
    ///
    /// Legacy dates seed `created_at`/`modified_at` for companies not yet in
    /// the store. Existing companies, including a name repeated within the
    /// batch, are updated like a normal upsert at `now` and their legacy dates
    /// are ignored. Entries that fail validation are skipped and counted.
    pub fn import_legacy(
        &mut self,
        companies: Vec<LegacyCompany>,
        now: DateTime<Utc>,
    ) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        for legacy in companies {
            let input = match legacy.input.validated() {
                Ok(input) => input,
                Err(e) => {
                    warn!("Skipping legacy entry: {}", e);
                    summary.rejected += 1;
                    continue;
                }
            };

            let key = name_key(&input.name);
            let (created_at, modified_at) = match self.companies.get(&key) {
                // legacy dates never move an existing record back in time
                Some(existing) => (existing.created_at, now.max(existing.modified_at)),
                None => {
                    let created_at = legacy.created_at.or(legacy.modified_at).unwrap_or(now);
                    (created_at, legacy.modified_at.unwrap_or(now).max(created_at))
                }
            };

            if self.apply(key, input, created_at, modified_at) {
                summary.inserted += 1;
            } else {
                summary.updated += 1;
            }
        }

        info!(
            "Imported legacy companies: {} inserted, {} updated, {} rejected",
            summary.inserted, summary.updated, summary.rejected
        );

        if summary.inserted + summary.updated > 0 {
            self.persist()?;
        }
        Ok(summary)
    }

    /// Every company with its valuation, best undervaluation first
    ///
    /// Companies without a combined undervaluation sort last. With
    /// `min_undervaluation_pct`, companies below the bound (or without a
    /// figure) are left out of the result; the bound itself is included.
    pub fn list_with_valuation(
        &self,
        min_undervaluation_pct: Option<f64>,
    ) -> Vec<RankedCompany<'_>> {
        let mut ranked: Vec<RankedCompany<'_>> = self
            .companies
            .values()
            .map(|record| RankedCompany {
                record,
                valuation: valuation_engine::valuate(&record.valuation_inputs()),
            })
            .filter(|company| match min_undervaluation_pct {
                Some(threshold) => company.valuation.meets_threshold(threshold),
                None => true,
            })
            .collect();

        ranked.sort_by(|a, b| {
            rank_order(a.valuation.undervaluation_pct, b.valuation.undervaluation_pct)
                .then_with(|| a.record.name.cmp(&b.record.name))
        });
        ranked
    }

    /// Look up a company by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&CompanyRecord> {
        self.companies.get(&name_key(name))
    }

    /// All companies, oldest first
    pub fn records(&self) -> Vec<&CompanyRecord> {
        let mut records: Vec<&CompanyRecord> = self.companies.values().collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        records
    }

    /// Number of companies
    pub fn len(&self) -> usize {
        self.companies.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    /// Write the full collection to the backend
    pub fn flush(&self) -> Result<()> {
        self.persist()
    }

    /// Replace or insert the record under `key`; returns whether it was new
    fn apply(
        &mut self,
        key: String,
        input: CompanyInput,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> bool {
        match self.companies.get_mut(&key) {
            Some(existing) => {
                *existing = CompanyRecord::from_input(input, existing.created_at, modified_at);
                false
            }
            None => {
                let record = CompanyRecord::from_input(input, created_at, modified_at);
                self.companies.insert(key, record);
                true
            }
        }
    }

    fn persist(&self) -> Result<()> {
        let records: Vec<CompanyRecord> = self.records().into_iter().cloned().collect();
        if let Err(e) = self.backend.save(&records) {
            warn!(
                "Failed to persist {} companies to {}: {}",
                records.len(),
                self.backend.describe(),
                e
            );
            return Err(e.into());
        }
        debug!("Persisted {} companies", records.len());
        Ok(())
    }
}

/// Descending by undervaluation, missing values last
fn rank_order(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryStorage;
    use crate::error::StoreError;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap()
    }

    fn acme() -> CompanyInput {
        CompanyInput {
            earnings_next_year: 10.0,
            pe_multiples: vec![12.0, 8.0],
            ..CompanyInput::new("Acme", 100.0)
        }
    }

    /// Company with a P/E target of 100, so undervaluation is `100 - price`
    fn priced_for(name: &str, pct: f64) -> CompanyInput {
        CompanyInput {
            earnings_next_year: 10.0,
            pe_multiples: vec![10.0],
            ..CompanyInput::new(name, 100.0 - pct)
        }
    }

    fn open_store() -> (CompanyStore, InMemoryStorage) {
        let storage = InMemoryStorage::new();
        let store = CompanyStore::open(storage.clone()).unwrap();
        (store, storage)
    }

    #[test]
    fn test_upsert_inserts_and_persists() {
        let (mut store, storage) = open_store();

        let record = store.upsert_at(acme(), t0()).unwrap();
        assert_eq!(record.created_at, t0());
        assert_eq!(record.modified_at, t0());

        assert_eq!(store.len(), 1);
        assert_eq!(storage.save_count(), 1);
        assert_eq!(storage.stored()[0].name, "Acme");
    }

    #[test]
    fn test_upsert_twice_keeps_first_created_at() {
        let (mut store, _) = open_store();
        let later = t0() + Duration::minutes(5);

        store.upsert_at(acme(), t0()).unwrap();
        store.upsert_at(acme(), later).unwrap();

        assert_eq!(store.len(), 1);
        let record = store.get("Acme").unwrap();
        assert_eq!(record.created_at, t0());
        assert_eq!(record.modified_at, later);
    }

    #[test]
    fn test_upsert_matches_case_insensitively() {
        let (mut store, _) = open_store();
        store.upsert_at(acme(), t0()).unwrap();

        store.upsert_at(CompanyInput::new(" ACME ", 80.0), t0() + Duration::days(1)).unwrap();

        assert_eq!(store.len(), 1);
        let record = store.get("acme").unwrap();
        assert_eq!(record.name, "ACME");
        assert_eq!(record.current_price, 80.0);
        // every field except created_at is replaced
        assert!(record.pe_multiples.is_empty());
        assert_eq!(record.created_at, t0());
    }

    #[test]
    fn test_blank_name_rejected_without_write() {
        let (mut store, storage) = open_store();

        let err = store.upsert(CompanyInput::new("   ", 10.0)).unwrap_err();

        assert!(matches!(err, StoreError::InvalidName(_)));
        assert!(store.is_empty());
        assert_eq!(storage.save_count(), 0);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let (mut store, storage) = open_store();
        store.upsert_at(acme(), t0()).unwrap();

        assert!(!store.delete("Globex").unwrap());
        assert!(!store.delete("Globex").unwrap());

        assert_eq!(store.len(), 1);
        assert_eq!(storage.save_count(), 1);
    }

    #[test]
    fn test_delete_existing_persists() {
        let (mut store, storage) = open_store();
        store.upsert_at(acme(), t0()).unwrap();

        assert!(store.delete("aCmE").unwrap());

        assert!(store.is_empty());
        assert!(storage.stored().is_empty());
        assert_eq!(storage.save_count(), 2);
    }

    #[test]
    fn test_failed_persist_keeps_memory_state() {
        let (mut store, storage) = open_store();
        storage.set_fail_writes(true);

        let err = store.upsert_at(acme(), t0()).unwrap_err();
        assert!(matches!(err, StoreError::Persistence(_)));
        assert!(!err.is_validation());

        // memory is the source of truth until the next successful flush
        assert!(store.get("Acme").is_some());
        assert!(storage.stored().is_empty());

        storage.set_fail_writes(false);
        store.flush().unwrap();
        assert_eq!(storage.stored().len(), 1);
    }

    #[test]
    fn test_list_sorted_descending_with_missing_last() {
        let (mut store, _) = open_store();
        store.upsert_at(priced_for("Low", 10.0), t0()).unwrap();
        store.upsert_at(priced_for("High", 50.0), t0()).unwrap();
        store.upsert_at(CompanyInput::new("NoData", 25.0), t0()).unwrap();
        store.upsert_at(priced_for("Over", -20.0), t0()).unwrap();

        let names: Vec<&str> = store
            .list_with_valuation(None)
            .iter()
            .map(|c| c.record.name.as_str())
            .collect();

        assert_eq!(names, vec!["High", "Low", "Over", "NoData"]);
    }

    #[test]
    fn test_list_threshold_is_inclusive() {
        let (mut store, _) = open_store();
        store.upsert_at(priced_for("Exactly", 30.0), t0()).unwrap();
        store.upsert_at(priced_for("Almost", 29.9), t0()).unwrap();
        store.upsert_at(CompanyInput::new("NoData", 25.0), t0()).unwrap();

        let candidates = store.list_with_valuation(Some(30.0));

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].record.name, "Exactly");
        // filtering never touches the store
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_list_reports_per_method_values() {
        let (mut store, _) = open_store();
        store.upsert_at(acme(), t0()).unwrap();

        let ranked = store.list_with_valuation(None);
        let valuation = ranked[0].valuation;

        assert_eq!(valuation.target_price_pe, Some(100.0));
        assert_eq!(valuation.undervaluation_pe_pct, Some(0.0));
        assert_eq!(valuation.target_price_ps, None);
        assert_eq!(valuation.undervaluation_pct, Some(0.0));
    }

    #[test]
    fn test_open_resolves_duplicate_names() {
        let older = CompanyRecord::from_input(CompanyInput::new("Acme", 1.0), t0(), t0());
        let newer = CompanyRecord::from_input(
            CompanyInput::new("ACME", 2.0),
            t0(),
            t0() + Duration::hours(1),
        );
        let storage = InMemoryStorage::with_records(vec![newer, older]);

        let store = CompanyStore::open(storage).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("acme").unwrap().current_price, 2.0);
    }

    #[test]
    fn test_import_legacy_seeds_timestamps_once() {
        let (mut store, storage) = open_store();
        store.upsert_at(acme(), t0()).unwrap();

        let legacy_date = Utc.with_ymd_and_hms(2023, 5, 2, 0, 0, 0).unwrap();
        let companies = vec![
            LegacyCompany {
                input: CompanyInput::new("Globex", 40.0),
                created_at: Some(legacy_date),
                modified_at: None,
            },
            LegacyCompany {
                input: CompanyInput::new("acme", 95.0),
                created_at: Some(legacy_date),
                modified_at: None,
            },
            LegacyCompany {
                input: CompanyInput::new("", 1.0),
                created_at: None,
                modified_at: None,
            },
        ];
        let now = t0() + Duration::days(3);

        let summary = store.import_legacy(companies, now).unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                inserted: 1,
                updated: 1,
                rejected: 1
            }
        );
        assert_eq!(storage.save_count(), 2);

        let globex = store.get("Globex").unwrap();
        assert_eq!(globex.created_at, legacy_date);
        assert_eq!(globex.modified_at, now);

        let acme = store.get("Acme").unwrap();
        assert_eq!(acme.created_at, t0());
        assert_eq!(acme.modified_at, now);
        assert_eq!(acme.current_price, 95.0);
    }

    #[test]
    fn test_import_over_existing_ignores_old_legacy_dates() {
        let (mut store, _) = open_store();
        store.upsert_at(acme(), t0()).unwrap();

        let document = crate::legacy::parse_legacy_document(
            r#"{"Acme": {"kurs": 90, "senast_andrad": "2023-05-02"}}"#,
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();

        let summary = store.import_legacy(document.companies, now).unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                inserted: 0,
                updated: 1,
                rejected: 0
            }
        );
        let acme = store.get("Acme").unwrap();
        assert_eq!(acme.current_price, 90.0);
        assert_eq!(acme.created_at, t0());
        assert_eq!(acme.modified_at, now);
    }

    #[test]
    fn test_import_repeated_name_keeps_first_dates() {
        let (mut store, _) = open_store();
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let stale = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let now = t0();
        let companies = vec![
            LegacyCompany {
                input: CompanyInput::new("Acme", 80.0),
                created_at: Some(created),
                modified_at: Some(created),
            },
            LegacyCompany {
                input: CompanyInput::new("ACME", 85.0),
                created_at: Some(stale),
                modified_at: Some(stale),
            },
        ];

        let summary = store.import_legacy(companies, now).unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                inserted: 1,
                updated: 1,
                rejected: 0
            }
        );
        let acme = store.get("acme").unwrap();
        assert_eq!(acme.current_price, 85.0);
        assert_eq!(acme.created_at, created);
        assert_eq!(acme.modified_at, now);
        assert!(acme.modified_at >= acme.created_at);
    }

    #[test]
    fn test_open_skips_entries_without_name() {
        let blank = CompanyRecord::from_input(CompanyInput::new("  ", 1.0), t0(), t0());
        let acme = CompanyRecord::from_input(acme(), t0(), t0());
        let storage = InMemoryStorage::with_records(vec![blank, acme]);

        let store = CompanyStore::open(storage).unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.get("").is_none());
        assert!(store.get("Acme").is_some());
    }
}
