//! # Company Store
//!
//! The canonical collection of tracked companies. Records are keyed by name
//! (case-insensitive), mutated only through upsert and delete, and written in
//! full to a storage backend after every change.
//!
//! ## Architecture
//!
//! - **CompanyStore**: in-memory collection, upsert/delete, valuation ranking
//! - **RecordStorage**: trait for storage backends
//! - **JsonFileStorage**: JSON file on disk, replaced atomically on write
//! - **InMemoryStorage**: shared in-memory backend for tests
//! - **legacy**: mapping from historical file layouts to the canonical schema
//!
//! ## Usage
//!
//! ```rust
//! use company_store::{CompanyInput, CompanyStore, InMemoryStorage};
//!
//! let mut store = CompanyStore::open(InMemoryStorage::new())?;
//! store.upsert(CompanyInput {
//!     earnings_next_year: 10.0,
//!     pe_multiples: vec![12.0, 8.0],
//!     ..CompanyInput::new("Acme", 100.0)
//! })?;
//!
//! let ranked = store.list_with_valuation(None);
//! assert_eq!(ranked[0].valuation.target_price_pe, Some(100.0));
//! # Ok::<(), company_store::StoreError>(())
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod legacy;
pub mod store;
pub mod types;

pub use backend::{InMemoryStorage, JsonFileStorage, RecordStorage};
pub use config::StoreConfig;
pub use error::{PersistenceError, Result, StoreError};
pub use legacy::{parse_legacy_document, LegacyCompany, LegacyDocument};
pub use store::{CompanyStore, ImportSummary, RankedCompany};
pub use types::{name_key, CompanyInput, CompanyRecord};

/// Re-export the valuation types records are annotated with
pub use valuation_engine::{ValuationInputs, ValuationResult};
