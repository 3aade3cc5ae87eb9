//! # Command Line Interface
//!
//! Stateless front end over the company store: every invocation loads the
//! store, runs one command and exits.

use crate::config::ScreenerConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use company_store::{
    parse_legacy_document, CompanyInput, CompanyRecord, CompanyStore, RankedCompany,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use valuation_engine::ValuationResult;

/// Fair value screener for tracked companies
#[derive(Parser, Debug)]
#[command(name = "screener")]
#[command(about = "Record company fundamentals and rank them by undervaluation")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Company data file, overriding the configuration
    #[arg(short, long, global = true)]
    pub data_file: Option<PathBuf>,

    /// Log level, overriding the configuration
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List companies ranked by undervaluation
    List {
        /// Only companies at least this undervalued (percent)
        #[arg(long, allow_negative_numbers = true, conflicts_with = "candidates")]
        min_undervaluation: Option<f64>,

        /// Only companies reaching the configured buy threshold
        #[arg(long)]
        candidates: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one company in detail
    Show {
        /// Company name (case-insensitive)
        name: String,
    },
    /// Add a company or replace an existing one
    Upsert(UpsertArgs),
    /// Remove a company
    Delete {
        /// Company name (case-insensitive)
        name: String,
    },
    /// Merge companies from an older data file
    Import {
        /// Legacy JSON file
        file: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct UpsertArgs {
    /// Company name
    #[arg(long)]
    pub name: String,

    /// Current share price
    #[arg(long)]
    pub price: f64,

    /// Earnings per share last year
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub eps_prior: f64,

    /// Expected earnings per share this year
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub eps_this: f64,

    /// Expected earnings per share next year
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub eps_next: f64,

    /// Revenue last year
    #[arg(long, default_value_t = 0.0)]
    pub revenue_prior: f64,

    /// Expected revenue growth this year (percent)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub growth_this: f64,

    /// Expected revenue growth next year (percent)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub growth_next: f64,

    /// Current P/E
    #[arg(long, default_value_t = 0.0)]
    pub pe_now: f64,

    /// Current P/S
    #[arg(long, default_value_t = 0.0)]
    pub ps_now: f64,

    /// Historical P/E sample (repeatable)
    #[arg(long = "pe", value_name = "MULTIPLE")]
    pub pe_multiples: Vec<f64>,

    /// Historical P/S sample (repeatable)
    #[arg(long = "ps", value_name = "MULTIPLE")]
    pub ps_multiples: Vec<f64>,
}

impl From<UpsertArgs> for CompanyInput {
    fn from(args: UpsertArgs) -> Self {
        Self {
            name: args.name,
            current_price: args.price,
            earnings_prior_year: args.eps_prior,
            earnings_this_year: args.eps_this,
            earnings_next_year: args.eps_next,
            revenue_prior_year: args.revenue_prior,
            revenue_growth_this_year_pct: args.growth_this,
            revenue_growth_next_year_pct: args.growth_next,
            pe_multiples: args.pe_multiples,
            ps_multiples: args.ps_multiples,
            current_pe: args.pe_now,
            current_ps: args.ps_now,
        }
    }
}

impl Cli {
    /// Apply command line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut ScreenerConfig) {
        if let Some(data_file) = &self.data_file {
            config.store.data_file = data_file.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

/// CLI handler
pub struct CliHandler {
    store: CompanyStore,
    config: ScreenerConfig,
}

impl CliHandler {
    /// Create new CLI handler
    pub fn new(store: CompanyStore, config: ScreenerConfig) -> Self {
        Self { store, config }
    }

    /// Handle a command, returning what should be printed
    pub fn handle_command(&mut self, command: Commands) -> Result<String> {
        match command {
            Commands::List {
                min_undervaluation,
                candidates,
                json,
            } => {
                let threshold = if candidates {
                    Some(self.config.screening.min_undervaluation_pct)
                } else {
                    min_undervaluation
                };
                self.list(threshold, json)
            }
            Commands::Show { name } => self.show(&name),
            Commands::Upsert(args) => self.upsert(args.into()),
            Commands::Delete { name } => self.delete(&name),
            Commands::Import { file } => self.import(&file),
        }
    }

    /// The store this handler works on
    pub fn store(&self) -> &CompanyStore {
        &self.store
    }

    fn list(&self, threshold: Option<f64>, json: bool) -> Result<String> {
        let ranked = self.store.list_with_valuation(threshold);

        if json {
            return Ok(serde_json::to_string_pretty(&ranked)?);
        }

        if ranked.is_empty() {
            return Ok(if self.store.is_empty() {
                "No companies recorded yet.".to_string()
            } else {
                "No companies match the criteria.".to_string()
            });
        }

        Ok(render_table(&ranked, self.config.screening.min_undervaluation_pct))
    }

    fn show(&self, name: &str) -> Result<String> {
        let record = self
            .store
            .get(name)
            .with_context(|| format!("Company not found: {name}"))?;
        let valuation = valuation_engine::valuate(&record.valuation_inputs());
        Ok(render_company(record, &valuation))
    }

    fn upsert(&mut self, input: CompanyInput) -> Result<String> {
        let existed = self.store.get(&input.name).is_some();
        let record = self.store.upsert(input).context("Failed to save company")?;
        let action = if existed { "Updated" } else { "Added" };
        Ok(format!("{action} {}", record.name))
    }

    fn delete(&mut self, name: &str) -> Result<String> {
        if self.store.delete(name).context("Failed to delete company")? {
            Ok(format!("Deleted {name}"))
        } else {
            Ok(format!("No company named {name}"))
        }
    }

    fn import(&mut self, file: &Path) -> Result<String> {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read legacy file {:?}", file))?;
        let document = parse_legacy_document(&content)
            .with_context(|| format!("Failed to parse legacy file {:?}", file))?;
        let skipped = document.skipped;

        let summary = self.store.import_legacy(document.companies, Utc::now())?;
        Ok(format!(
            "Imported {} new, {} updated, {} rejected, {} skipped",
            summary.inserted,
            summary.updated,
            summary.rejected,
            skipped
        ))
    }
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Round for display only
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn amount(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", round_to(v, 2)))
        .unwrap_or_else(|| "-".to_string())
}

fn percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}%", round_to(v, 2)))
        .unwrap_or_else(|| "-".to_string())
}

/// Ranked table, highlighting companies at or above `threshold`
pub fn render_table(ranked: &[RankedCompany<'_>], threshold: f64) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>3}  {:<24} {:>10} {:>10} {:>9} {:>10} {:>9} {:>9}",
        "#", "Company", "Price", "Target P/E", "Under P/E", "Target P/S", "Under P/S", "Best"
    );
    let _ = writeln!(out, "{}", "=".repeat(92));

    for (rank, company) in ranked.iter().enumerate() {
        let valuation = &company.valuation;
        let best = format!("{:>9}", percent(valuation.undervaluation_pct));
        let best = match valuation.undervaluation_pct {
            Some(pct) if pct >= threshold => best.green().bold(),
            Some(pct) if pct < 0.0 => best.red(),
            _ => best.normal(),
        };

        let _ = writeln!(
            out,
            "{:>3}  {:<24} {:>10} {:>10} {:>9} {:>10} {:>9} {}",
            rank + 1,
            company.record.name,
            amount(Some(company.record.current_price)),
            amount(valuation.target_price_pe),
            percent(valuation.undervaluation_pe_pct),
            amount(valuation.target_price_ps),
            percent(valuation.undervaluation_ps_pct),
            best
        );
    }

    out.trim_end().to_string()
}

/// Detail view of one company
pub fn render_company(record: &CompanyRecord, valuation: &ValuationResult) -> String {
    let samples = |values: &[f64]| {
        if values.is_empty() {
            "-".to_string()
        } else {
            values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }
    };

    let earnings = format!(
        "{} / {} / {}",
        record.earnings_prior_year, record.earnings_this_year, record.earnings_next_year
    );
    let growth = format!(
        "{}% this year, {}% next year",
        record.revenue_growth_this_year_pct, record.revenue_growth_next_year_pct
    );
    let pe = format!("{} / {}", record.current_pe, samples(&record.pe_multiples));
    let ps = format!("{} / {}", record.current_ps, samples(&record.ps_multiples));
    let target_pe = format!(
        "{} ({} undervalued)",
        amount(valuation.target_price_pe),
        percent(valuation.undervaluation_pe_pct)
    );
    let target_ps = format!(
        "{} ({} undervalued)",
        amount(valuation.target_price_ps),
        percent(valuation.undervaluation_ps_pct)
    );

    let rows = [
        ("Current price:", amount(Some(record.current_price))),
        ("EPS prior/this/next:", earnings),
        ("Revenue prior year:", record.revenue_prior_year.to_string()),
        ("Revenue growth:", growth),
        ("P/E now / history:", pe),
        ("P/S now / history:", ps),
        ("Target P/E:", target_pe),
        ("Target P/S:", target_ps),
        ("Best undervaluation:", percent(valuation.undervaluation_pct)),
        ("Created:", record.created_at.format(TIMESTAMP_FORMAT).to_string()),
        ("Last modified:", record.modified_at.format(TIMESTAMP_FORMAT).to_string()),
    ];

    let mut out = String::new();
    let _ = writeln!(out, "{}", record.name.bold());
    let _ = writeln!(out, "{}", "-".repeat(40));
    for (label, value) in rows {
        let _ = writeln!(out, "{label:<22}{value}");
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use company_store::InMemoryStorage;
    use tempfile::TempDir;

    fn handler() -> (CliHandler, InMemoryStorage) {
        colored::control::set_override(false);
        let storage = InMemoryStorage::new();
        let store = CompanyStore::open(storage.clone()).unwrap();
        (CliHandler::new(store, ScreenerConfig::default()), storage)
    }

    fn parse(args: &[&str]) -> Cli {
        let argv = std::iter::once("screener").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap()
    }

    fn run(handler: &mut CliHandler, args: &[&str]) -> Result<String> {
        handler.handle_command(parse(args).command)
    }

    /// Upsert a company whose P/E target is `10 * pe`
    fn upsert(handler: &mut CliHandler, name: &str, price: &str, pe: &[&str]) -> String {
        let mut args = vec!["upsert", "--name", name, "--price", price, "--eps-next", "10"];
        for sample in pe {
            args.extend(["--pe", *sample]);
        }
        run(handler, &args).unwrap()
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.345, 2), 12.35);
        assert_eq!(round_to(-3.333, 1), -3.3);
    }

    #[test]
    fn test_upsert_args_parse() {
        let cli = parse(&[
            "upsert",
            "--name",
            "Acme",
            "--price",
            "100",
            "--eps-next",
            "10",
            "--growth-next",
            "-5",
            "--pe",
            "12",
            "--pe",
            "8",
        ]);

        let Commands::Upsert(args) = cli.command else { panic!("expected upsert") };
        let input: CompanyInput = args.into();
        assert_eq!(input.name, "Acme");
        assert_eq!(input.earnings_next_year, 10.0);
        assert_eq!(input.revenue_growth_next_year_pct, -5.0);
        assert_eq!(input.pe_multiples, vec![12.0, 8.0]);
        assert!(input.ps_multiples.is_empty());
    }

    #[test]
    fn test_min_undervaluation_conflicts_with_candidates() {
        let result = Cli::try_parse_from([
            "screener",
            "list",
            "--candidates",
            "--min-undervaluation",
            "10",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_overrides() {
        let cli = parse(&["--data-file", "/tmp/x.json", "--log-level", "debug", "list"]);
        let mut config = ScreenerConfig::default();

        cli.apply_overrides(&mut config);

        assert_eq!(config.store.data_file, PathBuf::from("/tmp/x.json"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_upsert_then_list_and_show() {
        let (mut handler, storage) = handler();

        let added = upsert(&mut handler, "Acme", "100", &["12", "8"]);
        assert_eq!(added, "Added Acme");

        let updated = upsert(&mut handler, "acme", "50", &["10"]);
        assert_eq!(updated, "Updated acme");
        assert_eq!(storage.save_count(), 2);

        let table = run(&mut handler, &["list"]).unwrap();
        assert!(table.contains("acme"));
        assert!(table.contains("100.00"));
        assert!(table.contains("50.00%"));

        let detail = run(&mut handler, &["show", "ACME"]).unwrap();
        assert!(detail.contains("Target P/E:           100.00 (50.00% undervalued)"));
        assert!(detail.contains("Target P/S:           - (- undervalued)"));
        assert!(detail.contains("P/E now / history:    0 / 10"));
    }

    #[test]
    fn test_candidates_use_configured_threshold() {
        let (mut handler, _) = handler();
        upsert(&mut handler, "Cheap", "70", &["10"]);
        upsert(&mut handler, "Fair", "95", &["10"]);

        let json = run(&mut handler, &["list", "--candidates", "--json"]).unwrap();
        let rows: serde_json::Value = serde_json::from_str(&json).unwrap();

        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Cheap");
        assert_eq!(rows[0]["valuation"]["target_price_pe"], 100.0);
    }

    #[test]
    fn test_list_messages_when_empty() {
        let (mut handler, _) = handler();
        let empty = run(&mut handler, &["list"]).unwrap();
        assert_eq!(empty, "No companies recorded yet.");

        upsert(&mut handler, "Blank", "10", &[]);
        let none = run(&mut handler, &["list", "--min-undervaluation", "0"]).unwrap();
        assert_eq!(none, "No companies match the criteria.");
    }

    #[test]
    fn test_delete_and_show_missing() {
        let (mut handler, _) = handler();
        upsert(&mut handler, "Acme", "1", &[]);

        assert_eq!(run(&mut handler, &["delete", "ACME"]).unwrap(), "Deleted ACME");
        assert_eq!(
            run(&mut handler, &["delete", "ACME"]).unwrap(),
            "No company named ACME"
        );
        assert!(run(&mut handler, &["show", "Acme"]).is_err());
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let (mut handler, storage) = handler();
        let result = run(&mut handler, &["upsert", "--name", "  ", "--price", "1"]);

        assert!(result.is_err());
        assert_eq!(storage.save_count(), 0);
    }

    #[test]
    fn test_import_legacy_file() {
        let (mut handler, _) = handler();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bolag_data.json");
        let legacy = r#"[
            {"bolagsnamn": "Acme", "nuvarande_kurs": 100, "vinst_nastaar": 10, "pe1": 12},
            {"kurs": 3}
        ]"#;
        std::fs::write(&path, legacy).unwrap();

        let message = handler.handle_command(Commands::Import { file: path }).unwrap();

        assert_eq!(message, "Imported 1 new, 0 updated, 0 rejected, 1 skipped");
        assert_eq!(handler.store().len(), 1);
    }
}
