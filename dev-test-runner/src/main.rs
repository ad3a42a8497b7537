//! Golden-file runner over `fixtures/<case>/`.
//!
//! Each case holds `schemas.json`, `functions.json`, `request.json` (a list of
//! plan requests) and `expected.rs`. Usage:
//!
//! ```text
//! cargo run -p dev-test-runner -- [--bless] [CASE_REGEX]
//! ```
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;
use regex::Regex;
use tagconv::codegen::Codegen;
use tagconv::matcher::MatchOptions;
use tagconv::{PlanRequest, Planner};

enum Outcome {
    Pass,
    Blessed,
    Mismatch { expected: String, actual: String },
}

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("fixtures")
}

fn generate(case: &Path) -> Result<String> {
    let schemas = tagconv::input::load_schemas(&[case.join("schemas.json")], None)?;
    let functions = case.join("functions.json");
    let catalogs: Vec<PathBuf> = if functions.exists() { vec![functions] } else { Vec::new() };
    let registry = tagconv::input::load_functions(&catalogs, None, true)?;

    let request_path = case.join("request.json");
    let source = std::fs::read_to_string(&request_path)
        .with_context(|| format!("failed to read {}", request_path.display()))?;
    let requests: Vec<PlanRequest> = tagconv::path_de::from_str_with_path(&request_path.to_string_lossy(), &source)?;

    let options = MatchOptions::default();
    let plans = Planner::new(&schemas, &registry, &options).plan_all(&requests)?;
    let mut cg = Codegen::new();
    cg.emit_all(&plans);
    Ok(cg.into_string())
}

fn run_case(case: &Path, bless: bool) -> Result<Outcome> {
    let actual = generate(case)?;
    let expected_path = case.join("expected.rs");
    if bless {
        std::fs::write(&expected_path, &actual)?;
        return Ok(Outcome::Blessed);
    }
    let expected = std::fs::read_to_string(&expected_path)
        .with_context(|| format!("failed to read {}", expected_path.display()))?;
    if expected == actual {
        Ok(Outcome::Pass)
    } else {
        Ok(Outcome::Mismatch { expected, actual })
    }
}

fn main() -> ExitCode {
    let mut bless = false;
    let mut filter: Option<Regex> = None;
    for arg in std::env::args().skip(1) {
        if arg == "--bless" {
            bless = true;
            continue;
        }
        match Regex::new(&arg) {
            Ok(re) => filter = Some(re),
            Err(error) => {
                eprintln!("{} invalid case filter `{arg}`: {error}", "error:".red().bold());
                return ExitCode::FAILURE;
            }
        }
    }

    let mut cases: Vec<PathBuf> = match std::fs::read_dir(fixtures_dir()) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).filter(|p| p.is_dir()).collect(),
        Err(error) => {
            eprintln!("{} cannot read fixtures: {error}", "error:".red().bold());
            return ExitCode::FAILURE;
        }
    };
    cases.sort();

    let mut failed = 0usize;
    let mut ran = 0usize;
    for case in &cases {
        let name = case.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        if filter.as_ref().is_some_and(|re| !re.is_match(&name)) {
            continue;
        }
        ran += 1;
        match run_case(case, bless) {
            Ok(Outcome::Pass) => eprintln!("{} {name}", "ok".green().bold()),
            Ok(Outcome::Blessed) => eprintln!("{} {name}", "blessed".cyan().bold()),
            Ok(Outcome::Mismatch { expected, actual }) => {
                failed += 1;
                eprintln!("{} {name}", "FAILED".red().bold());
                for (i, (e, a)) in expected.lines().zip(actual.lines()).enumerate() {
                    if e != a {
                        eprintln!("  first difference at line {}:", i + 1);
                        eprintln!("  {} {e}", "-".red());
                        eprintln!("  {} {a}", "+".green());
                        break;
                    }
                }
                if expected.lines().count() != actual.lines().count() {
                    eprintln!("  expected {} lines, got {}", expected.lines().count(), actual.lines().count());
                }
            }
            Err(error) => {
                failed += 1;
                eprintln!("{} {name}: {error:#}", "ERROR".red().bold());
            }
        }
    }

    eprintln!("{ran} case(s), {failed} failed");
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
