//! Minimal CLI: schemas + catalogs → (plan | rust)
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::codegen::Codegen;
use crate::matcher::{DEFAULT_SKIP_MARKER, MatchOptions};
use crate::plan::{ConversionPlan, PlanRequest, Planner};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// plan conversions between tagged record schemas and output either the plans as JSON or Rust converter functions
#[derive(Parser, Debug)]
#[command(name = "tagconv", version)]
pub struct CommandLineInterface {
    /// more logging (-v debug, -vv trace); RUST_LOG applies otherwise
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// plan and print the conversion plans as JSON
    Plan(PlanOut),
    /// plan and emit Rust converter functions
    Rust(RustOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// Schema documents. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    schemas: Vec<String>,

    /// Function catalogs, layered over the built-ins in the order given
    #[arg(long, short, num_args = 1..)]
    functions: Vec<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// do not register the built-in numeric conversions
    #[arg(long, default_value_t = false)]
    no_builtins: bool,

    /// fail instead of dropping unmatched or ill-formed fields
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// tag value that flattens a nested record
    #[arg(long, default_value = DEFAULT_SKIP_MARKER)]
    skip_marker: String,
}

#[derive(Args, Debug, Clone)]
struct RequestSettings {
    /// source record type path (e.g. crate::wire::UserDto)
    #[arg(long, required_unless_present = "batch", conflicts_with = "batch")]
    from: Option<String>,

    /// destination record type path
    #[arg(long, required_unless_present = "batch", conflicts_with = "batch")]
    to: Option<String>,

    /// tag key fields are matched by
    #[arg(long, required_unless_present = "batch", conflicts_with = "batch")]
    tag: Option<String>,

    /// also plan the opposite direction
    #[arg(long, default_value_t = false)]
    inverse: bool,

    /// the converter takes `Option<&From>`
    #[arg(long, default_value_t = false)]
    from_nullable: bool,

    /// the converter returns `Option<To>`
    #[arg(long, default_value_t = false)]
    to_nullable: bool,

    /// converter function name (default `<from>_to_<to>`)
    #[arg(long)]
    fn_name: Option<String>,

    /// JSON file holding a list of requests
    #[arg(long)]
    batch: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct PlanOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    request_settings: RequestSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct RustOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    request_settings: RequestSettings,

    /// add a generation timestamp to the header
    #[arg(long, default_value_t = false)]
    stamp: bool,

    /// output .rs file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn match_options(&self) -> MatchOptions {
        MatchOptions { skip_marker: self.skip_marker.clone(), strict: self.strict }
    }

    fn plan(&self, requests: &[PlanRequest]) -> anyhow::Result<Vec<ConversionPlan>> {
        let jq_expr = self.jq_expr.as_deref();
        let schema_paths = resolve_file_path_patterns(&self.schemas)?;
        let function_paths = resolve_file_path_patterns(&self.functions)?;

        let schemas = crate::input::load_schemas(&schema_paths, jq_expr).context("failed to load schemas")?;
        let registry = crate::input::load_functions(&function_paths, jq_expr, !self.no_builtins)
            .context("failed to load function catalogs")?;
        tracing::info!(records = schemas.len(), functions = registry.len(), "inputs loaded");

        let options = self.match_options();
        let plans = Planner::new(&schemas, &registry, &options).plan_all(requests)?;
        for plan in &plans {
            for diagnostic in &plan.diagnostics {
                eprintln!("{} {}: {}", "warning".yellow().bold(), plan.function_name, diagnostic.message);
            }
        }
        Ok(plans)
    }
}

impl RequestSettings {
    fn requests(&self) -> anyhow::Result<Vec<PlanRequest>> {
        if let Some(batch) = self.batch.as_ref() {
            let source = std::fs::read_to_string(batch)
                .with_context(|| format!("failed to read batch file {}", batch.display()))?;
            let requests: Vec<PlanRequest> = crate::path_de::from_str_with_path(&batch.to_string_lossy(), &source)?;
            if requests.is_empty() {
                bail!("batch file {} holds no requests", batch.display());
            }
            return Ok(requests);
        }
        let (Some(from), Some(to), Some(tag)) = (&self.from, &self.to, &self.tag) else {
            bail!("--from, --to and --tag are required without --batch");
        };
        Ok(vec![PlanRequest {
            from: from.clone(),
            to: to.clone(),
            tag: tag.clone(),
            from_nullable: self.from_nullable,
            to_nullable: self.to_nullable,
            function_name: self.fn_name.clone(),
            inverse: self.inverse,
        }])
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Plan(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let requests = target.request_settings.requests()?;
                let plans = target.input_settings.plan(&requests)?;
                let plan_src = serde_json::to_string_pretty(&plans)?;
                write_output(target.out.as_deref(), &plan_src, plans.len())
            }
            Command::Rust(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let requests = target.request_settings.requests()?;
                let plans = target.input_settings.plan(&requests)?;
                let mut cg = Codegen::new().with_stamp(target.stamp);
                cg.emit_all(&plans);
                let rust_src = cg.into_string();
                write_output(target.out.as_deref(), &rust_src, plans.len())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&Path>, src: &str, count: usize) -> anyhow::Result<()> {
    let Some(out) = out else {
        println!("{src}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, src).with_context(|| format!("failed to write {}", out.display()))?;
    eprintln!("{} {count} conversion(s) → {}", "wrote".green().bold(), out.display());
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // an explicit glob that matched nothing is an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

// ------------------------------- Tests ------------------------------------ //
