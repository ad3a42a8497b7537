//! Rust emitter: conversion plans → converter functions.
//!
//! Each plan renders as one `pub fn`; imports from all plans are merged into
//! a single sorted `use` block at the top of the output.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::plan::ConversionPlan;
use crate::resolve::NilGuard;

const HEADER: &str = "// Code generated by tagconv. DO NOT EDIT.";

pub struct Codegen {
    imports: BTreeSet<String>,
    functions: Vec<String>,
    stamp: bool,
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

impl Codegen {
    pub fn new() -> Self {
        Self { imports: BTreeSet::new(), functions: Vec::new(), stamp: false }
    }

    /// Add a generation timestamp to the header (off by default so output
    /// stays byte-for-byte reproducible).
    pub fn with_stamp(mut self, stamp: bool) -> Self {
        self.stamp = stamp;
        self
    }

    pub fn emit(&mut self, plan: &ConversionPlan) {
        self.imports.extend(plan.required_imports.iter().cloned());
        self.functions.push(render_function(plan));
    }

    pub fn emit_all<'a>(&mut self, plans: impl IntoIterator<Item = &'a ConversionPlan>) {
        for plan in plans {
            self.emit(plan);
        }
    }

    pub fn into_string(self) -> String {
        let mut out = String::from(HEADER);
        out.push('\n');
        if self.stamp {
            let _ = writeln!(out, "// Generated at {}", chrono::Utc::now().to_rfc3339());
        }
        out.push('\n');
        if !self.imports.is_empty() {
            for import in &self.imports {
                let _ = writeln!(out, "use {import};");
            }
            out.push('\n');
        }
        out.push_str(&self.functions.join("\n"));
        out
    }
}

fn render_function(plan: &ConversionPlan) -> String {
    let from = &plan.from.name;
    let to = &plan.to.name;
    let fallible = plan.requires_failure_return;

    let unused = plan.field_plans.is_empty() && plan.leading_check.is_none();
    let param = match (plan.from_nullable, unused) {
        (true, _) => format!("from: Option<&{from}>"),
        (false, false) => format!("from: &{from}"),
        (false, true) => format!("_from: &{from}"),
    };
    let output = if plan.to_nullable { format!("Option<{to}>") } else { to.clone() };
    let ret = if fallible { format!("anyhow::Result<{output}>") } else { output };

    let mut body: Vec<String> = Vec::new();
    match plan.leading_check {
        Some(NilGuard::FailRecord) => {
            body.push(format!("let from = from.ok_or_else(|| anyhow!(\"{from} is missing\"))?;"));
        }
        Some(NilGuard::YieldNone) => {
            let none = if fallible { "Ok(None)" } else { "None" };
            body.push(format!("let Some(from) = from else {{ return {none}; }};"));
        }
        None => {}
    }
    body.extend(plan.guards.iter().cloned());
    if plan.field_plans.is_empty() {
        body.push(format!("let to = {to}::default();"));
    } else {
        body.push(format!("let mut to = {to}::default();"));
    }
    for fp in &plan.field_plans {
        body.extend(fp.statements.iter().cloned());
        body.push(format!("{} = {};", fp.place, fp.expr));
    }
    let value = if plan.to_nullable { "Some(to)" } else { "to" };
    body.push(if fallible { format!("Ok({value})") } else { value.to_string() });

    let mut out = String::new();
    let _ = writeln!(out, "/// Converts `{from}` into `{to}`.");
    let _ = writeln!(out, "pub fn {}({param}) -> {ret} {{", plan.function_name);
    for stmt in &body {
        for line in stmt.lines() {
            if line.is_empty() {
                out.push('\n');
            } else {
                let _ = writeln!(out, "    {line}");
            }
        }
    }
    out.push_str("}\n");
    out
}

// ------------------------------- Tests ------------------------------------ //
