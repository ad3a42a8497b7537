//! Plan builder.
//!
//! Matches the two records, resolves every field pair against the registry,
//! and lowers each resolution to Rust statements plus one assignment. The
//! plan also carries everything the emitter needs around the field plans:
//! leading record check, intermediate nil-check bindings, failure shape,
//! imports.
pub mod collection;

use std::collections::BTreeSet;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ir::{Field, RecordSchema, SchemaSet, TypeDesc, TypeKey};
use crate::matcher::{Diagnostic, FieldPair, MatchOptions, Matcher};
use crate::naming;
use crate::registry::FunctionRegistry;
use crate::resolve::{self, Coercion, NilGuard, Strategy, Subject};

pub const ANYHOW_IMPORT: &str = "anyhow::anyhow";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// One conversion to plan: `from` and `to` are record type paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub from: String,
    pub to: String,
    pub tag: String,
    #[serde(default)]
    pub from_nullable: bool,
    #[serde(default)]
    pub to_nullable: bool,
    #[serde(default)]
    pub function_name: Option<String>,
    /// also plan the To → From direction
    #[serde(default)]
    pub inverse: bool,
}

/// How a field pair is converted; collections nest their element shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    Value { strategy: Strategy },
    Collection { element: Box<Shape> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldPlan {
    pub target: String, // e.g. `User.Address.City`
    pub source: String,
    pub shape: Shape,
    pub statements: Vec<String>, // run before the assignment, may span lines
    pub place: String,           // left-hand side of the assignment
    pub expr: String,
    pub can_fail: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionPlan {
    pub function_name: String,
    pub from: TypeKey,
    pub to: TypeKey,
    pub from_nullable: bool,
    pub to_nullable: bool,
    pub leading_check: Option<NilGuard>,
    pub guards: Vec<String>, // nullable flattened intermediates, bound once
    pub field_plans: Vec<FieldPlan>,
    pub requires_failure_return: bool,
    pub required_imports: BTreeSet<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Where a value comes from while lowering.
#[derive(Debug, Clone)]
pub(crate) struct Source {
    pub place: String,   // expression naming the source (never moved out of)
    pub owned: bool,     // place already holds an owned value
    pub label: String,   // diagnostic label, braces escaped
    pub binding: String, // name for local bindings this value needs
}

/// Output of lowering one value conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Lowering {
    pub statements: Vec<String>,
    pub expr: String,
    pub can_fail: bool,
    pub uses_label: bool, // label placeholders appear in emitted diagnostics
    pub imports: Vec<String>,
    pub shape: Shape,
}

pub struct Planner<'a> {
    schemas: &'a SchemaSet,
    registry: &'a FunctionRegistry,
    options: &'a MatchOptions,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl PlanRequest {
    pub fn new(from: impl Into<String>, to: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            tag: tag.into(),
            from_nullable: false,
            to_nullable: false,
            function_name: None,
            inverse: false,
        }
    }

    /// The same request in the opposite direction.
    pub fn inverted(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            tag: self.tag.clone(),
            from_nullable: self.to_nullable,
            to_nullable: self.from_nullable,
            function_name: None,
            inverse: false,
        }
    }

    /// This request followed by its inverse when asked for.
    pub fn expand(&self) -> Vec<PlanRequest> {
        let mut out = vec![PlanRequest { inverse: false, ..self.clone() }];
        if self.inverse {
            out.push(self.inverted());
        }
        out
    }
}

impl Source {
    fn value(&self) -> String {
        if self.owned { self.place.clone() } else { format!("{}.clone()", self.place) }
    }
}

impl<'a> Planner<'a> {
    pub fn new(schemas: &'a SchemaSet, registry: &'a FunctionRegistry, options: &'a MatchOptions) -> Self {
        Self { schemas, registry, options }
    }

    /// Plan every request (and requested inverse) in parallel; output keeps
    /// request order.
    pub fn plan_all(&self, requests: &[PlanRequest]) -> Result<Vec<ConversionPlan>> {
        let expanded: Vec<PlanRequest> = requests.iter().flat_map(PlanRequest::expand).collect();
        expanded.par_iter().map(|request| self.plan(request)).collect()
    }

    pub fn plan(&self, request: &PlanRequest) -> Result<ConversionPlan> {
        let from = self.schemas.require(&TypeKey::parse(&request.from)?)?;
        let to = self.schemas.require(&TypeKey::parse(&request.to)?)?;
        let matched = Matcher::new(self.schemas, self.options).match_records(from, to, &request.tag)?;

        let mut guards: IndexMap<String, String> = IndexMap::new();
        let mut field_plans = Vec::with_capacity(matched.pairs.len());
        let mut imports = BTreeSet::new();

        for pair in &matched.pairs {
            let (field_plan, field_guards, field_imports) = self.plan_field(from, to, pair)?;
            for (binding, stmt) in field_guards {
                guards.entry(binding).or_insert(stmt);
            }
            imports.extend(field_imports);
            field_plans.push(field_plan);
        }

        let leading_check = match (request.from_nullable, request.to_nullable) {
            (false, _) => None,
            (true, false) => Some(NilGuard::FailRecord),
            (true, true) => Some(NilGuard::YieldNone),
        };
        let requires_failure_return = leading_check == Some(NilGuard::FailRecord)
            || !guards.is_empty()
            || field_plans.iter().any(|p| p.can_fail);

        if leading_check == Some(NilGuard::FailRecord) || !guards.is_empty() {
            imports.insert(ANYHOW_IMPORT.to_string());
        }
        imports.extend(from.key().use_path());
        imports.extend(to.key().use_path());

        let function_name = request.function_name.clone().unwrap_or_else(|| {
            format!("{}_to_{}", naming::snake_case(&from.type_name), naming::snake_case(&to.type_name))
        });

        tracing::info!(
            function = %function_name,
            fields = field_plans.len(),
            fallible = requires_failure_return,
            "planned {} -> {}", from.key(), to.key()
        );

        Ok(ConversionPlan {
            function_name,
            from: from.key(),
            to: to.key(),
            from_nullable: request.from_nullable,
            to_nullable: request.to_nullable,
            leading_check,
            guards: guards.into_values().collect(),
            field_plans,
            requires_failure_return,
            required_imports: imports,
            diagnostics: matched.diagnostics,
        })
    }

    /// One field pair → its plan, the intermediate guards it relies on, and
    /// its imports. Never looks at other pairs.
    fn plan_field(
        &self,
        from: &RecordSchema,
        to: &RecordSchema,
        pair: &FieldPair,
    ) -> Result<(FieldPlan, Vec<(String, String)>, Vec<String>)> {
        let (place, guards) = source_place(&from.type_name, &pair.from);
        let label = escape_braces(&pair.from.label(&from.type_name));
        let binding = naming::binding(&pair.to.segments().collect::<Vec<_>>().join("_"));
        let source = Source { place, owned: false, label, binding };

        let target = pair.to.label(&to.type_name);
        let lowering = self.lower_value(&pair.from.ty, &pair.to.ty, &source, &target, 0)?;

        let plan = FieldPlan {
            target,
            source: pair.from.label(&from.type_name),
            shape: lowering.shape,
            statements: lowering.statements,
            place: target_place(&pair.to),
            expr: lowering.expr,
            can_fail: lowering.can_fail,
        };
        Ok((plan, guards, lowering.imports))
    }

    /// Convert the value at `source` from `from` to `to`. The whole pair is
    /// resolved first; collections fall back to element-wise conversion.
    pub(crate) fn lower_value(
        &self,
        from: &TypeDesc,
        to: &TypeDesc,
        source: &Source,
        target: &str,
        depth: usize,
    ) -> Result<Lowering> {
        let function = self.registry.lookup(from, to);
        match resolve::resolve(Subject::new(from, to, function), target) {
            Ok(resolution) => Ok(lower_resolution(&resolution, source)),
            Err(Error::NoStrategy { .. }) if from.is_collection() && to.is_collection() => {
                collection::lower_collection(self, from, to, source, target, depth)
            }
            Err(err) => Err(err),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Lower one resolved strategy against a source value.
pub(crate) fn lower_resolution(res: &resolve::Resolution<'_>, source: &Source) -> Lowering {
    let mut statements = Vec::new();
    let mut imports = Vec::new();
    let mut uses_label = false;
    let b = &source.binding;

    let mut arg = source.value();
    if res.guard == Some(NilGuard::FailRecord) {
        statements.push(missing_check(b, &arg, &source.label));
        imports.push(ANYHOW_IMPORT.to_string());
        uses_label = true;
        arg = b.clone();
    }
    if res.wrap_arg {
        arg = format!("Some({arg})");
    }
    if let Some(f) = res.function {
        imports.extend(f.use_path());
    }
    let call = |arg: &str| match res.function {
        Some(f) => format!("{}({arg})", f.name),
        None => arg.to_string(),
    };

    let expr = match res.strategy {
        Strategy::DirectAssignment { coercion: Coercion::WrapSome } => format!("Some({arg})"),
        Strategy::DirectAssignment { .. } => arg,
        Strategy::PointerToPointer => {
            let name = res.function.map(|f| f.name.as_str()).unwrap_or_default();
            if res.can_fail() {
                format!("{arg}.map({name}).transpose()?")
            } else {
                format!("{arg}.map({name})")
            }
        }
        Strategy::FunctionWithFailure { wrap } => {
            statements.push(format!("let {b} = {}?;", call(&arg)));
            if wrap { format!("Some({b})") } else { b.clone() }
        }
        Strategy::DirectCall => call(&arg),
        Strategy::SeparateCall => {
            statements.push(format!("let {b} = {};", call(&arg)));
            format!("Some({b})")
        }
    };

    Lowering {
        statements,
        expr,
        can_fail: res.can_fail(),
        uses_label,
        imports,
        shape: Shape::Value { strategy: res.strategy },
    }
}

pub(crate) fn missing_check(binding: &str, value: &str, label: &str) -> String {
    format!("let {binding} = {value}.ok_or_else(|| anyhow!(\"{label} is missing\"))?;")
}

/// Access expression for a (possibly flattened) source field plus the
/// intermediate bindings needed to reach it through nullable records.
fn source_place(record: &str, field: &Field) -> (String, Vec<(String, String)>) {
    let mut base = "from".to_string();
    let mut label = record.to_string();
    let mut trail: Vec<&str> = Vec::new();
    let mut guards = Vec::new();
    for seg in &field.path {
        label.push('.');
        label.push_str(&seg.field);
        trail.push(&seg.field);
        let access = format!("{base}.{}", naming::field_ident(&seg.field));
        if seg.nullable {
            let binding = naming::guard_binding(&trail);
            let stmt = missing_check(&binding, &format!("{access}.as_ref()"), &escape_braces(&label));
            guards.push((binding.clone(), stmt));
            base = binding;
        } else {
            base = access;
        }
    }
    (format!("{base}.{}", naming::field_ident(&field.name)), guards)
}

/// Place expression for a destination field, creating nullable
/// intermediates on the way.
fn target_place(field: &Field) -> String {
    let mut out = "to".to_string();
    for seg in &field.path {
        out.push('.');
        out.push_str(&naming::field_ident(&seg.field));
        if seg.nullable {
            out.push_str(".get_or_insert_with(Default::default)");
        }
    }
    out.push('.');
    out.push_str(&naming::field_ident(&field.name));
    out
}

fn escape_braces(s: &str) -> String {
    s.replace('{', "{{").replace('}', "}}")
}

// ------------------------------- Tests ------------------------------------ //
