//! Conversion rule resolver.
//!
//! An ordered table of rules; the first rule that yields a strategy wins.
//! Guards (nil-check before the strategy runs, argument wrapping) are
//! computed separately from the chosen strategy and the field shapes.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::ir::TypeDesc;
use crate::registry::FunctionDesc;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    DirectAssignment { coercion: Coercion },
    PointerToPointer,
    /// `wrap`: the success value goes into `Some(..)`
    FunctionWithFailure { wrap: bool },
    DirectCall,
    SeparateCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    Identity,
    WrapSome,
    /// always behind a failing nil-check
    Unwrap,
}

/// What happens when the nullable source is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NilGuard {
    FailRecord,
    YieldNone,
}

/// The field shapes one decision is made for. The resolution only keeps
/// the function, so the descriptors may be short-lived.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'t, 'f> {
    pub from: &'t TypeDesc,
    pub to: &'t TypeDesc,
    pub function: Option<&'f FunctionDesc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'f> {
    pub strategy: Strategy,
    pub function: Option<&'f FunctionDesc>,
    pub guard: Option<NilGuard>,
    /// the source is plain but the function takes `Option<_>`
    pub wrap_arg: bool,
}

pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&Subject<'_, '_>) -> Option<Strategy>,
}

/// Precedence order: first match wins.
pub static RULES: &[Rule] = &[
    Rule { name: "direct_assignment", apply: direct_assignment },
    Rule { name: "pointer_to_pointer", apply: pointer_to_pointer },
    Rule { name: "function_with_failure", apply: function_with_failure },
    Rule { name: "direct_call", apply: direct_call },
    Rule { name: "separate_call", apply: separate_call },
];

// ————————————————————————————————————————————————————————————————————————————
// RULES
// ————————————————————————————————————————————————————————————————————————————

fn direct_assignment(s: &Subject<'_, '_>) -> Option<Strategy> {
    let coercion = if s.from == s.to {
        Coercion::Identity
    } else if !s.from.same_base(s.to) {
        return None;
    } else if !s.from.nullable && s.to.nullable {
        Coercion::WrapSome
    } else if s.function.is_none() {
        Coercion::Unwrap
    } else {
        return None;
    };
    Some(Strategy::DirectAssignment { coercion })
}

fn pointer_to_pointer(s: &Subject<'_, '_>) -> Option<Strategy> {
    let f = s.function?;
    (s.from.nullable && s.to.nullable && !f.from.nullable && !f.to.nullable).then_some(Strategy::PointerToPointer)
}

fn function_with_failure(s: &Subject<'_, '_>) -> Option<Strategy> {
    let f = s.function?;
    if !f.can_fail || (f.to.nullable && !s.to.nullable) {
        return None;
    }
    Some(Strategy::FunctionWithFailure { wrap: s.to.nullable && !f.to.nullable })
}

fn direct_call(s: &Subject<'_, '_>) -> Option<Strategy> {
    let f = s.function?;
    (!f.can_fail && f.to.nullable == s.to.nullable).then_some(Strategy::DirectCall)
}

fn separate_call(s: &Subject<'_, '_>) -> Option<Strategy> {
    let f = s.function?;
    (!f.can_fail && !f.to.nullable && s.to.nullable).then_some(Strategy::SeparateCall)
}

// ————————————————————————————————————————————————————————————————————————————
// GUARDS
// ————————————————————————————————————————————————————————————————————————————

fn nil_guard(s: &Subject<'_, '_>, strategy: Strategy) -> Option<NilGuard> {
    if !s.from.nullable {
        return None;
    }
    match strategy {
        Strategy::PointerToPointer => Some(NilGuard::YieldNone),
        Strategy::DirectAssignment { coercion: Coercion::Unwrap } => Some(NilGuard::FailRecord),
        Strategy::DirectAssignment { .. } => None,
        _ => match s.function {
            Some(f) if !f.from.nullable => Some(NilGuard::FailRecord),
            _ => None,
        },
    }
}

fn wraps_arg(s: &Subject<'_, '_>, strategy: Strategy) -> bool {
    match (strategy, s.function) {
        (Strategy::DirectAssignment { .. } | Strategy::PointerToPointer, _) => false,
        (_, Some(f)) => f.from.nullable && !s.from.nullable,
        (_, None) => false,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ENTRY
// ————————————————————————————————————————————————————————————————————————————

impl<'t, 'f> Subject<'t, 'f> {
    pub fn new(from: &'t TypeDesc, to: &'t TypeDesc, function: Option<&'f FunctionDesc>) -> Self {
        Self { from, to, function }
    }
}

impl Resolution<'_> {
    pub fn can_fail(&self) -> bool {
        self.guard == Some(NilGuard::FailRecord) || self.function.is_some_and(|f| f.can_fail)
    }
}

/// First strategy that applies, or `None` when the table is exhausted.
pub fn first_match(subject: &Subject<'_, '_>) -> Option<(&'static str, Strategy)> {
    RULES.iter().find_map(|rule| (rule.apply)(subject).map(|s| (rule.name, s)))
}

/// Resolve one field pair; `label` names the field in the error.
pub fn resolve<'f>(subject: Subject<'_, 'f>, label: &str) -> Result<Resolution<'f>> {
    let Some((rule, strategy)) = first_match(&subject) else {
        return Err(Error::no_strategy(subject.from.render(), subject.to.render(), label));
    };
    tracing::debug!(field = label, rule, from = %subject.from, to = %subject.to, "resolved");
    let function = match strategy {
        Strategy::DirectAssignment { .. } => None,
        _ => subject.function,
    };
    Ok(Resolution {
        strategy,
        function,
        guard: nil_guard(&subject, strategy),
        wrap_arg: wraps_arg(&subject, strategy),
    })
}

// ------------------------------- Tests ------------------------------------ //
