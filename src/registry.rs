//! Function registry: known conversion functions keyed by their declared
//! (from, to) descriptors.
//!
//! - Built-ins are registered first; user catalogs override them key by key.
//! - Type-parameterized catalog entries are expanded at load time (see
//!   [`catalog`]), so lookups here are purely monomorphic.
//! - The registry is read-only once assembled; share it by reference across
//!   parallel plan requests.
pub mod builtin;
pub mod catalog;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::Result;
use crate::ir::TypeDesc;

pub use catalog::{CatalogEntry, FunctionCatalog, TypeClass, TypeParam};

// ------------------------------- Types ------------------------------------ //

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionDesc {
    pub name: String, // call head, e.g. `parse_decimal` or `i64::from`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub module: String,
    pub from: TypeDesc, // nullability here is the function's own, not the field's
    pub to: TypeDesc,
    pub can_fail: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    entries: IndexMap<(TypeDesc, TypeDesc), FunctionDesc>,
}

// ---------------------------- FunctionDesc -------------------------------- //

impl FunctionDesc {
    pub fn new(name: impl Into<String>, from: TypeDesc, to: TypeDesc) -> Self {
        Self { name: name.into(), module: String::new(), from, to, can_fail: false }
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn failing(mut self) -> Self {
        self.can_fail = true;
        self
    }

    /// Path to import so the call head resolves: the module plus the first
    /// segment of the name (`rust_decimal::Decimal` for `Decimal::from_str`).
    pub fn use_path(&self) -> Option<String> {
        if self.module.is_empty() {
            return None;
        }
        let head = self.name.split("::").next().unwrap_or(&self.name);
        Some(format!("{}::{}", self.module, head))
    }
}

// --------------------------- FunctionRegistry ----------------------------- //

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with primitive numeric conversions.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        for f in builtin::functions()? {
            registry.register(f);
        }
        Ok(registry)
    }

    /// Expand a catalog and register every concrete instantiation.
    pub fn from_catalog(catalog: &FunctionCatalog) -> Result<Self> {
        let mut registry = Self::new();
        registry.load_catalog(catalog)?;
        Ok(registry)
    }

    pub fn load_catalog(&mut self, catalog: &FunctionCatalog) -> Result<usize> {
        let mut n = 0;
        for entry in &catalog.functions {
            for f in catalog::expand(entry)? {
                self.register(f);
                n += 1;
            }
        }
        Ok(n)
    }

    /// Register a function; returns the entry it replaced, if any.
    pub fn register(&mut self, f: FunctionDesc) -> Option<FunctionDesc> {
        let key = (f.from.clone(), f.to.clone());
        let prev = self.entries.insert(key, f);
        if let Some(prev) = &prev {
            tracing::debug!(function = %prev.name, from = %prev.from, to = %prev.to, "conversion function overridden");
        }
        prev
    }

    /// Layer `overrides` on top of this registry.
    pub fn merge(&mut self, overrides: FunctionRegistry) {
        for (_, f) in overrides.entries {
            self.register(f);
        }
    }

    /// Find a function for a field pair. Tries the field descriptors as
    /// declared, then with source nullability stripped, then destination,
    /// then both; after that a function taking `Option<_>` for a plain
    /// source (argument wrapped at the call). The first hit wins.
    pub fn lookup(&self, from: &TypeDesc, to: &TypeDesc) -> Option<&FunctionDesc> {
        let candidates = [
            (from.clone(), to.clone()),
            (from.non_null(), to.clone()),
            (from.clone(), to.non_null()),
            (from.non_null(), to.non_null()),
            (from.with_nullable(true), to.clone()),
            (from.with_nullable(true), to.non_null()),
        ];
        candidates.iter().find_map(|key| self.entries.get(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionDesc> {
        self.entries.values()
    }
}

// ------------------------------- Tests ------------------------------------ //
