//! Tag-driven conversion planner.
//!
//! Given two record schemas whose fields carry tags, and a registry of known
//! conversion functions, build a plan for converting one record into the
//! other and render it as Rust source.
//!
//! ```text
//! input (schemas, catalogs) → matcher → resolve → plan → codegen
//! ```
pub mod cli;
pub mod codegen;
pub mod error;
pub mod input;
pub mod ir;
pub mod jq_exec;
pub mod matcher;
pub mod naming;
pub mod path_de;
pub mod plan;
pub mod registry;
pub mod resolve;

pub use error::{Error, Result};
pub use plan::{ConversionPlan, PlanRequest, Planner};
