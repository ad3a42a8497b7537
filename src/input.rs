//! Reading schema documents and function catalogs from disk.
//!
//! Both are JSON; each file may optionally be run through a jq filter first,
//! in which case every jq output is decoded as its own document.

use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::ir::{RecordSchema, SchemaSet};
use crate::jq_exec::run_jaq;
use crate::path_de::{from_str_with_path, from_value_with_path};
use crate::registry::{FunctionCatalog, FunctionRegistry};

/// `{ "records": [..] }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub records: Vec<RecordSchema>,
}

/// Decode `src` as one or more `T`, applying `jq_expr` when given.
pub fn decode_documents<T: DeserializeOwned>(source_name: &str, src: &str, jq_expr: Option<&str>) -> Result<Vec<T>> {
    let Some(jq_expr) = jq_expr else {
        return Ok(vec![from_str_with_path(source_name, src)?]);
    };
    let value: serde_json::Value = from_str_with_path(source_name, src)?;
    run_jaq(jq_expr, &value)?
        .into_iter()
        .map(|doc| from_value_with_path(source_name, doc))
        .collect()
}

fn read_documents<T: DeserializeOwned>(path: &Path, jq_expr: Option<&str>) -> Result<Vec<T>> {
    let source = std::fs::read_to_string(path)?;
    let docs = decode_documents(&path.to_string_lossy(), &source, jq_expr)?;
    tracing::debug!(path = %path.display(), documents = docs.len(), "loaded");
    Ok(docs)
}

/// Merge every schema document into one set; later files may redefine records.
pub fn load_schemas<P: AsRef<Path>>(paths: &[P], jq_expr: Option<&str>) -> Result<SchemaSet> {
    let mut schemas = SchemaSet::new();
    for path in paths {
        for doc in read_documents::<SchemaDocument>(path.as_ref(), jq_expr)? {
            schemas.extend(doc.records)?;
        }
    }
    Ok(schemas)
}

/// Built-ins (unless disabled) overridden by each catalog in order.
pub fn load_functions<P: AsRef<Path>>(paths: &[P], jq_expr: Option<&str>, builtins: bool) -> Result<FunctionRegistry> {
    let mut registry = if builtins { FunctionRegistry::builtin()? } else { FunctionRegistry::new() };
    for path in paths {
        for catalog in read_documents::<FunctionCatalog>(path.as_ref(), jq_expr)? {
            let n = registry.load_catalog(&catalog)?;
            tracing::debug!(path = %path.as_ref().display(), functions = n, "catalog registered");
        }
    }
    Ok(registry)
}

// ------------------------------- Tests ------------------------------------ //
