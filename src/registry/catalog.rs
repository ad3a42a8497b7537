use serde::Deserialize;

use super::FunctionDesc;
use crate::error::{Error, Result};
use crate::ir::TypeDesc;

const SIGNED: &[&str] = &["i8", "i16", "i32", "i64", "i128", "isize"];
const UNSIGNED: &[&str] = &["u8", "u16", "u32", "u64", "u128", "usize"];
const FLOAT: &[&str] = &["f32", "f64"];

/// Function Reader output: one entry per declared function.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionCatalog {
    #[serde(default)]
    pub functions: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub name: String, // may contain `{T}` placeholders for type parameters
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub type_params: Vec<TypeParam>,
    pub from: TypeDesc,
    pub to: TypeDesc,
    #[serde(default)]
    pub can_fail: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub class: TypeClass,
}

/// The set of concrete types a type parameter may be instantiated with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeClass {
    Signed,
    Unsigned,
    Integer,
    Float,
    Number,
    OneOf(Vec<String>),
}

impl TypeClass {
    pub fn members(&self) -> Vec<String> {
        let names: Vec<&str> = match self {
            TypeClass::Signed => SIGNED.to_vec(),
            TypeClass::Unsigned => UNSIGNED.to_vec(),
            TypeClass::Integer => [SIGNED, UNSIGNED].concat(),
            TypeClass::Float => FLOAT.to_vec(),
            TypeClass::Number => [SIGNED, UNSIGNED, FLOAT].concat(),
            TypeClass::OneOf(xs) => return xs.clone(),
        };
        names.into_iter().map(String::from).collect()
    }
}

impl CatalogEntry {
    pub fn concrete(name: impl Into<String>, from: TypeDesc, to: TypeDesc) -> Self {
        Self {
            name: name.into(),
            module: String::new(),
            type_params: Vec::new(),
            from,
            to,
            can_fail: false,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, class: TypeClass) -> Self {
        self.type_params.push(TypeParam { name: name.into(), class });
        self
    }
}

/// One concrete function per legal instantiation of the entry's type
/// parameters (cartesian product when there are several).
pub fn expand(entry: &CatalogEntry) -> Result<Vec<FunctionDesc>> {
    check_params(entry)?;

    let mut instantiations: Vec<Vec<(&str, String)>> = vec![Vec::new()];
    for param in &entry.type_params {
        let members = param.class.members();
        if members.is_empty() {
            return Err(Error::Catalog(format!(
                "{}: type parameter {} has an empty class",
                entry.name, param.name
            )));
        }
        instantiations = instantiations
            .into_iter()
            .flat_map(|prefix| {
                members.iter().map(move |m| {
                    let mut next = prefix.clone();
                    next.push((param.name.as_str(), m.clone()));
                    next
                })
            })
            .collect();
    }

    Ok(instantiations
        .into_iter()
        .map(|bindings| FunctionDesc {
            name: substitute_name(&entry.name, &bindings),
            module: entry.module.clone(),
            from: substitute(&entry.from, &bindings),
            to: substitute(&entry.to, &bindings),
            can_fail: entry.can_fail,
        })
        .collect())
}

fn check_params(entry: &CatalogEntry) -> Result<()> {
    for (i, param) in entry.type_params.iter().enumerate() {
        if entry.type_params[..i].iter().any(|p| p.name == param.name) {
            return Err(Error::Catalog(format!(
                "{}: type parameter {} declared twice",
                entry.name, param.name
            )));
        }
        if !mentions(&entry.from, &param.name) && !mentions(&entry.to, &param.name) {
            return Err(Error::Catalog(format!(
                "{}: type parameter {} is not used by the input or output",
                entry.name, param.name
            )));
        }
    }
    entry.from.validate()?;
    entry.to.validate()?;
    Ok(())
}

fn is_param(ty: &TypeDesc, param: &str) -> bool {
    ty.elem.is_none() && ty.module.is_empty() && ty.name == param
}

fn mentions(ty: &TypeDesc, param: &str) -> bool {
    is_param(ty, param) || ty.elem.as_deref().is_some_and(|e| mentions(e, param))
}

fn substitute(ty: &TypeDesc, bindings: &[(&str, String)]) -> TypeDesc {
    let mut out = ty.clone();
    if let Some((_, concrete)) = bindings.iter().find(|(p, _)| is_param(ty, p)) {
        out.name = concrete.clone();
    }
    if let Some(elem) = &ty.elem {
        out.elem = Some(Box::new(substitute(elem, bindings)));
    }
    out
}

fn substitute_name(name: &str, bindings: &[(&str, String)]) -> String {
    bindings.iter().fold(name.to_string(), |acc, (param, concrete)| {
        acc.replace(&format!("{{{param}}}"), concrete)
    })
}
