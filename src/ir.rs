// Shared data model for schemas, fields and types. Built fresh per request.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Identity of a named type, ignoring nullability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey {
    pub name: String,
    #[serde(default)]
    pub module: String,
}

/// A field's type. A collection always carries `elem`; anything else never does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDesc {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub module: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elem: Option<Box<TypeDesc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// A field as declared in a record schema, tags not yet filtered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeDesc,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub type_name: String,
    #[serde(default)]
    pub module: String,
    pub fields: Vec<FieldDecl>, // declaration order == emission order
}

/// One ancestor on a flattened field's path back to its original record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PathSegment {
    pub field: String,
    pub nullable: bool,
}

/// A field after tag filtering: exactly one tag value retained, plus the
/// ancestor path when it was pulled up through a skip-tagged record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub ty: TypeDesc,
    pub tag: String,
    pub path: Vec<PathSegment>, // empty for top-level fields
}

/// Every record the schema reader produced, keyed by type identity.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    records: IndexMap<TypeKey, RecordSchema>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeKey {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self { name: name.into(), module: module.into() }
    }

    /// `crate::model::User` → module `crate::model`, name `User`.
    pub fn parse(path: &str) -> Result<Self> {
        let path = path.trim();
        let (module, name) = match path.rsplit_once("::") {
            Some((module, name)) => (module, name),
            None => ("", path),
        };
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(Error::Config(format!("invalid type reference `{path}`")));
        }
        Ok(Self::new(name, module))
    }

    /// Fully-qualified path usable in a `use` declaration.
    pub fn use_path(&self) -> Option<String> {
        if self.module.is_empty() {
            None
        } else {
            Some(format!("{}::{}", self.module, self.name))
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.use_path() {
            Some(path) => f.write_str(&path),
            None => f.write_str(&self.name),
        }
    }
}

impl TypeDesc {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), module: String::new(), nullable: false, elem: None }
    }

    pub fn vec_of(elem: TypeDesc) -> Self {
        Self { name: "Vec".into(), module: String::new(), nullable: false, elem: Some(Box::new(elem)) }
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_nullable(&self, nullable: bool) -> Self {
        Self { nullable, ..self.clone() }
    }

    pub fn non_null(&self) -> Self {
        self.with_nullable(false)
    }

    pub fn key(&self) -> TypeKey {
        TypeKey::new(&self.name, &self.module)
    }

    pub fn is_collection(&self) -> bool {
        self.elem.is_some()
    }

    /// Equal once nullability is ignored on this level.
    pub fn same_base(&self, other: &TypeDesc) -> bool {
        self.name == other.name && self.module == other.module && self.elem == other.elem
    }

    /// Rust spelling: `Option<Vec<String>>`.
    pub fn render(&self) -> String {
        let base = match &self.elem {
            Some(elem) => format!("Vec<{}>", elem.render()),
            None => self.name.clone(),
        };
        if self.nullable { format!("Option<{base}>") } else { base }
    }

    /// Checks the collection/element invariant for this descriptor and
    /// every nested element.
    pub fn validate(&self) -> Result<()> {
        match (&self.elem, self.name.as_str()) {
            (Some(elem), "Vec") => elem.validate(),
            (Some(_), other) => Err(Error::Config(format!(
                "type `{other}` carries an element type but is not a collection"
            ))),
            (None, "Vec") => Err(Error::Config("collection type without element type".into())),
            (None, _) => Ok(()),
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FieldDecl {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|t| t.key == key).map(|t| t.value.as_str())
    }
}

impl RecordSchema {
    pub fn key(&self) -> TypeKey {
        TypeKey::new(&self.type_name, &self.module)
    }
}

impl Field {
    /// `User.Address.City` style label naming the real nested location.
    pub fn label(&self, record: &str) -> String {
        let mut out = String::from(record);
        for seg in &self.path {
            out.push('.');
            out.push_str(&seg.field);
        }
        out.push('.');
        out.push_str(&self.name);
        out
    }

    /// Path segments plus the field itself.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.iter().map(|s| s.field.as_str()).chain(std::iter::once(self.name.as_str()))
    }
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; a later record with the same identity replaces the earlier one.
    pub fn insert(&mut self, record: RecordSchema) -> Result<()> {
        for field in &record.fields {
            field.ty.validate().map_err(|e| {
                Error::Config(format!("{}.{}: {e}", record.type_name, field.name))
            })?;
        }
        if let Some(prev) = self.records.insert(record.key(), record) {
            tracing::debug!(record = %prev.key(), "record redefined by a later schema document");
        }
        Ok(())
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = RecordSchema>) -> Result<()> {
        for record in records {
            self.insert(record)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &TypeKey) -> Option<&RecordSchema> {
        self.records.get(key)
    }

    /// Record for a field type, if the type names a known record.
    pub fn record_of(&self, ty: &TypeDesc) -> Option<&RecordSchema> {
        if ty.is_collection() {
            return None;
        }
        self.records.get(&ty.key())
    }

    pub fn require(&self, key: &TypeKey) -> Result<&RecordSchema> {
        self.get(key).ok_or_else(|| Error::UnknownRecord(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_includes_nullability() {
        let a = TypeDesc::named("String");
        let b = TypeDesc::named("String").nullable();
        assert_ne!(a, b);
        assert!(a.same_base(&b));
        assert_eq!(a, b.non_null());
    }

    #[test]
    fn collections_differ_by_element() {
        let a = TypeDesc::vec_of(TypeDesc::named("String"));
        let b = TypeDesc::vec_of(TypeDesc::named("i64"));
        assert_ne!(a, b);
        assert!(!a.same_base(&b));
        assert_eq!(a.render(), "Vec<String>");
        assert_eq!(b.nullable().render(), "Option<Vec<i64>>");
    }

    #[test]
    fn type_key_parse() {
        let k = TypeKey::parse("crate::model::User").unwrap();
        assert_eq!(k.module, "crate::model");
        assert_eq!(k.name, "User");
        assert_eq!(k.use_path().as_deref(), Some("crate::model::User"));

        let bare = TypeKey::parse("User").unwrap();
        assert_eq!(bare.module, "");
        assert_eq!(bare.use_path(), None);
        assert!(TypeKey::parse("").is_err());
    }

    #[test]
    fn element_invariant_is_checked() {
        let bad = TypeDesc { elem: Some(Box::new(TypeDesc::named("u8"))), ..TypeDesc::named("String") };
        assert!(bad.validate().is_err());
        assert!(TypeDesc::named("Vec").validate().is_err());
        assert!(TypeDesc::vec_of(TypeDesc::vec_of(TypeDesc::named("u8"))).validate().is_ok());
    }

    #[test]
    fn label_follows_path() {
        let f = Field {
            name: "City".into(),
            ty: TypeDesc::named("String"),
            tag: "city".into(),
            path: vec![PathSegment { field: "Address".into(), nullable: true }],
        };
        assert_eq!(f.label("User"), "User.Address.City");
        assert_eq!(f.segments().collect::<Vec<_>>(), ["Address", "City"]);
    }

    #[test]
    fn schema_set_rejects_bad_field_types() {
        let mut set = SchemaSet::new();
        let record = RecordSchema {
            type_name: "User".into(),
            module: String::new(),
            fields: vec![FieldDecl { name: "ids".into(), ty: TypeDesc::named("Vec"), tags: vec![] }],
        };
        assert!(set.insert(record).is_err());
        assert!(set.is_empty());
    }
}
