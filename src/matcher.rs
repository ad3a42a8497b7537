//! Field matching and skip-tag flattening.
//!
//! Both schemas are filtered down to fields carrying the requested tag key.
//! A field tagged with the skip marker is replaced by its own record's tagged
//! fields (matched with that field's declared key), each remembering the path
//! back to the skipped field. The resulting lists are paired by tag value in
//! destination order.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::ir::{Field, PathSegment, RecordSchema, SchemaSet, TypeKey};

pub const DEFAULT_SKIP_MARKER: &str = "skip";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub skip_marker: String,
    /// turn every permissive drop into an error
    pub strict: bool,
}

/// Non-fatal finding recorded while matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldPair {
    pub from: Field,
    pub to: Field,
}

#[derive(Debug, Clone, Default)]
pub struct Matched {
    pub pairs: Vec<FieldPair>, // destination order
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TagValue<'a> {
    Plain(&'a str),
    Skip { key: Option<&'a str> },
}

pub struct Matcher<'a> {
    schemas: &'a SchemaSet,
    options: &'a MatchOptions,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Default for MatchOptions {
    fn default() -> Self {
        Self { skip_marker: DEFAULT_SKIP_MARKER.to_string(), strict: false }
    }
}

impl<'a> Matcher<'a> {
    pub fn new(schemas: &'a SchemaSet, options: &'a MatchOptions) -> Self {
        Self { schemas, options }
    }

    /// Pair the tagged fields of `from` and `to` by tag value.
    pub fn match_records(&self, from: &RecordSchema, to: &RecordSchema, key: &str) -> Result<Matched> {
        let mut diagnostics = Vec::new();
        let from_fields = self.flatten(from, key, &mut diagnostics)?;
        let to_fields = self.flatten(to, key, &mut diagnostics)?;

        let mut by_tag: IndexMap<&str, &Field> = IndexMap::with_capacity(from_fields.len());
        for field in &from_fields {
            if let Some(first) = by_tag.get(field.tag.as_str()) {
                let err = Error::DuplicateTag {
                    tag: field.tag.clone(),
                    first: first.label(&from.type_name),
                    second: field.label(&from.type_name),
                };
                self.note(&mut diagnostics, err)?;
                continue;
            }
            by_tag.insert(field.tag.as_str(), field);
        }

        let mut pairs = Vec::with_capacity(to_fields.len());
        for field in &to_fields {
            match by_tag.get(field.tag.as_str()) {
                Some(src) => pairs.push(FieldPair { from: (*src).clone(), to: field.clone() }),
                None => {
                    let err = Error::UnmatchedField { field: field.label(&to.type_name), tag: field.tag.clone() };
                    self.note(&mut diagnostics, err)?;
                }
            }
        }
        Ok(Matched { pairs, diagnostics })
    }

    /// Tagged fields of a record with skip-tagged records inlined.
    /// Fails when nothing carries the tag at all.
    pub fn flatten(&self, record: &RecordSchema, key: &str, diagnostics: &mut Vec<Diagnostic>) -> Result<Vec<Field>> {
        let fields = self.flatten_record(record, key, &[], &[record.key()], diagnostics)?;
        if fields.is_empty() {
            return Err(Error::NoTaggedFields { record: record.key().to_string(), tag: key.to_string() });
        }
        Ok(fields)
    }

    fn flatten_record(
        &self,
        record: &RecordSchema,
        key: &str,
        prefix: &[PathSegment],
        ancestors: &[TypeKey],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<Field>> {
        let mut out = Vec::new();
        for decl in &record.fields {
            let Some(raw) = decl.tag(key) else {
                continue;
            };
            match parse_tag(raw, &self.options.skip_marker) {
                TagValue::Plain(value) => out.push(Field {
                    name: decl.name.clone(),
                    ty: decl.ty.clone(),
                    tag: value.to_string(),
                    path: prefix.to_vec(),
                }),
                TagValue::Skip { key: inner_key } => {
                    let label = label_of(record, prefix, &decl.name);
                    let Some(nested) = self.schemas.record_of(&decl.ty) else {
                        self.note(diagnostics, Error::SkipNonRecord { field: label, ty: decl.ty.render() })?;
                        continue;
                    };
                    if ancestors.contains(&nested.key()) {
                        return Err(Error::SkipCycle { field: label, record: nested.key().to_string() });
                    }
                    let inner_key = inner_key.unwrap_or(key);
                    let mut path = prefix.to_vec();
                    path.push(PathSegment { field: decl.name.clone(), nullable: decl.ty.nullable });
                    let mut chain = ancestors.to_vec();
                    chain.push(nested.key());

                    let inner = self.flatten_record(nested, inner_key, &path, &chain, diagnostics)?;
                    if inner.is_empty() {
                        self.note(diagnostics, Error::NestedWithoutFields { field: label, tag: inner_key.to_string() })?;
                    }
                    out.extend(inner);
                }
            }
        }
        Ok(out)
    }

    fn note(&self, diagnostics: &mut Vec<Diagnostic>, err: Error) -> Result<()> {
        if self.options.strict {
            return Err(err);
        }
        tracing::warn!("{err}");
        diagnostics.push(Diagnostic { message: err.to_string() });
        Ok(())
    }
}

fn label_of(record: &RecordSchema, prefix: &[PathSegment], name: &str) -> String {
    let mut out = record.type_name.clone();
    for seg in prefix {
        out.push('.');
        out.push_str(&seg.field);
    }
    out.push('.');
    out.push_str(name);
    out
}

/// First comma-separated component is the join value; `skip,<key>` names the
/// tag key used inside the nested record.
fn parse_tag<'a>(raw: &'a str, skip_marker: &str) -> TagValue<'a> {
    let mut parts = raw.split(',').map(str::trim);
    let value = parts.next().unwrap_or_default();
    if value == skip_marker {
        TagValue::Skip { key: parts.next().filter(|k| !k.is_empty()) }
    } else {
        TagValue::Plain(value)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FieldDecl, Tag, TypeDesc};

    fn decl(name: &str, ty: TypeDesc, tags: &[(&str, &str)]) -> FieldDecl {
        FieldDecl {
            name: name.into(),
            ty,
            tags: tags.iter().map(|(k, v)| Tag { key: k.to_string(), value: v.to_string() }).collect(),
        }
    }

    fn record(name: &str, fields: Vec<FieldDecl>) -> RecordSchema {
        RecordSchema { type_name: name.into(), module: String::new(), fields }
    }

    fn set(records: Vec<RecordSchema>) -> SchemaSet {
        let mut s = SchemaSet::new();
        s.extend(records).unwrap();
        s
    }

    #[test]
    fn tag_parsing() {
        assert_eq!(parse_tag("id", "skip"), TagValue::Plain("id"));
        assert_eq!(parse_tag("id,omitempty", "skip"), TagValue::Plain("id"));
        assert_eq!(parse_tag("skip", "skip"), TagValue::Skip { key: None });
        assert_eq!(parse_tag("skip, db", "skip"), TagValue::Skip { key: Some("db") });
        assert_eq!(parse_tag("-", "-"), TagValue::Skip { key: None });
    }

    #[test]
    fn untagged_fields_are_dropped_and_pairs_follow_destination_order() {
        let from = record("A", vec![
            decl("X", TypeDesc::named("i64"), &[("conv", "x")]),
            decl("Y", TypeDesc::named("i64"), &[("conv", "y")]),
            decl("Z", TypeDesc::named("i64"), &[("json", "z")]),
        ]);
        let to = record("B", vec![
            decl("Y2", TypeDesc::named("i64"), &[("conv", "y")]),
            decl("X2", TypeDesc::named("i64"), &[("conv", "x")]),
            decl("W", TypeDesc::named("i64"), &[("conv", "w")]),
        ]);
        let schemas = set(vec![from.clone(), to.clone()]);
        let options = MatchOptions::default();
        let m = Matcher::new(&schemas, &options).match_records(&from, &to, "conv").unwrap();
        let names: Vec<_> = m.pairs.iter().map(|p| (p.from.name.as_str(), p.to.name.as_str())).collect();
        assert_eq!(names, [("Y", "Y2"), ("X", "X2")]);
        assert_eq!(m.diagnostics.len(), 1, "unmatched W is reported");
        assert!(m.diagnostics[0].message.contains("B.W"));
    }

    #[test]
    fn strict_mode_rejects_unmatched() {
        let from = record("A", vec![decl("X", TypeDesc::named("i64"), &[("conv", "x")])]);
        let to = record("B", vec![decl("W", TypeDesc::named("i64"), &[("conv", "w")])]);
        let schemas = set(vec![from.clone(), to.clone()]);
        let options = MatchOptions { strict: true, ..MatchOptions::default() };
        let err = Matcher::new(&schemas, &options).match_records(&from, &to, "conv").unwrap_err();
        assert!(matches!(err, Error::UnmatchedField { .. }));
    }

    #[test]
    fn no_tagged_fields_is_configuration_error() {
        let from = record("A", vec![decl("X", TypeDesc::named("i64"), &[("json", "x")])]);
        let schemas = set(vec![from.clone()]);
        let options = MatchOptions::default();
        let err = Matcher::new(&schemas, &options).flatten(&from, "conv", &mut Vec::new()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn skip_inlines_nested_fields_with_path_and_own_key() {
        let address = record("Address", vec![
            decl("City", TypeDesc::named("String"), &[("db", "city")]),
            decl("Zip", TypeDesc::named("String"), &[("conv", "zip")]),
        ]);
        let user = record("User", vec![
            decl("Name", TypeDesc::named("String"), &[("conv", "name")]),
            decl("Address", TypeDesc::named("Address").nullable(), &[("conv", "skip,db")]),
        ]);
        let schemas = set(vec![address, user.clone()]);
        let options = MatchOptions::default();
        let fields = Matcher::new(&schemas, &options).flatten(&user, "conv", &mut Vec::new()).unwrap();
        assert_eq!(fields.len(), 2);
        let city = &fields[1];
        assert_eq!(city.name, "City");
        assert_eq!(city.tag, "city");
        assert_eq!(city.path, [PathSegment { field: "Address".into(), nullable: true }]);
        assert_eq!(city.label("User"), "User.Address.City");
    }

    #[test]
    fn skip_on_non_record_is_a_diagnostic() {
        let user = record("User", vec![
            decl("Name", TypeDesc::named("String"), &[("conv", "name")]),
            decl("Meta", TypeDesc::named("String"), &[("conv", "skip")]),
        ]);
        let schemas = set(vec![user.clone()]);
        let options = MatchOptions::default();
        let mut diags = Vec::new();
        let fields = Matcher::new(&schemas, &options).flatten(&user, "conv", &mut diags).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("User.Meta"));
    }

    #[test]
    fn skip_cycle_is_rejected() {
        let node = record("Node", vec![
            decl("V", TypeDesc::named("i64"), &[("conv", "v")]),
            decl("Next", TypeDesc::named("Node").nullable(), &[("conv", "skip")]),
        ]);
        let schemas = set(vec![node.clone()]);
        let options = MatchOptions::default();
        let err = Matcher::new(&schemas, &options).flatten(&node, "conv", &mut Vec::new()).unwrap_err();
        assert!(matches!(err, Error::SkipCycle { .. }));
    }

    #[test]
    fn empty_nested_record_is_absent() {
        let inner = record("Inner", vec![decl("Q", TypeDesc::named("i64"), &[("json", "q")])]);
        let outer = record("Outer", vec![
            decl("A", TypeDesc::named("i64"), &[("conv", "a")]),
            decl("In", TypeDesc::named("Inner"), &[("conv", "skip")]),
        ]);
        let schemas = set(vec![inner, outer.clone()]);
        let options = MatchOptions::default();
        let mut diags = Vec::new();
        let fields = Matcher::new(&schemas, &options).flatten(&outer, "conv", &mut diags).unwrap();
        assert_eq!(fields.len(), 1);
        assert!(diags[0].message.contains("Outer.In"));
    }

    #[test]
    fn matching_twice_is_identical() {
        let from = record("A", vec![
            decl("X", TypeDesc::named("i64"), &[("conv", "x")]),
            decl("X2", TypeDesc::named("i64"), &[("conv", "x")]),
        ]);
        let to = record("B", vec![decl("X", TypeDesc::named("i64"), &[("conv", "x")])]);
        let schemas = set(vec![from.clone(), to.clone()]);
        let options = MatchOptions::default();
        let matcher = Matcher::new(&schemas, &options);
        let a = matcher.match_records(&from, &to, "conv").unwrap();
        let b = matcher.match_records(&from, &to, "conv").unwrap();
        assert_eq!(a.pairs, b.pairs);
        assert_eq!(a.pairs[0].from.name, "X", "first source tag wins");
        assert_eq!(a.diagnostics, b.diagnostics);
    }
}
