use super::{ANYHOW_IMPORT, Lowering, Planner, Shape, Source, missing_check};
use crate::error::{Error, Result};
use crate::ir::TypeDesc;

/// Element-wise conversion of one collection into another: the element pair
/// goes through the same resolution as a field, against a per-element
/// binding, and the result is pushed into a freshly sized `Vec`. A failing
/// element returns from the converter at once, so no partial collection
/// escapes.
///
/// An absent source collection fails the record when the destination is
/// plain and yields `None` when it is nullable; a present but empty one
/// always gives an empty `Vec`.
pub(crate) fn lower_collection(
    planner: &Planner<'_>,
    from: &TypeDesc,
    to: &TypeDesc,
    source: &Source,
    target: &str,
    depth: usize,
) -> Result<Lowering> {
    let (Some(from_elem), Some(to_elem)) = (from.elem.as_deref(), to.elem.as_deref()) else {
        return Err(Error::no_strategy(from.render(), to.render(), target));
    };

    let suffix = if depth == 0 { String::new() } else { format!("_{depth}") };
    let item = format!("item{suffix}");
    let index = format!("index{suffix}");
    let out = if depth == 0 { source.binding.clone() } else { format!("items{suffix}") };

    let element_source = Source {
        place: item.clone(),
        owned: false,
        label: format!("{}[{{{index}}}]", source.label),
        binding: item.clone(),
    };
    let element_target = format!("{target}[]");
    let element = planner.lower_value(from_elem, to_elem, &element_source, &element_target, depth + 1)?;

    // present collection to iterate: the field itself, or its unwrapped value
    let src = if from.nullable { format!("{out}_src") } else { source.place.clone() };
    let head = if element.uses_label {
        format!("for ({index}, {item}) in {src}.iter().enumerate() {{")
    } else {
        format!("for {item} in {src}.iter() {{")
    };
    let mut body = vec![format!("let mut {out} = Vec::with_capacity({src}.len());"), head];
    for stmt in &element.statements {
        body.extend(stmt.lines().map(|l| format!("    {l}")));
    }
    body.push(format!("    {out}.push({});", element.expr));
    body.push("}".to_string());

    let mut imports = element.imports;
    let mut can_fail = element.can_fail;
    let mut uses_label = element.uses_label; // outer loops must enumerate too
    let (statement, expr) = match (from.nullable, to.nullable) {
        (false, false) => (body.join("\n"), out),
        (false, true) => (body.join("\n"), format!("Some({out})")),
        (true, false) => {
            let check = missing_check(&src, &format!("{}.as_ref()", source.place), &source.label);
            imports.push(ANYHOW_IMPORT.to_string());
            can_fail = true;
            uses_label = true;
            (format!("{check}\n{}", body.join("\n")), out)
        }
        (true, true) => {
            let mut lines = vec![
                format!("let {out} = match {}.as_ref() {{", source.place),
                format!("    Some({src}) => {{"),
            ];
            lines.extend(body.iter().map(|l| format!("        {l}")));
            lines.push(format!("        Some({out})"));
            lines.push("    }".to_string());
            lines.push("    None => None,".to_string());
            lines.push("};".to_string());
            (lines.join("\n"), out)
        }
    };

    Ok(Lowering {
        statements: vec![statement],
        expr,
        can_fail,
        uses_label,
        imports,
        shape: Shape::Collection { element: Box::new(element.shape) },
    })
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use crate::ir::{FieldDecl, RecordSchema, SchemaSet, Tag, TypeDesc};
    use crate::matcher::MatchOptions;
    use crate::plan::{ConversionPlan, PlanRequest, Planner, Shape};
    use crate::registry::{FunctionDesc, FunctionRegistry};
    use crate::resolve::{Coercion, Strategy};
    use pretty_assertions::assert_eq;

    fn t(name: &str) -> TypeDesc {
        TypeDesc::named(name)
    }

    fn plan_pair(from: TypeDesc, to: TypeDesc, functions: Vec<FunctionDesc>) -> crate::Result<ConversionPlan> {
        let field = |name: &str, ty| FieldDecl {
            name: name.into(),
            ty,
            tags: vec![Tag { key: "conv".into(), value: "ids".into() }],
        };
        let mut schemas = SchemaSet::new();
        schemas.insert(RecordSchema { type_name: "A".into(), module: String::new(), fields: vec![field("IDs", from)] })?;
        schemas.insert(RecordSchema { type_name: "B".into(), module: String::new(), fields: vec![field("UUIDs", to)] })?;
        let mut registry = FunctionRegistry::new();
        for f in functions {
            registry.register(f);
        }
        let options = MatchOptions::default();
        Planner::new(&schemas, &registry, &options).plan(&PlanRequest::new("A", "B", "conv"))
    }

    #[test]
    fn failing_elements_stop_the_loop() {
        let plan = plan_pair(
            TypeDesc::vec_of(t("String")),
            TypeDesc::vec_of(t("Decimal")),
            vec![FunctionDesc::new("parse_decimal", t("String"), t("Decimal")).failing()],
        )
        .unwrap();
        let fp = &plan.field_plans[0];
        assert_eq!(
            fp.statements[0],
            "let mut uuids = Vec::with_capacity(from.IDs.len());\n\
             for item in from.IDs.iter() {\n    \
                 let item = parse_decimal(item.clone())?;\n    \
                 uuids.push(item);\n\
             }"
        );
        assert_eq!(fp.expr, "uuids");
        assert!(fp.can_fail);
        assert!(plan.requires_failure_return);
        assert_eq!(
            fp.shape,
            Shape::Collection { element: Box::new(Shape::Value { strategy: Strategy::FunctionWithFailure { wrap: false } }) }
        );
    }

    #[test]
    fn identical_collections_are_assigned_whole() {
        let ty = TypeDesc::vec_of(t("String"));
        let plan = plan_pair(ty.clone(), ty, vec![]).unwrap();
        let fp = &plan.field_plans[0];
        assert_eq!(fp.shape, Shape::Value { strategy: Strategy::DirectAssignment { coercion: Coercion::Identity } });
        assert_eq!(fp.expr, "from.IDs.clone()");
    }

    #[test]
    fn nullable_elements_enumerate_for_diagnostics() {
        let plan = plan_pair(
            TypeDesc::vec_of(t("String").nullable()),
            TypeDesc::vec_of(t("String")),
            vec![],
        )
        .unwrap();
        let body = &plan.field_plans[0].statements[0];
        assert!(body.contains("for (index, item) in from.IDs.iter().enumerate() {"), "{body}");
        assert!(body.contains("anyhow!(\"A.IDs[{index}] is missing\")"), "{body}");
        assert!(plan.requires_failure_return);
        assert!(plan.required_imports.contains("anyhow::anyhow"));
    }

    #[test]
    fn present_collection_never_checks_for_absence() {
        let plan = plan_pair(
            TypeDesc::vec_of(t("i32")),
            TypeDesc::vec_of(t("i64")),
            vec![FunctionDesc::new("i64::from", t("i32"), t("i64"))],
        )
        .unwrap();
        let fp = &plan.field_plans[0];
        assert_eq!(
            fp.statements,
            ["let mut uuids = Vec::with_capacity(from.IDs.len());\n\
              for item in from.IDs.iter() {\n    \
                  uuids.push(i64::from(item.clone()));\n\
              }"]
        );
        assert!(!fp.statements[0].contains("ok_or_else"));
        assert!(!fp.can_fail, "an empty source yields an empty Vec");
        assert!(!plan.requires_failure_return);
    }

    #[test]
    fn absent_source_collection_fails_a_plain_destination() {
        let plan = plan_pair(
            TypeDesc::vec_of(t("i32")).nullable(),
            TypeDesc::vec_of(t("i64")),
            vec![FunctionDesc::new("i64::from", t("i32"), t("i64"))],
        )
        .unwrap();
        let fp = &plan.field_plans[0];
        assert_eq!(
            fp.statements,
            ["let uuids_src = from.IDs.as_ref().ok_or_else(|| anyhow!(\"A.IDs is missing\"))?;\n\
              let mut uuids = Vec::with_capacity(uuids_src.len());\n\
              for item in uuids_src.iter() {\n    \
                  uuids.push(i64::from(item.clone()));\n\
              }"]
        );
        assert_eq!(fp.expr, "uuids");
        assert!(fp.can_fail);
        assert!(plan.requires_failure_return);
        assert!(plan.required_imports.contains("anyhow::anyhow"));
    }

    #[test]
    fn absent_source_collection_stays_absent() {
        let plan = plan_pair(
            TypeDesc::vec_of(t("i32")).nullable(),
            TypeDesc::vec_of(t("i64")).nullable(),
            vec![FunctionDesc::new("i64::from", t("i32"), t("i64"))],
        )
        .unwrap();
        let fp = &plan.field_plans[0];
        assert_eq!(
            fp.statements,
            ["let uuids = match from.IDs.as_ref() {\n    \
                  Some(uuids_src) => {\n        \
                      let mut uuids = Vec::with_capacity(uuids_src.len());\n        \
                      for item in uuids_src.iter() {\n            \
                          uuids.push(i64::from(item.clone()));\n        \
                      }\n        \
                      Some(uuids)\n    \
                  }\n    \
                  None => None,\n\
              };"]
        );
        assert_eq!(fp.expr, "uuids");
        assert!(!plan.requires_failure_return, "None maps to None");
    }

    #[test]
    fn absent_inner_collection_names_its_index() {
        let plan = plan_pair(
            TypeDesc::vec_of(TypeDesc::vec_of(t("i32")).nullable()),
            TypeDesc::vec_of(TypeDesc::vec_of(t("i64"))),
            vec![FunctionDesc::new("i64::from", t("i32"), t("i64"))],
        )
        .unwrap();
        let body = &plan.field_plans[0].statements[0];
        assert!(body.contains("for (index, item) in from.IDs.iter().enumerate() {"), "{body}");
        assert!(
            body.contains("    let items_1_src = item.as_ref().ok_or_else(|| anyhow!(\"A.IDs[{index}] is missing\"))?;"),
            "{body}"
        );
        assert!(plan.requires_failure_return);
    }

    #[test]
    fn nested_collections_recurse() {
        let plan = plan_pair(
            TypeDesc::vec_of(TypeDesc::vec_of(t("i32"))),
            TypeDesc::vec_of(TypeDesc::vec_of(t("i64"))),
            vec![FunctionDesc::new("i64::from", t("i32"), t("i64"))],
        )
        .unwrap();
        let body = &plan.field_plans[0].statements[0];
        assert!(body.contains("for item in from.IDs.iter() {"), "{body}");
        assert!(body.contains("    let mut items_1 = Vec::with_capacity(item.len());"), "{body}");
        assert!(body.contains("        items_1.push(i64::from(item_1.clone()));"), "{body}");
        assert!(body.contains("    uuids.push(items_1);"), "{body}");
        assert!(!plan.requires_failure_return);
    }

    #[test]
    fn unconvertible_elements_are_an_error() {
        let err = plan_pair(TypeDesc::vec_of(t("String")), TypeDesc::vec_of(t("Uuid")), vec![]).unwrap_err();
        assert!(err.to_string().contains("B.UUIDs[]"), "{err}");
    }
}
