use super::catalog::{self, CatalogEntry, TypeClass};
use super::FunctionDesc;
use crate::error::Result;
use crate::ir::TypeDesc;

const INTEGERS: &[&str] = &[
    "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize",
];

/// Lossless `From` impls in std, by destination.
const WIDENING: &[(&str, &[&str])] = &[
    ("i8", &["bool"]),
    ("i16", &["i8", "u8", "bool"]),
    ("i32", &["i8", "i16", "u8", "u16", "bool"]),
    ("i64", &["i8", "i16", "i32", "u8", "u16", "u32", "bool"]),
    ("i128", &["i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64", "bool"]),
    ("isize", &["i8", "i16", "u8", "bool"]),
    ("u8", &["bool"]),
    ("u16", &["u8", "bool"]),
    ("u32", &["u8", "u16", "bool"]),
    ("u64", &["u8", "u16", "u32", "bool"]),
    ("u128", &["u8", "u16", "u32", "u64", "bool"]),
    ("usize", &["u8", "u16", "bool"]),
    ("f32", &["i8", "i16", "u8", "u16"]),
    ("f64", &["i8", "i16", "i32", "u8", "u16", "u32", "f32"]),
];

fn widening_sources(dst: &str) -> &'static [&'static str] {
    WIDENING.iter().find(|(d, _)| *d == dst).map(|(_, srcs)| *srcs).unwrap_or(&[])
}

/// Catalog entries for primitive numeric conversions: `<dst>::from` where
/// std has a lossless impl, `<dst>::try_from` for every other integer pair.
pub fn entries() -> Vec<CatalogEntry> {
    let mut out = Vec::new();
    for (dst, srcs) in WIDENING {
        out.push(
            CatalogEntry::concrete(format!("{dst}::from"), TypeDesc::named("T"), TypeDesc::named(*dst))
                .with_param("T", one_of(srcs.iter().copied())),
        );
    }
    for dst in INTEGERS {
        let narrowing = INTEGERS
            .iter()
            .copied()
            .filter(|src| src != dst && !widening_sources(dst).contains(src));
        let mut entry = CatalogEntry::concrete(format!("{dst}::try_from"), TypeDesc::named("T"), TypeDesc::named(*dst))
            .with_param("T", one_of(narrowing));
        entry.can_fail = true;
        out.push(entry);
    }
    out
}

fn one_of<'a>(names: impl Iterator<Item = &'a str>) -> TypeClass {
    TypeClass::OneOf(names.map(String::from).collect())
}

pub fn functions() -> Result<Vec<FunctionDesc>> {
    let mut out = Vec::new();
    for entry in entries() {
        out.extend(catalog::expand(&entry)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FunctionRegistry;

    fn t(name: &str) -> TypeDesc {
        TypeDesc::named(name)
    }

    #[test]
    fn every_entry_expands() {
        for entry in entries() {
            let expanded = catalog::expand(&entry).unwrap();
            assert!(!expanded.is_empty(), "{} expands to nothing", entry.name);
        }
        assert!(functions().unwrap().len() > INTEGERS.len());
    }

    #[test]
    fn widening_is_infallible_narrowing_can_fail() {
        let reg = FunctionRegistry::builtin().unwrap();
        let widen = reg.lookup(&t("u16"), &t("u64")).unwrap();
        assert_eq!(widen.name, "u64::from");
        assert!(!widen.can_fail);

        let narrow = reg.lookup(&t("i64"), &t("i32")).unwrap();
        assert_eq!(narrow.name, "i32::try_from");
        assert!(narrow.can_fail);

        let sign = reg.lookup(&t("i8"), &t("u8")).unwrap();
        assert!(sign.can_fail);
    }

    #[test]
    fn every_integer_pair_is_covered() {
        let reg = FunctionRegistry::builtin().unwrap();
        for src in INTEGERS {
            for dst in INTEGERS {
                if src == dst {
                    assert!(reg.lookup(&t(src), &t(dst)).is_none(), "{src} -> {dst} needs no function");
                } else {
                    assert!(reg.lookup(&t(src), &t(dst)).is_some(), "{src} -> {dst} missing");
                }
            }
        }
    }

    #[test]
    fn floats_only_widen() {
        let reg = FunctionRegistry::builtin().unwrap();
        assert_eq!(reg.lookup(&t("f32"), &t("f64")).map(|f| f.name.as_str()), Some("f64::from"));
        assert!(reg.lookup(&t("f64"), &t("f32")).is_none());
        assert!(reg.lookup(&t("i64"), &t("f64")).is_none());
    }
}
