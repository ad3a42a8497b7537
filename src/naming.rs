use once_cell::sync::Lazy;
use regex::Regex;

static WORD_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([a-z0-9])([A-Z])|([A-Z]+)([A-Z][a-z]{2,})").expect("static regex")
});

static NON_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("static regex"));

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait",
    "true", "type", "unsafe", "use", "where", "while", "yield",
];

/// `UserDTO` → `user_dto`, `IDs` → `ids`.
pub fn snake_case(name: &str) -> String {
    let spaced = WORD_BOUNDARY.replace_all(name, |caps: &regex::Captures<'_>| {
        match (caps.get(1), caps.get(2)) {
            (Some(a), Some(b)) => format!("{}_{}", a.as_str(), b.as_str()),
            _ => format!("{}_{}", &caps[3], &caps[4]),
        }
    });
    let cleaned = NON_IDENT.replace_all(&spaced, "_");
    let lowered = cleaned.trim_matches('_').to_lowercase();
    if lowered.is_empty() { "value".to_string() } else { lowered }
}

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Field identifier as written in a place expression (`r#type`).
pub fn field_ident(name: &str) -> String {
    if is_keyword(name) && !matches!(name, "self" | "Self" | "super" | "crate") {
        format!("r#{name}")
    } else {
        name.to_string()
    }
}

/// Local binding derived from a name; never a keyword, never one of the
/// converter's own parameters, and never a [`guard_binding`] name.
pub fn binding(name: &str) -> String {
    let snake = snake_case(name);
    if is_keyword(&snake)
        || matches!(snake.as_str(), "from" | "to" | "item" | "index")
        || snake.starts_with("from_")
        || snake.starts_with(char::is_numeric)
    {
        format!("{snake}_")
    } else {
        snake
    }
}

/// Binding for a nullable source intermediate (`from_address`). Always
/// `from_` plus a snake name that never ends in `_`, so it cannot meet a
/// [`binding`], which ends in `_` whenever it starts with `from_`.
pub fn guard_binding(path: &[&str]) -> String {
    format!("from_{}", snake_case(&path.join("_")))
}
