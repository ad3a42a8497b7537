use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(source_name: &str, src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        Error::decode(source_name, format!("at JSON path {path} → {}", err.into_inner()))
    })
}

/// Same as [`from_str_with_path`] for an already parsed document (jq output).
pub fn from_value_with_path<T: DeserializeOwned>(source_name: &str, value: serde_json::Value) -> Result<T> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| {
        let path = err.path().to_string();
        Error::decode(source_name, format!("at JSON path {path} → {}", err.into_inner()))
    })
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::RecordSchema;

    #[test]
    fn decode_error_names_the_offending_path() {
        let src = r#"{"type_name": "User", "fields": [{"name": "ID", "ty": {"name": 7}}]}"#;
        let err = from_str_with_path::<RecordSchema>("user.json", src).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("user.json"), "{text}");
        assert!(text.contains("fields[0].ty.name"), "{text}");
        assert!(err.is_configuration());
    }

    #[test]
    fn values_decode_like_text() {
        let value = serde_json::json!({"type_name": "User", "fields": []});
        let record: RecordSchema = from_value_with_path("jq output", value).unwrap();
        assert_eq!(record.type_name, "User");
        assert!(record.module.is_empty());
    }
}
