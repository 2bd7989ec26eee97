//! # JSON Serialization Module
//!
//! Request bodies are parsed with simd-json; serialization goes through
//! serde_json.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse JSON text to a typed value using simd-json
///
/// # Errors
///
/// Returns `Error::BadRequest` if the text is not valid JSON for `T`.
pub fn parse_json<T: DeserializeOwned>(json_str: &str) -> Result<T> {
    let mut bytes = json_str.as_bytes().to_vec();
    parse_json_bytes(&mut bytes)
}

/// Parse JSON bytes in place
///
/// simd-json rewrites the buffer while parsing, hence `&mut`.
///
/// # Errors
///
/// Returns `Error::BadRequest` if the bytes are not valid JSON for `T`.
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| Error::BadRequest {
        reason: format!("Invalid JSON body: {e}"),
    })
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns `Error::Json` if `T`'s `Serialize` impl fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct NewPost {
        title: String,
        draft: bool,
    }

    #[test]
    fn test_parse_json_object() {
        let post: NewPost = parse_json(r#"{"title": "Hello", "draft": true}"#).unwrap();
        assert_eq!(post.title, "Hello");
        assert!(post.draft);
    }

    #[test]
    fn test_parse_json_map() {
        let map: HashMap<String, String> = parse_json(r#"{"csrf_token": "abc"}"#).unwrap();
        assert_eq!(map.get("csrf_token"), Some(&"abc".to_string()));
    }

    #[test]
    fn test_invalid_json_is_bad_request() {
        let result: Result<NewPost> = parse_json("title=Hello");
        assert!(matches!(result, Err(Error::BadRequest { .. })));
    }

    #[test]
    fn test_to_json() {
        let json = to_json(&NewPost {
            title: "Bob".to_string(),
            draft: false,
        })
        .unwrap();
        assert_eq!(json, r#"{"title":"Bob","draft":false}"#);
    }
}
