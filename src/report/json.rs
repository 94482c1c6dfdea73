//! JSON output for scripting and piping.

use serde::Serialize;

use crate::error::Result;

/// Serialization failures propagate; a caller never receives degraded
/// output in place of an error.
pub fn render<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriftError;
    use serde::ser::Error as _;

    struct Unrenderable;

    impl Serialize for Unrenderable {
        fn serialize<S: serde::Serializer>(
            &self,
            _: S,
        ) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom("not representable"))
        }
    }

    #[test]
    fn renders_pretty_json() {
        let value = serde_json::json!({"path": "a.txt", "size": 1});
        let out = render(&value).unwrap();
        assert!(out.contains("\"path\": \"a.txt\""));
    }

    #[test]
    fn serialization_failure_propagates() {
        let err = render(&Unrenderable).unwrap_err();
        assert!(matches!(err, DriftError::Serialization(_)));
    }
}
