//! DRS URI and object-metadata helpers.

use super::ProbeError;
use serde_json::Value;

pub const DRS_SCHEME_PREFIX: &str = "drs://";

/// Object id used for index lookups: everything after the last colon.
///
/// `drs://dg.712C:dg.712C/fa640b0e-...` resolves to `dg.712C/fa640b0e-...`.
pub fn object_id(drs_uri: &str) -> Result<&str, ProbeError> {
    if !drs_uri.starts_with(DRS_SCHEME_PREFIX) {
        return Err(ProbeError::InvalidDrsUri {
            uri: drs_uri.to_string(),
        });
    }
    // "drs://" always contains a colon, so rsplit yields at least one piece.
    Ok(drs_uri.rsplit(':').next().unwrap_or(drs_uri))
}

/// Access id of the first access method whose `type` equals `scheme`.
pub fn access_id_for_scheme(metadata: &Value, scheme: &str) -> Result<Option<String>, ProbeError> {
    let methods = metadata
        .get("access_methods")
        .and_then(Value::as_array)
        .ok_or(ProbeError::MissingField { field: "access_methods" })?;

    for method in methods {
        let kind = method
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProbeError::MissingField { field: "type" })?;
        if kind == scheme {
            let id = method
                .get("access_id")
                .and_then(Value::as_str)
                .ok_or(ProbeError::MissingField { field: "access_id" })?;
            return Ok(Some(id.to_string()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_id_after_last_colon() {
        let uri = "drs://dg.712C:dg.712C/fa640b0e-9779-452f-99a6-16d833d15bd0";
        assert_eq!(object_id(uri).unwrap(), "dg.712C/fa640b0e-9779-452f-99a6-16d833d15bd0");
    }

    #[test]
    fn test_object_id_without_compact_prefix() {
        assert_eq!(object_id("drs://host.example.org/abc").unwrap(), "//host.example.org/abc");
    }

    #[test]
    fn test_object_id_rejects_other_schemes() {
        assert!(matches!(
            object_id("gs://bucket/object"),
            Err(ProbeError::InvalidDrsUri { .. })
        ));
    }

    #[test]
    fn test_access_id_matches_scheme() {
        let metadata = json!({
            "access_methods": [
                {"type": "s3", "access_id": "Y"},
                {"type": "gs", "access_id": "X"}
            ]
        });
        assert_eq!(access_id_for_scheme(&metadata, "gs").unwrap(), Some("X".to_string()));
        assert_eq!(access_id_for_scheme(&metadata, "s3").unwrap(), Some("Y".to_string()));
        assert_eq!(access_id_for_scheme(&metadata, "az").unwrap(), None);
    }

    #[test]
    fn test_access_id_first_match_wins() {
        let metadata = json!({
            "access_methods": [
                {"type": "gs", "access_id": "first"},
                {"type": "gs", "access_id": "second"}
            ]
        });
        assert_eq!(access_id_for_scheme(&metadata, "gs").unwrap(), Some("first".to_string()));
    }

    #[test]
    fn test_access_id_missing_methods() {
        let err = access_id_for_scheme(&json!({"id": "x"}), "gs").unwrap_err();
        assert!(matches!(err, ProbeError::MissingField { field: "access_methods" }));
    }
}
