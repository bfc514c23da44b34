//! Shared JSON Schema loading for on-disk documents.
//!
//! Schemas carry their own `schema_version` as a const at
//! `/properties/schema_version/const`; loading extracts it so callers can
//! reject documents of another version before running the full validation.

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::JSONSchema;
use serde_json::Value;

const SCHEMA_VERSION_POINTER: &str = "/properties/schema_version/const";

/// A compiled schema plus the version it pins.
pub(crate) struct CompiledSchema {
    pub schema_version: String,
    compiled: JSONSchema,
}

impl CompiledSchema {
    /// Check `instance` against the schema, reporting every violation.
    pub fn validate(&self, instance: &Value, label: &str) -> Result<()> {
        if let Err(errors) = self.compiled.validate(instance) {
            let details = errors
                .map(|err| err.to_string())
                .collect::<Vec<_>>()
                .join("\n");
            bail!("{label} failed schema validation:\n{details}");
        }
        Ok(())
    }

    /// Require `instance` to declare this schema's version.
    pub fn check_version(&self, instance: &Value, label: &str) -> Result<()> {
        let declared = instance
            .get("schema_version")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if declared != self.schema_version {
            bail!(
                "{label} has schema_version '{declared}', expected '{}'",
                self.schema_version
            );
        }
        Ok(())
    }
}

/// Compile a schema from its JSON text.
pub(crate) fn compile_schema(raw: &str, label: &str) -> Result<CompiledSchema> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("parsing schema {label}"))?;
    let schema_version = extract_schema_version(&value)
        .ok_or_else(|| anyhow!("schema {label} missing schema_version const"))?;
    let compiled =
        JSONSchema::compile(&value).map_err(|err| anyhow!("compiling schema {label}: {err}"))?;
    Ok(CompiledSchema {
        schema_version,
        compiled,
    })
}

fn extract_schema_version(schema: &Value) -> Option<String> {
    let version = schema.pointer(SCHEMA_VERSION_POINTER).and_then(Value::as_str)?;
    if !version.is_empty()
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        Some(version.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: &str = r#"{
        "type": "object",
        "required": ["schema_version", "n"],
        "properties": {
            "schema_version": {"const": "demo_v1"},
            "n": {"type": "integer"}
        }
    }"#;

    #[test]
    fn compiles_and_validates() {
        let schema = compile_schema(SCHEMA, "demo").unwrap();
        assert_eq!(schema.schema_version, "demo_v1");
        schema
            .validate(&json!({"schema_version": "demo_v1", "n": 3}), "doc")
            .unwrap();

        let err = schema
            .validate(&json!({"schema_version": "demo_v1", "n": "three"}), "doc")
            .unwrap_err();
        assert!(err.to_string().contains("doc failed schema validation"));
    }

    #[test]
    fn version_mismatch_is_reported() {
        let schema = compile_schema(SCHEMA, "demo").unwrap();
        let err = schema
            .check_version(&json!({"schema_version": "demo_v2"}), "doc")
            .unwrap_err();
        assert!(err.to_string().contains("expected 'demo_v1'"));
    }

    #[test]
    fn schema_without_version_const_is_rejected() {
        assert!(compile_schema(r#"{"type": "object"}"#, "bare").is_err());
        assert!(
            compile_schema(r#"{"properties": {"schema_version": {"const": "bad version"}}}"#, "bad")
                .is_err()
        );
    }
}
