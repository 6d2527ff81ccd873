use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error("Template info file not found: {0} (run the provisioning step first)")]
    Missing(String),
    #[error("Invalid template info file {path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// Opaque reference to the provisioned extraction template. The core never
/// creates or mutates the template; the reference is threaded explicitly
/// through the pipeline as plain configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef(String);

impl TemplateRef {
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Deserialize)]
struct TemplateInfo {
    #[serde(alias = "templateRef", alias = "templateArn", alias = "projectArn")]
    template_ref: Option<String>,
}

/// Read the template reference from the JSON info file the provisioning
/// step writes. Absence is fatal before any scheduling begins.
pub fn load_template_ref(path: &Path) -> Result<TemplateRef, ProvisioningError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|_| ProvisioningError::Missing(path.display().to_string()))?;

    let info: TemplateInfo =
        serde_json::from_str(&raw).map_err(|e| ProvisioningError::Invalid {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    match info.template_ref {
        Some(reference) if !reference.trim().is_empty() => Ok(TemplateRef::new(reference)),
        _ => Err(ProvisioningError::Invalid {
            path: path.display().to_string(),
            reason: "missing templateRef".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_template_ref() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("template_info.json");
        std::fs::write(&path, r#"{"templateRef": "tpl-insurance-v3"}"#).unwrap();

        let template = load_template_ref(&path).unwrap();
        assert_eq!(template.as_str(), "tpl-insurance-v3");
    }

    #[test]
    fn test_legacy_key_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("project_info.json");
        std::fs::write(&path, r#"{"projectArn": "arn:aws:bedrock:p/123"}"#).unwrap();

        let template = load_template_ref(&path).unwrap();
        assert_eq!(template.as_str(), "arn:aws:bedrock:p/123");
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let result = load_template_ref(Path::new("/nope/template_info.json"));
        assert!(matches!(result, Err(ProvisioningError::Missing(_))));
    }

    #[test]
    fn test_malformed_file_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("template_info.json");
        std::fs::write(&path, r#"{"somethingElse": true}"#).unwrap();

        assert!(matches!(
            load_template_ref(&path),
            Err(ProvisioningError::Invalid { .. })
        ));
    }
}
