use serde::{Deserialize, Serialize};

/// FHIR R4 `Coding` — a single code from a terminology system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    pub fn snomed(code: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            system: Some("http://snomed.info/sct".to_string()),
            code: Some(code.into()),
            display: Some(display.into()),
        }
    }
}

/// FHIR R4 `CodeableConcept` — one or more codings plus an optional
/// free-text rendering. §6 requires at least one `{system, code, display}`
/// for coded values (routes, administration methods).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coding: Option<Vec<Coding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    pub fn coded(coding: Coding) -> Self {
        Self {
            coding: Some(vec![coding]),
            text: None,
        }
    }

    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            coding: None,
            text: Some(text.into()),
        }
    }
}
