use serde::{Deserialize, Serialize};

use crate::codeable_concept::CodeableConcept;
use crate::quantity::{Quantity, Range, Ratio};
use crate::timing::Timing;

/// A `Dosage.doseAndRate` element — exactly one of `doseQuantity` or
/// `doseRange` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DoseAndRate {
    Quantity {
        #[serde(rename = "doseQuantity")]
        dose_quantity: Quantity,
    },
    Range {
        #[serde(rename = "doseRange")]
        dose_range: Range,
    },
}

impl DoseAndRate {
    pub fn quantity(q: Quantity) -> Self {
        DoseAndRate::Quantity { dose_quantity: q }
    }

    pub fn range(r: Range) -> Self {
        DoseAndRate::Range { dose_range: r }
    }
}

/// How one titration phase's instruction relates to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Sequential,
    Concurrent,
    Conditional,
}

/// `SignatureInstruction.relationship` — links a phase to the one before it
/// (tapering) or expresses a conditional branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Relationship {
    pub fn sequential(target_id: impl Into<String>) -> Self {
        Self {
            relationship_type: RelationshipType::Sequential,
            target_id: Some(target_id.into()),
            condition: None,
        }
    }

    pub fn conditional(condition: impl Into<String>) -> Self {
        Self {
            relationship_type: RelationshipType::Conditional,
            target_id: None,
            condition: Some(condition.into()),
        }
    }
}

/// FHIR R4 `Dosage`, shaped as a rendered signature instruction. `text`
/// and `dose_and_rate` are always present; titration output is an ordered
/// `Vec<Dosage>` with `sequence` and `relationship` set from index 1 on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dosage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    pub text: String,
    pub timing: Timing,
    pub dose_and_rate: Vec<DoseAndRate>,
    pub route: CodeableConcept,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_needed_boolean: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_dose_per_period: Option<Ratio>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_instructions: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<Relationship>,
}

impl Dosage {
    /// A single, non-titrated instruction with no sequence/relationship.
    pub fn single(
        text: String,
        timing: Timing,
        dose_and_rate: DoseAndRate,
        route: CodeableConcept,
    ) -> Self {
        Self {
            sequence: None,
            text,
            timing,
            dose_and_rate: vec![dose_and_rate],
            route,
            as_needed_boolean: None,
            max_dose_per_period: None,
            additional_instructions: Vec::new(),
            relationship: None,
        }
    }

    pub fn uses_dose_range(&self) -> bool {
        self.dose_and_rate
            .iter()
            .any(|d| matches!(d, DoseAndRate::Range { .. }))
    }
}
