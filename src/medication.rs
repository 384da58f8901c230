//! Data model entities: `MedicationProfile`, `MedicationRequestContext`,
//! and the types they're built from.

use std::fmt;
use std::str::FromStr;

use fhir_types::{Quantity, Ratio, Timing};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::value_objects::DoseValue;

/// The closed set of dose forms a `MedicationProfile` can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DoseForm {
    Tablet,
    Capsule,
    Odt,
    Troche,
    Solution,
    Suspension,
    Syrup,
    Elixir,
    Injection,
    Vial,
    Cream,
    Gel,
    Ointment,
    Patch,
    Suppository,
    Inhaler,
    NasalSpray,
    Drops,
}

impl DoseForm {
    pub fn is_solid_oral(self) -> bool {
        matches!(
            self,
            DoseForm::Tablet | DoseForm::Capsule | DoseForm::Odt | DoseForm::Troche
        )
    }

    pub fn is_liquid(self) -> bool {
        matches!(
            self,
            DoseForm::Solution
                | DoseForm::Suspension
                | DoseForm::Syrup
                | DoseForm::Elixir
                | DoseForm::Injection
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DoseForm::Tablet => "tablet",
            DoseForm::Capsule => "capsule",
            DoseForm::Odt => "ODT",
            DoseForm::Troche => "troche",
            DoseForm::Solution => "solution",
            DoseForm::Suspension => "suspension",
            DoseForm::Syrup => "syrup",
            DoseForm::Elixir => "elixir",
            DoseForm::Injection => "injection",
            DoseForm::Vial => "vial",
            DoseForm::Cream => "cream",
            DoseForm::Gel => "gel",
            DoseForm::Ointment => "ointment",
            DoseForm::Patch => "patch",
            DoseForm::Suppository => "suppository",
            DoseForm::Inhaler => "inhaler",
            DoseForm::NasalSpray => "nasal spray",
            DoseForm::Drops => "drops",
        }
    }
}

impl fmt::Display for DoseForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Physical splitting indentations on a solid dose form (GLOSSARY: Scoring).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scoring {
    None,
    Half,
    Quarter,
}

impl Scoring {
    /// Smallest fraction of a unit this scoring allows, e.g. 0.25 for
    /// `Quarter`, 0.5 for `Half`, 1.0 (whole units only) for `None`.
    pub fn smallest_fraction(self) -> f64 {
        match self {
            Scoring::None => 1.0,
            Scoring::Half => 0.5,
            Scoring::Quarter => 0.25,
        }
    }

    /// True if `value` is an allowed split for this scoring (a non-negative
    /// multiple of `smallest_fraction`, within floating-point tolerance).
    pub fn allows(self, value: f64) -> bool {
        if value <= 0.0 {
            return false;
        }
        let steps = value / self.smallest_fraction();
        (steps - steps.round()).abs() < 1e-6
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MedicationClassification {
    Medication,
    Supplement,
    Compound,
}

/// One active ingredient and its strength ratio (numerator over
/// denominator, e.g. 10 mg / 1 mL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub name: String,
    pub strength_ratio: Ratio,
}

impl Ingredient {
    /// Validates the invariant that both sides of the strength ratio are
    /// strictly positive.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.strength_ratio.numerator.value <= 0.0
            || self.strength_ratio.denominator.value <= 0.0
        {
            return Err(EngineError::InvalidDoseInput {
                reason: format!(
                    "ingredient '{}' has a non-positive strength ratio",
                    self.name
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispenserType {
    Topiclick,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispenserMetadata {
    pub dispenser_type: DispenserType,
    /// Units of the dispenser's own measure (e.g. clicks) per 1 unit of the
    /// bridged unit (e.g. mL). Topiclick is 4 clicks per mL.
    pub conversion_ratio: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DosageConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_single_dose: Option<Quantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_single_dose: Option<Quantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_per_period: Option<Ratio>,
}

impl Default for DosageConstraints {
    fn default() -> Self {
        Self {
            min_single_dose: None,
            max_single_dose: None,
            max_per_period: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub quantity: f64,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pack_size: Option<f64>,
}

/// An immutable medication descriptor. Constructed once by the caller and
/// shared by reference across builder/strategy/days-supply calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationProfile {
    pub id: String,
    pub display_name: String,
    pub classification: MedicationClassification,
    pub dose_form: DoseForm,
    pub ingredients: Vec<Ingredient>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring: Option<Scoring>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispenser: Option<DispenserMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosage_constraints: Option<DosageConstraints>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub eligible_genders: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route_whitelist: Vec<String>,
}

impl MedicationProfile {
    /// Checks core invariants: at least one ingredient, every ingredient's
    /// ratio is positive. Scoring has no illegal combination beyond the
    /// three-value enum itself, so this only needs to check the ingredient
    /// ratios and non-emptiness.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.ingredients.is_empty() {
            return Err(EngineError::InvalidDoseInput {
                reason: format!("medication '{}' has no ingredients", self.id),
            });
        }
        for ingredient in &self.ingredients {
            ingredient.validate()?;
        }
        Ok(())
    }

    pub fn primary_ingredient(&self) -> Option<&Ingredient> {
        self.ingredients.first()
    }

    pub fn is_compound(&self) -> bool {
        matches!(self.classification, MedicationClassification::Compound)
            || self.ingredients.len() >= 2
    }

    pub fn has_topiclick_dispenser(&self) -> bool {
        matches!(
            self.dispenser,
            Some(DispenserMetadata {
                dispenser_type: DispenserType::Topiclick,
                ..
            })
        )
    }
}

/// The raw, unparsed shape of `MedicationRequestContext.frequency` — a
/// single string, an already-structured `Timing`, or an ordered sequence of
/// either (a titration schedule). Parsed by `TemporalParser`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrequencyInput {
    Text(String),
    Structured(Timing),
    Sequence(Vec<FrequencyInput>),
}

/// A dosing interval expressed as a range, e.g. "every 4-6 hours". Models
/// the interval directly since that is what gets rendered and what "wait
/// at least Y hours between doses" is derived from — see DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyRange {
    pub min_interval: f64,
    pub max_interval: f64,
    pub interval_unit: fhir_types::DurationUnit,
}

impl FrequencyRange {
    /// Min/max doses per day implied by the interval range (a shorter
    /// interval means more doses per day, hence the swap).
    pub fn doses_per_day_range(&self) -> (f64, f64) {
        let min_interval_hours = self.min_interval * self.interval_unit.days_factor() * 24.0;
        let max_interval_hours = self.max_interval * self.interval_unit.days_factor() * 24.0;
        (24.0 / max_interval_hours, 24.0 / min_interval_hours)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientContext {
    pub id: String,
    pub age_years: Option<f64>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub concurrent_medications: Vec<String>,
}

/// Transient per-request input. Never mutated after construction —
/// builders copy the fields they need into their own audit trail rather
/// than holding a reference that could be mutated by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRequestContext {
    pub request_id: String,
    pub timestamp: String,
    pub medication: MedicationProfile,
    #[serde(default)]
    pub patient: PatientContext,
    pub dose: DoseInput,
    pub frequency: FrequencyInput,
    pub route: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<fhir_types::Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispense_quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refills: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub as_needed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_dose_per_period: Option<Ratio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_range: Option<FrequencyRange>,
    /// For a titration `frequency` sequence, the dose value for each phase
    /// in order (same unit as `dose`). `None` means every phase uses
    /// `dose` unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub titration_phase_doses: Option<Vec<f64>>,
}

/// The dose half of a request — either a single point dose or a PRN range,
/// always carrying the unit string as given (parsed downstream into a typed
/// `DoseValue` once the medication's dose form disambiguates it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, rename_all = "camelCase")]
pub enum DoseInput {
    Single { value: f64, unit: String },
    Range { min_value: f64, max_value: f64, unit: String },
}

impl DoseInput {
    pub fn unit(&self) -> &str {
        match self {
            DoseInput::Single { unit, .. } => unit,
            DoseInput::Range { unit, .. } => unit,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            DoseInput::Single { value, .. } => {
                if *value <= 0.0 || !value.is_finite() {
                    return Err(EngineError::InvalidDoseInput {
                        reason: format!("dose value must be positive, got {value}"),
                    });
                }
            }
            DoseInput::Range { min_value, max_value, .. } => {
                if *min_value <= 0.0 || *max_value <= 0.0 {
                    return Err(EngineError::InvalidDoseInput {
                        reason: "dose range values must be positive".to_string(),
                    });
                }
                if min_value > max_value {
                    return Err(EngineError::InvalidDoseInput {
                        reason: format!("dose range min {min_value} exceeds max {max_value}"),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn as_dose_value(&self) -> Result<DoseValue, EngineError> {
        match self {
            DoseInput::Single { value, unit } => DoseValue::parse(*value, unit),
            DoseInput::Range { .. } => Err(EngineError::InvalidDoseInput {
                reason: "a dose range cannot be converted to a single DoseValue".to_string(),
            }),
        }
    }
}

impl FromStr for DispenserType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "topiclick" => Ok(DispenserType::Topiclick),
            _ => Ok(DispenserType::Other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir_types::Quantity;
    use pretty_assertions::assert_eq;

    fn metformin() -> MedicationProfile {
        MedicationProfile {
            id: "metformin-500".to_string(),
            display_name: "Metformin 500 mg tablet".to_string(),
            classification: MedicationClassification::Medication,
            dose_form: DoseForm::Tablet,
            ingredients: vec![Ingredient {
                name: "Metformin".to_string(),
                strength_ratio: Ratio::new(Quantity::new(500.0, "mg"), Quantity::new(1.0, "tablet")),
            }],
            scoring: Some(Scoring::None),
            dispenser: None,
            dosage_constraints: None,
            package: Some(PackageInfo {
                quantity: 30.0,
                unit: "tablet".to_string(),
                pack_size: None,
            }),
            eligible_genders: Vec::new(),
            route_whitelist: Vec::new(),
        }
    }

    #[test]
    fn medication_with_ingredient_validates() {
        assert!(metformin().validate().is_ok());
    }

    #[test]
    fn medication_without_ingredients_is_rejected() {
        let mut m = metformin();
        m.ingredients.clear();
        assert!(m.validate().is_err());
    }

    #[test]
    fn scoring_none_allows_only_whole_units() {
        assert!(Scoring::None.allows(1.0));
        assert!(!Scoring::None.allows(0.5));
    }

    #[test]
    fn scoring_half_allows_halves_but_not_quarters() {
        assert!(Scoring::Half.allows(0.5));
        assert!(Scoring::Half.allows(1.5));
        assert!(!Scoring::Half.allows(0.25));
    }

    #[test]
    fn scoring_quarter_allows_quarters() {
        assert!(Scoring::Quarter.allows(0.25));
        assert!(Scoring::Quarter.allows(0.75));
    }

    #[test]
    fn dose_input_range_rejects_inverted_bounds() {
        let d = DoseInput::Range {
            min_value: 2.0,
            max_value: 1.0,
            unit: "tablet".to_string(),
        };
        assert!(d.validate().is_err());
    }
}
