//! SimpleTabletBuilder aspect: tablets, capsules, ODT, troches with whole
//! or scoring-permitted fractional doses.

use fhir_types::{DoseAndRate, Quantity};

use super::{format_dose_value_phrase, DosageBuilder};
use crate::error::EngineError;
use crate::medication::{DoseInput, MedicationRequestContext, Scoring};

/// Rejects a fractional dose the medication's scoring doesn't permit.
/// Whole-number doses always pass, regardless of scoring.
pub(crate) fn validate_scoring(value: f64, unit: &str, scoring: Option<Scoring>) -> Result<(), EngineError> {
    if value.fract().abs() < 1e-9 {
        return Ok(());
    }
    let scoring = scoring.unwrap_or(Scoring::None);
    if !scoring.allows(value) {
        return Err(EngineError::ScoringViolation {
            dose: value,
            unit: unit.to_string(),
            scoring: format!("{scoring:?}"),
        });
    }
    Ok(())
}

pub(crate) fn build_dose(b: &mut DosageBuilder, ctx: &MedicationRequestContext) -> Result<(), EngineError> {
    ctx.dose.validate()?;
    let value = match &ctx.dose {
        DoseInput::Single { value, .. } => *value,
        DoseInput::Range { .. } => {
            return Err(EngineError::InvalidDoseInput {
                reason: "SimpleTabletBuilder does not accept a dose range; use ComplexPRNBuilder".to_string(),
            })
        }
    };
    validate_scoring(value, ctx.dose.unit(), b.medication.scoring)?;

    let dose_value = ctx.dose.as_dose_value()?;
    b.dose_and_rate = Some(DoseAndRate::quantity(Quantity::new(dose_value.value(), dose_value.unit_str())));
    b.dose_phrase = format_dose_value_phrase(dose_value);
    b.audit(format!("buildDose -> {}", b.dose_phrase));
    Ok(())
}
