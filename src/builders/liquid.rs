//! SimpleLiquidBuilder aspect: solutions, suspensions, syrups, injections.
//! Also the shared base the Topiclick, nasal-spray, and multi-ingredient
//! aspects build on top of.

use fhir_types::{CodeableConcept, DoseAndRate, Quantity};

use super::{format_dose_value_phrase, DosageBuilder};
use crate::error::EngineError;
use crate::medication::{DoseForm, DoseInput, MedicationRequestContext};
use crate::units::UnitConverter;
use crate::value_objects::DoseValue;

pub(crate) fn build_dose(b: &mut DosageBuilder, ctx: &MedicationRequestContext) -> Result<(), EngineError> {
    ctx.dose.validate()?;
    match &ctx.dose {
        DoseInput::Single { .. } => {}
        DoseInput::Range { .. } => {
            return Err(EngineError::InvalidDoseInput {
                reason: "SimpleLiquidBuilder does not accept a dose range; use ComplexPRNBuilder".to_string(),
            })
        }
    }

    let dose_value = ctx.dose.as_dose_value()?;
    b.dose_and_rate = Some(DoseAndRate::quantity(Quantity::new(dose_value.value(), dose_value.unit_str())));
    b.dose_phrase = dual_dose_phrase(b, dose_value);

    if b.medication.dose_form == DoseForm::Suspension {
        b.additional_instructions.push(CodeableConcept::text_only("Shake well before use"));
    }

    b.audit(format!("buildDose -> {}", b.dose_phrase));
    Ok(())
}

/// "250 mg, as 5 mL" — when the request is expressed in weight units and
/// the medication carries a concentration ratio, append the equivalent
/// volume. Conversion failure is non-fatal here: the phrase just omits the
/// augmentation.
pub(crate) fn dual_dose_phrase(b: &DosageBuilder, dose_value: DoseValue) -> String {
    let primary = format_dose_value_phrase(dose_value);
    if let DoseValue::Mass(_) = dose_value {
        if let Ok(converted) = UnitConverter::convert(dose_value, "mL", &b.medication) {
            return format!("{primary}, as {}", format_dose_value_phrase(converted));
        }
    }
    primary
}
