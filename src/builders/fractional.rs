//! FractionalTabletBuilder aspect: extends the tablet builder by rounding
//! to the nearest quarter tablet and emitting splitting guidance.

use fhir_types::{CodeableConcept, DoseAndRate, Quantity};

use super::tablet::validate_scoring;
use super::{format_dose_value_phrase, DosageBuilder};
use crate::error::EngineError;
use crate::medication::{DoseInput, MedicationRequestContext, Scoring};
use crate::value_objects::DoseValue;

fn round_to_quarter(value: f64) -> f64 {
    (value * 4.0).round() / 4.0
}

pub(crate) fn build_dose(b: &mut DosageBuilder, ctx: &MedicationRequestContext) -> Result<(), EngineError> {
    ctx.dose.validate()?;
    let value = match &ctx.dose {
        DoseInput::Single { value, .. } => *value,
        DoseInput::Range { .. } => {
            return Err(EngineError::InvalidDoseInput {
                reason: "FractionalTabletBuilder does not accept a dose range".to_string(),
            })
        }
    };

    let rounded = round_to_quarter(value);
    if (rounded - value).abs() > 1e-6 {
        b.warnings.push(format!("rounded dose {value} to nearest quarter tablet ({rounded})"));
    }
    validate_scoring(rounded, ctx.dose.unit(), b.medication.scoring)?;

    let dose_value = DoseValue::parse(rounded, ctx.dose.unit())?;
    b.dose_and_rate = Some(DoseAndRate::quantity(Quantity::new(dose_value.value(), dose_value.unit_str())));
    b.dose_phrase = format_dose_value_phrase(dose_value);

    if rounded.fract().abs() > 1e-9 {
        let guidance = match b.medication.scoring {
            Some(Scoring::Quarter) => "Split tablet into quarters",
            _ => "Split tablet in half",
        };
        b.additional_instructions.push(CodeableConcept::text_only(guidance));
    }

    b.audit(format!("buildDose -> {}", b.dose_phrase));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rounds_to_nearest_quarter() {
        assert_eq!(round_to_quarter(0.6), 0.5);
        assert_eq!(round_to_quarter(0.6 + 0.05), 0.75);
        assert_eq!(round_to_quarter(1.0), 1.0);
    }
}
