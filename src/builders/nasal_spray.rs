//! NasalSprayBuilder aspect: doses expressed in sprays, validated against
//! the medication's per-day maximum and rendered "N sprays per nostril".

use fhir_types::{DoseAndRate, Quantity};

use super::{trim_trailing_zero, DosageBuilder};
use crate::error::EngineError;
use crate::medication::{DoseInput, MedicationRequestContext};
use crate::temporal::TemporalParser;
use crate::value_objects::DoseValue;

pub(crate) fn build_dose(b: &mut DosageBuilder, ctx: &MedicationRequestContext) -> Result<(), EngineError> {
    ctx.dose.validate()?;
    let value = match &ctx.dose {
        DoseInput::Single { value, .. } => *value,
        DoseInput::Range { .. } => {
            return Err(EngineError::InvalidDoseInput {
                reason: "NasalSprayBuilder does not accept a dose range".to_string(),
            })
        }
    };
    let dose_value = DoseValue::parse(value, ctx.dose.unit())?;

    if let Some(constraints) = &b.medication.dosage_constraints {
        if let Some(max_per_period) = constraints.max_per_period {
            let result = TemporalParser::parse(&ctx.frequency);
            let doses_per_day = result.single_timing().repeat.doses_per_day();
            let sprays_per_day = value * doses_per_day;
            let max_per_day = max_per_period.value();
            if sprays_per_day > max_per_day + 1e-9 {
                return Err(EngineError::InvalidDoseInput {
                    reason: format!(
                        "{sprays_per_day} sprays/day exceeds the maximum of {max_per_day} for '{}'",
                        b.medication.id
                    ),
                });
            }
        }
    }

    b.dose_and_rate = Some(DoseAndRate::quantity(Quantity::new(dose_value.value(), dose_value.unit_str())));
    b.dose_phrase = format!("{} sprays per nostril", trim_trailing_zero(dose_value.value()));
    b.audit(format!("buildDose -> {}", b.dose_phrase));
    Ok(())
}
