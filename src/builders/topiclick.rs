//! TopiclickBuilder aspect: extends the liquid builder for medications
//! dispensed through a Topiclick device — doses are requested in clicks,
//! bridged to mL (4:1) and then to mg via the ingredient's strength
//! ratio.

use fhir_types::{CodeableConcept, DoseAndRate, Quantity};

use super::{trim_trailing_zero, DosageBuilder};
use crate::error::EngineError;
use crate::medication::{DoseInput, MedicationRequestContext};
use crate::units::UnitConverter;
use crate::value_objects::DoseValue;

pub(crate) fn build_dose(b: &mut DosageBuilder, ctx: &MedicationRequestContext) -> Result<(), EngineError> {
    ctx.dose.validate()?;
    let value = match &ctx.dose {
        DoseInput::Single { value, .. } => *value,
        DoseInput::Range { .. } => {
            return Err(EngineError::InvalidDoseInput {
                reason: "TopiclickBuilder does not accept a dose range".to_string(),
            })
        }
    };
    let dose_value = DoseValue::parse(value, ctx.dose.unit())?;

    let volume = UnitConverter::convert(dose_value, "mL", &b.medication)?;
    let mass = UnitConverter::convert(volume, "mg", &b.medication)?;

    b.dose_and_rate = Some(DoseAndRate::quantity(Quantity::new(dose_value.value(), dose_value.unit_str())));
    b.dose_phrase = format!("{} clicks ({:.1} mg)", trim_trailing_zero(dose_value.value()), mass.value());

    for instruction in [
        "Prime device with 4 clicks before first use",
        "Each click dispenses 0.25 mL",
        "Rotate base until you hear the required number of clicks",
    ] {
        b.additional_instructions.push(CodeableConcept::text_only(instruction));
    }

    b.audit(format!("buildDose -> {}", b.dose_phrase));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::BuilderKind;
    use crate::medication::{
        DispenserMetadata, DispenserType, FrequencyInput, Ingredient, MedicationClassification, MedicationProfile,
        PatientContext, Scoring,
    };
    use fhir_types::{Quantity as Q, Ratio};
    use pretty_assertions::assert_eq;

    fn progesterone_cream() -> MedicationProfile {
        MedicationProfile {
            id: "progesterone-cream".to_string(),
            display_name: "Progesterone 10 mg/mL cream".to_string(),
            classification: MedicationClassification::Compound,
            dose_form: crate::medication::DoseForm::Cream,
            ingredients: vec![Ingredient {
                name: "Progesterone".to_string(),
                strength_ratio: Ratio::new(Q::new(10.0, "mg"), Q::new(1.0, "mL")),
            }],
            scoring: Some(Scoring::None),
            dispenser: Some(DispenserMetadata {
                dispenser_type: DispenserType::Topiclick,
                conversion_ratio: 4.0,
                unit: "click".to_string(),
            }),
            dosage_constraints: None,
            package: None,
            eligible_genders: Vec::new(),
            route_whitelist: Vec::new(),
        }
    }

    #[test]
    fn four_clicks_render_as_ten_milligrams() {
        let med = progesterone_cream();
        let mut b = DosageBuilder::new(BuilderKind::Topiclick, med.clone());
        let ctx = MedicationRequestContext {
            request_id: "req-1".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            medication: med,
            patient: PatientContext::default(),
            dose: DoseInput::Single { value: 4.0, unit: "click".to_string() },
            frequency: FrequencyInput::Text("twice daily".to_string()),
            route: "Topically".to_string(),
            duration: None,
            dispense_quantity: None,
            refills: None,
            special_instructions: None,
            as_needed: false,
            max_dose_per_period: None,
            frequency_range: None,
            titration_phase_doses: None,
        };
        build_dose(&mut b, &ctx).unwrap();
        assert_eq!(b.dose_phrase, "4 clicks (10.0 mg)");
    }
}
