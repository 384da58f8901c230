//! MultiIngredientBuilder aspect: compounds with two or more active
//! ingredients. Renders the overall dose volume/mass alongside each
//! ingredient's pro-rated amount, e.g. "1 mL (Testosterone: 50 mg,
//! Anastrozole: 0.5 mg)".

use fhir_types::{CodeableConcept, DoseAndRate, Quantity};

use super::{format_dose_value_phrase, trim_trailing_zero};
use super::DosageBuilder;
use crate::error::EngineError;
use crate::medication::{DoseInput, MedicationRequestContext};
use crate::units::UnitConverter;
use crate::value_objects::DoseValue;

pub(crate) fn build_dose(b: &mut DosageBuilder, ctx: &MedicationRequestContext) -> Result<(), EngineError> {
    ctx.dose.validate()?;
    match &ctx.dose {
        DoseInput::Single { .. } => {}
        DoseInput::Range { .. } => {
            return Err(EngineError::InvalidDoseInput {
                reason: "MultiIngredientBuilder does not accept a dose range".to_string(),
            })
        }
    }

    let dose_value = ctx.dose.as_dose_value()?;
    b.dose_and_rate = Some(DoseAndRate::quantity(Quantity::new(dose_value.value(), dose_value.unit_str())));

    let mut per_ingredient = Vec::new();
    for ingredient in &b.medication.ingredients {
        let ratio = ingredient.strength_ratio.clone();
        let numerator_unit = ratio.numerator.unit.as_deref().unwrap_or("mg");
        match UnitConverter::convert(dose_value, numerator_unit, &one_ingredient_medication(b, ingredient)) {
            Ok(amount) => per_ingredient.push(format!(
                "{}: {} {}",
                ingredient.name,
                trim_trailing_zero(amount.value()),
                amount.unit_str()
            )),
            Err(_) => per_ingredient.push(format!("{}: unresolved amount", ingredient.name)),
        }
    }

    b.dose_phrase = format!("{} ({})", format_dose_value_phrase(dose_value), per_ingredient.join(", "));
    b.audit(format!("buildDose -> {}", b.dose_phrase));
    Ok(())
}

/// `UnitConverter::convert` bridges through the medication's primary
/// ingredient only; pro-rating a non-primary ingredient means temporarily
/// treating it as primary for the single conversion call.
fn one_ingredient_medication(
    b: &DosageBuilder,
    ingredient: &crate::medication::Ingredient,
) -> crate::medication::MedicationProfile {
    let mut med = b.medication.clone();
    med.ingredients = vec![ingredient.clone()];
    med
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::BuilderKind;
    use crate::medication::{
        DoseForm, FrequencyInput, Ingredient, MedicationClassification, MedicationProfile, PatientContext, Scoring,
    };
    use fhir_types::{Quantity as Q, Ratio};
    use pretty_assertions::assert_eq;

    fn trt_compound() -> MedicationProfile {
        MedicationProfile {
            id: "trt-compound".to_string(),
            display_name: "Testosterone/Anastrozole compound".to_string(),
            classification: MedicationClassification::Compound,
            dose_form: DoseForm::Injection,
            ingredients: vec![
                Ingredient {
                    name: "Testosterone".to_string(),
                    strength_ratio: Ratio::new(Q::new(50.0, "mg"), Q::new(1.0, "mL")),
                },
                Ingredient {
                    name: "Anastrozole".to_string(),
                    strength_ratio: Ratio::new(Q::new(0.5, "mg"), Q::new(1.0, "mL")),
                },
            ],
            scoring: Some(Scoring::None),
            dispenser: None,
            dosage_constraints: None,
            package: None,
            eligible_genders: Vec::new(),
            route_whitelist: Vec::new(),
        }
    }

    #[test]
    fn renders_per_ingredient_breakdown() {
        let med = trt_compound();
        let mut b = DosageBuilder::new(BuilderKind::MultiIngredient, med.clone());
        let ctx = MedicationRequestContext {
            request_id: "req-1".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            medication: med,
            patient: PatientContext::default(),
            dose: DoseInput::Single { value: 1.0, unit: "mL".to_string() },
            frequency: FrequencyInput::Text("once weekly".to_string()),
            route: "Intramuscular".to_string(),
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
        assert_eq!(b.dose_phrase, "1 mL (Testosterone: 50 mg, Anastrozole: 0.5 mg)");
    }
}
