//! LiquidDaysSupplyStrategy: solutions, suspensions, and Topiclick-
//! dispensed creams/gels. Shares the tablet strategy's overall
//! shape; the bridge to the package unit may cross a mass/volume/count
//! dimension instead of staying within one.

use crate::builders::trim_trailing_zero;
use crate::error::EngineError;
use crate::units::UnitConverter;
use crate::value_objects::DoseValue;

use super::{doses_per_day, DaysSupplyContext, DaysSupplyResult};

const SMALL_VOLUME_THRESHOLD_ML: f64 = 0.1;

pub(crate) fn calculate(ctx: &DaysSupplyContext) -> Result<DaysSupplyResult, EngineError> {
    let mut warnings = Vec::new();

    let (effective_dose, mut confidence) = if ctx.dose_unit.eq_ignore_ascii_case(&ctx.package_unit) {
        (ctx.dose_amount, 0.9)
    } else {
        let dose_value = DoseValue::parse(ctx.dose_amount, &ctx.dose_unit)?;
        let converted = UnitConverter::convert(dose_value, &ctx.package_unit, &ctx.medication)?;
        warnings.push(format!(
            "dose unit '{}' differs from package unit '{}'; converted {} to {} via strength ratio",
            ctx.dose_unit,
            ctx.package_unit,
            trim_trailing_zero(ctx.dose_amount),
            trim_trailing_zero(converted.value())
        ));
        (converted.value(), 0.7)
    };

    if ctx.package_unit.eq_ignore_ascii_case("mL") && effective_dose > 0.0 && effective_dose < SMALL_VOLUME_THRESHOLD_ML {
        warnings.push(format!(
            "effective dose {} mL is below the {} mL precision threshold",
            trim_trailing_zero(effective_dose),
            SMALL_VOLUME_THRESHOLD_ML
        ));
        confidence = confidence.min(0.7);
    }

    let (dpd, timing_confidence) = doses_per_day(&ctx.timing);
    if timing_confidence < 0.9 {
        confidence = confidence.min(0.7);
    }

    let consumption_per_day = effective_dose * dpd;
    if consumption_per_day <= 0.0 {
        return Ok(DaysSupplyResult::empty(
            "LiquidDaysSupplyStrategy",
            0.5,
            "computed consumption per day is zero; cannot derive a days-supply",
        ));
    }

    let days_supply = (ctx.package_quantity / consumption_per_day).floor().max(0.0) as u32;

    Ok(DaysSupplyResult {
        days_supply,
        calculation_method: "LiquidDaysSupplyStrategy",
        breakdown: Vec::new(),
        confidence,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medication::{
        DispenserMetadata, DispenserType, DoseForm, FrequencyInput, Ingredient, MedicationClassification,
        MedicationProfile,
    };
    use fhir_types::{Quantity, Ratio};
    use pretty_assertions::assert_eq;

    fn amoxicillin_suspension() -> MedicationProfile {
        MedicationProfile {
            id: "amoxicillin-susp".to_string(),
            display_name: "Amoxicillin 250 mg/5 mL suspension".to_string(),
            classification: MedicationClassification::Medication,
            dose_form: DoseForm::Suspension,
            ingredients: vec![Ingredient {
                name: "Amoxicillin".to_string(),
                strength_ratio: Ratio::new(Quantity::new(250.0, "mg"), Quantity::new(5.0, "mL")),
            }],
            scoring: None,
            dispenser: None,
            dosage_constraints: None,
            package: None,
            eligible_genders: Vec::new(),
            route_whitelist: Vec::new(),
        }
    }

    fn topiclick_cream() -> MedicationProfile {
        MedicationProfile {
            id: "progesterone-cream".to_string(),
            display_name: "Progesterone 10% cream".to_string(),
            classification: MedicationClassification::Compound,
            dose_form: DoseForm::Cream,
            ingredients: vec![Ingredient {
                name: "Progesterone".to_string(),
                strength_ratio: Ratio::new(Quantity::new(50.0, "mg"), Quantity::new(1.0, "mL")),
            }],
            scoring: None,
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
    fn direct_volume_dose_divides_evenly() {
        let ctx = DaysSupplyContext {
            package_quantity: 150.0,
            package_unit: "mL".to_string(),
            dose_amount: 5.0,
            dose_unit: "mL".to_string(),
            timing: FrequencyInput::Text("three times daily".to_string()),
            medication: amoxicillin_suspension(),
            titration_phase_doses: None,
        };
        let result = calculate(&ctx).unwrap();
        assert_eq!(result.days_supply, 10);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn topiclick_click_dose_bridges_to_mL_package() {
        let ctx = DaysSupplyContext {
            package_quantity: 30.0,
            package_unit: "mL".to_string(),
            dose_amount: 2.0,
            dose_unit: "click".to_string(),
            timing: FrequencyInput::Text("twice daily".to_string()),
            medication: topiclick_cream(),
            titration_phase_doses: None,
        };
        let result = calculate(&ctx).unwrap();
        assert_eq!(result.confidence, 0.7);
        assert!(!result.warnings.is_empty());
        assert_eq!(result.days_supply, 30);
    }
}
