//! TabletDaysSupplyStrategy: solid orals, whole or scoring-permitted
//! fractional doses.

use crate::builders::trim_trailing_zero;
use crate::error::EngineError;
use crate::units::UnitConverter;
use crate::value_objects::DoseValue;

use super::{doses_per_day, DaysSupplyContext, DaysSupplyResult};

fn normalize_unit(unit: &str) -> &str {
    unit.trim_end_matches('s')
}

pub(crate) fn calculate(ctx: &DaysSupplyContext) -> Result<DaysSupplyResult, EngineError> {
    let mut warnings = Vec::new();

    let dose_unit = normalize_unit(&ctx.dose_unit);
    let package_unit = normalize_unit(&ctx.package_unit);

    let (effective_dose, mut confidence) = if dose_unit.eq_ignore_ascii_case(package_unit) {
        (ctx.dose_amount, 0.9)
    } else {
        let dose_value = DoseValue::parse(ctx.dose_amount, dose_unit)?;
        let converted = UnitConverter::convert(dose_value, package_unit, &ctx.medication)?;
        warnings.push(format!(
            "dose unit '{}' differs from package unit '{}'; converted {} to {} via strength ratio",
            ctx.dose_unit,
            ctx.package_unit,
            trim_trailing_zero(ctx.dose_amount),
            trim_trailing_zero(converted.value())
        ));
        (converted.value(), 0.7)
    };

    let (dpd, timing_confidence) = doses_per_day(&ctx.timing);
    if timing_confidence < 0.9 {
        confidence = confidence.min(0.7);
    }

    let consumption_per_day = effective_dose * dpd;
    if consumption_per_day <= 0.0 {
        return Ok(DaysSupplyResult::empty(
            "TabletDaysSupplyStrategy",
            0.5,
            "computed consumption per day is zero; cannot derive a days-supply",
        ));
    }

    if let Some(scoring) = ctx.medication.scoring {
        if effective_dose.fract().abs() > 1e-9 && !scoring.allows(effective_dose) {
            warnings.push(format!(
                "dose {} {} is not an allowed fraction under {:?} scoring",
                trim_trailing_zero(effective_dose),
                package_unit,
                scoring
            ));
            confidence = confidence.min(0.7);
        }
    }

    let days_supply = (ctx.package_quantity / consumption_per_day).floor().max(0.0) as u32;

    Ok(DaysSupplyResult {
        days_supply,
        calculation_method: "TabletDaysSupplyStrategy",
        breakdown: Vec::new(),
        confidence,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medication::{DoseForm, FrequencyInput, Ingredient, MedicationClassification, MedicationProfile};
    use fhir_types::{Quantity, Ratio};
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
            scoring: Some(crate::medication::Scoring::None),
            dispenser: None,
            dosage_constraints: None,
            package: None,
            eligible_genders: Vec::new(),
            route_whitelist: Vec::new(),
        }
    }

    #[test]
    fn thirty_tablets_twice_daily_lasts_fifteen_days() {
        let ctx = DaysSupplyContext {
            package_quantity: 30.0,
            package_unit: "tablets".to_string(),
            dose_amount: 1.0,
            dose_unit: "tablet".to_string(),
            timing: FrequencyInput::Text("twice daily".to_string()),
            medication: metformin(),
            titration_phase_doses: None,
        };
        let result = calculate(&ctx).unwrap();
        assert_eq!(result.days_supply, 15);
        assert_eq!(result.confidence, 0.9);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn fractional_scored_half_tablet_once_daily_lasts_sixty_days() {
        let mut med = metformin();
        med.scoring = Some(crate::medication::Scoring::Half);
        let ctx = DaysSupplyContext {
            package_quantity: 30.0,
            package_unit: "tablet".to_string(),
            dose_amount: 0.5,
            dose_unit: "tablet".to_string(),
            timing: FrequencyInput::Text("once daily".to_string()),
            medication: med,
            titration_phase_doses: None,
        };
        let result = calculate(&ctx).unwrap();
        assert_eq!(result.days_supply, 60);
    }

    #[test]
    fn mg_dose_converts_to_package_tablet_unit_with_lower_confidence() {
        let ctx = DaysSupplyContext {
            package_quantity: 30.0,
            package_unit: "tablet".to_string(),
            dose_amount: 500.0,
            dose_unit: "mg".to_string(),
            timing: FrequencyInput::Text("once daily".to_string()),
            medication: metformin(),
            titration_phase_doses: None,
        };
        let result = calculate(&ctx).unwrap();
        assert_eq!(result.days_supply, 30);
        assert_eq!(result.confidence, 0.7);
        assert!(!result.warnings.is_empty());
    }
}
