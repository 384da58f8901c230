//! TitrationDaysSupplyStrategy: phases accumulate
//! consumption until the package runs out or the maintenance phase takes
//! over, at which point the remaining quantity is divided at the
//! maintenance rate.

use crate::error::EngineError;
use crate::temporal::TemporalParser;

use super::{DaysSupplyContext, DaysSupplyResult, PhaseBreakdown};

fn phase_dose(ctx: &DaysSupplyContext, index: usize) -> f64 {
    ctx.titration_phase_doses
        .as_ref()
        .and_then(|doses| doses.get(index).copied())
        .unwrap_or(ctx.dose_amount)
}

pub(crate) fn calculate(ctx: &DaysSupplyContext) -> Result<DaysSupplyResult, EngineError> {
    let parsed = TemporalParser::parse(&ctx.timing);
    let phases = match &parsed.phases {
        Some(phases) if !phases.is_empty() => phases,
        _ => {
            return Ok(DaysSupplyResult::empty(
                "TitrationDaysSupplyStrategy",
                0.5,
                "timing did not parse into any titration phases",
            ))
        }
    };

    let confidence = if parsed.warnings.is_empty() { 0.9 } else { 0.7 };
    let mut warnings = parsed.warnings.clone();
    let mut breakdown = Vec::new();
    let mut remaining = ctx.package_quantity;
    let mut total_days = 0.0_f64;

    for (index, phase) in phases.iter().enumerate() {
        let duration_days = phase.duration.as_days();

        if phase.is_maintenance_phase {
            let maintenance_dose = phase_dose(ctx, index);
            let consumption_per_day = TemporalParser::doses_per_period(&phase.timing, 1.0) * maintenance_dose;
            let additional_days = if consumption_per_day > 0.0 {
                (remaining / consumption_per_day).floor().max(0.0)
            } else {
                0.0
            };
            breakdown.push(PhaseBreakdown {
                description: phase.description.clone(),
                doses_in_phase: TemporalParser::doses_per_period(&phase.timing, additional_days),
                total_consumption: consumption_per_day * additional_days,
                phase_duration_days: additional_days,
            });
            total_days += additional_days;
            continue;
        }

        let duration_days = duration_days.unwrap_or(0.0);
        let dose = phase_dose(ctx, index);
        let doses_in_phase = TemporalParser::doses_per_period(&phase.timing, duration_days);
        let total_consumption = doses_in_phase * dose;

        if total_consumption <= remaining {
            remaining -= total_consumption;
            total_days += duration_days;
            breakdown.push(PhaseBreakdown {
                description: phase.description.clone(),
                doses_in_phase,
                total_consumption,
                phase_duration_days: duration_days,
            });
        } else {
            let consumption_per_day = TemporalParser::doses_per_period(&phase.timing, 1.0) * dose;
            let days_that_fit = if consumption_per_day > 0.0 {
                (remaining / consumption_per_day).floor().max(0.0)
            } else {
                0.0
            };
            let consumption_used = consumption_per_day * days_that_fit;
            warnings.push(format!(
                "package exhausted during phase '{}'; only {} of {} days in this phase are covered",
                phase.description, days_that_fit, duration_days
            ));
            breakdown.push(PhaseBreakdown {
                description: phase.description.clone(),
                doses_in_phase: TemporalParser::doses_per_period(&phase.timing, days_that_fit),
                total_consumption: consumption_used,
                phase_duration_days: days_that_fit,
            });
            total_days += days_that_fit;
            return Ok(DaysSupplyResult {
                days_supply: total_days.floor().max(0.0) as u32,
                calculation_method: "TitrationDaysSupplyStrategy",
                breakdown,
                confidence: confidence.min(0.7),
                warnings,
            });
        }
    }

    Ok(DaysSupplyResult {
        days_supply: total_days.floor().max(0.0) as u32,
        calculation_method: "TitrationDaysSupplyStrategy",
        breakdown,
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

    fn glp1_pen() -> MedicationProfile {
        MedicationProfile {
            id: "semaglutide-pen".to_string(),
            display_name: "Semaglutide injection pen".to_string(),
            classification: MedicationClassification::Medication,
            dose_form: DoseForm::Injection,
            ingredients: vec![Ingredient {
                name: "Semaglutide".to_string(),
                strength_ratio: Ratio::new(Quantity::new(1.0, "unit"), Quantity::new(1.0, "unit")),
            }],
            scoring: None,
            dispenser: None,
            dosage_constraints: None,
            package: None,
            eligible_genders: Vec::new(),
            route_whitelist: Vec::new(),
        }
    }

    fn titration_ctx(package_quantity: f64) -> DaysSupplyContext {
        DaysSupplyContext {
            package_quantity,
            package_unit: "unit".to_string(),
            dose_amount: 12.5,
            dose_unit: "unit".to_string(),
            timing: FrequencyInput::Sequence(vec![
                FrequencyInput::Text("Week 1-4: once weekly".to_string()),
                FrequencyInput::Text("Week 5-8: once weekly".to_string()),
                FrequencyInput::Text("Week 9+: once weekly".to_string()),
            ]),
            medication: glp1_pen(),
            titration_phase_doses: Some(vec![12.5, 25.0, 50.0]),
        }
    }

    #[test]
    fn full_glp1_titration_schedule_yields_one_hundred_seventy_five_days() {
        let result = calculate(&titration_ctx(1000.0)).unwrap();
        assert_eq!(result.days_supply, 175);
        assert_eq!(result.breakdown.len(), 3);
        assert_eq!(result.breakdown[0].total_consumption, 50.0);
        assert_eq!(result.breakdown[1].total_consumption, 100.0);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn package_exhausted_mid_titration_stops_early_with_warning() {
        let result = calculate(&titration_ctx(60.0)).unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("exhausted")));
        assert!(result.days_supply < 56);
    }
}
