//! ComplexPRNBuilder aspect: dose ranges with an interval range and a
//! maximum per-period dose, e.g. "1-2 tablets every 4-6 hours as needed".

use fhir_types::{CodeableConcept, DoseAndRate, Quantity, Range};

use super::{trim_trailing_zero, DosageBuilder};
use crate::error::EngineError;
use crate::medication::{DoseInput, MedicationRequestContext};
use crate::value_objects::DoseValue;

pub(crate) fn build_dose(b: &mut DosageBuilder, ctx: &MedicationRequestContext) -> Result<(), EngineError> {
    ctx.dose.validate()?;
    let (min_value, max_value, unit) = match &ctx.dose {
        DoseInput::Range { min_value, max_value, unit } => (*min_value, *max_value, unit.clone()),
        DoseInput::Single { .. } => {
            return Err(EngineError::InvalidDoseInput {
                reason: "ComplexPRNBuilder requires a dose range".to_string(),
            })
        }
    };

    let low = DoseValue::parse(min_value, &unit)?;
    let high = DoseValue::parse(max_value, &unit)?;
    b.dose_and_rate = Some(DoseAndRate::range(Range {
        low: Quantity::new(low.value(), low.unit_str()),
        high: Quantity::new(high.value(), high.unit_str()),
    }));
    b.dose_phrase = format!(
        "{}-{} {}",
        trim_trailing_zero(low.value()),
        trim_trailing_zero(high.value()),
        if high.value() > 1.0 + 1e-9 { format!("{}s", unit) } else { unit.clone() }
    );

    if let Some(max_dose) = &ctx.max_dose_per_period {
        let per_day = max_dose.value();
        let unit_label = max_dose.numerator.unit.clone().unwrap_or_else(|| unit.clone());
        b.additional_instructions.push(CodeableConcept::text_only(format!(
            "Do not exceed {} {} in 24 hours",
            trim_trailing_zero(per_day),
            unit_label
        )));
    }

    if let Some(range) = &ctx.frequency_range {
        let min_hours = range.min_interval * range.interval_unit.days_factor() * 24.0;
        let max_hours = range.max_interval * range.interval_unit.days_factor() * 24.0;
        b.additional_instructions.push(CodeableConcept::text_only(format!(
            "Wait at least {} hours between doses",
            trim_trailing_zero(min_hours)
        )));
        if (max_hours - min_hours).abs() > 1e-9 {
            b.additional_instructions.push(CodeableConcept::text_only(format!(
                "May space doses up to {} hours apart",
                trim_trailing_zero(max_hours)
            )));
        }
    }

    b.audit(format!("buildDose -> {}", b.dose_phrase));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{BuilderKind, DosageBuilder};
    use crate::medication::{
        DoseForm, FrequencyInput, FrequencyRange, Ingredient, MedicationClassification, MedicationProfile,
        PatientContext, Scoring,
    };
    use fhir_types::{DurationUnit, Quantity as Q, Ratio};
    use pretty_assertions::assert_eq;

    fn ibuprofen() -> MedicationProfile {
        MedicationProfile {
            id: "ibuprofen-200".to_string(),
            display_name: "Ibuprofen 200 mg tablet".to_string(),
            classification: MedicationClassification::Medication,
            dose_form: DoseForm::Tablet,
            ingredients: vec![Ingredient {
                name: "Ibuprofen".to_string(),
                strength_ratio: Ratio::new(Q::new(200.0, "mg"), Q::new(1.0, "tablet")),
            }],
            scoring: Some(Scoring::None),
            dispenser: None,
            dosage_constraints: None,
            package: None,
            eligible_genders: Vec::new(),
            route_whitelist: Vec::new(),
        }
    }

    fn ctx() -> MedicationRequestContext {
        MedicationRequestContext {
            request_id: "req-1".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            medication: ibuprofen(),
            patient: PatientContext::default(),
            dose: DoseInput::Range { min_value: 1.0, max_value: 2.0, unit: "tablet".to_string() },
            frequency: FrequencyInput::Text("as needed".to_string()),
            route: "Orally".to_string(),
            duration: None,
            dispense_quantity: None,
            refills: None,
            special_instructions: None,
            as_needed: true,
            max_dose_per_period: Some(Ratio::new(Q::new(6.0, "tablet"), Q::new(1.0, "d"))),
            frequency_range: Some(FrequencyRange {
                min_interval: 4.0,
                max_interval: 6.0,
                interval_unit: DurationUnit::Hour,
            }),
            titration_phase_doses: None,
        }
    }

    #[test]
    fn dose_range_renders_low_to_high_phrase() {
        let mut b = DosageBuilder::new(BuilderKind::ComplexPrn, ibuprofen());
        build_dose(&mut b, &ctx()).unwrap();
        assert_eq!(b.dose_phrase, "1-2 tablets");
    }

    #[test]
    fn instructions_include_max_and_wait_time() {
        let mut b = DosageBuilder::new(BuilderKind::ComplexPrn, ibuprofen());
        build_dose(&mut b, &ctx()).unwrap();
        let texts: Vec<_> = b.additional_instructions.iter().filter_map(|i| i.text.clone()).collect();
        assert!(texts.contains(&"Do not exceed 6 tablet in 24 hours".to_string()));
        assert!(texts.contains(&"Wait at least 4 hours between doses".to_string()));
        assert!(texts.contains(&"May space doses up to 6 hours apart".to_string()));
    }

    #[test]
    fn end_to_end_scenario_matches_expected_text() {
        use crate::builders::build_signature;
        let result = build_signature(&ctx()).unwrap();
        assert_eq!(result[0].text, "Take 1-2 tablets by mouth every 4-6 hours as needed.");
        assert!(result[0].uses_dose_range());
        assert_eq!(result[0].max_dose_per_period.as_ref().unwrap().value(), 6.0);
    }
}
