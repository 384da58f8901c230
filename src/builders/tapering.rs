//! TaperingDoseBuilder: a titration/tapering frequency sequence produces
//! an ordered `Vec<Dosage>`, each linked to the one before it via
//! `relationship`, rather than the single `Dosage` every other builder
//! kind produces.

use fhir_types::{CodeableConcept, Dosage, DoseAndRate, Quantity, Relationship};

use super::{default_verb, format_dose_value_phrase};
use crate::error::EngineError;
use crate::medication::{FrequencyInput, MedicationRequestContext};
use crate::route::RouteValidator;
use crate::temporal::TemporalParser;
use crate::value_objects::DoseValue;

pub fn build(ctx: &MedicationRequestContext) -> Result<Vec<Dosage>, EngineError> {
    let phase_count = match &ctx.frequency {
        FrequencyInput::Sequence(items) => items.len(),
        _ => {
            return Err(EngineError::InvalidTitrationSchedule {
                reason: "tapering requires a frequency sequence of two or more phases".to_string(),
            })
        }
    };

    let doses = match &ctx.titration_phase_doses {
        Some(doses) if doses.len() == phase_count => doses.clone(),
        Some(doses) => {
            return Err(EngineError::InvalidTitrationSchedule {
                reason: format!(
                    "{} titration phase doses given for {phase_count} frequency phases",
                    doses.len()
                ),
            })
        }
        None => {
            let value = ctx.dose.as_dose_value()?.value();
            vec![value; phase_count]
        }
    };

    let result = TemporalParser::parse(&ctx.frequency);
    if !result.is_titration {
        return Err(EngineError::InvalidTitrationSchedule {
            reason: "frequency sequence was not recognised as a titration schedule".to_string(),
        });
    }
    let phases = result.phases.ok_or_else(|| EngineError::InvalidTitrationSchedule {
        reason: "titration parse produced no phases".to_string(),
    })?;

    let validation = RouteValidator::validate(&ctx.route, Some(ctx.medication.dose_form));
    if !validation.is_valid {
        return Err(EngineError::InvalidRouteForDoseForm {
            route: ctx.route.clone(),
            dose_form: ctx.medication.dose_form.to_string(),
        });
    }
    let canonical = validation.canonical.expect("valid routes always resolve a canonical entry");
    let route_phrase = if canonical.id == "oral" {
        "by mouth".to_string()
    } else {
        canonical.display_text.to_lowercase()
    };
    let route = CodeableConcept::coded(canonical.coding());
    let verb = default_verb(ctx.medication.dose_form);

    let unit = ctx.dose.unit();
    let direction = detect_direction(&doses);

    let mut dosages = Vec::with_capacity(phases.len());
    for (index, phase) in phases.iter().enumerate() {
        let dose_value = DoseValue::parse(doses[index], unit)?;
        let dose_and_rate = DoseAndRate::quantity(Quantity::new(dose_value.value(), dose_value.unit_str()));

        let mut text = format!(
            "{verb} {} {route_phrase} {}",
            format_dose_value_phrase(dose_value),
            phase.frequency_phrase
        );
        if let Some(days) = phase.duration.as_days() {
            let weeks = (days / 7.0).round() as i64;
            text.push_str(&format!(" for {weeks} weeks"));
        }
        let text = format!("{}.", text.split_whitespace().collect::<Vec<_>>().join(" "));

        let mut dosage = Dosage::single(text, phase.timing.clone(), dose_and_rate, route.clone());
        dosage.sequence = Some(index as u32);
        if index > 0 {
            dosage.relationship = Some(Relationship::sequential((index - 1).to_string()));
        }
        if phase.is_maintenance_phase && direction.is_some() {
            dosage.additional_instructions.push(CodeableConcept::text_only(
                "Do not stop abruptly; follow the prescribed taper schedule",
            ));
        }
        dosages.push(dosage);
    }

    Ok(dosages)
}

/// `Some(true)` ascending, `Some(false)` descending, `None` when the doses
/// don't move monotonically (a warning-worthy but not fatal shape).
fn detect_direction(doses: &[f64]) -> Option<bool> {
    if doses.len() < 2 {
        return None;
    }
    let ascending = doses.windows(2).all(|w| w[1] >= w[0]);
    let descending = doses.windows(2).all(|w| w[1] <= w[0]);
    match (ascending, descending) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}
