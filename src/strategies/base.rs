//! Base strategies: a representative set, each building a `Dosage`
//! directly rather than going through `DosageBuilder` — the strategy
//! pipeline is the dispatcher's independent alternative to the builder
//! pipeline, not a thin wrapper over it.

use fhir_types::{CodeableConcept, Dosage, DoseAndRate, Quantity};

use crate::builders::default_verb;
use crate::error::EngineError;
use crate::medication::MedicationRequestContext;
use crate::route::RouteValidator;
use crate::temporal::TemporalParser;
use crate::units::UnitConverter;
use crate::value_objects::DoseValue;

use super::Specificity;

/// One row of the base-strategy table: a name, its specificity, and the
/// `matches`/`build` behaviour, represented as plain function pointers
/// (a tagged table in place of dynamic dispatch).
pub struct StrategyDef {
    pub name: &'static str,
    pub specificity: Specificity,
    pub matches: fn(&MedicationRequestContext) -> bool,
    pub build: fn(&MedicationRequestContext) -> Result<Dosage, EngineError>,
    pub explain: fn() -> &'static str,
}

/// Shared assembly: route + timing + a single dose-quantity rendering,
/// used by every base strategy except `TestosteroneCypionateStrategy`
/// (which needs the dual mg/mL presentation).
fn build_simple(ctx: &MedicationRequestContext) -> Result<Dosage, EngineError> {
    ctx.dose.validate()?;
    let dose_value = ctx.dose.as_dose_value()?;

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

    let temporal = TemporalParser::parse(&ctx.frequency);
    if temporal.is_titration {
        return Err(EngineError::InvalidTimingInput {
            reason: "a titrating frequency was routed to a non-titration base strategy".to_string(),
        });
    }

    let verb = default_verb(ctx.medication.dose_form).as_str();
    let dose_phrase = crate::builders::format_dose_value_phrase(dose_value);
    let frequency_phrase = temporal.frequency_phrase();
    let text = format!("{verb} {dose_phrase} {route_phrase} {frequency_phrase}.");

    let dose_and_rate = DoseAndRate::quantity(Quantity::new(dose_value.value(), dose_value.unit_str()));
    let route = CodeableConcept::coded(canonical.coding());
    let mut dosage = Dosage::single(text, temporal.single_timing().clone(), dose_and_rate, route);
    for warning in temporal.warnings {
        dosage.additional_instructions.push(CodeableConcept::text_only(warning));
    }
    Ok(dosage)
}

pub const DEFAULT_STRATEGY: StrategyDef = StrategyDef {
    name: "DefaultStrategy",
    specificity: Specificity::Default,
    matches: |_ctx| true,
    build: build_simple,
    explain: || "Matches any context; the catch-all when nothing more specific applies.",
};

pub const TABLET_STRATEGY: StrategyDef = StrategyDef {
    name: "TabletStrategy",
    specificity: Specificity::DoseForm,
    matches: |ctx| ctx.medication.dose_form.is_solid_oral(),
    build: build_simple,
    explain: || "Matches tablets, capsules, ODTs, and troches.",
};

pub const LIQUID_STRATEGY: StrategyDef = StrategyDef {
    name: "LiquidStrategy",
    specificity: Specificity::DoseForm,
    matches: |ctx| ctx.medication.dose_form.is_liquid(),
    build: build_simple,
    explain: || "Matches solutions, suspensions, syrups, elixirs, and injections.",
};

fn is_testosterone_cypionate(ctx: &MedicationRequestContext) -> bool {
    ctx.medication.id.eq_ignore_ascii_case("testosterone-cypionate")
        || ctx.medication.display_name.to_lowercase().contains("testosterone cypionate")
}

/// Testosterone cypionate is dosed in mg but dispensed as an injectable
/// solution; the dual-unit presentation ("100 mg (0.5 mL)") is a
/// textbook case for a `MEDICATION_ID`-specificity bespoke strategy.
fn build_testosterone_cypionate(ctx: &MedicationRequestContext) -> Result<Dosage, EngineError> {
    ctx.dose.validate()?;
    let dose_value = ctx.dose.as_dose_value()?;
    let volume = UnitConverter::convert(dose_value, "mL", &ctx.medication)?;

    let validation = RouteValidator::validate(&ctx.route, Some(ctx.medication.dose_form));
    if !validation.is_valid {
        return Err(EngineError::InvalidRouteForDoseForm {
            route: ctx.route.clone(),
            dose_form: ctx.medication.dose_form.to_string(),
        });
    }
    let canonical = validation.canonical.expect("valid routes always resolve a canonical entry");
    let route_phrase = canonical.display_text.to_lowercase();

    let temporal = TemporalParser::parse(&ctx.frequency);
    if temporal.is_titration {
        return Err(EngineError::InvalidTimingInput {
            reason: "a titrating frequency was routed to a non-titration base strategy".to_string(),
        });
    }

    let dose_phrase = format!(
        "{} ({} {})",
        crate::builders::format_dose_value_phrase(dose_value),
        crate::builders::trim_trailing_zero(volume.value()),
        volume.unit_str()
    );
    let text = format!(
        "Inject {dose_phrase} {route_phrase} {}.",
        temporal.frequency_phrase()
    );

    let dose_and_rate = DoseAndRate::quantity(Quantity::new(dose_value.value(), dose_value.unit_str()));
    let route = CodeableConcept::coded(canonical.coding());
    Ok(Dosage::single(text, temporal.single_timing().clone(), dose_and_rate, route))
}

pub const TESTOSTERONE_CYPIONATE_STRATEGY: StrategyDef = StrategyDef {
    name: "TestosteroneCypionateStrategy",
    specificity: Specificity::MedicationId,
    matches: is_testosterone_cypionate,
    build: build_testosterone_cypionate,
    explain: || "Matches testosterone cypionate by medication id/name; renders a dual mg/mL dose.",
};

/// The representative built-in base strategy set.
pub fn default_strategies() -> Vec<StrategyDef> {
    vec![DEFAULT_STRATEGY, TABLET_STRATEGY, LIQUID_STRATEGY, TESTOSTERONE_CYPIONATE_STRATEGY]
}
