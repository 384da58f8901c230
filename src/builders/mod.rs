//! Builders.
//!
//! A small core (`DosageBuilder`) holds the state every dose-form needs —
//! audit trail, warnings, the dose/timing/route once resolved, rendered
//! phrases — and each dose-form's behaviour lives in its own aspect module
//! (`tablet`, `liquid`, `fractional`, …) operating on that shared state:
//! one state struct, many orthogonal aspects, selected by `BuilderKind`
//! rather than a deep inheritance chain.

mod complex_prn;
mod fractional;
mod liquid;
mod multi_ingredient;
mod nasal_spray;
mod tablet;
mod tapering;
mod topiclick;

use chrono::Utc;
use fhir_types::{CodeableConcept, Dosage, DoseAndRate, DurationUnit, Ratio, Timing, TimingRepeat};

use crate::error::EngineError;
use crate::medication::{DoseForm, DoseInput, FrequencyInput, MedicationProfile, MedicationRequestContext, Scoring};
use crate::route::RouteValidator;
use crate::template::{TemplateEngine, Verb};
use crate::value_objects::{CountUnit, DoseValue};

/// "1 tablet" / "2 tablets" / "½ tablet" — singular below/at one unit,
/// plural above, fraction glyphs from the template engine's formatter.
pub(crate) fn format_count_phrase(value: f64, unit: CountUnit) -> String {
    let qty = TemplateEngine::format_fraction(value);
    let word = if value > 1.0 + 1e-9 { unit.plural() } else { unit.as_str() };
    format!("{qty} {word}")
}

pub(crate) fn format_dose_value_phrase(dose: DoseValue) -> String {
    match dose {
        DoseValue::Count(c) => format_count_phrase(c.value, c.unit),
        DoseValue::Mass(m) => format!("{} {}", trim_trailing_zero(m.value), m.unit.as_str()),
        DoseValue::Volume(v) => format!("{} {}", trim_trailing_zero(v.value), v.unit.as_str()),
    }
}

/// Renders a dose number without a pile of trailing zeros (`5` not `5.0`)
/// while keeping meaningful decimals (`2.5`).
pub(crate) fn trim_trailing_zero(value: f64) -> String {
    if (value.fract()).abs() < 1e-9 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Which dose-form/regimen family a request resolves to, per the builder
/// factory below. `Tapering` is handled outside the shared
/// `DosageBuilder` because it produces a sequence of instructions rather
/// than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderKind {
    SimpleTablet,
    SimpleLiquid,
    FractionalTablet,
    Topiclick,
    NasalSpray,
    ComplexPrn,
    MultiIngredient,
    Tapering,
}

fn dose_is_fractional(dose: &DoseInput) -> bool {
    match dose {
        DoseInput::Single { value, .. } => (value.fract()).abs() > 1e-9,
        DoseInput::Range { min_value, max_value, .. } => {
            min_value.fract().abs() > 1e-9 || max_value.fract().abs() > 1e-9
        }
    }
}

fn is_titration_request(ctx: &MedicationRequestContext) -> bool {
    matches!(&ctx.frequency, FrequencyInput::Sequence(items) if items.len() >= 2)
}

fn is_complex_regimen(ctx: &MedicationRequestContext) -> bool {
    matches!(ctx.dose, DoseInput::Range { .. }) || ctx.frequency_range.is_some()
}

/// Builder factory: picks the most specific builder kind that applies to
/// `ctx`, in priority order.
pub fn select_builder_kind(ctx: &MedicationRequestContext) -> BuilderKind {
    let med = &ctx.medication;
    if med.has_topiclick_dispenser() {
        return BuilderKind::Topiclick;
    }
    if med.dose_form == DoseForm::NasalSpray {
        return BuilderKind::NasalSpray;
    }
    if med.is_compound() {
        return BuilderKind::MultiIngredient;
    }
    if is_titration_request(ctx) {
        return BuilderKind::Tapering;
    }
    if is_complex_regimen(ctx) {
        return BuilderKind::ComplexPrn;
    }
    if med.dose_form.is_solid_oral() {
        if let Some(scoring) = med.scoring {
            if scoring != Scoring::None && dose_is_fractional(&ctx.dose) {
                return BuilderKind::FractionalTablet;
            }
        }
        return BuilderKind::SimpleTablet;
    }
    BuilderKind::SimpleLiquid
}

pub(crate) fn default_verb(dose_form: DoseForm) -> Verb {
    match dose_form {
        DoseForm::Tablet | DoseForm::Capsule | DoseForm::Odt | DoseForm::Troche => Verb::Take,
        DoseForm::Solution | DoseForm::Suspension | DoseForm::Syrup | DoseForm::Elixir => Verb::Take,
        DoseForm::Injection | DoseForm::Vial => Verb::Inject,
        DoseForm::Cream | DoseForm::Gel | DoseForm::Ointment => Verb::Apply,
        DoseForm::Patch => Verb::Place,
        DoseForm::Suppository => Verb::Insert,
        DoseForm::Inhaler => Verb::Inhale,
        DoseForm::NasalSpray => Verb::Instill,
        DoseForm::Drops => Verb::Instill,
    }
}

/// Shared mutable state assembled by the fluent `build*` calls and
/// finalised by `get_result`.
pub struct DosageBuilder {
    pub(crate) kind: BuilderKind,
    pub(crate) medication: MedicationProfile,
    audit: Vec<String>,
    pub(crate) warnings: Vec<String>,
    pub(crate) verb: Verb,
    pub(crate) dose_and_rate: Option<DoseAndRate>,
    pub(crate) dose_phrase: String,
    pub(crate) timing: Option<Timing>,
    pub(crate) frequency_phrase: String,
    pub(crate) route: Option<CodeableConcept>,
    pub(crate) route_phrase: String,
    pub(crate) as_needed: bool,
    pub(crate) max_dose_per_period: Option<Ratio>,
    pub(crate) additional_instructions: Vec<CodeableConcept>,
    pub(crate) trailing_phrase: Option<String>,
}

impl DosageBuilder {
    pub fn new(kind: BuilderKind, medication: MedicationProfile) -> Self {
        let verb = default_verb(medication.dose_form);
        Self {
            kind,
            medication,
            audit: Vec::new(),
            warnings: Vec::new(),
            verb,
            dose_and_rate: None,
            dose_phrase: String::new(),
            timing: None,
            frequency_phrase: String::new(),
            route: None,
            route_phrase: String::new(),
            as_needed: false,
            max_dose_per_period: None,
            additional_instructions: Vec::new(),
            trailing_phrase: None,
        }
    }

    /// Appends one audit-trail line; a no-op never calls this.
    pub(crate) fn audit(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(kind = ?self.kind, %message, "builder step");
        self.audit.push(format!("[{}] {}", Utc::now().to_rfc3339(), message));
    }

    pub fn build_dose(&mut self, ctx: &MedicationRequestContext) -> Result<&mut Self, EngineError> {
        match self.kind {
            BuilderKind::SimpleTablet => tablet::build_dose(self, ctx)?,
            BuilderKind::FractionalTablet => fractional::build_dose(self, ctx)?,
            BuilderKind::SimpleLiquid => liquid::build_dose(self, ctx)?,
            BuilderKind::Topiclick => topiclick::build_dose(self, ctx)?,
            BuilderKind::NasalSpray => nasal_spray::build_dose(self, ctx)?,
            BuilderKind::ComplexPrn => complex_prn::build_dose(self, ctx)?,
            BuilderKind::MultiIngredient => multi_ingredient::build_dose(self, ctx)?,
            BuilderKind::Tapering => {
                return Err(EngineError::InvalidDoseInput {
                    reason: "tapering schedules are built via builders::tapering::build, not DosageBuilder".to_string(),
                })
            }
        }
        Ok(self)
    }

    pub fn build_timing(&mut self, ctx: &MedicationRequestContext) -> Result<&mut Self, EngineError> {
        if let Some(range) = &ctx.frequency_range {
            let min_hours = range.min_interval * range.interval_unit.days_factor() * 24.0;
            let max_hours = range.max_interval * range.interval_unit.days_factor() * 24.0;
            let avg_hours = (min_hours + max_hours) / 2.0;
            self.timing = Some(Timing {
                repeat: TimingRepeat::new(1, avg_hours, DurationUnit::Hour),
            });
            self.frequency_phrase = format!(
                "every {}-{} hours",
                trim_trailing_zero(min_hours),
                trim_trailing_zero(max_hours)
            );
            self.audit(format!("buildTiming -> {}", self.frequency_phrase));
            return Ok(self);
        }

        let result = crate::temporal::TemporalParser::parse(&ctx.frequency);
        if result.is_titration {
            return Err(EngineError::InvalidTimingInput {
                reason: "a titrating frequency was routed to a non-tapering builder".to_string(),
            });
        }
        self.frequency_phrase = if ctx.as_needed {
            format!("{} as needed", result.frequency_phrase())
        } else {
            result.frequency_phrase()
        };
        self.timing = Some(result.single_timing().clone());
        for warning in result.warnings {
            self.warnings.push(warning);
        }
        self.audit(format!("buildTiming -> {}", self.frequency_phrase));
        Ok(self)
    }

    pub fn build_route(&mut self, ctx: &MedicationRequestContext) -> Result<&mut Self, EngineError> {
        let validation = RouteValidator::validate(&ctx.route, Some(self.medication.dose_form));
        if !validation.is_valid {
            return Err(EngineError::InvalidRouteForDoseForm {
                route: ctx.route.clone(),
                dose_form: self.medication.dose_form.to_string(),
            });
        }
        for warning in &validation.warnings {
            self.warnings.push(warning.clone());
        }
        let canonical = validation.canonical.expect("valid routes always resolve a canonical entry");
        self.route_phrase = if canonical.id == "oral" {
            "by mouth".to_string()
        } else {
            canonical.display_text.to_lowercase()
        };
        self.route = Some(CodeableConcept::coded(canonical.coding()));
        self.audit(format!("buildRoute -> {}", self.route_phrase));
        Ok(self)
    }

    pub fn build_constraints(&mut self, ctx: &MedicationRequestContext) -> Result<&mut Self, EngineError> {
        if let Some(ratio) = &ctx.max_dose_per_period {
            self.max_dose_per_period = Some(ratio.clone());
            self.audit("buildConstraints -> max dose per period set");
        }
        Ok(self)
    }

    pub fn build_as_needed(&mut self, ctx: &MedicationRequestContext) -> Result<&mut Self, EngineError> {
        self.as_needed = ctx.as_needed;
        if ctx.as_needed && !self.frequency_phrase.ends_with("as needed") {
            self.frequency_phrase = format!("{} as needed", self.frequency_phrase);
        }
        Ok(self)
    }

    pub fn build_special_instructions(&mut self, ctx: &MedicationRequestContext) -> Result<&mut Self, EngineError> {
        if let Some(text) = &ctx.special_instructions {
            self.additional_instructions.push(CodeableConcept::text_only(text.clone()));
            self.audit(format!("buildSpecialInstructions -> '{text}'"));
        }
        for warning in self.warnings.clone() {
            self.additional_instructions.push(CodeableConcept::text_only(warning));
        }
        Ok(self)
    }

    pub fn get_result(&self) -> Result<Vec<Dosage>, EngineError> {
        let dose_and_rate = self.dose_and_rate.clone().ok_or_else(|| EngineError::InvalidDoseInput {
            reason: "buildDose was never called".to_string(),
        })?;
        let timing = self.timing.clone().ok_or_else(|| EngineError::InvalidTimingInput {
            reason: "buildTiming was never called".to_string(),
        })?;
        let route = self.route.clone().ok_or_else(|| EngineError::InvalidRouteForDoseForm {
            route: "<unset>".to_string(),
            dose_form: self.medication.dose_form.to_string(),
        })?;

        let mut text = format!(
            "{} {} {} {}",
            self.verb, self.dose_phrase, self.route_phrase, self.frequency_phrase
        );
        if let Some(trailing) = &self.trailing_phrase {
            text.push(' ');
            text.push_str(trailing);
        }
        let text = format!("{}.", text.split_whitespace().collect::<Vec<_>>().join(" "));

        let mut dosage = Dosage::single(text, timing, dose_and_rate, route);
        dosage.max_dose_per_period = self.max_dose_per_period.clone();
        dosage.as_needed_boolean = self.as_needed.then_some(true);
        dosage.additional_instructions = self.additional_instructions.clone();
        Ok(vec![dosage])
    }

    pub fn explain(&self) -> &[String] {
        &self.audit
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": format!("{:?}", self.kind),
            "medicationId": self.medication.id,
            "dosePhrase": self.dose_phrase,
            "frequencyPhrase": self.frequency_phrase,
            "routePhrase": self.route_phrase,
            "warnings": self.warnings,
            "audit": self.audit,
        })
    }
}

/// Canonical entry point: a single `build(Request) -> Result` function is
/// the preferred form; the fluent `DosageBuilder` methods above remain
/// available for callers that want step-by-step control/inspection.
pub fn build_signature(ctx: &MedicationRequestContext) -> Result<Vec<Dosage>, EngineError> {
    let kind = select_builder_kind(ctx);
    if kind == BuilderKind::Tapering {
        return tapering::build(ctx);
    }
    let mut builder = DosageBuilder::new(kind, ctx.medication.clone());
    builder
        .build_dose(ctx)?
        .build_timing(ctx)?
        .build_route(ctx)?
        .build_constraints(ctx)?
        .build_as_needed(ctx)?
        .build_special_instructions(ctx)?;
    builder.get_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medication::{
        DispenserMetadata, DispenserType, Ingredient, MedicationClassification, PatientContext,
    };
    use fhir_types::Quantity;
    use pretty_assertions::assert_eq;

    fn ctx_with(medication: MedicationProfile, dose: DoseInput, frequency: FrequencyInput, route: &str) -> MedicationRequestContext {
        MedicationRequestContext {
            request_id: "req-1".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            medication,
            patient: PatientContext::default(),
            dose,
            frequency,
            route: route.to_string(),
            duration: None,
            dispense_quantity: None,
            refills: None,
            special_instructions: None,
            as_needed: false,
            max_dose_per_period: None,
            frequency_range: None,
            titration_phase_doses: None,
        }
    }

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
            scoring: Some(Scoring::None),
            dispenser: None,
            dosage_constraints: None,
            package: None,
            eligible_genders: Vec::new(),
            route_whitelist: Vec::new(),
        }
    }

    #[test]
    fn simple_tablet_scenario_renders_expected_text() {
        let ctx = ctx_with(
            metformin(),
            DoseInput::Single { value: 1.0, unit: "tablet".to_string() },
            FrequencyInput::Text("twice daily".to_string()),
            "Orally",
        );
        let result = build_signature(&ctx).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "Take 1 tablet by mouth twice daily.");
        assert_eq!(result[0].route.coding.as_ref().unwrap()[0].code.as_deref(), Some("26643006"));
    }

    #[test]
    fn levothyroxine_half_tablet_uses_fractional_builder() {
        let mut med = metformin();
        med.id = "levothyroxine-25mcg".to_string();
        med.scoring = Some(Scoring::Half);
        med.ingredients[0].strength_ratio = Ratio::new(Quantity::new(25.0, "mcg"), Quantity::new(1.0, "tablet"));
        let ctx = ctx_with(
            med,
            DoseInput::Single { value: 0.5, unit: "tablet".to_string() },
            FrequencyInput::Text("once daily".to_string()),
            "Orally",
        );
        assert_eq!(select_builder_kind(&ctx), BuilderKind::FractionalTablet);
        let result = build_signature(&ctx).unwrap();
        assert_eq!(result[0].text, "Take ½ tablet by mouth once daily.");
        assert!(result[0]
            .additional_instructions
            .iter()
            .any(|i| i.text.as_deref() == Some("Split tablet in half")));
    }

    #[test]
    fn topiclick_cream_scenario_renders_expected_text() {
        let med = MedicationProfile {
            id: "progesterone-cream".to_string(),
            display_name: "Progesterone 10 mg/mL cream".to_string(),
            classification: MedicationClassification::Compound,
            dose_form: DoseForm::Cream,
            ingredients: vec![Ingredient {
                name: "Progesterone".to_string(),
                strength_ratio: Ratio::new(Quantity::new(10.0, "mg"), Quantity::new(1.0, "mL")),
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
        };
        let ctx = ctx_with(
            med,
            DoseInput::Single { value: 4.0, unit: "click".to_string() },
            FrequencyInput::Text("twice daily".to_string()),
            "Topically",
        );
        let result = build_signature(&ctx).unwrap();
        assert_eq!(result[0].text, "Apply 4 clicks (10.0 mg) topically twice daily.");
    }
}
