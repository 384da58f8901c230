//! Days-Supply Engine: a specificity-ranked dispatcher over tablet,
//! liquid, and titration calculation strategies, structurally analogous
//! to the strategy/modifier dispatcher but over a different
//! `Context`/`Result` pair.

mod liquid;
mod tablet;
mod titration;

use crate::error::EngineError;
use crate::medication::{FrequencyInput, MedicationProfile};
use crate::strategies::Specificity;
use crate::temporal::TemporalParser;

/// Input to a days-supply calculation.
#[derive(Debug, Clone)]
pub struct DaysSupplyContext {
    pub package_quantity: f64,
    pub package_unit: String,
    pub dose_amount: f64,
    pub dose_unit: String,
    pub timing: FrequencyInput,
    pub medication: MedicationProfile,
    /// For a titrating `timing`, the dose amount for each phase in order
    /// (same unit as `dose_amount`). `None` means every phase consumes
    /// `dose_amount` unchanged — mirrors
    /// `MedicationRequestContext::titration_phase_doses`.
    pub titration_phase_doses: Option<Vec<f64>>,
}

/// One phase's contribution to a titration days-supply breakdown.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseBreakdown {
    pub description: String,
    pub doses_in_phase: f64,
    pub total_consumption: f64,
    pub phase_duration_days: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DaysSupplyResult {
    pub days_supply: u32,
    pub calculation_method: &'static str,
    pub breakdown: Vec<PhaseBreakdown>,
    pub confidence: f64,
    pub warnings: Vec<String>,
}

impl DaysSupplyResult {
    fn empty(method: &'static str, confidence: f64, warning: impl Into<String>) -> Self {
        Self {
            days_supply: 0,
            calculation_method: method,
            breakdown: Vec::new(),
            confidence,
            warnings: vec![warning.into()],
        }
    }
}

/// One row of the days-supply strategy table: a name, specificity, and the
/// `matches`/`calculate` behaviour, mirroring `strategies::StrategyDef`.
pub struct DaysSupplyStrategyDef {
    pub name: &'static str,
    pub specificity: Specificity,
    pub matches: fn(&DaysSupplyContext) -> bool,
    pub calculate: fn(&DaysSupplyContext) -> Result<DaysSupplyResult, EngineError>,
}

fn titration_matches(ctx: &DaysSupplyContext) -> bool {
    TemporalParser::parse(&ctx.timing).is_titration
}

fn tablet_matches(ctx: &DaysSupplyContext) -> bool {
    ctx.medication.dose_form.is_solid_oral()
}

fn liquid_matches(ctx: &DaysSupplyContext) -> bool {
    ctx.medication.dose_form.is_liquid() || ctx.medication.has_topiclick_dispenser()
}

pub const TITRATION_STRATEGY: DaysSupplyStrategyDef = DaysSupplyStrategyDef {
    name: "TitrationDaysSupplyStrategy",
    specificity: Specificity::DoseFormAndIngredient,
    matches: titration_matches,
    calculate: titration::calculate,
};

pub const TABLET_STRATEGY: DaysSupplyStrategyDef = DaysSupplyStrategyDef {
    name: "TabletDaysSupplyStrategy",
    specificity: Specificity::DoseForm,
    matches: tablet_matches,
    calculate: tablet::calculate,
};

pub const LIQUID_STRATEGY: DaysSupplyStrategyDef = DaysSupplyStrategyDef {
    name: "LiquidDaysSupplyStrategy",
    specificity: Specificity::DoseForm,
    matches: liquid_matches,
    calculate: liquid::calculate,
};

pub fn default_days_supply_strategies() -> Vec<DaysSupplyStrategyDef> {
    vec![TITRATION_STRATEGY, TABLET_STRATEGY, LIQUID_STRATEGY]
}

/// Selects the highest-specificity matching strategy and runs it. Ties at
/// the top specificity and "nothing matched" both propagate as
/// `EngineError`, same as `strategies::Dispatcher::dispatch`.
pub fn calculate_days_supply(ctx: &DaysSupplyContext) -> Result<DaysSupplyResult, EngineError> {
    if ctx.package_quantity == 0.0 {
        return Ok(DaysSupplyResult::empty(
            "none",
            0.5,
            "package quantity is zero; days-supply cannot be computed",
        ));
    }

    let strategies = default_days_supply_strategies();
    let mut matched: Vec<&DaysSupplyStrategyDef> = strategies.iter().filter(|s| (s.matches)(ctx)).collect();

    if matched.is_empty() {
        return Err(EngineError::NoMatchingStrategy {
            registered: strategies.iter().map(|s| s.name.to_string()).collect(),
        });
    }

    matched.sort_by(|a, b| b.specificity.as_u8().cmp(&a.specificity.as_u8()));
    if matched.len() > 1 && matched[0].specificity.as_u8() == matched[1].specificity.as_u8() {
        let tied_specificity = matched[0].specificity.as_u8();
        let candidates = matched
            .iter()
            .filter(|s| s.specificity.as_u8() == tied_specificity)
            .map(|s| crate::error::StrategyCandidate { name: s.name.to_string(), specificity: tied_specificity })
            .collect();
        return Err(EngineError::AmbiguousStrategy { specificity: tied_specificity, candidates });
    }

    (matched[0].calculate)(ctx)
}

/// Doses per day implied by `timing`, used by every calculation strategy.
pub(crate) fn doses_per_day(timing: &FrequencyInput) -> (f64, f64) {
    let parsed = TemporalParser::parse(timing);
    if parsed.is_titration {
        (0.0, parsed.confidence)
    } else {
        (TemporalParser::doses_per_period(parsed.single_timing(), 1.0), parsed.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medication::{DoseForm, Ingredient, MedicationClassification};
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
            scoring: None,
            dispenser: None,
            dosage_constraints: None,
            package: None,
            eligible_genders: Vec::new(),
            route_whitelist: Vec::new(),
        }
    }

    #[test]
    fn simple_tablet_days_supply_is_fifteen() {
        let ctx = DaysSupplyContext {
            package_quantity: 30.0,
            package_unit: "tablet".to_string(),
            dose_amount: 1.0,
            dose_unit: "tablet".to_string(),
            timing: FrequencyInput::Text("twice daily".to_string()),
            medication: metformin(),
            titration_phase_doses: None,
        };
        let result = calculate_days_supply(&ctx).unwrap();
        assert_eq!(result.days_supply, 15);
        assert_eq!(result.calculation_method, "TabletDaysSupplyStrategy");
    }

    #[test]
    fn zero_package_quantity_is_a_warning_not_an_error() {
        let ctx = DaysSupplyContext {
            package_quantity: 0.0,
            package_unit: "tablet".to_string(),
            dose_amount: 1.0,
            dose_unit: "tablet".to_string(),
            timing: FrequencyInput::Text("once daily".to_string()),
            medication: metformin(),
            titration_phase_doses: None,
        };
        let result = calculate_days_supply(&ctx).unwrap();
        assert_eq!(result.days_supply, 0);
        assert_eq!(result.confidence, 0.5);
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn glp1_titration_pen_yields_one_hundred_seventy_five_days() {
        let mut med = metformin();
        med.dose_form = DoseForm::Injection;
        let ctx = DaysSupplyContext {
            package_quantity: 1000.0,
            package_unit: "unit".to_string(),
            dose_amount: 12.5,
            dose_unit: "unit".to_string(),
            timing: FrequencyInput::Sequence(vec![
                FrequencyInput::Text("Week 1-4: once weekly".to_string()),
                FrequencyInput::Text("Week 5-8: once weekly".to_string()),
                FrequencyInput::Text("Week 9+: once weekly".to_string()),
            ]),
            medication: med,
            titration_phase_doses: Some(vec![12.5, 25.0, 50.0]),
        };
        let result = calculate_days_supply(&ctx).unwrap();
        assert_eq!(result.calculation_method, "TitrationDaysSupplyStrategy");
        assert_eq!(result.days_supply, 175);
        assert_eq!(result.breakdown.len(), 3);
    }
}
