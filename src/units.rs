//! Unit Converter.
//!
//! Bridges across mass/volume/count dimensions using a medication's
//! strength ratio or dispenser metadata. Same-dimension conversions walk a
//! fixed ladder (mcg↔mg↔g↔kg, mL↔L); cross-dimension conversions require a
//! medication profile to supply the bridge. Callers doing display
//! augmentation (e.g. "also equals 2 clicks") treat a conversion failure as
//! non-fatal and simply omit the augmentation; callers relying on the
//! result for a days-supply calculation propagate the error.

use std::str::FromStr;

use crate::error::EngineError;
use crate::medication::{DispenserType, MedicationProfile};
use crate::value_objects::{Count, CountUnit, DoseValue, Mass, MassUnit, Volume, VolumeUnit};

/// Number of decimal places the converter rounds its output to by default.
pub const DEFAULT_PRECISION: u32 = 4;

fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UnitKind {
    Mass(MassUnit),
    Volume(VolumeUnit),
    Count(CountUnit),
}

fn classify(unit: &str) -> Option<UnitKind> {
    if let Ok(u) = CountUnit::from_str(unit) {
        return Some(UnitKind::Count(u));
    }
    if let Ok(u) = MassUnit::from_str(unit) {
        return Some(UnitKind::Mass(u));
    }
    if let Ok(u) = VolumeUnit::from_str(unit) {
        return Some(UnitKind::Volume(u));
    }
    None
}

pub struct UnitConverter;

impl UnitConverter {
    /// Converts `dose` to `to_unit`, bridging dimensions via `medication`'s
    /// strength ratio or dispenser metadata when the units don't already
    /// share a dimension.
    pub fn convert(
        dose: DoseValue,
        to_unit: &str,
        medication: &MedicationProfile,
    ) -> Result<DoseValue, EngineError> {
        if dose.unit_str().eq_ignore_ascii_case(to_unit) {
            return Ok(dose);
        }

        let target = classify(to_unit).ok_or_else(|| EngineError::UnsupportedUnitConversion {
            from_unit: dose.unit_str().to_string(),
            to_unit: to_unit.to_string(),
            reason: format!("'{to_unit}' is not a recognised mass, volume, or count unit"),
        })?;

        match (dose, target) {
            (DoseValue::Mass(m), UnitKind::Mass(u)) => {
                let mg = m.to_mg();
                let value = round_to(mg / u.to_mg_factor(), DEFAULT_PRECISION);
                Ok(DoseValue::Mass(Mass::new(value, u)?))
            }
            (DoseValue::Volume(v), UnitKind::Volume(u)) => {
                let ml = v.to_ml();
                let value = round_to(ml / u.to_ml_factor(), DEFAULT_PRECISION);
                Ok(DoseValue::Volume(Volume::new(value, u)?))
            }
            (DoseValue::Mass(m), UnitKind::Count(u)) => {
                let mg_per_unit = Self::mg_per_count_unit(medication, dose.unit_str())?;
                let value = round_to(m.to_mg() / mg_per_unit, DEFAULT_PRECISION);
                Ok(DoseValue::Count(Count::new(value, u)?))
            }
            (DoseValue::Count(c), UnitKind::Mass(u)) => {
                let mg_per_unit = Self::mg_per_count_unit(medication, c.unit.as_str())?;
                let mg = c.value * mg_per_unit;
                let value = round_to(mg / u.to_mg_factor(), DEFAULT_PRECISION);
                Ok(DoseValue::Mass(Mass::new(value, u)?))
            }
            (DoseValue::Mass(m), UnitKind::Volume(u)) => {
                let mg_per_ml = Self::mg_per_ml(medication)?;
                let value = round_to(m.to_mg() / mg_per_ml / u.to_ml_factor(), DEFAULT_PRECISION);
                Ok(DoseValue::Volume(Volume::new(value, u)?))
            }
            (DoseValue::Volume(v), UnitKind::Mass(u)) => {
                let mg_per_ml = Self::mg_per_ml(medication)?;
                let mg = v.to_ml() * mg_per_ml;
                let value = round_to(mg / u.to_mg_factor(), DEFAULT_PRECISION);
                Ok(DoseValue::Mass(Mass::new(value, u)?))
            }
            (DoseValue::Volume(v), UnitKind::Count(u)) => {
                let clicks_per_ml = Self::dispenser_ratio(medication)?;
                let value = round_to(v.to_ml() * clicks_per_ml, DEFAULT_PRECISION);
                Ok(DoseValue::Count(Count::new(value, u)?))
            }
            (DoseValue::Count(c), UnitKind::Volume(u)) => {
                let clicks_per_ml = Self::dispenser_ratio(medication)?;
                let ml = c.value / clicks_per_ml;
                let value = round_to(ml / u.to_ml_factor(), DEFAULT_PRECISION);
                Ok(DoseValue::Volume(Volume::new(value, u)?))
            }
            (DoseValue::Count(_), UnitKind::Count(_)) => {
                // Identity was already handled above; two distinct count
                // units (e.g. click -> puff) have no shared dimension
                // absent a medication-specific bridge.
                Err(EngineError::UnsupportedUnitConversion {
                    from_unit: dose.unit_str().to_string(),
                    to_unit: to_unit.to_string(),
                    reason: "no bridge between distinct count units".to_string(),
                })
            }
        }
    }

    /// mg contributed by one unit of `medication`'s primary ingredient
    /// strength ratio, used both for mass<->count bridging directions.
    fn mg_per_count_unit(
        medication: &MedicationProfile,
        count_unit: &str,
    ) -> Result<f64, EngineError> {
        let ingredient = medication.primary_ingredient().ok_or_else(|| {
            EngineError::UnsupportedUnitConversion {
                from_unit: "mass".to_string(),
                to_unit: count_unit.to_string(),
                reason: format!("medication '{}' has no ingredients to bridge from", medication.id),
            }
        })?;
        let ratio = ingredient.strength_ratio.clone();
        let numerator_mg = ratio.numerator.value
            * MassUnit::from_str(ratio.numerator.unit.as_deref().unwrap_or("mg"))
                .map(|u| u.to_mg_factor())
                .unwrap_or(1.0);
        if ratio.denominator.value <= 0.0 {
            return Err(EngineError::UnsupportedUnitConversion {
                from_unit: "mass".to_string(),
                to_unit: count_unit.to_string(),
                reason: "strength ratio has a zero denominator".to_string(),
            });
        }
        Ok(numerator_mg / ratio.denominator.value)
    }

    fn mg_per_ml(medication: &MedicationProfile) -> Result<f64, EngineError> {
        let ingredient = medication.primary_ingredient().ok_or_else(|| {
            EngineError::UnsupportedUnitConversion {
                from_unit: "mass".to_string(),
                to_unit: "mL".to_string(),
                reason: format!("medication '{}' has no ingredients to bridge from", medication.id),
            }
        })?;
        let ratio = &ingredient.strength_ratio;
        let numerator_mg = ratio.numerator.value
            * MassUnit::from_str(ratio.numerator.unit.as_deref().unwrap_or("mg"))
                .map(|u| u.to_mg_factor())
                .unwrap_or(1.0);
        let denominator_ml = ratio.denominator.value
            * VolumeUnit::from_str(ratio.denominator.unit.as_deref().unwrap_or("mL"))
                .map(|u| u.to_ml_factor())
                .unwrap_or(1.0);
        if denominator_ml <= 0.0 {
            return Err(EngineError::UnsupportedUnitConversion {
                from_unit: "mass".to_string(),
                to_unit: "mL".to_string(),
                reason: "strength ratio has a zero-volume denominator".to_string(),
            });
        }
        Ok(numerator_mg / denominator_ml)
    }

    /// Dispenser units (e.g. clicks) per 1 mL.
    fn dispenser_ratio(medication: &MedicationProfile) -> Result<f64, EngineError> {
        match &medication.dispenser {
            Some(d) if d.dispenser_type == DispenserType::Topiclick || d.conversion_ratio > 0.0 => {
                Ok(d.conversion_ratio)
            }
            _ => Err(EngineError::UnsupportedUnitConversion {
                from_unit: "count".to_string(),
                to_unit: "mL".to_string(),
                reason: format!("medication '{}' has no dispenser metadata", medication.id),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir_types::{Quantity, Ratio};
    use pretty_assertions::assert_eq;

    use crate::medication::{
        DispenserMetadata, DoseForm, Ingredient, MedicationClassification, MedicationProfile,
    };

    fn tablet_500mg() -> MedicationProfile {
        MedicationProfile {
            id: "metformin-500".to_string(),
            display_name: "Metformin 500 mg".to_string(),
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
    fn same_unit_is_identity() {
        let dose = DoseValue::parse(1.0, "tablet").unwrap();
        let converted = UnitConverter::convert(dose, "tablet", &tablet_500mg()).unwrap();
        assert_eq!(converted.value(), 1.0);
    }

    #[test]
    fn mass_ladder_converts_mg_to_g() {
        let dose = DoseValue::parse(500.0, "mg").unwrap();
        let converted = UnitConverter::convert(dose, "g", &tablet_500mg()).unwrap();
        assert_eq!(converted.value(), 0.5);
    }

    #[test]
    fn strength_ratio_bridges_mass_to_count() {
        let dose = DoseValue::parse(500.0, "mg").unwrap();
        let converted = UnitConverter::convert(dose, "tablet", &tablet_500mg()).unwrap();
        assert_eq!(converted.value(), 1.0);
    }

    #[test]
    fn strength_ratio_bridges_count_to_mass() {
        let dose = DoseValue::parse(0.5, "tablet").unwrap();
        let converted = UnitConverter::convert(dose, "mg", &tablet_500mg()).unwrap();
        assert_eq!(converted.value(), 250.0);
    }

    #[test]
    fn dispenser_bridges_volume_to_clicks() {
        let dose = DoseValue::parse(1.0, "mL").unwrap();
        let converted = UnitConverter::convert(dose, "click", &topiclick_cream()).unwrap();
        assert_eq!(converted.value(), 4.0);
    }

    #[test]
    fn dispenser_bridges_clicks_to_volume() {
        let dose = DoseValue::parse(2.0, "click").unwrap();
        let converted = UnitConverter::convert(dose, "mL", &topiclick_cream()).unwrap();
        assert_eq!(converted.value(), 0.5);
    }

    #[test]
    fn missing_bridge_is_a_recoverable_error() {
        let dose = DoseValue::parse(1.0, "tablet").unwrap();
        let result = UnitConverter::convert(dose, "mL", &tablet_500mg());
        assert!(result.is_err());
    }
}
