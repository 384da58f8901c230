//! Branded, immutable dose value objects.
//!
//! `Mass`, `Volume`, and `Count` are disjoint at the type level — there is
//! no implicit conversion between them, only the explicit bridging the unit
//! converter (`units.rs`) performs when a medication's strength ratio or
//! dispenser metadata makes it meaningful.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MassUnit {
    Mcg,
    Mg,
    G,
    Kg,
}

impl MassUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            MassUnit::Mcg => "mcg",
            MassUnit::Mg => "mg",
            MassUnit::G => "g",
            MassUnit::Kg => "kg",
        }
    }

    /// Conversion factor to milligrams.
    pub fn to_mg_factor(self) -> f64 {
        match self {
            MassUnit::Mcg => 0.001,
            MassUnit::Mg => 1.0,
            MassUnit::G => 1_000.0,
            MassUnit::Kg => 1_000_000.0,
        }
    }
}

impl fmt::Display for MassUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MassUnit {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mcg" | "microgram" | "micrograms" => Ok(MassUnit::Mcg),
            "mg" | "milligram" | "milligrams" => Ok(MassUnit::Mg),
            "g" | "gram" | "grams" => Ok(MassUnit::G),
            "kg" | "kilogram" | "kilograms" => Ok(MassUnit::Kg),
            other => Err(EngineError::InvalidDoseInput {
                reason: format!("unknown mass unit '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeUnit {
    Ml,
    L,
}

impl VolumeUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            VolumeUnit::Ml => "mL",
            VolumeUnit::L => "L",
        }
    }

    pub fn to_ml_factor(self) -> f64 {
        match self {
            VolumeUnit::Ml => 1.0,
            VolumeUnit::L => 1_000.0,
        }
    }
}

impl fmt::Display for VolumeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VolumeUnit {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => {
                Ok(VolumeUnit::Ml)
            }
            "l" | "liter" | "liters" | "litre" | "litres" => Ok(VolumeUnit::L),
            other => Err(EngineError::InvalidDoseInput {
                reason: format!("unknown volume unit '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountUnit {
    Tablet,
    Capsule,
    Patch,
    Click,
    Puff,
    Drop,
    Spray,
    Suppository,
    /// Generic dosing unit (e.g. insulin/GLP-1 "units", IU) for injectable
    /// pens that aren't dispensed as clicks or sprays.
    Unit,
}

impl CountUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            CountUnit::Tablet => "tablet",
            CountUnit::Capsule => "capsule",
            CountUnit::Patch => "patch",
            CountUnit::Click => "click",
            CountUnit::Puff => "puff",
            CountUnit::Drop => "drop",
            CountUnit::Spray => "spray",
            CountUnit::Suppository => "suppository",
            CountUnit::Unit => "unit",
        }
    }

    /// Pluralised form used by the template engine.
    pub fn plural(self) -> &'static str {
        match self {
            CountUnit::Tablet => "tablets",
            CountUnit::Capsule => "capsules",
            CountUnit::Patch => "patches",
            CountUnit::Click => "clicks",
            CountUnit::Puff => "puffs",
            CountUnit::Drop => "drops",
            CountUnit::Spray => "sprays",
            CountUnit::Suppository => "suppositories",
            CountUnit::Unit => "units",
        }
    }
}

impl fmt::Display for CountUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CountUnit {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        if lower == "suppositories" {
            return Ok(CountUnit::Suppository);
        }
        let norm = lower.trim_end_matches('s');
        match norm {
            "tablet" => Ok(CountUnit::Tablet),
            "capsule" => Ok(CountUnit::Capsule),
            "patch" => Ok(CountUnit::Patch),
            "click" => Ok(CountUnit::Click),
            "puff" => Ok(CountUnit::Puff),
            "drop" => Ok(CountUnit::Drop),
            "spray" => Ok(CountUnit::Spray),
            "suppositor" | "suppository" => Ok(CountUnit::Suppository),
            "unit" | "iu" | "international unit" => Ok(CountUnit::Unit),
            other => Err(EngineError::InvalidDoseInput {
                reason: format!("unknown count unit '{other}'"),
            }),
        }
    }
}

macro_rules! scalar_value_object {
    ($name:ident, $unit:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $name {
            pub value: f64,
            pub unit: $unit,
        }

        impl $name {
            pub fn new(value: f64, unit: $unit) -> Result<Self, EngineError> {
                if !value.is_finite() || value <= 0.0 {
                    return Err(EngineError::InvalidDoseInput {
                        reason: format!("{} value must be positive, got {value}", stringify!($name)),
                    });
                }
                Ok(Self { value, unit })
            }
        }
    };
}

scalar_value_object!(Mass, MassUnit);
scalar_value_object!(Volume, VolumeUnit);
scalar_value_object!(Count, CountUnit);

impl Mass {
    pub fn to_mg(self) -> f64 {
        self.value * self.unit.to_mg_factor()
    }
}

impl Volume {
    pub fn to_ml(self) -> f64 {
        self.value * self.unit.to_ml_factor()
    }
}

/// A validated dose amount, disjoint by dimension. Wire form is the tagged
/// JSON shape `{type, value, unit}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DoseValue {
    Mass(Mass),
    Volume(Volume),
    Count(Count),
}

impl DoseValue {
    pub fn value(self) -> f64 {
        match self {
            DoseValue::Mass(m) => m.value,
            DoseValue::Volume(v) => v.value,
            DoseValue::Count(c) => c.value,
        }
    }

    pub fn unit_str(self) -> &'static str {
        match self {
            DoseValue::Mass(m) => m.unit.as_str(),
            DoseValue::Volume(v) => v.unit.as_str(),
            DoseValue::Count(c) => c.unit.as_str(),
        }
    }

    /// Parse a free-standing `(value, unit)` pair into whichever dimension
    /// the unit string belongs to.
    pub fn parse(value: f64, unit: &str) -> Result<Self, EngineError> {
        if let Ok(u) = CountUnit::from_str(unit) {
            return Ok(DoseValue::Count(Count::new(value, u)?));
        }
        if let Ok(u) = MassUnit::from_str(unit) {
            return Ok(DoseValue::Mass(Mass::new(value, u)?));
        }
        if let Ok(u) = VolumeUnit::from_str(unit) {
            return Ok(DoseValue::Volume(Volume::new(value, u)?));
        }
        Err(EngineError::InvalidDoseInput {
            reason: format!("unrecognised dose unit '{unit}'"),
        })
    }
}

impl Serialize for DoseValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct Tagged<'a> {
            #[serde(rename = "type")]
            kind: &'a str,
            value: f64,
            unit: &'a str,
        }
        let tagged = match self {
            DoseValue::Mass(m) => Tagged {
                kind: "mass",
                value: m.value,
                unit: m.unit.as_str(),
            },
            DoseValue::Volume(v) => Tagged {
                kind: "volume",
                value: v.value,
                unit: v.unit.as_str(),
            },
            DoseValue::Count(c) => Tagged {
                kind: "count",
                value: c.value,
                unit: c.unit.as_str(),
            },
        };
        tagged.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DoseValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Tagged {
            #[serde(rename = "type")]
            kind: String,
            value: f64,
            unit: String,
        }
        let tagged = Tagged::deserialize(deserializer)?;
        let built = match tagged.kind.as_str() {
            "mass" => MassUnit::from_str(&tagged.unit)
                .ok()
                .and_then(|u| Mass::new(tagged.value, u).ok())
                .map(DoseValue::Mass),
            "volume" => VolumeUnit::from_str(&tagged.unit)
                .ok()
                .and_then(|u| Volume::new(tagged.value, u).ok())
                .map(DoseValue::Volume),
            "count" => CountUnit::from_str(&tagged.unit)
                .ok()
                .and_then(|u| Count::new(tagged.value, u).ok())
                .map(DoseValue::Count),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "unknown DoseValue type '{other}'"
                )))
            }
        };
        built.ok_or_else(|| serde::de::Error::custom("invalid DoseValue payload"))
    }
}

/// Whether a schedule is a regular repeating timing or "as needed".
#[derive(Debug, Clone, PartialEq)]
pub enum Frequency {
    Regular(fhir_types::Timing),
    Prn,
}

/// A canonicalised administration route name, as produced by the route
/// validator (`route.rs`). Free-standing construction is intentionally not
/// exposed — callers go through `RouteValidator::validate`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route(pub(crate) String);

impl Route {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mass_rejects_non_positive_value() {
        assert!(Mass::new(0.0, MassUnit::Mg).is_err());
        assert!(Mass::new(-1.0, MassUnit::Mg).is_err());
        assert!(Mass::new(5.0, MassUnit::Mg).is_ok());
    }

    #[test]
    fn dose_value_parse_routes_by_unit_dimension() {
        assert!(matches!(
            DoseValue::parse(1.0, "tablet").unwrap(),
            DoseValue::Count(_)
        ));
        assert!(matches!(
            DoseValue::parse(250.0, "mg").unwrap(),
            DoseValue::Mass(_)
        ));
        assert!(matches!(
            DoseValue::parse(5.0, "mL").unwrap(),
            DoseValue::Volume(_)
        ));
    }

    #[test]
    fn dose_value_rejects_unknown_unit() {
        assert!(DoseValue::parse(1.0, "furlong").is_err());
    }

    #[test]
    fn dose_value_serializes_tagged_json() {
        let dv = DoseValue::parse(0.5, "tablet").unwrap();
        let json = serde_json::to_value(dv).unwrap();
        assert_eq!(json["type"], "count");
        assert_eq!(json["value"], 0.5);
        assert_eq!(json["unit"], "tablet");
    }

    #[test]
    fn dose_value_round_trips_through_json() {
        let dv = DoseValue::parse(250.0, "mg").unwrap();
        let json = serde_json::to_string(&dv).unwrap();
        let back: DoseValue = serde_json::from_str(&json).unwrap();
        assert_eq!(dv, back);
    }

    #[test]
    fn count_unit_parses_plurals() {
        assert_eq!(CountUnit::from_str("tablets").unwrap(), CountUnit::Tablet);
        assert_eq!(CountUnit::from_str("clicks").unwrap(), CountUnit::Click);
        assert_eq!(CountUnit::from_str("suppositories").unwrap(), CountUnit::Suppository);
        assert_eq!(CountUnit::from_str("units").unwrap(), CountUnit::Unit);
    }
}
