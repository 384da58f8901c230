use serde::{Deserialize, Serialize};

/// FHIR R4 `Quantity` — a measured amount with an optional UCUM unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Quantity {
    pub fn new(value: f64, unit: &str) -> Self {
        Self {
            value,
            unit: Some(unit.to_string()),
            system: Some("http://unitsofmeasure.org".to_string()),
            code: Some(unit.to_string()),
        }
    }
}

/// FHIR R4 `Ratio` — e.g. a strength ratio (10 mg / 1 mL) or a
/// `maxDosePerPeriod` (6 tablet / 1 d).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ratio {
    pub numerator: Quantity,
    pub denominator: Quantity,
}

impl Ratio {
    pub fn new(numerator: Quantity, denominator: Quantity) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// numerator / denominator, ignoring units — callers are responsible for
    /// having already bridged both sides to compatible units.
    pub fn value(&self) -> f64 {
        self.numerator.value / self.denominator.value
    }
}

/// FHIR R4 `Range` — low/high bound, used for `doseRange`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub low: Quantity,
    pub high: Quantity,
}

/// FHIR R4 `Duration` — a bounded elapsed time.
///
/// Titration schedules need an *unbounded* duration for the maintenance
/// phase ("Week 9+"). `f64::INFINITY` is not representable in JSON, so the
/// unbounded case is a distinct variant rather than a sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Duration {
    Bounded { value: f64, unit: DurationUnit },
    Unbounded,
}

impl Duration {
    pub fn bounded(value: f64, unit: DurationUnit) -> Self {
        Duration::Bounded { value, unit }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Duration::Unbounded)
    }

    /// Value in days, for phases where that's the relevant unit. Returns
    /// `None` for the unbounded maintenance phase.
    pub fn as_days(&self) -> Option<f64> {
        match self {
            Duration::Unbounded => None,
            Duration::Bounded { value, unit } => Some(value * unit.days_factor()),
        }
    }
}

/// UCUM period units used throughout timing and duration (§6 wire format:
/// `s|min|h|d|wk|mo|a`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    #[serde(rename = "s")]
    Second,
    #[serde(rename = "min")]
    Minute,
    #[serde(rename = "h")]
    Hour,
    #[serde(rename = "d")]
    Day,
    #[serde(rename = "wk")]
    Week,
    #[serde(rename = "mo")]
    Month,
    #[serde(rename = "a")]
    Year,
}

impl DurationUnit {
    /// Conversion factor to days. Months use a 30-day convention;
    /// calendar-aware arithmetic would only apply when the input carries
    /// absolute dates, which this engine's inputs never do.
    pub fn days_factor(self) -> f64 {
        match self {
            DurationUnit::Second => 1.0 / 86_400.0,
            DurationUnit::Minute => 1.0 / 1_440.0,
            DurationUnit::Hour => 1.0 / 24.0,
            DurationUnit::Day => 1.0,
            DurationUnit::Week => 7.0,
            DurationUnit::Month => 30.0,
            DurationUnit::Year => 365.0,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            DurationUnit::Second => "s",
            DurationUnit::Minute => "min",
            DurationUnit::Hour => "h",
            DurationUnit::Day => "d",
            DurationUnit::Week => "wk",
            DurationUnit::Month => "mo",
            DurationUnit::Year => "a",
        }
    }
}
