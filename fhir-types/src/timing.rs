use serde::{Deserialize, Serialize};

use crate::quantity::DurationUnit;

/// A bounded elapsed time attached to a `TimingRepeat` (`boundsDuration`).
/// Unlike `Duration` in `quantity.rs`, this is always finite — FHIR's wire
/// format has no representation for the open-ended maintenance phase, so
/// titration builders omit `boundsDuration` entirely for that phase instead
/// of encoding it here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsDuration {
    pub value: f64,
    pub unit: DurationUnit,
}

/// FHIR R4 `Timing.repeat` — the structured half of a dosing schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingRepeat {
    pub frequency: u32,
    pub period: f64,
    pub period_unit: DurationUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds_duration: Option<BoundsDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

impl TimingRepeat {
    pub fn new(frequency: u32, period: f64, period_unit: DurationUnit) -> Self {
        Self {
            frequency,
            period,
            period_unit,
            when: None,
            bounds_duration: None,
            count: None,
        }
    }

    /// Doses per day implied by this repeat, ignoring `boundsDuration`.
    pub fn doses_per_day(&self) -> f64 {
        let period_days = self.period * self.period_unit.days_factor();
        if period_days <= 0.0 {
            0.0
        } else {
            self.frequency as f64 / period_days
        }
    }
}

/// FHIR R4 `Timing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub repeat: TimingRepeat,
}
