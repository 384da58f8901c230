//! Typed failures for the engine.
//!
//! Only validation, semantic, and ambiguity errors are represented here —
//! clinical warnings and internal fallbacks never abort a call and instead
//! travel as data in `warnings: Vec<String>` fields.

use thiserror::Error;

/// A single matched-or-not candidate, used to explain ambiguous dispatch and
/// "no strategy matched" failures.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyCandidate {
    pub name: String,
    pub specificity: u8,
}

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// Kind 1 (Validation): a dose value/unit is malformed on its own terms
    /// (non-positive value, empty/unknown unit) — rejected before any
    /// medication-specific rule is consulted.
    #[error("invalid dose input: {reason}")]
    InvalidDoseInput { reason: String },

    /// Kind 1 (Validation): a timing string/array/FHIR Timing could not be
    /// parsed into a schedule at all.
    #[error("invalid timing input: {reason}")]
    InvalidTimingInput { reason: String },

    /// Kind 2 (Semantic): the requested route is not compatible with the
    /// medication's dose form.
    #[error("route '{route}' is not valid for dose form '{dose_form}'")]
    InvalidRouteForDoseForm { route: String, dose_form: String },

    /// Kind 1/5: no conversion path exists between the requested units for
    /// this medication (unrelated dimensions, missing strength ratio). Only
    /// raised when the caller required the conversion to succeed — display
    /// augmentation callers treat this as non-fatal per §4.3.
    #[error("cannot convert {from_unit} to {to_unit}: {reason}")]
    UnsupportedUnitConversion {
        from_unit: String,
        to_unit: String,
        reason: String,
    },

    /// Kind 2 (Semantic): a fractional dose was requested that the
    /// medication's scoring does not permit.
    #[error("dose {dose} {unit} violates scoring rule {scoring:?}")]
    ScoringViolation {
        dose: f64,
        unit: String,
        scoring: String,
    },

    /// Kind 3 (Ambiguity): two or more base strategies at the same
    /// specificity matched the same context.
    #[error(
        "ambiguous strategy selection: {} candidates tied at specificity {specificity}: {}",
        candidates.len(),
        candidates.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
    )]
    AmbiguousStrategy {
        specificity: u8,
        candidates: Vec<StrategyCandidate>,
    },

    /// Kind 3: no registered base strategy matched the context.
    #[error(
        "no matching strategy; registered strategies: {}",
        registered.join(", ")
    )]
    NoMatchingStrategy { registered: Vec<String> },

    /// Kind 3: registry construction found two strategies/modifiers sharing
    /// a name.
    #[error("duplicate strategy name: '{name}'")]
    DuplicateStrategyName { name: String },

    /// Kind 3: registry construction found two modifiers sharing a
    /// priority.
    #[error("priority conflict: '{first}' and '{second}' both claim priority {priority}")]
    PriorityConflict {
        priority: u32,
        first: String,
        second: String,
    },

    /// Kind 2 (Semantic): a titration phase is malformed (zero duration, no
    /// maintenance phase where one was expected, phases out of order).
    #[error("invalid titration schedule: {reason}")]
    InvalidTitrationSchedule { reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
