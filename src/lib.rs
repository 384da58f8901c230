//! Medication signature builder and days-supply engine.
//!
//! Two independent pipelines render a `MedicationRequestContext` into a
//! FHIR R4 `Dosage`: [`builders::build_signature`] assembles one
//! dose-form-specific aspect at a time, and [`strategies::Dispatcher`]
//! selects a whole-instruction strategy by specificity and folds
//! priority-ordered modifiers over it. [`days_supply::calculate_days_supply`]
//! runs an analogous specificity dispatch over tablet/liquid/titration
//! calculation strategies.

pub mod builders;
pub mod config;
pub mod days_supply;
pub mod error;
pub mod medication;
pub mod route;
pub mod strategies;
pub mod template;
pub mod temporal;
pub mod units;
pub mod value_objects;

pub use config::EngineConfig;
pub use days_supply::{calculate_days_supply, DaysSupplyContext, DaysSupplyResult, PhaseBreakdown};
pub use error::{EngineError, EngineResult, StrategyCandidate};
pub use medication::{DoseForm, MedicationProfile, MedicationRequestContext};
pub use strategies::{Dispatcher, Registry, Specificity};

/// Renders `ctx` through the builder pipeline (the dose-form factory plus
/// its aspect modules). The strategy/modifier pipeline
/// ([`strategies::Dispatcher`]) is the independent alternative for
/// medications registered with a bespoke strategy.
pub fn build_signature(ctx: &MedicationRequestContext) -> EngineResult<Vec<fhir_types::Dosage>> {
    builders::build_signature(ctx)
}
