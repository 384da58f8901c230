//! FHIR R4 data shapes shared by the medication signature engine.
//!
//! This crate holds only the slice of the FHIR R4 model the engine actually
//! emits — `Dosage` and the value types it is built from. It does not model
//! `Patient`, `Encounter`, or other resources; callers that need those bring
//! their own types and reference this crate's `Dosage` from within a
//! `MedicationRequest.dosageInstruction`.

pub mod codeable_concept;
pub mod dosage;
pub mod quantity;
pub mod timing;

pub use codeable_concept::{CodeableConcept, Coding};
pub use dosage::{Dosage, DoseAndRate, Relationship, RelationshipType};
pub use quantity::{Duration, DurationUnit, Quantity, Range, Ratio};
pub use timing::{BoundsDuration, Timing, TimingRepeat};
