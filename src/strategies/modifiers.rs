//! Modifiers: priority-ordered transforms folded over the `Dosage` a base
//! strategy produced.

use fhir_types::{CodeableConcept, Dosage};

use crate::medication::MedicationRequestContext;
use crate::units::UnitConverter;
use crate::value_objects::DoseValue;

/// One row of the modifier table: a name, a unique priority (lower runs
/// first), and the `appliesTo`/`modify` behaviour.
pub struct ModifierDef {
    pub name: &'static str,
    pub priority: u32,
    pub applies_to: fn(&MedicationRequestContext) -> bool,
    pub modify: fn(Dosage, &MedicationRequestContext) -> Dosage,
    pub explain: fn() -> &'static str,
}

fn topiclick_applies(ctx: &MedicationRequestContext) -> bool {
    ctx.medication.has_topiclick_dispenser()
}

/// Annotates a Topiclick-dispensed instruction with the click-count and
/// priming note the builder pipeline's `TopiclickBuilder` also emits —
/// here as a modifier over whatever base strategy matched.
fn topiclick_modify(mut dosage: Dosage, ctx: &MedicationRequestContext) -> Dosage {
    if let Ok(dose_value) = ctx.dose.as_dose_value() {
        if let DoseValue::Count(count) = dose_value {
            if let Ok(mass) = UnitConverter::convert(dose_value, "mg", &ctx.medication) {
                dosage.text = format!(
                    "{} ({} clicks, {} mg)",
                    dosage.text.trim_end_matches('.'),
                    crate::builders::trim_trailing_zero(count.value),
                    crate::builders::trim_trailing_zero(mass.value())
                );
                dosage.text.push('.');
            }
        }
    }
    dosage
        .additional_instructions
        .push(CodeableConcept::text_only("Prime device with 4 clicks before first use"));
    dosage
}

pub const TOPICLICK_MODIFIER: ModifierDef = ModifierDef {
    name: "TopiclickModifier",
    priority: 10,
    applies_to: topiclick_applies,
    modify: topiclick_modify,
    explain: || "Adds click-count display and priming note for Topiclick-dispensed medications.",
};

fn strength_display_applies(ctx: &MedicationRequestContext) -> bool {
    ctx.medication.dose_form.is_solid_oral() && matches!(ctx.dose.unit(), "tablet" | "capsule" | "tablets" | "capsules")
}

/// Annotates a solid-oral dose expressed in tablets/capsules with the
/// total strength in mg, e.g. "Take 2 tablets... (1000 mg)."
fn strength_display_modify(mut dosage: Dosage, ctx: &MedicationRequestContext) -> Dosage {
    if let Ok(dose_value) = ctx.dose.as_dose_value() {
        if let Ok(mass) = UnitConverter::convert(dose_value, "mg", &ctx.medication) {
            dosage.text = format!(
                "{} ({} mg)",
                dosage.text.trim_end_matches('.'),
                crate::builders::trim_trailing_zero(mass.value())
            );
            dosage.text.push('.');
        }
    }
    dosage
}

pub const STRENGTH_DISPLAY_MODIFIER: ModifierDef = ModifierDef {
    name: "StrengthDisplayModifier",
    priority: 20,
    applies_to: strength_display_applies,
    modify: strength_display_modify,
    explain: || "Annotates solid-oral tablet/capsule doses with total strength in mg.",
};

/// The representative built-in modifier set.
pub fn default_modifiers() -> Vec<ModifierDef> {
    vec![TOPICLICK_MODIFIER, STRENGTH_DISPLAY_MODIFIER]
}
