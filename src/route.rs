//! Route Validator.
//!
//! Normalises a free-form administration route string against a fixed alias
//! table, looks up canonical route metadata, and — when a dose form is
//! supplied — checks bidirectional route/dose-form compatibility.

use std::collections::HashMap;

use fhir_types::Coding;

use crate::medication::DoseForm;
use crate::value_objects::Route;

/// Canonical route metadata, one entry per row of the route registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRoute {
    pub id: &'static str,
    pub snomed_code: &'static str,
    pub fhir_code: &'static str,
    pub display_text: &'static str,
    pub applicable_forms: &'static [DoseForm],
    pub requires_special_instructions: bool,
}

impl CanonicalRoute {
    pub fn coding(&self) -> Coding {
        Coding::snomed(self.snomed_code, self.display_text)
    }
}

const ORAL: &[DoseForm] = &[
    DoseForm::Tablet,
    DoseForm::Capsule,
    DoseForm::Odt,
    DoseForm::Troche,
    DoseForm::Solution,
    DoseForm::Suspension,
    DoseForm::Syrup,
    DoseForm::Elixir,
];
const INJECTABLE: &[DoseForm] = &[DoseForm::Injection, DoseForm::Vial];
const TOPICAL: &[DoseForm] = &[DoseForm::Cream, DoseForm::Gel, DoseForm::Ointment];
const TRANSDERMAL: &[DoseForm] = &[DoseForm::Patch];
const RECTAL: &[DoseForm] = &[DoseForm::Suppository];
const NASAL: &[DoseForm] = &[DoseForm::NasalSpray, DoseForm::Drops];
const OPHTHALMIC_OTIC: &[DoseForm] = &[DoseForm::Drops];
const INHALED: &[DoseForm] = &[DoseForm::Inhaler];
const SUBLINGUAL: &[DoseForm] = &[DoseForm::Tablet, DoseForm::Troche];

/// The closed registry of canonical routes. Order is not significant; it is
/// a flat lookup table, not a priority list.
const REGISTRY: &[CanonicalRoute] = &[
    CanonicalRoute {
        id: "oral",
        snomed_code: "26643006",
        fhir_code: "PO",
        display_text: "Orally",
        applicable_forms: ORAL,
        requires_special_instructions: false,
    },
    CanonicalRoute {
        id: "sublingual",
        snomed_code: "37839007",
        fhir_code: "SL",
        display_text: "Sublingually",
        applicable_forms: SUBLINGUAL,
        requires_special_instructions: true,
    },
    CanonicalRoute {
        id: "intramuscular",
        snomed_code: "78421000",
        fhir_code: "IM",
        display_text: "Intramuscularly",
        applicable_forms: INJECTABLE,
        requires_special_instructions: true,
    },
    CanonicalRoute {
        id: "subcutaneous",
        snomed_code: "34206005",
        fhir_code: "SC",
        display_text: "Subcutaneously",
        applicable_forms: INJECTABLE,
        requires_special_instructions: true,
    },
    CanonicalRoute {
        id: "intravenous",
        snomed_code: "47625008",
        fhir_code: "IV",
        display_text: "Intravenously",
        applicable_forms: INJECTABLE,
        requires_special_instructions: true,
    },
    CanonicalRoute {
        id: "topical",
        snomed_code: "6064005",
        fhir_code: "TOP",
        display_text: "Topically",
        applicable_forms: TOPICAL,
        requires_special_instructions: false,
    },
    CanonicalRoute {
        id: "transdermal",
        snomed_code: "45890007",
        fhir_code: "TD",
        display_text: "Transdermally",
        applicable_forms: TRANSDERMAL,
        requires_special_instructions: true,
    },
    CanonicalRoute {
        id: "rectal",
        snomed_code: "37161004",
        fhir_code: "PR",
        display_text: "Rectally",
        applicable_forms: RECTAL,
        requires_special_instructions: true,
    },
    CanonicalRoute {
        id: "nasal",
        snomed_code: "46713006",
        fhir_code: "NASINHL",
        display_text: "Into the nose",
        applicable_forms: NASAL,
        requires_special_instructions: false,
    },
    CanonicalRoute {
        id: "ophthalmic",
        snomed_code: "54485002",
        fhir_code: "OPTHAL",
        display_text: "Into the eye",
        applicable_forms: OPHTHALMIC_OTIC,
        requires_special_instructions: true,
    },
    CanonicalRoute {
        id: "otic",
        snomed_code: "10547007",
        fhir_code: "AURICULAR",
        display_text: "Into the ear",
        applicable_forms: OPHTHALMIC_OTIC,
        requires_special_instructions: true,
    },
    CanonicalRoute {
        id: "inhaled",
        snomed_code: "447694001",
        fhir_code: "IPINHL",
        display_text: "By inhalation",
        applicable_forms: INHALED,
        requires_special_instructions: true,
    },
];

fn alias_table() -> &'static HashMap<&'static str, &'static str> {
    use std::sync::OnceLock;
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            ("po", "oral"),
            ("by mouth", "oral"),
            ("oral", "oral"),
            ("orally", "oral"),
            ("sl", "sublingual"),
            ("sublingual", "sublingual"),
            ("sublingually", "sublingual"),
            ("under the tongue", "sublingual"),
            ("im", "intramuscular"),
            ("intramuscular", "intramuscular"),
            ("intramuscularly", "intramuscular"),
            ("sc", "subcutaneous"),
            ("sq", "subcutaneous"),
            ("subq", "subcutaneous"),
            ("subcut", "subcutaneous"),
            ("subcutaneous", "subcutaneous"),
            ("subcutaneously", "subcutaneous"),
            ("iv", "intravenous"),
            ("intravenous", "intravenous"),
            ("intravenously", "intravenous"),
            ("top", "topical"),
            ("topical", "topical"),
            ("topically", "topical"),
            ("apply to skin", "topical"),
            ("td", "transdermal"),
            ("transdermal", "transdermal"),
            ("transdermally", "transdermal"),
            ("patch", "transdermal"),
            ("pr", "rectal"),
            ("rectal", "rectal"),
            ("rectally", "rectal"),
            ("per rectum", "rectal"),
            ("nasal", "nasal"),
            ("nasally", "nasal"),
            ("intranasal", "nasal"),
            ("intranasally", "nasal"),
            ("into the nose", "nasal"),
            ("ou", "ophthalmic"),
            ("os", "ophthalmic"),
            ("od", "ophthalmic"),
            ("ophthalmic", "ophthalmic"),
            ("into the eye", "ophthalmic"),
            ("au", "otic"),
            ("as", "otic"),
            ("ad", "otic"),
            ("otic", "otic"),
            ("into the ear", "otic"),
            ("inh", "inhaled"),
            ("inhaled", "inhaled"),
            ("by inhalation", "inhaled"),
            ("nebulized", "inhaled"),
        ])
    })
}

fn lookup_id(id: &str) -> Option<&'static CanonicalRoute> {
    REGISTRY.iter().find(|r| r.id == id)
}

/// Outcome of `RouteValidator::validate`.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggested_routes: Vec<String>,
    pub route: Option<Route>,
    pub canonical: Option<CanonicalRoute>,
}

pub struct RouteValidator;

impl RouteValidator {
    /// Normalises `raw` against the alias table and, if `dose_form` is
    /// given, checks it is one of the canonical route's applicable forms.
    pub fn validate(raw: &str, dose_form: Option<DoseForm>) -> RouteValidation {
        let normalized = raw.trim().to_lowercase();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let canonical_id = alias_table().get(normalized.as_str()).copied();

        let Some(canonical_id) = canonical_id else {
            let suggestions = Self::suggest(&normalized);
            errors.push(format!("unrecognised route '{raw}'"));
            return RouteValidation {
                is_valid: false,
                errors,
                warnings,
                suggested_routes: suggestions,
                route: None,
                canonical: None,
            };
        };

        let canonical = lookup_id(canonical_id)
            .cloned()
            .expect("alias table only points at registered canonical routes");

        if let Some(form) = dose_form {
            if !canonical.applicable_forms.contains(&form) {
                errors.push(format!(
                    "route '{}' is not valid for dose form '{}'",
                    canonical.display_text, form
                ));
            }
        } else {
            warnings.push("no dose form supplied; route/dose-form compatibility not checked".to_string());
        }

        if canonical.requires_special_instructions {
            warnings.push(format!(
                "route '{}' typically requires special administration instructions",
                canonical.display_text
            ));
        }

        let is_valid = errors.is_empty();
        RouteValidation {
            is_valid,
            errors,
            warnings,
            suggested_routes: Vec::new(),
            route: is_valid.then(|| Route(canonical.display_text.to_string())),
            canonical: Some(canonical),
        }
    }

    /// Fuzzy suggestions using Levenshtein distance ≤ 2 over canonical
    /// display names and ids.
    fn suggest(normalized: &str) -> Vec<String> {
        let mut candidates: Vec<(u32, &'static str)> = REGISTRY
            .iter()
            .flat_map(|r| [r.id, r.display_text])
            .map(|name| (levenshtein(normalized, &name.to_lowercase()), name))
            .filter(|(distance, _)| *distance <= 2)
            .collect();
        candidates.sort_by_key(|(distance, _)| *distance);
        candidates.dedup_by_key(|(_, name)| *name);
        candidates.into_iter().map(|(_, name)| name.to_string()).collect()
    }
}

/// Classic dynamic-programming edit distance; route names are short enough
/// that the O(n*m) table is negligible.
fn levenshtein(a: &str, b: &str) -> u32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    let mut row: Vec<u32> = (0..=m as u32).collect();
    for i in 1..=n {
        let mut prev_diag = row[0];
        row[0] = i as u32;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            let temp = row[j];
            row[j] = (row[j] + 1).min(row[j - 1] + 1).min(prev_diag + cost);
            prev_diag = temp;
        }
    }
    row[m]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn po_normalizes_to_oral() {
        let v = RouteValidator::validate("po", Some(DoseForm::Tablet));
        assert!(v.is_valid);
        assert_eq!(v.route.unwrap().as_str(), "Orally");
    }

    #[test]
    fn im_is_incompatible_with_tablet() {
        let v = RouteValidator::validate("im", Some(DoseForm::Tablet));
        assert!(!v.is_valid);
        assert!(!v.errors.is_empty());
    }

    #[test]
    fn unknown_dose_form_yields_warning_not_failure() {
        let v = RouteValidator::validate("po", None);
        assert!(v.is_valid);
        assert!(v.warnings.iter().any(|w| w.contains("no dose form")));
    }

    #[test]
    fn unknown_route_offers_fuzzy_suggestions() {
        let v = RouteValidator::validate("oraly", None);
        assert!(!v.is_valid);
        assert!(v.suggested_routes.iter().any(|s| s == "oral" || s == "Orally"));
    }

    #[test]
    fn transdermal_route_requires_special_instructions_warning() {
        let v = RouteValidator::validate("patch", Some(DoseForm::Patch));
        assert!(v.is_valid);
        assert!(v.warnings.iter().any(|w| w.contains("special administration")));
    }

    #[test]
    fn levenshtein_distance_matches_known_values() {
        assert_eq!(levenshtein("oral", "oral"), 0);
        assert_eq!(levenshtein("oral", "orla"), 2);
        assert_eq!(levenshtein("im", "iv"), 1);
    }
}
