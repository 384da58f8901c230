//! Strategies, Modifiers, Registry, and Dispatcher.
//!
//! A rule-based alternative to the builder pipeline for medications that
//! need a bespoke rendering. The registry is an immutable value built once
//! at start-up and threaded through `dispatch`; the dispatcher holds it
//! plus a per-instance audit ring buffer and performance counters.

pub mod base;
pub mod modifiers;

use std::time::{Duration as StdDuration, Instant};

use fhir_types::Dosage;

use crate::error::{EngineError, StrategyCandidate};
use crate::medication::MedicationRequestContext;

pub use base::StrategyDef;
pub use modifiers::ModifierDef;

/// Specificity ordinal: higher wins when more than one base strategy
/// matches a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Specificity {
    Default = 0,
    DoseForm = 1,
    DoseFormAndIngredient = 2,
    MedicationId = 3,
    MedicationSku = 4,
}

impl Specificity {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// An immutable, validated set of base strategies and modifiers.
/// Construction fails if two entries share a name, or two modifiers share
/// a priority.
pub struct Registry {
    strategies: Vec<StrategyDef>,
    modifiers: Vec<ModifierDef>,
}

impl Registry {
    pub fn new(strategies: Vec<StrategyDef>, modifiers: Vec<ModifierDef>) -> Result<Self, EngineError> {
        for (i, a) in strategies.iter().enumerate() {
            for b in &strategies[i + 1..] {
                if a.name == b.name {
                    return Err(EngineError::DuplicateStrategyName { name: a.name.to_string() });
                }
            }
        }
        for (i, a) in modifiers.iter().enumerate() {
            for b in &modifiers[i + 1..] {
                if a.name == b.name {
                    return Err(EngineError::DuplicateStrategyName { name: a.name.to_string() });
                }
                if a.priority == b.priority {
                    return Err(EngineError::PriorityConflict {
                        priority: a.priority,
                        first: a.name.to_string(),
                        second: b.name.to_string(),
                    });
                }
            }
        }
        Ok(Self { strategies, modifiers })
    }

    /// The registry built-in to this crate: `base::default_strategies()` +
    /// `modifiers::default_modifiers()`. Never fails — the built-in set is
    /// constructed to be internally consistent.
    pub fn default_registry() -> Self {
        Self::new(base::default_strategies(), modifiers::default_modifiers())
            .expect("built-in strategy/modifier set has no name or priority collisions")
    }

    pub fn strategies(&self) -> &[StrategyDef] {
        &self.strategies
    }

    pub fn modifiers(&self) -> &[ModifierDef] {
        &self.modifiers
    }
}

/// A single audit-log entry: which strategies matched (and at what
/// specificity), which one was selected, which modifiers ran, and how
/// long the dispatch took.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub request_id: String,
    pub matched: Vec<StrategyCandidate>,
    pub selected: String,
    pub modifiers_applied: Vec<String>,
    pub duration: StdDuration,
}

/// `Dispatcher::preview`'s result: what dispatch *would* select, without
/// executing a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub selected_strategy: String,
    pub applicable_modifiers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceStats {
    pub count: usize,
    pub mean: StdDuration,
    pub p50: StdDuration,
    pub p95: StdDuration,
    pub p99: StdDuration,
}

impl PerformanceStats {
    fn empty() -> Self {
        Self {
            count: 0,
            mean: StdDuration::ZERO,
            p50: StdDuration::ZERO,
            p95: StdDuration::ZERO,
            p99: StdDuration::ZERO,
        }
    }
}

fn percentile(sorted: &[StdDuration], pct: f64) -> StdDuration {
    if sorted.is_empty() {
        return StdDuration::ZERO;
    }
    let rank = ((sorted.len() as f64 - 1.0) * pct).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Selects the highest-specificity matching base strategy, folds
/// applicable modifiers over its output in ascending-priority order, and
/// records one audit entry per dispatch. Single-threaded and synchronous —
/// callers sharing a `Dispatcher` across threads must supply their own
/// mutual exclusion around `dispatch`/`get_audit_log`/`clear_audit_log`.
pub struct Dispatcher {
    registry: Registry,
    audit_capacity: usize,
    audit_log: Vec<AuditEntry>,
    durations: Vec<StdDuration>,
}

impl Dispatcher {
    pub fn new(registry: Registry, audit_capacity: usize) -> Self {
        Self {
            registry,
            audit_capacity,
            audit_log: Vec::new(),
            durations: Vec::new(),
        }
    }

    pub fn with_default_registry() -> Self {
        Self::new(Registry::default_registry(), crate::config::DEFAULT_AUDIT_CAPACITY)
    }

    /// Step 1-2: compute `matches` for every base strategy, sort by
    /// specificity descending, and reject ties at the top.
    fn select_strategy(&self, ctx: &MedicationRequestContext) -> Result<(&StrategyDef, Vec<StrategyCandidate>), EngineError> {
        let mut matched: Vec<&StrategyDef> = self
            .registry
            .strategies()
            .iter()
            .filter(|s| (s.matches)(ctx))
            .collect();

        let candidates: Vec<StrategyCandidate> = matched
            .iter()
            .map(|s| StrategyCandidate {
                name: s.name.to_string(),
                specificity: s.specificity.as_u8(),
            })
            .collect();

        if matched.is_empty() {
            return Err(EngineError::NoMatchingStrategy {
                registered: self.registry.strategies().iter().map(|s| s.name.to_string()).collect(),
            });
        }

        matched.sort_by(|a, b| b.specificity.cmp(&a.specificity));
        if matched.len() > 1 && matched[0].specificity == matched[1].specificity {
            let tied_specificity = matched[0].specificity.as_u8();
            let tied: Vec<StrategyCandidate> = matched
                .iter()
                .filter(|s| s.specificity.as_u8() == tied_specificity)
                .map(|s| StrategyCandidate { name: s.name.to_string(), specificity: tied_specificity })
                .collect();
            return Err(EngineError::AmbiguousStrategy {
                specificity: tied_specificity,
                candidates: tied,
            });
        }

        Ok((matched[0], candidates))
    }

    fn applicable_modifiers(&self, ctx: &MedicationRequestContext) -> Vec<&ModifierDef> {
        let mut applicable: Vec<&ModifierDef> = self
            .registry
            .modifiers()
            .iter()
            .filter(|m| (m.applies_to)(ctx))
            .collect();
        applicable.sort_by_key(|m| m.priority);
        applicable
    }

    /// Selects a strategy, applies matching modifiers, and records one
    /// audit entry.
    pub fn dispatch(&mut self, ctx: &MedicationRequestContext) -> Result<Dosage, EngineError> {
        let start = Instant::now();
        let (strategy, matched) = self.select_strategy(ctx)?;
        tracing::debug!(strategy = strategy.name, request_id = %ctx.request_id, "strategy selected");
        let mut dosage = (strategy.build)(ctx)?;

        let applicable = self.applicable_modifiers(ctx);
        let mut modifiers_applied = Vec::with_capacity(applicable.len());
        for modifier in applicable {
            tracing::debug!(modifier = modifier.name, request_id = %ctx.request_id, "modifier applied");
            dosage = (modifier.modify)(dosage, ctx);
            modifiers_applied.push(modifier.name.to_string());
        }

        let duration = start.elapsed();
        if duration.as_millis() > 5 {
            tracing::warn!(?duration, request_id = %ctx.request_id, "dispatch exceeded the 5ms soft budget");
        }
        self.record(AuditEntry {
            request_id: ctx.request_id.clone(),
            matched,
            selected: strategy.name.to_string(),
            modifiers_applied,
            duration,
        });

        Ok(dosage)
    }

    fn record(&mut self, entry: AuditEntry) {
        self.durations.push(entry.duration);
        self.audit_log.push(entry);
        if self.audit_log.len() > self.audit_capacity {
            let overflow = self.audit_log.len() - self.audit_capacity;
            self.audit_log.drain(0..overflow);
        }
    }

    /// Returns the strategy/modifiers dispatch *would* select, without
    /// building anything or recording an audit entry.
    pub fn preview(&self, ctx: &MedicationRequestContext) -> Result<Preview, EngineError> {
        let (strategy, _) = self.select_strategy(ctx)?;
        let applicable_modifiers = self.applicable_modifiers(ctx).into_iter().map(|m| m.name.to_string()).collect();
        Ok(Preview {
            selected_strategy: strategy.name.to_string(),
            applicable_modifiers,
        })
    }

    /// A multi-line human trace of every strategy's match result and,
    /// where dispatch would succeed, the winning strategy and modifier
    /// chain.
    pub fn explain_selection(&self, ctx: &MedicationRequestContext) -> String {
        let mut lines = Vec::new();
        for strategy in self.registry.strategies() {
            let matched = (strategy.matches)(ctx);
            lines.push(format!(
                "{} (specificity {}): {}",
                strategy.name,
                strategy.specificity.as_u8(),
                if matched { "matched" } else { "no match" }
            ));
        }
        match self.select_strategy(ctx) {
            Ok((strategy, _)) => {
                lines.push(format!("selected: {}", strategy.name));
                for modifier in self.applicable_modifiers(ctx) {
                    lines.push(format!("modifier applied: {} (priority {})", modifier.name, modifier.priority));
                }
            }
            Err(e) => lines.push(format!("dispatch would fail: {e}")),
        }
        lines.join("\n")
    }

    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit_log
    }

    pub fn clear_audit_log(&mut self) {
        self.audit_log.clear();
        self.durations.clear();
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        if self.durations.is_empty() {
            return PerformanceStats::empty();
        }
        let mut sorted = self.durations.clone();
        sorted.sort();
        let total: StdDuration = sorted.iter().sum();
        PerformanceStats {
            count: sorted.len(),
            mean: total / sorted.len() as u32,
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medication::{
        DoseForm, DoseInput, FrequencyInput, Ingredient, MedicationClassification, MedicationProfile, PatientContext,
    };
    use fhir_types::{Quantity as Q, Ratio};
    use pretty_assertions::assert_eq;

    fn metformin() -> MedicationProfile {
        MedicationProfile {
            id: "metformin-500".to_string(),
            display_name: "Metformin 500 mg tablet".to_string(),
            classification: MedicationClassification::Medication,
            dose_form: DoseForm::Tablet,
            ingredients: vec![Ingredient {
                name: "Metformin".to_string(),
                strength_ratio: Ratio::new(Q::new(500.0, "mg"), Q::new(1.0, "tablet")),
            }],
            scoring: None,
            dispenser: None,
            dosage_constraints: None,
            package: None,
            eligible_genders: Vec::new(),
            route_whitelist: Vec::new(),
        }
    }

    fn ctx() -> MedicationRequestContext {
        MedicationRequestContext {
            request_id: "req-1".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            medication: metformin(),
            patient: PatientContext::default(),
            dose: DoseInput::Single { value: 1.0, unit: "tablet".to_string() },
            frequency: FrequencyInput::Text("twice daily".to_string()),
            route: "Orally".to_string(),
            duration: None,
            dispense_quantity: None,
            refills: None,
            special_instructions: None,
            as_needed: false,
            max_dose_per_period: None,
            frequency_range: None,
            titration_phase_doses: None,
        }
    }

    #[test]
    fn dispatch_picks_tablet_strategy_over_default() {
        let mut dispatcher = Dispatcher::with_default_registry();
        let dosage = dispatcher.dispatch(&ctx()).unwrap();
        assert!(dosage.text.starts_with("Take 1 tablet"));
        assert_eq!(dispatcher.audit_log().len(), 1);
        assert_eq!(dispatcher.audit_log()[0].selected, "TabletStrategy");
    }

    #[test]
    fn strength_display_modifier_runs_for_tablet_dose() {
        let mut dispatcher = Dispatcher::with_default_registry();
        let dosage = dispatcher.dispatch(&ctx()).unwrap();
        assert!(dosage.text.contains("500 mg"));
    }

    #[test]
    fn testosterone_cypionate_wins_over_liquid_strategy_by_specificity() {
        let mut med = metformin();
        med.id = "testosterone-cypionate".to_string();
        med.dose_form = DoseForm::Injection;
        med.ingredients[0].strength_ratio = Ratio::new(Q::new(200.0, "mg"), Q::new(1.0, "mL"));
        let mut c = ctx();
        c.medication = med;
        c.dose = DoseInput::Single { value: 100.0, unit: "mg".to_string() };
        c.route = "Intramuscularly".to_string();

        let mut dispatcher = Dispatcher::with_default_registry();
        dispatcher.dispatch(&c).unwrap();
        assert_eq!(dispatcher.audit_log()[0].selected, "TestosteroneCypionateStrategy");
    }

    #[test]
    fn duplicate_strategy_name_fails_registration() {
        let strategies = vec![base::DEFAULT_STRATEGY, base::DEFAULT_STRATEGY];
        let result = Registry::new(strategies, Vec::new());
        assert!(matches!(result, Err(EngineError::DuplicateStrategyName { .. })));
    }

    #[test]
    fn duplicate_modifier_priority_fails_registration() {
        let mut mods = modifiers::default_modifiers();
        mods[1].priority = mods[0].priority;
        let result = Registry::new(base::default_strategies(), mods);
        assert!(matches!(result, Err(EngineError::PriorityConflict { .. })));
    }

    #[test]
    fn ambiguous_strategies_throw_when_tied_at_same_specificity() {
        let mut clone_of_tablet = base::TABLET_STRATEGY;
        clone_of_tablet.name = "DuplicateTabletStrategy";
        let registry = Registry::new(vec![base::TABLET_STRATEGY, clone_of_tablet], Vec::new()).unwrap();
        let mut dispatcher = Dispatcher::new(registry, 10);
        let result = dispatcher.dispatch(&ctx());
        assert!(matches!(result, Err(EngineError::AmbiguousStrategy { .. })));
    }

    #[test]
    fn no_matching_strategy_lists_registered_names() {
        let registry = Registry::new(vec![base::TESTOSTERONE_CYPIONATE_STRATEGY], Vec::new()).unwrap();
        let mut dispatcher = Dispatcher::new(registry, 10);
        let result = dispatcher.dispatch(&ctx());
        match result {
            Err(EngineError::NoMatchingStrategy { registered }) => {
                assert_eq!(registered, vec!["TestosteroneCypionateStrategy".to_string()]);
            }
            _ => panic!("expected NoMatchingStrategy"),
        }
    }

    #[test]
    fn preview_does_not_record_an_audit_entry() {
        let dispatcher = Dispatcher::with_default_registry();
        let preview = dispatcher.preview(&ctx()).unwrap();
        assert_eq!(preview.selected_strategy, "TabletStrategy");
        assert_eq!(dispatcher.audit_log().len(), 0);
    }

    #[test]
    fn audit_log_is_a_bounded_ring_buffer() {
        let mut dispatcher = Dispatcher::new(Registry::default_registry(), 2);
        for _ in 0..5 {
            dispatcher.dispatch(&ctx()).unwrap();
        }
        assert_eq!(dispatcher.audit_log().len(), 2);
    }

    #[test]
    fn clear_audit_log_empties_entries_and_stats() {
        let mut dispatcher = Dispatcher::with_default_registry();
        dispatcher.dispatch(&ctx()).unwrap();
        dispatcher.clear_audit_log();
        assert_eq!(dispatcher.audit_log().len(), 0);
        assert_eq!(dispatcher.performance_stats().count, 0);
    }

    #[test]
    fn performance_stats_count_matches_dispatch_count() {
        let mut dispatcher = Dispatcher::with_default_registry();
        for _ in 0..3 {
            dispatcher.dispatch(&ctx()).unwrap();
        }
        assert_eq!(dispatcher.performance_stats().count, 3);
    }

    #[test]
    fn explain_selection_names_the_winner() {
        let dispatcher = Dispatcher::with_default_registry();
        let trace = dispatcher.explain_selection(&ctx());
        assert!(trace.contains("selected: TabletStrategy"));
    }
}
