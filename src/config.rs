//! Engine configuration.
//!
//! The domain-terminology vocabulary layer (patient/client/contact, loaded
//! from env) lives outside this core. What remains here is the small
//! amount of engine-internal tuning the dispatch layer needs: the
//! dispatcher's audit ring-buffer capacity. Read straight from `std::env`
//! rather than through a config crate. `UnitConverter`'s rounding
//! precision is a fixed constant (`units::DEFAULT_PRECISION`) — it has no
//! per-deployment knob, so it does not live here.

use std::env;

/// Default capacity of a `Dispatcher`'s audit ring buffer.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of entries a `Dispatcher`'s audit log retains before
    /// the oldest entries are evicted.
    pub audit_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Reads `DOSAGE_ENGINE_AUDIT_CAPACITY` from the environment, falling
    /// back to the documented default when unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let audit_capacity = env::var("DOSAGE_ENGINE_AUDIT_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.audit_capacity);
        Self { audit_capacity }
    }
}
